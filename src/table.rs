//! Table detection from glyph positions.
//!
//! [`PageLayout`] is a `pdf-extract` output device that records where each
//! glyph lands on the page and groups glyphs into [`TextRun`]s: a run ends
//! when the baseline changes or the next glyph starts more than one em past
//! the previous one. Runs sharing a baseline form a row, and a row with at
//! least two cells is a table row. A table is a run of consecutive table
//! rows, rendered one row per line with cells joined by `" | "`; rows
//! shorter than the widest row are padded with empty cells.

use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};

/// Horizontal gap, in ems, that separates two cells.
const COLUMN_GAP_EM: f64 = 1.0;

/// Baseline drift, in ems, still treated as the same row.
const ROW_TOLERANCE_EM: f64 = 0.5;

/// A table found on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Pipe-delimited rendering, missing cells as `""`.
    pub fn render(&self) -> String {
        let width = self.width();
        self.rows
            .iter()
            .map(|row| {
                (0..width)
                    .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Glyphs drawn on one baseline without a column-sized gap.
///
/// Coordinates are in page space with `y` growing downwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub end_x: f64,
    pub size: f64,
    pub text: String,
}

impl TextRun {
    fn continues_with(&self, x: f64, y: f64) -> bool {
        (y - self.y).abs() <= self.size * ROW_TOLERANCE_EM
            && x + self.size * ROW_TOLERANCE_EM >= self.end_x
            && x - self.end_x <= self.size * COLUMN_GAP_EM
    }
}

/// Output device collecting the [`TextRun`]s of every page.
#[derive(Debug, Default)]
pub struct PageLayout {
    pages: Vec<(u32, Vec<TextRun>)>,
    page_height: f64,
    current: Option<TextRun>,
}

impl PageLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs per page, in the order the pages were rendered.
    pub fn into_pages(mut self) -> Vec<(u32, Vec<TextRun>)> {
        self.finish_run();
        self.pages
    }

    fn finish_run(&mut self) {
        let Some(mut run) = self.current.take() else {
            return;
        };
        let text = run.text.trim();
        if text.is_empty() {
            return;
        }
        run.text = text.to_string();
        if let Some((_, runs)) = self.pages.last_mut() {
            runs.push(run);
        }
    }
}

impl OutputDev for PageLayout {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.finish_run();
        self.page_height = media_box.ury - media_box.lly;
        self.pages.push((page_num, Vec::new()));
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.finish_run();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        ch: &str,
    ) -> Result<(), OutputError> {
        let x = trm.m31;
        let y = self.page_height - trm.m32;
        let scaled = (font_size * (trm.m11 + trm.m21)) * (font_size * (trm.m12 + trm.m22));
        let size = match scaled.abs().sqrt() {
            s if s.is_finite() && s > 0.0 => s,
            _ => font_size.abs().max(1.0),
        };
        let end_x = x + width * size;

        if !self.current.as_ref().is_some_and(|run| run.continues_with(x, y)) {
            self.finish_run();
            self.current = Some(TextRun {
                x,
                y,
                end_x,
                size,
                text: String::new(),
            });
        }
        if let Some(run) = self.current.as_mut() {
            run.text.push_str(ch);
            run.end_x = run.end_x.max(end_x);
        }
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Group runs into rows top to bottom, each row's cells left to right.
///
/// Runs on the same baseline closer than a column gap share one cell.
pub fn rows_from_runs(runs: &[TextRun]) -> Vec<Vec<String>> {
    let mut sorted: Vec<&TextRun> = runs.iter().collect();
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    for run in sorted {
        match lines.last_mut() {
            Some(line) if (run.y - line[0].y).abs() <= line[0].size * ROW_TOLERANCE_EM => {
                line.push(run)
            }
            _ => lines.push(vec![run]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut cells: Vec<String> = Vec::new();
            let mut last_end = f64::NEG_INFINITY;
            for run in line {
                match cells.last_mut() {
                    Some(cell) if run.x - last_end <= run.size * COLUMN_GAP_EM => {
                        cell.push(' ');
                        cell.push_str(&run.text);
                    }
                    _ => cells.push(run.text.clone()),
                }
                last_end = last_end.max(run.end_x);
            }
            cells
        })
        .collect()
}

/// Find tables among one page's runs.
pub fn detect_tables(runs: &[TextRun], min_rows: usize) -> Vec<Table> {
    let min_rows = min_rows.max(1);
    let mut tables = Vec::new();
    let mut pending: Vec<Vec<String>> = Vec::new();

    for cells in rows_from_runs(runs) {
        if cells.len() >= 2 {
            pending.push(cells);
            continue;
        }
        flush(&mut pending, min_rows, &mut tables);
    }
    flush(&mut pending, min_rows, &mut tables);

    tables
}

fn flush(pending: &mut Vec<Vec<String>>, min_rows: usize, out: &mut Vec<Table>) {
    if pending.len() >= min_rows {
        out.push(Table {
            rows: std::mem::take(pending),
        });
    } else {
        pending.clear();
    }
}
