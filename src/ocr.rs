//! OCR through the Tesseract and Poppler command-line tools.
//!
//! Images are passed straight to `tesseract <image> stdout`. PDFs are first
//! rasterised to one PNG per page with `pdftoppm -png -r <dpi>` into a
//! temporary directory, then each page is OCR'd in page order.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::ExtractionConfig;
use crate::extract::ExtractError;

/// OCR a single image file and return the recognised text.
pub async fn ocr_image(config: &ExtractionConfig, image: &Path) -> Result<String, ExtractError> {
    let output = Command::new(&config.tesseract_path)
        .arg(image)
        .arg("stdout")
        .output()
        .await
        .map_err(|e| {
            ExtractError::Ocr(format!(
                "failed to execute '{}': {}. Is tesseract installed?",
                config.tesseract_path.display(),
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(format!(
            "tesseract failed on {}: {}",
            image.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Rasterise every page of a PDF and OCR it.
///
/// Returns `"Page N: <text>"` lines joined by `\n`; pages whose OCR output
/// is blank are left out. A failure on one page is logged and skipped.
pub async fn ocr_pdf_pages(config: &ExtractionConfig, pdf: &Path) -> Result<String, ExtractError> {
    let workdir = tempfile::TempDir::new()?;
    let prefix = workdir.path().join("page");

    let output = Command::new(&config.pdftoppm_path)
        .arg("-png")
        .arg("-r")
        .arg(config.ocr_dpi.to_string())
        .arg(pdf)
        .arg(&prefix)
        .output()
        .await
        .map_err(|e| {
            ExtractError::Ocr(format!(
                "failed to execute '{}': {}. Is poppler installed?",
                config.pdftoppm_path.display(),
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(format!(
            "pdftoppm failed on {}: {}",
            pdf.display(),
            stderr.trim()
        )));
    }

    let pages = rendered_pages(workdir.path())?;
    let mut lines = Vec::new();
    for (page, image) in pages {
        match ocr_image(config, &image).await {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(format!("Page {}: {}", page, text));
                }
            }
            Err(e) => {
                tracing::warn!(pdf = %pdf.display(), page, error = %e, "page OCR failed");
            }
        }
    }

    Ok(lines.join("\n"))
}

/// List `page-<n>.png` files produced by pdftoppm, sorted by page number.
///
/// pdftoppm zero-pads the page number to the width of the page count, so
/// the number is parsed rather than sorted lexically.
fn rendered_pages(dir: &Path) -> Result<Vec<(u32, PathBuf)>, ExtractError> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(page) = page_number(&path) {
            pages.push((page, path));
        }
    }
    pages.sort_by_key(|(page, _)| *page);
    Ok(pages)
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit_once('-')?.1.parse().ok()
}
