//! TOML configuration.
//!
//! Every section is optional and falls back to defaults, so an empty file
//! is a valid configuration (with embeddings and generation disabled).
//! Settings are static for the lifetime of the process.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory uploaded files are saved into before extraction.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Path of the index file. The metadata sidecar lives next to it.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            index_path: default_index_path(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploaded_files")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./vector_db.index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Base URL, only used by the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Credential override; otherwise read from the provider's env var.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout(),
            url: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            api_key: None,
        }
    }
}

fn default_max_tokens() -> usize {
    500
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Run Tesseract over images and rasterised PDF pages.
    #[serde(default = "default_true")]
    pub ocr: bool,
    #[serde(default = "default_tesseract")]
    pub tesseract_path: PathBuf,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: PathBuf,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    #[serde(default = "default_min_table_rows")]
    pub min_table_rows: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr: true,
            tesseract_path: default_tesseract(),
            pdftoppm_path: default_pdftoppm(),
            ocr_dpi: default_ocr_dpi(),
            min_table_rows: default_min_table_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tesseract() -> PathBuf {
    PathBuf::from("tesseract")
}
fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}
fn default_ocr_dpi() -> u32 {
    200
}
fn default_min_table_rows() -> usize {
    2
}

/// Read, parse and validate a config file, then create the storage
/// directories it names.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    prepare_storage(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    if !(0.0..=5.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 5.0]");
    }

    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "cohere" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, cohere, or local.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "cohere" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, cohere, or openai.",
            other
        ),
    }

    Ok(())
}

/// Make sure the upload directory and the index's parent directory exist.
pub fn prepare_storage(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.storage.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory: {}",
            config.storage.upload_dir.display()
        )
    })?;

    if let Some(parent) = config.storage.index_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.embedding.batch_size, 32);
        assert_eq!(cfg.generation.max_tokens, 500);
        assert!((cfg.generation.temperature - 0.2).abs() < f32::EPSILON);
        assert!(!cfg.embedding.is_enabled());
        validate(&cfg).unwrap();
    }

    #[test]
    fn enabled_embedding_requires_dims_and_model() {
        let cfg: Config = toml::from_str("[embedding]\nprovider = \"openai\"\n").unwrap();
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("embedding.dims"), "{}", err);

        let cfg: Config =
            toml::from_str("[embedding]\nprovider = \"openai\"\ndims = 8\n").unwrap();
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("embedding.model"), "{}", err);
    }

    #[test]
    fn unknown_generation_provider_rejected() {
        let cfg: Config = toml::from_str("[generation]\nprovider = \"palm\"\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let cfg: Config = toml::from_str("[retrieval]\ntop_k = 0\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn load_config_creates_storage_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        let cfg_path = root.join("docrag.toml");
        std::fs::write(
            &cfg_path,
            format!(
                "[storage]\nupload_dir = \"{}/uploads\"\nindex_path = \"{}/db/vector.index\"\n",
                root.display(),
                root.display()
            ),
        )
        .unwrap();

        load_config(&cfg_path).unwrap();
        assert!(root.join("uploads").is_dir());
        assert!(root.join("db").is_dir());
    }
}
