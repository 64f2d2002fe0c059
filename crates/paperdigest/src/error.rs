use std::path::PathBuf;
use thiserror::Error;

pub use crate::archive::ArchiveError;
pub use crate::record::RecordError;
pub use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum PaperdigestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Record store error: {0}")]
    Record(#[from] RecordError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid keyword rule for category '{category}': {reason}")]
    InvalidRule { category: String, reason: String },

    #[error("Invalid environment override '{name}': {reason}")]
    InvalidOverride { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to rasterize pages: {0}")]
    Rasterize(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Cloud OCR request failed: {0}")]
    CloudOcr(String),

    #[error("Report rendering failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, PaperdigestError>;
