use std::path::{Path, PathBuf};

use crate::error::ProcessError;
use crate::sanitize::sanitize_file_name;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    /// Sniffs the content first and falls back to the file extension.
    pub fn detect(bytes: &[u8], file_name: &str) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(DocumentFormat::Pdf);
        }
        if image::guess_format(bytes).is_ok() {
            return Some(DocumentFormat::Image);
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(extension)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp" => {
                Some(DocumentFormat::Image)
            }
            _ => None,
        }
    }
}

/// The fetched attachment, copied into the job workspace.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub format: DocumentFormat,
    pub content_type: String,
    pub path: PathBuf,
    /// Record title, used for classification and the report heading.
    pub title: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Detects the format and writes `bytes` into `dir`.
    pub async fn materialize(
        file_name: &str,
        bytes: Vec<u8>,
        title: Option<String>,
        dir: &Path,
    ) -> Result<Self, ProcessError> {
        let format = DocumentFormat::detect(&bytes, file_name)
            .ok_or_else(|| ProcessError::UnsupportedFormat(file_name.to_string()))?;

        let content_type = match format {
            DocumentFormat::Pdf => "application/pdf".to_string(),
            DocumentFormat::Image => mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let safe_name = sanitize_file_name(file_name);
        let path = dir.join(&safe_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ProcessError::ReadDocument {
                path: path.clone(),
                source: e,
            })?;

        Ok(Self {
            file_name: file_name.to_string(),
            format,
            content_type,
            path,
            title,
            bytes,
        })
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
    }
}
