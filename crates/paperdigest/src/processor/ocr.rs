use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::error::ProcessError;
use crate::processor::{ExtractionInput, TextStrategy};
use crate::sanitize::redact_path;

/// Recognizes the text of a single page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, ProcessError>;
}

/// Local Tesseract OCR through leptess.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    languages: String,
}

impl TesseractEngine {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "jpn".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn recognize_bytes(languages: &str, image_data: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.tesseract").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // leptess only reads encoded images; normalize to PNG
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &Path) -> Result<String, ProcessError> {
        let data = tokio::fs::read(image)
            .await
            .map_err(|e| ProcessError::ReadDocument {
                path: image.to_path_buf(),
                source: e,
            })?;

        let languages = self.languages.clone();
        tokio::task::spawn_blocking(move || Self::recognize_bytes(&languages, &data))
            .await
            .map_err(|e| ProcessError::OcrFailed(format!("OCR task failed: {}", e)))?
    }
}

/// Runs an [`OcrEngine`] over every page of the document.
///
/// Up to `concurrency` pages are in flight at once; the joined text is always
/// in page order. A failed page is skipped, and the strategy only fails when
/// no page could be read at all.
pub struct PageOcr {
    name: String,
    engine: Arc<dyn OcrEngine>,
    concurrency: usize,
}

impl PageOcr {
    pub fn new(name: impl Into<String>, engine: Arc<dyn OcrEngine>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            engine,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl TextStrategy for PageOcr {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, ProcessError> {
        let pages = input.pages().await?;
        if pages.is_empty() {
            return Ok(String::new());
        }

        let results: Vec<Result<String, ProcessError>> = stream::iter(pages.iter().cloned())
            .map(|page| {
                let engine = Arc::clone(&self.engine);
                async move { engine.recognize(&page).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut texts = Vec::with_capacity(results.len());
        let mut failures = 0usize;
        for (page, result) in pages.iter().zip(results) {
            match result {
                Ok(text) => texts.push(text.trim().to_string()),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        strategy = %self.name,
                        page = %redact_path(page),
                        error = %e,
                        "Page OCR failed, skipping page"
                    );
                }
            }
        }

        if failures == pages.len() {
            return Err(ProcessError::OcrFailed(format!(
                "{}: all {} pages failed",
                self.name, failures
            )));
        }

        texts.retain(|t| !t.is_empty());
        Ok(texts.join("\n"))
    }
}
