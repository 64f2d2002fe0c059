use async_trait::async_trait;

use crate::error::ProcessError;
use crate::processor::document::DocumentFormat;
use crate::processor::{ExtractionInput, TextStrategy};

/// Reads the embedded text layer with lopdf. No rendering, no OCR.
#[derive(Debug, Default)]
pub struct NativeTextLayer;

impl NativeTextLayer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextStrategy for NativeTextLayer {
    fn name(&self) -> &str {
        "native"
    }

    async fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, ProcessError> {
        let document = input.document();
        if document.format != DocumentFormat::Pdf {
            return Ok(String::new());
        }

        let bytes = document.bytes.clone();
        let text = tokio::task::spawn_blocking(move || extract_text_layer(&bytes))
            .await
            .map_err(|e| ProcessError::PdfProcessing(format!("Text extraction task failed: {}", e)))??;

        if is_unusable(&text) {
            tracing::debug!(chars = text.chars().count(), "Text layer unusable");
            return Ok(String::new());
        }
        Ok(text)
    }
}

/// Text of every page in page-number order, one page per line block.
fn extract_text_layer(pdf_bytes: &[u8]) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.native").entered();

    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::debug!(page = page_num, error = %e, "Page has no readable text"),
        }
    }

    Ok(text)
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this length the alphanumeric ratio is not checked.
const MIN_TOTAL_CHARS: usize = 50;

const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// True when a text layer exists but carries nothing worth summarizing:
/// whitespace, undecodable-font markers, or mostly non-alphanumeric noise.
fn is_unusable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}
