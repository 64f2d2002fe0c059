//! Text extraction: a cascade of strategies from cheapest to most expensive.

pub mod cloud_ocr;
pub mod document;
pub mod ocr;
pub mod pdf;
pub mod raster;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::Instrument;

use crate::config::OcrConfig;
use crate::error::ProcessError;

pub use cloud_ocr::CloudVisionEngine;
pub use document::{DocumentFormat, SourceDocument};
pub use ocr::{OcrEngine, PageOcr, TesseractEngine};
pub use pdf::NativeTextLayer;
pub use raster::{PageRasterizer, PdftoppmRasterizer};

/// One way of turning a document into text.
#[async_trait]
pub trait TextStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Empty text means "nothing found", not an error.
    async fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, ProcessError>;
}

/// What a strategy sees. Page images are rendered at most once per
/// extraction and shared by every OCR strategy.
pub struct ExtractionInput<'a> {
    document: &'a SourceDocument,
    work_dir: &'a Path,
    rasterizer: &'a dyn PageRasterizer,
    pages: OnceCell<Result<Vec<PathBuf>, String>>,
}

impl<'a> ExtractionInput<'a> {
    pub fn new(
        document: &'a SourceDocument,
        work_dir: &'a Path,
        rasterizer: &'a dyn PageRasterizer,
    ) -> Self {
        Self {
            document,
            work_dir,
            rasterizer,
            pages: OnceCell::new(),
        }
    }

    pub fn document(&self) -> &SourceDocument {
        self.document
    }

    /// Page images in page order. An image document is its own single page.
    pub async fn pages(&self) -> Result<&[PathBuf], ProcessError> {
        let pages = self
            .pages
            .get_or_init(|| async {
                match self.document.format {
                    DocumentFormat::Image => Ok(vec![self.document.path.clone()]),
                    DocumentFormat::Pdf => self
                        .rasterizer
                        .rasterize(&self.document.path, &self.work_dir.join("pages"))
                        .await
                        .map_err(|e| e.to_string()),
                }
            })
            .await;

        match pages {
            Ok(pages) => Ok(pages.as_slice()),
            Err(message) => Err(ProcessError::Rasterize(message.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Text { chars: usize },
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
}

/// Result of a cascade run. Empty `text` is a valid outcome.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    /// Strategy that produced `text`, if any did.
    pub strategy: Option<String>,
    pub attempts: Vec<Attempt>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub struct ExtractionCascade {
    strategies: Vec<Box<dyn TextStrategy>>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl ExtractionCascade {
    pub fn new(strategies: Vec<Box<dyn TextStrategy>>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            strategies,
            rasterizer,
        }
    }

    /// Native layer, then the enabled OCR engines in order.
    ///
    /// Cloud OCR is left out of the chain when its API key cannot be resolved.
    pub fn from_config(config: &OcrConfig, client: &Client, request_timeout: Duration) -> Self {
        let mut strategies: Vec<Box<dyn TextStrategy>> = vec![Box::new(NativeTextLayer::new())];

        if config.local.enabled {
            strategies.push(Box::new(PageOcr::new(
                "local_ocr",
                Arc::new(TesseractEngine::new(&config.local.languages)),
                config.page_concurrency,
            )));
        }

        if config.cloud.enabled {
            match config.cloud.api_key.resolve("ocr.cloud.api_key") {
                Ok(key) => strategies.push(Box::new(PageOcr::new(
                    "cloud_ocr",
                    Arc::new(CloudVisionEngine::new(client.clone(), &config.cloud, key)),
                    config.page_concurrency,
                ))),
                Err(e) => tracing::warn!(error = %e, "Cloud OCR disabled: no API key"),
            }
        }

        Self::new(
            strategies,
            Arc::new(PdftoppmRasterizer::new(config.dpi, request_timeout)),
        )
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs strategies in order until one yields non-blank text. Never fails.
    pub async fn extract(&self, document: &SourceDocument, work_dir: &Path) -> Extraction {
        let input = ExtractionInput::new(document, work_dir, self.rasterizer.as_ref());
        let mut extraction = Extraction::default();

        for strategy in &self.strategies {
            let name = strategy.name();
            let result = strategy
                .extract(&input)
                .instrument(tracing::info_span!("processor.strategy", strategy = name))
                .await;

            let outcome = match result {
                Ok(text) if !text.trim().is_empty() => {
                    let chars = text.chars().count();
                    tracing::info!(strategy = name, chars, "Text extracted");
                    extraction.attempts.push(Attempt {
                        strategy: name.to_string(),
                        outcome: AttemptOutcome::Text { chars },
                    });
                    extraction.text = text;
                    extraction.strategy = Some(name.to_string());
                    return extraction;
                }
                Ok(_) => {
                    tracing::debug!(strategy = name, "No text, trying next strategy");
                    AttemptOutcome::Empty
                }
                Err(e) => {
                    tracing::warn!(strategy = name, error = %e, "Strategy failed, trying next");
                    AttemptOutcome::Failed(e.to_string())
                }
            };

            extraction.attempts.push(Attempt {
                strategy: name.to_string(),
                outcome,
            });
        }

        extraction
    }
}
