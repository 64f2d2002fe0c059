use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProcessError;

/// Renders every page of a PDF to an image file.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Returns page images in page order.
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ProcessError>;
}

/// poppler's `pdftoppm`, run as a child process.
pub struct PdftoppmRasterizer {
    dpi: u32,
    timeout: Duration,
}

const PAGE_PREFIX: &str = "page";

impl PdftoppmRasterizer {
    pub fn new(dpi: u32, timeout: Duration) -> Self {
        Self { dpi, timeout }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ProcessError::Rasterize(format!("Failed to create page directory: {}", e)))?;

        let mut command = Command::new("pdftoppm");
        command
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                ProcessError::Rasterize(format!("pdftoppm timed out after {:?}", self.timeout))
            })?
            .map_err(|e| {
                ProcessError::Rasterize(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ProcessError::Rasterize(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_pages(out_dir).await?;
        if pages.is_empty() {
            return Err(ProcessError::Rasterize("pdftoppm produced no pages".to_string()));
        }
        tracing::debug!(pages = pages.len(), dpi = self.dpi, "Rasterized PDF");
        Ok(pages)
    }
}

/// Lists `page-N.png` files sorted by N. pdftoppm zero-pads N to the width
/// of the page count, so a plain name sort is not enough.
async fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ProcessError::Rasterize(format!("Failed to list rendered pages: {}", e)))?;

    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ProcessError::Rasterize(format!("Failed to list rendered pages: {}", e)))?
    {
        let path = entry.path();
        if let Some(number) = page_number(&path) {
            pages.push((number, path));
        }
    }

    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some("png") {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}
