//! Isolated pipeline runs for integration tests.
//!
//! The archive is a real [`LocalArchive`] in a temp directory; the record
//! store, summarizer and OCR engines are in-memory doubles.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use paperdigest::archive::LocalArchive;
use paperdigest::categorizer::Classifier;
use paperdigest::config::Config;
use paperdigest::processor::{ExtractionCascade, NativeTextLayer, PageOcr};
use paperdigest::report::PdfReportRenderer;
use paperdigest::testing::{MockOcrEngine, MockRasterizer, MockRecordStore, MockSummarizer};
use paperdigest::{ArchiveRouter, Job, JobResult, Pipeline, PipelineConfig, PipelineContext, RecordId};

use super::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub archive_dir: PathBuf,
    pub records: Arc<MockRecordStore>,
    pub summarizer: Arc<MockSummarizer>,
    pub local_ocr: Arc<MockOcrEngine>,
    pipeline: Pipeline,
}

impl TestHarness {
    /// `configure` receives a builder already pointed at the temp archive.
    pub fn new(
        records: MockRecordStore,
        configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder,
    ) -> Self {
        Self::with_ocr(records, MockOcrEngine::text("ocr text"), configure)
    }

    pub fn with_ocr(
        records: MockRecordStore,
        local_ocr: MockOcrEngine,
        configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let archive_dir = temp_dir.path().join("archive");
        let config = configure(
            ConfigBuilder::new().archive_dir(archive_dir.to_str().expect("utf-8 temp path")),
        )
        .build();

        let records = Arc::new(records);
        let summarizer = Arc::new(MockSummarizer::returning("SUMMARY"));
        let local_ocr = Arc::new(local_ocr);
        let pipeline = build_pipeline(&config, &archive_dir, &records, &summarizer, &local_ocr);

        Self {
            temp_dir,
            archive_dir,
            records,
            summarizer,
            local_ocr,
            pipeline,
        }
    }

    pub async fn run(&self, record_id: &str) -> (JobResult, PipelineContext) {
        self.run_job(Job::new(RecordId::new(record_id))).await
    }

    pub async fn run_job(&self, job: Job) -> (JobResult, PipelineContext) {
        self.pipeline.run(PipelineContext::new(job)).await
    }

    /// Archived files relative to the archive root, sorted.
    pub fn archived_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.archive_dir, &self.archive_dir, &mut files);
        files.sort();
        files
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn build_pipeline(
    config: &Config,
    archive_dir: &Path,
    records: &Arc<MockRecordStore>,
    summarizer: &Arc<MockSummarizer>,
    local_ocr: &Arc<MockOcrEngine>,
) -> Pipeline {
    let cascade = ExtractionCascade::new(
        vec![
            Box::new(NativeTextLayer::new()),
            Box::new(PageOcr::new("local_ocr", local_ocr.clone(), 2)),
        ],
        Arc::new(MockRasterizer::new(2)),
    );
    let archive = ArchiveRouter::new(
        config.archive.folders.clone(),
        Arc::new(LocalArchive::new(archive_dir, "https://files.test")),
    );

    Pipeline::new(
        Arc::new(PipelineConfig::from_config(config)),
        records.clone(),
        cascade,
        Classifier::new(&config.classifier),
        summarizer.clone(),
        Arc::new(PdfReportRenderer::new(&config.report)),
        archive,
    )
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}
