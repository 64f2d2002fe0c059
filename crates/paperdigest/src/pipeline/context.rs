use std::fmt;

use crate::archive::ArchiveLink;
use crate::categorizer::Category;
use crate::processor::{Extraction, SourceDocument};
use crate::record::Record;
use crate::report::RenderedReport;
use crate::summarizer::Summary;

use super::error::PipelineError;
use super::job::Job;
use super::workspace::JobWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Classify,
    UploadOriginal,
    PersistOriginalLink,
    ExtractText,
    Summarize,
    PersistSummaryText,
    RenderReport,
    UploadReport,
    PersistReportLink,
    ClearSource,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Classify => "classify",
            Stage::UploadOriginal => "upload_original",
            Stage::PersistOriginalLink => "persist_original_link",
            Stage::ExtractText => "extract_text",
            Stage::Summarize => "summarize",
            Stage::PersistSummaryText => "persist_summary_text",
            Stage::RenderReport => "render_report",
            Stage::UploadReport => "upload_report",
            Stage::PersistReportLink => "persist_report_link",
            Stage::ClearSource => "clear_source",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
}

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Fetch: dropped (and deleted) when the job ends
    pub workspace: Option<JobWorkspace>,
    pub record: Option<Record>,
    pub document: Option<SourceDocument>,

    pub category: Option<Category>,
    pub original_link: Option<ArchiveLink>,
    pub extraction: Option<Extraction>,
    pub summary: Option<Summary>,
    pub report: Option<RenderedReport>,
    pub summary_link: Option<ArchiveLink>,

    /// One entry per stage reached, in execution order.
    pub journal: Vec<StageRecord>,

    /// Non-fatal failures, in the order they happened.
    pub errors: Vec<PipelineError>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            workspace: None,
            record: None,
            document: None,
            category: None,
            original_link: None,
            extraction: None,
            summary: None,
            report: None,
            summary_link: None,
            journal: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn complete(&mut self, stage: Stage) {
        self.journal.push(StageRecord {
            stage,
            status: StageStatus::Completed,
        });
    }

    pub fn skip(&mut self, stage: Stage) {
        tracing::debug!(stage = %stage, "Stage skipped");
        self.journal.push(StageRecord {
            stage,
            status: StageStatus::Skipped,
        });
    }

    /// Logs the failure and records it against `stage`.
    pub fn fail(&mut self, stage: Stage, error: PipelineError) {
        match &error {
            PipelineError::Configuration { .. } | PipelineError::Fetch(_) => {
                tracing::error!(stage = %stage, error = %error, "Stage failed")
            }
            _ => tracing::warn!(stage = %stage, error = %error, "Stage failed"),
        }
        self.journal.push(StageRecord {
            stage,
            status: StageStatus::Failed(error.to_string()),
        });
        self.errors.push(error);
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.journal
            .iter()
            .rev()
            .find(|r| r.stage == stage)
            .map(|r| &r.status)
    }
}
