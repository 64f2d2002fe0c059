use thiserror::Error;

use crate::archive::ArchiveError;
use crate::config::ArtifactKind;
use crate::error::ProcessError;
use crate::record::RecordError;

/// Failures of the Fetch stage. Any of these ends the job.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch record: {0}")]
    Record(#[source] RecordError),

    #[error("Record has no file in attachment field '{field}'")]
    NoAttachment { field: String },

    #[error("Failed to download attachment: {0}")]
    Download(#[source] RecordError),

    #[error("Failed to create job workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Document(ProcessError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No extraction strategy produced text")]
    ExtractionExhausted,

    #[error("Summarizer returned the placeholder")]
    SummarizationDegraded,

    #[error("Archival failed: {0}")]
    Archival(#[source] ArchiveError),

    #[error("No {kind} folder configured for category '{category}'")]
    Configuration { kind: ArtifactKind, category: String },

    #[error("Failed to write field '{field}': {source}")]
    Persistence {
        field: String,
        #[source]
        source: RecordError,
    },

    #[error("Failed to render report: {0}")]
    Render(#[source] ProcessError),
}

impl PipelineError {
    /// Only fetch failures abort a job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Fetch(_))
    }
}

impl From<ArchiveError> for PipelineError {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::Unconfigured { kind, category } => {
                PipelineError::Configuration { kind, category }
            }
            other => PipelineError::Archival(other),
        }
    }
}
