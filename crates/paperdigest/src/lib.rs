pub mod archive;
pub mod categorizer;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod processor;
pub mod record;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod summarizer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use archive::{ArchiveBackend, ArchiveLink, ArchiveRouter};
pub use categorizer::{Category, Classifier};
pub use config::{load_config, Config};
pub use error::{ConfigError, PaperdigestError, ProcessError, Result};
pub use pipeline::{
    Job, JobRequest, JobResponse, JobResult, Pipeline, PipelineConfig, PipelineContext,
    PipelineError, Stage,
};
pub use record::{RecordId, RecordStore};
pub use secrets::{resolve_secret, SecretError, SecretRef};
pub use summarizer::{Summarizer, Summary};
