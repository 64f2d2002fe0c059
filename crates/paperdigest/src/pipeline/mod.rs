pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod runner;
pub mod workspace;

pub use config::PipelineConfig;
pub use context::{PipelineContext, Stage, StageRecord, StageStatus};
pub use error::{FetchError, PipelineError};
pub use job::{Job, JobRequest, JobResponse, JobResult};
pub use runner::Pipeline;
pub use workspace::JobWorkspace;
