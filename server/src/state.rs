use std::sync::Arc;
use std::time::Instant;

use paperdigest::Pipeline;

/// Shared across handlers. The pipeline holds only immutable configuration
/// and collaborator clients, so concurrent jobs share nothing mutable.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            start_time: Instant::now(),
        }
    }
}
