//! HTTP wrapper around the paperdigest pipeline: one job endpoint plus a
//! health check.

pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod state;

pub use error::{ApiError, ServerError};
pub use routes::{create_router, serve};
pub use state::AppState;
