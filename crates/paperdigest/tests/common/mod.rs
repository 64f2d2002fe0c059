//! Shared utilities for paperdigest integration tests.
//!
//! - `TestHarness` runs jobs against an archive in a temp directory
//! - Builders create configurations programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
