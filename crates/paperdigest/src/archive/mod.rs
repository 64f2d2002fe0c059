//! Archival of job artifacts to folder-addressed storage.

pub mod drive;
pub mod filesystem;
pub mod router;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ArtifactKind;

pub use drive::DriveBackend;
pub use filesystem::LocalArchive;
pub use router::ArchiveRouter;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("No {kind} folder configured for category '{category}'")]
    Unconfigured { kind: ArtifactKind, category: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to make '{name}' readable by link: {reason}")]
    Permission { name: String, reason: String },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for '{0}'")]
    FileExists(PathBuf),
}

/// A stored artifact, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    /// Link that opens the file once it is shared.
    pub web_link: String,
}

/// Shareable URL of an archived artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLink(String);

impl ArchiveLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArchiveLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folder-addressed blob storage.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<UploadedFile, ArchiveError>;

    /// Grants read access to anyone holding the link.
    async fn set_public_readable(&self, file: &UploadedFile) -> Result<(), ArchiveError>;
}
