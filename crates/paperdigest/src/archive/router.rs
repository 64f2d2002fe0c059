use std::sync::Arc;

use reqwest::Client;

use super::{ArchiveBackend, ArchiveError, ArchiveLink, DriveBackend, LocalArchive};
use crate::categorizer::Category;
use crate::config::{ArchiveBackendConfig, ArchiveConfig, ArtifactKind, FolderTable};
use crate::error::PaperdigestError;

/// Resolves `(artifact kind, category)` to a folder and archives there.
pub struct ArchiveRouter {
    folders: FolderTable,
    backend: Arc<dyn ArchiveBackend>,
}

impl ArchiveRouter {
    pub fn new(folders: FolderTable, backend: Arc<dyn ArchiveBackend>) -> Self {
        Self { folders, backend }
    }

    pub fn from_config(config: &ArchiveConfig, client: &Client) -> Result<Self, PaperdigestError> {
        let backend: Arc<dyn ArchiveBackend> = match &config.backend {
            ArchiveBackendConfig::Drive {
                api_base,
                upload_base,
                access_token,
            } => Arc::new(DriveBackend::new(
                client.clone(),
                api_base,
                upload_base,
                access_token.resolve("archive.backend.access_token")?,
            )),
            ArchiveBackendConfig::Local {
                directory,
                base_url,
            } => Arc::new(LocalArchive::new(directory, base_url)),
        };
        Ok(Self::new(config.folders.clone(), backend))
    }

    /// Folder id for the pair. A missing entry is a configuration error.
    pub fn route(&self, kind: ArtifactKind, category: &Category) -> Result<&str, ArchiveError> {
        self.folders
            .get(&kind)
            .and_then(|by_category| by_category.get(category.as_str()))
            .map(String::as_str)
            .ok_or_else(|| {
                tracing::error!(
                    kind = %kind,
                    category = %category,
                    "No archive folder configured"
                );
                ArchiveError::Unconfigured {
                    kind,
                    category: category.to_string(),
                }
            })
    }

    /// Uploads and shares one artifact. Both steps must succeed.
    pub async fn archive(
        &self,
        kind: ArtifactKind,
        category: &Category,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<ArchiveLink, ArchiveError> {
        let folder = self.route(kind, category)?;

        let file = self.backend.upload(bytes, name, content_type, folder).await?;
        self.backend.set_public_readable(&file).await?;

        tracing::info!(kind = %kind, category = %category, file = %file.name, "Archived");
        Ok(ArchiveLink::new(file.web_link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStorage;
    use std::collections::BTreeMap;

    fn folders() -> FolderTable {
        BTreeMap::from([
            (
                ArtifactKind::Original,
                BTreeMap::from([("invoice".to_string(), "orig-inv".to_string())]),
            ),
            (
                ArtifactKind::Summary,
                BTreeMap::from([("invoice".to_string(), "sum-inv".to_string())]),
            ),
        ])
    }

    #[test]
    fn test_route_by_kind_and_category() {
        let router = ArchiveRouter::new(folders(), Arc::new(MockStorage::new()));
        let invoice = Category::new("invoice");
        assert_eq!(router.route(ArtifactKind::Original, &invoice).unwrap(), "orig-inv");
        assert_eq!(router.route(ArtifactKind::Summary, &invoice).unwrap(), "sum-inv");
    }

    #[test]
    fn test_route_missing_entry_is_unconfigured() {
        let router = ArchiveRouter::new(folders(), Arc::new(MockStorage::new()));
        let result = router.route(ArtifactKind::Summary, &Category::new("other"));
        assert!(matches!(
            result,
            Err(ArchiveError::Unconfigured { kind: ArtifactKind::Summary, ref category }) if category == "other"
        ));
    }

    #[tokio::test]
    async fn test_archive_uploads_then_shares() {
        let storage = Arc::new(MockStorage::new());
        let router = ArchiveRouter::new(folders(), storage.clone());

        let link = router
            .archive(
                ArtifactKind::Original,
                &Category::new("invoice"),
                b"%PDF",
                "a.pdf",
                "application/pdf",
            )
            .await
            .unwrap();

        assert_eq!(link.as_str(), "https://storage.test/orig-inv/a.pdf");
        assert_eq!(storage.uploads(), vec![("orig-inv".to_string(), "a.pdf".to_string())]);
        assert_eq!(storage.shared(), 1);
    }

    #[tokio::test]
    async fn test_share_failure_fails_archival() {
        let storage = Arc::new(MockStorage::new().fail_sharing());
        let router = ArchiveRouter::new(folders(), storage.clone());

        let result = router
            .archive(
                ArtifactKind::Original,
                &Category::new("invoice"),
                b"%PDF",
                "a.pdf",
                "application/pdf",
            )
            .await;

        assert!(matches!(result, Err(ArchiveError::Permission { .. })));
        assert_eq!(storage.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_route_never_uploads() {
        let storage = Arc::new(MockStorage::new());
        let router = ArchiveRouter::new(FolderTable::new(), storage.clone());

        let result = router
            .archive(ArtifactKind::Summary, &Category::new("other"), b"x", "s.pdf", "application/pdf")
            .await;

        assert!(matches!(result, Err(ArchiveError::Unconfigured { .. })));
        assert!(storage.uploads().is_empty());
    }
}
