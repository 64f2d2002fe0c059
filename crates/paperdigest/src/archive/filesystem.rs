use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;

use super::{ArchiveBackend, ArchiveError, UploadedFile};
use crate::sanitize::sanitize_file_name;

/// Archive on a local (or mounted) filesystem, published under `base_url`.
///
/// Folder ids are directory names under the root.
pub struct LocalArchive {
    root: PathBuf,
    base_url: String,
}

const MAX_NAME_ATTEMPTS: usize = 1000;

impl LocalArchive {
    pub fn new<P: AsRef<Path>>(root: P, base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn link_for(&self, folder: &str, file_name: &str) -> Result<String, ArchiveError> {
        let mut url = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| ArchiveError::Upload(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ArchiveError::Upload("Base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(folder)
            .push(file_name);
        Ok(url.into())
    }
}

/// Creates `name` in `dir` with O_EXCL, numbering it `name_2.ext`,
/// `name_3.ext`, ... until a free name is found.
fn create_unique(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf, ArchiveError> {
    let (base, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot..])),
        _ => (name, None),
    };

    for counter in 1..=MAX_NAME_ATTEMPTS {
        let candidate = match (counter, ext) {
            (1, _) => name.to_string(),
            (n, Some(ext)) => format!("{}_{}{}", base, n, ext),
            (n, None) => format!("{}_{}", base, n),
        };
        let path = dir.join(&candidate);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| ArchiveError::WriteFile {
                        path: path.clone(),
                        source: e,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ArchiveError::WriteFile { path, source: e }),
        }
    }

    Err(ArchiveError::FileExists(dir.join(name)))
}

#[async_trait]
impl ArchiveBackend for LocalArchive {
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        _content_type: &str,
        folder: &str,
    ) -> Result<UploadedFile, ArchiveError> {
        let folder = sanitize_file_name(folder);
        let dir = self.root.join(&folder);
        let name = sanitize_file_name(name);
        let content = bytes.to_vec();

        let path = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::WriteFile {
                path: dir.clone(),
                source: e,
            })?;
            create_unique(&dir, &name, &content)
        })
        .await
        .map_err(|e| ArchiveError::Upload(format!("Archive task failed: {}", e)))??;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(UploadedFile {
            id: format!("{}/{}", folder, file_name),
            web_link: self.link_for(&folder, &file_name)?,
            name: file_name,
        })
    }

    async fn set_public_readable(&self, file: &UploadedFile) -> Result<(), ArchiveError> {
        let path = self.root.join(&file.id);
        let permission_error = |e: std::io::Error| ArchiveError::Permission {
            name: file.name.clone(),
            reason: e.to_string(),
        };

        let mut permissions = tokio::fs::metadata(&path)
            .await
            .map_err(permission_error)?
            .permissions();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            permissions.set_mode(0o644);
        }
        #[cfg(not(unix))]
        permissions.set_readonly(false);

        tokio::fs::set_permissions(&path, permissions)
            .await
            .map_err(permission_error)
    }
}
