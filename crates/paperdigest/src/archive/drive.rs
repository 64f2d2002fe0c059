use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{ArchiveBackend, ArchiveError, UploadedFile};
use crate::http::describe_error;
use crate::sanitize::truncate_body;

/// Google Drive v3, shared drives included.
pub struct DriveBackend {
    client: Client,
    api_base: String,
    upload_base: String,
    access_token: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl DriveBackend {
    pub fn new(
        client: Client,
        api_base: &str,
        upload_base: &str,
        access_token: SecretString,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            access_token,
        }
    }
}

/// `multipart/related` body: JSON metadata part, then the media part.
fn multipart_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {ct}\r\n\r\n",
            b = boundary,
            m = metadata,
            ct = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

fn fallback_link(id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", id)
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {}: {}", status, truncate_body(&body))
}

#[async_trait]
impl ArchiveBackend for DriveBackend {
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<UploadedFile, ArchiveError> {
        let boundary = format!("paperdigest-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [folder] });

        let response = self
            .client
            .post(format!("{}/files", self.upload_base))
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id,name,webViewLink"),
            ])
            .bearer_auth(self.access_token.expose_secret())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(multipart_body(&boundary, &metadata, content_type, bytes))
            .send()
            .await
            .map_err(|e| ArchiveError::Upload(describe_error(&e)))?;

        if !response.status().is_success() {
            return Err(ArchiveError::Upload(error_body(response).await));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| ArchiveError::Upload(describe_error(&e)))?;

        tracing::debug!(file_id = %file.id, "Uploaded to Drive");
        Ok(UploadedFile {
            web_link: file.web_view_link.unwrap_or_else(|| fallback_link(&file.id)),
            name: file.name.unwrap_or_else(|| name.to_string()),
            id: file.id,
        })
    }

    async fn set_public_readable(&self, file: &UploadedFile) -> Result<(), ArchiveError> {
        let response = self
            .client
            .post(format!("{}/files/{}/permissions", self.api_base, file.id))
            .query(&[("supportsAllDrives", "true")])
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| ArchiveError::Permission {
                name: file.name.clone(),
                reason: describe_error(&e),
            })?;

        if !response.status().is_success() {
            return Err(ArchiveError::Permission {
                name: file.name.clone(),
                reason: error_body(response).await,
            });
        }
        Ok(())
    }
}
