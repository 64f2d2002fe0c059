//! kintone REST adapter (`/k/v1/record.json`, `/k/v1/file.json`).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{FieldValue, Record, RecordError, RecordId, RecordStore};
use crate::config::RecordStoreConfig;
use crate::http::describe_error;
use crate::sanitize::truncate_body;

const TOKEN_HEADER: &str = "X-Cybozu-API-Token";

pub struct KintoneClient {
    client: Client,
    base_url: String,
    app_id: u64,
    api_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: HashMap<String, FieldEnvelope>,
}

#[derive(Debug, Deserialize)]
struct FieldEnvelope {
    #[serde(default)]
    value: serde_json::Value,
}

impl KintoneClient {
    pub fn new(client: Client, config: &RecordStoreConfig, api_token: SecretString) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id,
            api_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/k/v1/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RecordError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RecordError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

#[async_trait]
impl RecordStore for KintoneClient {
    async fn get_record(&self, id: &RecordId) -> Result<Record, RecordError> {
        debug!(record_id = %id, "Fetching record");

        let app = self.app_id.to_string();
        let response = self
            .client
            .get(self.url("record.json"))
            .header(TOKEN_HEADER, self.api_token.expose_secret())
            .query(&[("app", app.as_str()), ("id", id.as_str())])
            .send()
            .await
            .map_err(|e| RecordError::Request(describe_error(&e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RecordError::NotFound(id.clone()));
        }
        let response = Self::check(response).await?;

        let parsed: RecordResponse = response
            .json()
            .await
            .map_err(|e| RecordError::Decode(describe_error(&e)))?;

        Ok(Record {
            id: id.clone(),
            fields: parsed
                .record
                .into_iter()
                .map(|(code, field)| (code, field.value))
                .collect(),
        })
    }

    async fn download(&self, file_key: &str) -> Result<Vec<u8>, RecordError> {
        debug!("Downloading attachment");

        let response = self
            .client
            .get(self.url("file.json"))
            .header(TOKEN_HEADER, self.api_token.expose_secret())
            .query(&[("fileKey", file_key)])
            .send()
            .await
            .map_err(|e| RecordError::Request(describe_error(&e)))?;
        let response = Self::check(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RecordError::Request(describe_error(&e)))?;
        Ok(bytes.to_vec())
    }

    async fn put_field(
        &self,
        id: &RecordId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), RecordError> {
        debug!(record_id = %id, field, "Updating record field");

        let body = serde_json::json!({
            "app": self.app_id,
            "id": id.as_str(),
            "record": { field: { "value": value.to_json() } },
        });

        let response = self
            .client
            .put(self.url("record.json"))
            .header(TOKEN_HEADER, self.api_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| RecordError::Request(describe_error(&e)))?;
        Self::check(response).await?;
        Ok(())
    }
}
