use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::CloudOcrConfig;
use crate::error::ProcessError;
use crate::http::describe_error;
use crate::processor::ocr::OcrEngine;
use crate::sanitize::truncate_body;

/// Google Cloud Vision `images:annotate` with `DOCUMENT_TEXT_DETECTION`.
pub struct CloudVisionEngine {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    language_hints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    full_text_annotation: Option<FullText>,
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct FullText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

impl CloudVisionEngine {
    pub fn new(client: Client, config: &CloudOcrConfig, api_key: SecretString) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            language_hints: config.language_hints.clone(),
        }
    }

    fn request_body(&self, image_data: &[u8]) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": base64::engine::general_purpose::STANDARD.encode(image_data) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": self.language_hints },
            }]
        })
    }
}

/// Prefers the full-page annotation, then the first text annotation.
fn page_text(response: AnnotateResponse) -> Result<String, ProcessError> {
    let page = response.responses.into_iter().next().unwrap_or_default();

    if let Some(status) = page.error {
        return Err(ProcessError::CloudOcr(status.message));
    }

    if let Some(full) = page.full_text_annotation {
        return Ok(full.text);
    }
    Ok(page
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description)
        .unwrap_or_default())
}

#[async_trait]
impl OcrEngine for CloudVisionEngine {
    async fn recognize(&self, image: &Path) -> Result<String, ProcessError> {
        let data = tokio::fs::read(image)
            .await
            .map_err(|e| ProcessError::ReadDocument {
                path: image.to_path_buf(),
                source: e,
            })?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&self.request_body(&data))
            .send()
            .await
            .map_err(|e| ProcessError::CloudOcr(describe_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessError::CloudOcr(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_body(&body)
            )));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| ProcessError::CloudOcr(describe_error(&e)))?;
        page_text(parsed)
    }
}
