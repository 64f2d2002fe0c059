use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{truncate_chars, Summarizer, Summary};
use crate::config::SummarizerConfig;
use crate::http::describe_error;
use crate::sanitize::truncate_body;

/// Gemini `generateContent`.
pub struct GeminiSummarizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    placeholder: String,
    max_content_chars: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiSummarizer {
    pub fn new(client: Client, config: &SummarizerConfig, api_key: SecretString) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            placeholder: config.placeholder.clone(),
            max_content_chars: config.max_content_chars,
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, text: &str, instruction: &str) -> serde_json::Value {
        let content = truncate_chars(text, self.max_content_chars);
        json!({
            "contents": [{
                "parts": [{ "text": format!("{}\n\n{}", instruction, content) }]
            }]
        })
    }

    async fn generate(&self, text: &str, instruction: &str) -> Result<Option<String>, String> {
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&self.request_body(text, instruction))
            .send()
            .await
            .map_err(|e| describe_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), truncate_body(&body)));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| describe_error(&e))?;
        Ok(first_text(parsed))
    }
}

/// `candidates[0].content.parts[0].text`, if present and non-blank.
fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|t| !t.trim().is_empty())
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str, instruction: &str) -> Summary {
        if text.trim().is_empty() {
            debug!("No text to summarize");
            return Summary::placeholder(&self.placeholder);
        }

        match self.generate(text, instruction).await {
            Ok(Some(summary)) => Summary::generated(summary),
            Ok(None) => {
                warn!(model = %self.model, "Summarizer returned no candidate text");
                Summary::placeholder(&self.placeholder)
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Summarization failed");
                Summary::placeholder(&self.placeholder)
            }
        }
    }
}
