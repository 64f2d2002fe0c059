//! Shared HTTP client construction for collaborator adapters.

use std::time::Duration;

use reqwest::Client;

use crate::config::HttpConfig;
use crate::error::PaperdigestError;

/// Builds a client with the configured connect and request timeouts.
///
/// A timed-out call surfaces as an ordinary `reqwest::Error`, so every adapter
/// treats it like any other failure of that call.
pub fn build_client(config: &HttpConfig) -> Result<Client, PaperdigestError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("paperdigest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PaperdigestError::HttpClient(e.to_string()))
}

/// Describes a `reqwest` failure without leaking secret query parameters.
pub(crate) fn describe_error(error: &reqwest::Error) -> String {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_decode() {
        "invalid response body"
    } else {
        "request failed"
    };

    match error.url() {
        Some(url) => format!("{} ({})", kind, crate::sanitize::redact_url(url.as_str())),
        None => kind.to_string(),
    }
}
