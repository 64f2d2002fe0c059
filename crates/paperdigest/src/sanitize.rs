//! Helpers for sanitizing data before it enters logs, spans or the filesystem.
//!
//! Collaborator URLs carry API keys as query parameters and attachment names
//! come from a remote system; neither is trusted as-is.

use std::path::Path;

/// Query parameters whose values are masked by [`redact_url`].
const SECRET_PARAMS: &[&str] = &["key", "api_key", "access_token", "token"];

/// Maximum length of a collaborator error body kept for logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks secret query parameter values in a URL.
///
/// - `https://host/v1/x?key=abc&alt=json` → `https://host/v1/x?key=****&alt=json`
/// - `https://host/v1/x` → unchanged
pub fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if SECRET_PARAMS.contains(&name) => format!("{}=****", name),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", base, redacted.join("&"))
}

/// Truncates a collaborator error body so responses don't flood the logs.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

/// Makes a remote attachment name safe to use as a single path component.
///
/// Path separators and control characters become `_`, leading dots are
/// stripped, and an empty result falls back to `document`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}
