//! Generative summarization.

pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiSummarizer;

/// Summary text; never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    /// `text` is the failure placeholder rather than a generated summary.
    pub degraded: bool,
}

impl Summary {
    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            degraded: false,
        }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            degraded: true,
        }
    }
}

/// Turns document text plus an instruction into a summary.
///
/// Implementations never fail: every error becomes a degraded summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, instruction: &str) -> Summary;
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
