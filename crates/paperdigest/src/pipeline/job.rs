use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::RecordId;

/// Inbound job request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub record_id: RecordId,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Job {
    /// Log correlation only.
    pub id: String,
    pub record_id: RecordId,
    pub prompt: Option<String>,
    pub category_override: Option<String>,
}

impl Job {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            record_id,
            prompt: None,
            category_override: None,
        }
    }

    pub fn from_request(request: JobRequest) -> Self {
        let blank_to_none = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Self {
            prompt: blank_to_none(request.prompt),
            category_override: blank_to_none(request.category),
            ..Self::new(request.record_id)
        }
    }
}

/// What a finished job produced. Absent keys were not produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_pdf_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobResult {
    Completed(JobResponse),
    /// The job stopped at Fetch.
    Failed { error: String },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Completed(_))
    }
}
