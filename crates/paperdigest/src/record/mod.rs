//! Record-management backend: the only durable state this pipeline touches.

pub mod kintone;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use kintone::KintoneClient;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record store request failed: {0}")]
    Request(String),

    #[error("Record store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Record '{0}' not found")]
    NotFound(RecordId),

    #[error("Failed to decode record store response: {0}")]
    Decode(String),
}

/// Opaque record identifier. Accepts JSON strings and numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_json::Value;

        match Value::deserialize(deserializer)? {
            Value::String(s) if !s.trim().is_empty() => Ok(RecordId(s.trim().to_string())),
            Value::Number(n) => Ok(RecordId(n.to_string())),
            _ => Err(D::Error::custom("record id must be a non-empty string or a number")),
        }
    }
}

/// One file stored in an attachment field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_key: String,
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// A fetched record: field code → raw field value.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub fields: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    pub fn with_text(mut self, field: &str, value: &str) -> Self {
        self.fields
            .insert(field.to_string(), serde_json::Value::String(value.to_string()));
        self
    }

    pub fn with_attachments(mut self, field: &str, attachments: Vec<Attachment>) -> Self {
        let value = serde_json::to_value(attachments).unwrap_or(serde_json::Value::Null);
        self.fields.insert(field.to_string(), value);
        self
    }

    /// Text value of a field; empty strings count as absent.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Files in an attachment field, in stored order.
    pub fn attachments(&self, field: &str) -> Vec<Attachment> {
        self.fields
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// A value written back to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Replaces the files of an attachment field; empty clears it.
    Files(Vec<String>),
}

impl FieldValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(text) => serde_json::Value::String(text.clone()),
            FieldValue::Files(keys) => serde_json::Value::Array(
                keys.iter()
                    .map(|key| serde_json::json!({ "fileKey": key }))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_record(&self, id: &RecordId) -> Result<Record, RecordError>;

    async fn download(&self, file_key: &str) -> Result<Vec<u8>, RecordError>;

    async fn put_field(
        &self,
        id: &RecordId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), RecordError>;

    /// Removes every file from an attachment field.
    async fn clear_field(&self, id: &RecordId, field: &str) -> Result<(), RecordError> {
        self.put_field(id, field, FieldValue::Files(Vec::new())).await
    }
}
