use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::secrets::SecretRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub record_store: RecordStoreConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub pipeline: PipelineOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Timeouts applied to every outbound collaborator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    /// Base URL of the kintone domain, e.g. `https://example.cybozu.com`.
    pub base_url: String,
    pub app_id: u64,
    #[serde(default = "default_record_token")]
    pub api_token: SecretRef,
    #[serde(default)]
    pub fields: RecordFieldsConfig,
}

fn default_record_token() -> SecretRef {
    SecretRef::from_env("KINTONE_API_TOKEN")
}

/// Field codes of the record this pipeline reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFieldsConfig {
    #[serde(default = "default_attachment_field")]
    pub attachment: String,
    #[serde(default = "default_title_field")]
    pub title: String,
    #[serde(default = "default_original_link_field")]
    pub original_link: String,
    #[serde(default = "default_summary_text_field")]
    pub summary_text: String,
    #[serde(default = "default_summary_link_field")]
    pub summary_link: String,
}

fn default_attachment_field() -> String {
    "attachment".to_string()
}

fn default_title_field() -> String {
    "title".to_string()
}

fn default_original_link_field() -> String {
    "original_link".to_string()
}

fn default_summary_text_field() -> String {
    "summary".to_string()
}

fn default_summary_link_field() -> String {
    "summary_pdf_link".to_string()
}

impl Default for RecordFieldsConfig {
    fn default() -> Self {
        Self {
            attachment: default_attachment_field(),
            title: default_title_field(),
            original_link: default_original_link_field(),
            summary_text: default_summary_text_field(),
            summary_link: default_summary_link_field(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_summarizer_key")]
    pub api_key: SecretRef,
    /// Instruction used when a job does not carry its own prompt.
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
    /// Returned in place of a summary whenever generation fails.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_summarizer_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_summarizer_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_summarizer_key() -> SecretRef {
    SecretRef::from_env("GEMINI_API_KEY")
}

fn default_prompt() -> String {
    "以下を要約してください：".to_string()
}

fn default_placeholder() -> String {
    "⚠ 要約できませんでした".to_string()
}

fn default_max_content_chars() -> usize {
    100_000
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_endpoint(),
            model: default_summarizer_model(),
            api_key: default_summarizer_key(),
            default_prompt: default_prompt(),
            placeholder: default_placeholder(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub local: LocalOcrConfig,
    #[serde(default)]
    pub cloud: CloudOcrConfig,
    /// Pages OCR'd concurrently; output order is always page order.
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_page_concurrency() -> usize {
    num_cpus::get()
}

fn default_dpi() -> u32 {
    300
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalOcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["jpn".to_string()]
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudOcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_vision_key")]
    pub api_key: SecretRef,
    #[serde(default = "default_language_hints")]
    pub language_hints: Vec<String>,
}

fn default_vision_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_vision_key() -> SecretRef {
    SecretRef::from_env("GOOGLE_VISION_API_KEY")
}

fn default_language_hints() -> Vec<String> {
    vec!["ja".to_string()]
}

impl Default for CloudOcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_vision_endpoint(),
            api_key: default_vision_key(),
            language_hints: default_language_hints(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    /// First keyword rule found in the record title.
    #[default]
    Keyword,
    /// Category named by a record field.
    Field,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub strategy: ClassifierStrategy,
    /// Declared category labels, excluding the default.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_category")]
    pub default_category: String,
    /// Keyword rules, checked in order.
    #[serde(default)]
    pub keywords: Vec<KeywordRule>,
    /// Record field read by the `field` strategy.
    #[serde(default)]
    pub field: Option<String>,
}

fn default_category() -> String {
    "other".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::default(),
            categories: Vec::new(),
            default_category: default_category(),
            keywords: Vec::new(),
            field: None,
        }
    }
}

impl ClassifierConfig {
    /// Every label a job may be routed under, default included.
    pub fn known_categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.default_category.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Optional regex matched against the title in addition to the keywords.
    #[serde(default)]
    pub pattern: Option<String>,
}

/// The two artifacts archived per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Original,
    Summary,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Original => write!(f, "original"),
            ArtifactKind::Summary => write!(f, "summary"),
        }
    }
}

/// artifact kind → category → destination folder id
pub type FolderTable = BTreeMap<ArtifactKind, BTreeMap<String, String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub backend: ArchiveBackendConfig,
    #[serde(default)]
    pub folders: FolderTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArchiveBackendConfig {
    Drive {
        #[serde(default = "default_drive_api")]
        api_base: String,
        #[serde(default = "default_drive_upload")]
        upload_base: String,
        #[serde(default = "default_drive_token")]
        access_token: SecretRef,
    },
    Local {
        directory: String,
        base_url: String,
    },
}

fn default_drive_api() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_upload() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_drive_token() -> SecretRef {
    SecretRef::from_env("GOOGLE_DRIVE_ACCESS_TOKEN")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// `{title}` is replaced with the record title.
    #[serde(default = "default_report_title")]
    pub title_template: String,
    /// `{stem}` is the original file name without extension, `{date}` is YYYYMMDD.
    #[serde(default = "default_report_file_name")]
    pub file_name_template: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_report_title() -> String {
    "{title} 要約".to_string()
}

fn default_report_file_name() -> String {
    "{stem}_summary_{date}.pdf".to_string()
}

fn default_font_size() -> f32 {
    11.0
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title_template: default_report_title(),
            file_name_template: default_report_file_name(),
            font_size: default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Keep the source attachment when the original could not be archived.
    #[serde(default)]
    pub clear_source_requires_archive: bool,
}
