use crate::config::{Config, RecordFieldsConfig, ReportConfig};

/// The slice of [`Config`] the orchestrator itself reads.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fields: RecordFieldsConfig,
    pub default_prompt: String,
    pub report: ReportConfig,
    /// Keep the source attachment unless the original was archived.
    pub clear_source_requires_archive: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fields: config.record_store.fields.clone(),
            default_prompt: config.summarizer.default_prompt.clone(),
            report: config.report.clone(),
            clear_source_requires_archive: config.pipeline.clear_source_requires_archive,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: RecordFieldsConfig::default(),
            default_prompt: crate::config::SummarizerConfig::default().default_prompt,
            report: ReportConfig::default(),
            clear_source_requires_archive: false,
        }
    }
}
