//! Builders for test configurations.

#![allow(dead_code)]

use paperdigest::config::{
    ArchiveBackendConfig, ArchiveConfig, ArtifactKind, ClassifierConfig, ClassifierStrategy,
    Config, FolderTable, HttpConfig, KeywordRule, OcrConfig, RecordStoreConfig, ReportConfig,
    SummarizerConfig,
};
use paperdigest::secrets::SecretRef;

/// Builder for `Config` instances backed by a local archive.
pub struct ConfigBuilder {
    archive_dir: String,
    classifier: ClassifierConfig,
    folders: FolderTable,
    clear_source_requires_archive: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            archive_dir: "/tmp/paperdigest-archive".to_string(),
            classifier: ClassifierConfig::default(),
            folders: FolderTable::new(),
            clear_source_requires_archive: false,
        }
    }

    pub fn archive_dir(mut self, dir: &str) -> Self {
        self.archive_dir = dir.to_string();
        self
    }

    /// Declares a category and routes both artifacts of it to
    /// `{kind}-{category}` folders.
    pub fn category(mut self, category: &str) -> Self {
        self.classifier.categories.push(category.to_string());
        self.route(category)
    }

    /// Routes both artifacts of an already-known category.
    pub fn route(mut self, category: &str) -> Self {
        for kind in [ArtifactKind::Original, ArtifactKind::Summary] {
            self.folders
                .entry(kind)
                .or_default()
                .insert(category.to_string(), format!("{}-{}", kind, category));
        }
        self
    }

    pub fn rule(mut self, rule: KeywordRule) -> Self {
        self.classifier.keywords.push(rule);
        self
    }

    /// Switches to the field strategy reading `field`.
    pub fn field_strategy(mut self, field: &str) -> Self {
        self.classifier.strategy = ClassifierStrategy::Field;
        self.classifier.field = Some(field.to_string());
        self
    }

    pub fn require_archive_before_clear(mut self) -> Self {
        self.clear_source_requires_archive = true;
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: "1.0".to_string(),
            server: Default::default(),
            http: HttpConfig::default(),
            record_store: RecordStoreConfig {
                base_url: "https://example.cybozu.com".to_string(),
                app_id: 7,
                api_token: SecretRef {
                    value: Some("record-token".to_string()),
                    ..SecretRef::default()
                },
                fields: Default::default(),
            },
            summarizer: SummarizerConfig::default(),
            ocr: OcrConfig::default(),
            classifier: self.classifier,
            archive: ArchiveConfig {
                backend: ArchiveBackendConfig::Local {
                    directory: self.archive_dir,
                    base_url: "https://files.test".to_string(),
                },
                folders: self.folders,
            },
            report: ReportConfig::default(),
            pipeline: paperdigest::config::PipelineOptions {
                clear_source_requires_archive: self.clear_source_requires_archive,
            },
        }
    }

    /// The built config serialized as a config file.
    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&self.build()).expect("config serializes")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for keyword rules.
pub struct RuleBuilder {
    rule: KeywordRule,
}

impl RuleBuilder {
    pub fn new(category: &str) -> Self {
        Self {
            rule: KeywordRule {
                category: category.to_string(),
                keywords: Vec::new(),
                pattern: None,
            },
        }
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.rule.keywords.push(keyword.to_string());
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.rule.pattern = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> KeywordRule {
        self.rule
    }
}
