pub mod loader;
pub mod schema;

pub use loader::{apply_overrides, load_config, load_config_from_str, validate_config};
pub use schema::{
    ArchiveBackendConfig, ArchiveConfig, ArtifactKind, ClassifierConfig, ClassifierStrategy,
    CloudOcrConfig, Config, FolderTable, HttpConfig, KeywordRule, LocalOcrConfig, OcrConfig,
    PipelineOptions, RecordFieldsConfig, RecordStoreConfig, ReportConfig, ServerConfig,
    SummarizerConfig,
};
