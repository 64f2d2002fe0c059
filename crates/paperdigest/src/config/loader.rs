use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{ClassifierStrategy, Config, FolderTable};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub const ENV_PORT: &str = "PORT";
pub const ENV_DEFAULT_PROMPT: &str = "PAPERDIGEST_DEFAULT_PROMPT";
pub const ENV_FOLDERS: &str = "PAPERDIGEST_FOLDERS";

/// Loads, validates and applies process environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = load_config_from_str(&content)?;
    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Applies the environment-style overrides using `lookup` to read variables.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::InvalidOverride {
                name: ENV_PORT.to_string(),
                reason: e.to_string(),
            })?;
    }

    if let Some(prompt) = lookup(ENV_DEFAULT_PROMPT) {
        if !prompt.trim().is_empty() {
            config.summarizer.default_prompt = prompt;
        }
    }

    if let Some(folders) = lookup(ENV_FOLDERS) {
        let table: FolderTable =
            serde_json::from_str(&folders).map_err(|e| ConfigError::InvalidOverride {
                name: ENV_FOLDERS.to_string(),
                reason: e.to_string(),
            })?;
        config.archive.folders = table;
    }

    Ok(())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.http.connect_timeout_secs == 0 || config.http.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "HTTP timeouts must be positive".to_string(),
        });
    }

    if config.ocr.page_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.page_concurrency must be at least 1".to_string(),
        });
    }

    if config.ocr.dpi == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.dpi must be positive".to_string(),
        });
    }

    if config.report.font_size <= 0.0 {
        return Err(ConfigError::Validation {
            message: "report.font_size must be positive".to_string(),
        });
    }

    let classifier = &config.classifier;
    let known: HashSet<&str> = classifier.known_categories().collect();

    let mut declared = HashSet::new();
    for category in &classifier.categories {
        if !declared.insert(category.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate category '{}'", category),
            });
        }
    }

    for rule in &classifier.keywords {
        if !known.contains(rule.category.as_str()) {
            return Err(ConfigError::InvalidRule {
                category: rule.category.clone(),
                reason: "Category is not declared in classifier.categories".to_string(),
            });
        }
        if rule.keywords.is_empty() && rule.pattern.is_none() {
            return Err(ConfigError::InvalidRule {
                category: rule.category.clone(),
                reason: "Rule needs at least one keyword or a pattern".to_string(),
            });
        }
        if let Some(pattern) = &rule.pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::InvalidRule {
                    category: rule.category.clone(),
                    reason: format!("Invalid regex pattern: {}", e),
                });
            }
        }
    }

    if classifier.strategy == ClassifierStrategy::Field && classifier.field.is_none() {
        return Err(ConfigError::Validation {
            message: "classifier.field is required for the 'field' strategy".to_string(),
        });
    }

    for (kind, destinations) in &config.archive.folders {
        for category in destinations.keys() {
            if !known.contains(category.as_str()) {
                return Err(ConfigError::Validation {
                    message: format!(
                        "archive.folders.{} references unknown category '{}'",
                        kind, category
                    ),
                });
            }
        }
    }

    Ok(())
}
