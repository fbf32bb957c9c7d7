use std::path::Path;

use tracing::debug;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_from_str(&content)?;
    debug!(path = %crate::sanitize::redact_path(path), "Loaded config");
    Ok(config)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
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

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.ocr.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.maxAttempts must be at least 1".to_string(),
        });
    }

    if config.ocr.initial_backoff_ms > config.ocr.max_backoff_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "ocr.initialBackoffMs ({}) exceeds ocr.maxBackoffMs ({})",
                config.ocr.initial_backoff_ms, config.ocr.max_backoff_ms
            ),
        });
    }

    let models = [
        ("ocrModel", &config.gemini.ocr_model),
        ("mappingModel", &config.gemini.mapping_model),
        ("cleanupModel", &config.gemini.cleanup_model),
        ("validationModel", &config.gemini.validation_model),
    ];
    for (key, model) in models {
        if model.trim().is_empty() || model.contains('/') {
            return Err(ConfigError::Validation {
                message: format!("gemini.{} is not a valid model name: '{}'", key, model),
            });
        }
    }

    Ok(())
}
