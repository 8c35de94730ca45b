use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::storage::validate_key;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
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
    let invalid = |message: String| -> Result<(), ConfigError> {
        Err(ConfigError::Validation { message })
    };

    if config.version != "1.0" {
        return invalid(format!("Unsupported config version: {}", config.version));
    }

    let worker = &config.worker;
    for (name, value) in [
        ("worker.batch_size", worker.batch_size as u64),
        ("worker.concurrency", worker.concurrency as u64),
        ("worker.poll_interval_ms", worker.poll_interval_ms),
        ("worker.job_timeout_secs", worker.job_timeout_secs),
        ("worker.error_message_limit", worker.error_message_limit as u64),
    ] {
        if value == 0 {
            return invalid(format!("{} must be greater than zero", name));
        }
    }

    validate_key(&config.storage.output_bucket, "check").map_err(|e| ConfigError::Validation {
        message: format!("storage.output_bucket: {}", e),
    })?;

    let pdf = &config.pdf;
    for (name, value) in [
        ("pdf.page_width", pdf.page_width),
        ("pdf.page_height", pdf.page_height),
        ("pdf.body_font_size", pdf.body_font_size),
        ("pdf.title_font_size", pdf.title_font_size),
        ("pdf.leading", pdf.leading),
        ("pdf.avg_glyph_width_em", pdf.avg_glyph_width_em),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return invalid(format!("{} must be a positive number", name));
        }
    }
    if !(pdf.margin.is_finite() && pdf.margin >= 0.0) {
        return invalid("pdf.margin must not be negative".to_string());
    }
    if pdf.page_width - 2.0 * pdf.margin <= 0.0 {
        return invalid("pdf.margin leaves no horizontal room for text".to_string());
    }
    if pdf.page_height - 2.0 * pdf.margin < pdf.leading {
        return invalid("pdf.margin leaves no room for a single line".to_string());
    }

    Ok(())
}
