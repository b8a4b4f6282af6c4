//! Configuration file parsing (JSON format).
//!
//! Two layouts are accepted, and may be mixed: the nested sections of
//! [`Config`], and flat top-level keys named like the environment variables
//! (`{"SLACK_APP_TOKEN": "...", "TRIVIA_CHANNEL": "..."}`). Flat keys are
//! applied on top of the nested sections.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::common::error::ConfigError;
use crate::config::env::apply_overrides_from;
use crate::config::types::Config;

/// Load configuration from a JSON file.
///
/// A missing file is not an error: defaults are returned so that the
/// whole configuration can come from the environment.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(ConfigError::IoError {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    load_config_str(&content)
}

/// Load configuration from a JSON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    let value: Value = serde_json::from_str(content).map_err(parse_error)?;
    let flat = flat_settings(&value);
    let config: Config = serde_json::from_value(value).map_err(parse_error)?;

    if flat.is_empty() {
        return Ok(config);
    }
    info!("Applying {} flat settings from config file", flat.len());
    Ok(apply_overrides_from(config, |key| flat.get(key).cloned()))
}

fn parse_error(e: serde_json::Error) -> ConfigError {
    ConfigError::ParseError {
        message: e.to_string(),
    }
}

/// Top-level keys shaped like environment variable names, as strings.
fn flat_settings(value: &Value) -> HashMap<String, String> {
    let Some(object) = value.as_object() else {
        return HashMap::new();
    };

    object
        .iter()
        .filter(|(key, _)| is_setting_name(key))
        .filter_map(|(key, value)| setting_text(value).map(|text| (key.clone(), text)))
        .collect()
}

fn is_setting_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Render a value the way it would appear in the environment.
fn setting_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}
