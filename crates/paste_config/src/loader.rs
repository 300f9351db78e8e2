//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::PasteConfig;
use paste_common::ContentType;
use std::path::Path;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "paste.toml";

/// Loads and validates a `paste.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<PasteConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `paste.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<PasteConfig, ConfigError> {
    let config: PasteConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &PasteConfig) -> Result<(), ConfigError> {
    let prefix = &config.paste.build_prefix;
    if prefix.is_empty() {
        return Err(ConfigError::MissingField("paste.build_prefix".to_string()));
    }
    if prefix.contains(['/', '\\']) || prefix == "." || prefix == ".." {
        return Err(ConfigError::ValidationError(format!(
            "build_prefix '{prefix}' must be a single directory name"
        )));
    }
    for (index, entry) in config.paths.iter().enumerate() {
        if entry.dir.is_empty() {
            return Err(ConfigError::MissingField(format!("paths[{index}].dir")));
        }
    }
    for (content_type, compressor) in &config.compressors {
        content_type
            .parse::<ContentType>()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if compressor.program.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "compressors.{content_type}.program"
            )));
        }
    }
    Ok(())
}
