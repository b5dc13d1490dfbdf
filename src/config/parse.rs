use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

const ENV_VAR_PATTERN: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse and validate config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    expand_paths(&mut config);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN)
        .map_err(|e| ConfigError::Validation(format!("invalid env var pattern: {}", e)))?;

    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         Set them before starting, or replace the $env{{...}} references in the config file",
        unexpanded_vars.join(", ")
    )))
}

fn expand_paths(config: &mut Config) {
    config.poll.pos_file = expand_tilde(&config.poll.pos_file);

    if let OutputConfig::File { path } = &mut config.output {
        *path = expand_tilde(path);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);

    if config.poll.refresh_interval == 0 {
        errors.push("poll.refresh_interval must be greater than zero".to_string());
    }

    if config.poll.pos_file.as_os_str().is_empty() {
        errors.push("poll.pos_file is required".to_string());
    }

    if config.tag.trim().is_empty() {
        errors.push("tag is required".to_string());
    }

    if let OutputConfig::File { path } = &config.output {
        if path.as_os_str().is_empty() {
            errors.push("output.path is required when output.type is 'file'".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.region.trim().is_empty() {
        errors.push("source.region is required".to_string());
    }

    if source.db_instance_identifier.trim().is_empty() {
        errors.push("source.db_instance_identifier is required".to_string());
    }

    if source.endpoint.trim().is_empty() {
        errors.push("source.endpoint is required".to_string());
    } else if !source.endpoint.starts_with("http://") && !source.endpoint.starts_with("https://")
    {
        errors.push(format!(
            "source.endpoint must be an http(s) URL: {}",
            source.endpoint
        ));
    }

    if source.timeout.is_zero() {
        errors.push("source.timeout must be greater than zero".to_string());
    }
}
