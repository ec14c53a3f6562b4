//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::PipelineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the registry agent address.
pub const REGISTRY_ADDR_ENV_VAR: &str = "REGISTRY_ADDR";

/// Overrides the log file path.
pub const LOG_FILE_ENV_VAR: &str = "LOG_FILE";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration, apply process environment overrides, and validate.
///
/// Without a path the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => PipelineConfig::default(),
    };

    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `REGISTRY_ADDR` and `LOG_FILE`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut PipelineConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = env(REGISTRY_ADDR_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!(registry_addr = %addr, "Registry address overridden from environment");
        config.registry.address = addr;
    }
    if let Some(path) = env(LOG_FILE_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.observability.log_file = Some(PathBuf::from(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config_with_env(None, |_| None).unwrap();
        assert_eq!(config.registry.address, "localhost:8500");
        assert_eq!(config.observability.log_file, Some(PathBuf::from("registration.log")));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[registry]\naddress = \"from-file:8500\"").unwrap();

        let config = load_config_with_env(Some(file.path()), |key| match key {
            REGISTRY_ADDR_ENV_VAR => Some("from-env:9500".to_string()),
            LOG_FILE_ENV_VAR => Some("/tmp/pipeline.log".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.registry.address, "from-env:9500");
        assert_eq!(config.observability.log_file, Some(PathBuf::from("/tmp/pipeline.log")));
    }

    #[test]
    fn test_empty_env_value_ignored() {
        let config = load_config_with_env(None, |_| Some("  ".to_string())).unwrap();
        assert_eq!(config.registry.address, "localhost:8500");
    }

    #[test]
    fn test_errors_are_classified() {
        let missing = load_config_with_env(Some(Path::new("/definitely/not/here.toml")), |_| None);
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retries]\nmax_attempts = \"three\"").unwrap();
        assert!(matches!(load_config_with_env(Some(file.path()), |_| None), Err(ConfigError::Parse(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retries]\nmax_attempts = 0").unwrap();
        let err = load_config_with_env(Some(file.path()), |_| None).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: retries.max_attempts: must be > 0");
    }
}
