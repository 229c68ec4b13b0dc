//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::environment::Environment;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Path of the bootstrap file for an environment: `<dir>/registry.<env>.toml`.
pub fn config_path(dir: &Path, env: Environment) -> PathBuf {
    dir.join(format!("registry.{}.toml", env))
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AgentConfig, ConfigError> {
    let config: AgentConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the bootstrap file selected by `env` from `dir`.
pub fn load_for_environment(dir: &Path, env: Environment) -> Result<AgentConfig, ConfigError> {
    let path = config_path(dir, env);
    tracing::debug!(path = %path.display(), env = %env, "Loading bootstrap configuration");
    load_config(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path() {
        let path = config_path(Path::new("/etc/app"), Environment::Pre);
        assert_eq!(path, PathBuf::from("/etc/app/registry.pre.toml"));
    }

    #[test]
    fn test_load_for_environment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("registry.test.toml"),
            "[instance]\napp_name = \"chat\"\nport = 8100\n",
        )
        .unwrap();

        let config = load_for_environment(dir.path(), Environment::Test).unwrap();
        assert_eq!(config.instance.app_name, "chat");
        assert_eq!(config.instance.port, 8100);

        let missing = load_for_environment(dir.path(), Environment::Prod);
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("[instance]\nport = 0\n").unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: instance.port: must be > 0");
    }
}
