//! Default application settings document.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];

/// Settings served by the registry for the host application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Log level applied to the running process on every reload.
    pub log_level: String,

    pub db: DbSettings,

    /// Credentials for the upstream model provider.
    pub llm: LlmSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            db: DbSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DbSettings {
    pub url: Option<String>,
    pub pool_size: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: String,
    pub secret_key: String,
    pub app_id: u64,
}

impl Settings for AppSettings {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(format!("log_level: unknown level '{}'", self.log_level));
        }
        if self.db.pool_size == 0 {
            errors.push("db.pool_size: must be > 0".to_string());
        }
        if let Some(url) = &self.db.url {
            if url.is_empty() {
                errors.push("db.url: must not be empty when set".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn log_level(&self) -> Option<&str> {
        Some(&self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AppSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let settings = AppSettings {
            log_level: "verbose".to_string(),
            db: DbSettings {
                url: Some(String::new()),
                pool_size: 0,
            },
            llm: LlmSettings::default(),
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("log_level"));
    }
}
