//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check the registry address is a usable HTTP URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::AgentConfig;

/// A single semantic problem in the bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a bootstrap configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.registry.server_addr) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "registry.server_addr",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "registry.server_addr",
            format!("invalid URL: {}", e),
        )),
    }

    if config.registry.namespace.is_empty() {
        errors.push(ValidationError::new("registry.namespace", "must not be empty"));
    }
    if config.registry.group.is_empty() {
        errors.push(ValidationError::new("registry.group", "must not be empty"));
    }
    if !matches!(
        config.registry.file_extension.as_str(),
        "yml" | "yaml" | "toml" | "json"
    ) {
        errors.push(ValidationError::new(
            "registry.file_extension",
            format!("unsupported extension '{}'", config.registry.file_extension),
        ));
    }
    if config.registry.request_timeout_secs == 0 {
        errors.push(ValidationError::new("registry.request_timeout_secs", "must be > 0"));
    }

    if config.instance.app_name.is_empty() {
        errors.push(ValidationError::new("instance.app_name", "must not be empty"));
    }
    if config.instance.port == 0 {
        errors.push(ValidationError::new("instance.port", "must be > 0"));
    }
    if !(config.instance.weight > 0.0) {
        errors.push(ValidationError::new("instance.weight", "must be > 0"));
    }

    if config.listener.long_poll_secs == 0 {
        errors.push(ValidationError::new("listener.long_poll_secs", "must be > 0"));
    }
    if config.heartbeat.interval_secs == 0 {
        errors.push(ValidationError::new("heartbeat.interval_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
