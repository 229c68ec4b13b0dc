//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Change the log level at runtime when reloaded settings carry a new one
//!
//! `RUST_LOG`, when set, wins over configured levels and disables runtime changes.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::{
    filter::ParseError, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::settings::{Settings, SettingsStore};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to swap log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Filter directive for a level name, keeping HTTP client internals quiet.
pub fn directive(level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    };
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn")
}

/// Handle for changing the active log level.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        if self.env_override {
            tracing::debug!(log_level = level, "RUST_LOG is set, ignoring configured log level");
            return Ok(());
        }
        let filter = EnvFilter::try_new(directive(level))?;
        self.handle.reload(filter)?;
        tracing::info!(log_level = level, "Log level changed");
        Ok(())
    }
}

/// Install the global subscriber.
pub fn init_logging(level: &str) -> LogHandle {
    let (filter, env_override) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (
            EnvFilter::try_new(directive(level)).unwrap_or_else(|_| EnvFilter::new("info")),
            false,
        ),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogHandle {
        handle,
        env_override,
    }
}

/// Re-apply the settings' log level after every successful reload.
pub fn follow_settings<T: Settings>(
    store: Arc<SettingsStore<T>>,
    handle: LogHandle,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut versions = store.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = versions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }

            let settings = store.snapshot();
            if let Some(level) = settings.log_level() {
                if let Err(e) = handle.set_level(level) {
                    tracing::warn!(error = %e, log_level = level, "Ignoring unusable log level from settings");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        assert_eq!(directive("INFO"), "info,hyper=warn,hyper_util=warn,reqwest=warn");
        assert!(directive("WARNING").starts_with("warn,"));
        assert!(EnvFilter::try_new(directive("DEBUG")).is_ok());
    }
}
