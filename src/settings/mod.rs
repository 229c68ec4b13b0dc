//! Process-wide application settings, hot-reloaded from the registry.
//!
//! # Data Flow
//! ```text
//! registry document (yml/toml/json)
//!     → parse_document (deserialize into the host settings type)
//!     → Settings::validate (semantic checks)
//!     → SettingsStore::apply_if_valid (atomic swap of Arc<T>)
//!     → readers call snapshot() / subscribers observe a new version
//! ```
//!
//! # Design Decisions
//! - A rejected candidate never touches the current value
//! - Readers hold an `Arc<T>` snapshot, never a live handle
//! - Writes are serialized; reads are lock-free (arc-swap)

pub mod schema;

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;

pub use schema::{AppSettings, DbSettings, LlmSettings};

/// Settings type that can be loaded from a registry document.
pub trait Settings: DeserializeOwned + Send + Sync + 'static {
    /// Semantic validation of a freshly parsed candidate.
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }

    /// Log level carried by the document, if the type has one.
    fn log_level(&self) -> Option<&str> {
        None
    }
}

/// Errors from parsing or applying a settings document.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse {format} document: {message}")]
    Parse {
        format: DocumentFormat,
        message: String,
    },

    #[error("invalid settings: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Serialization format of the remote document, chosen by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "yml" | "yaml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Toml => write!(f, "toml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Deserialize a document into a settings candidate.
pub fn parse_document<T: DeserializeOwned>(
    text: &str,
    format: DocumentFormat,
) -> Result<T, SettingsError> {
    let parse_err = |message: String| SettingsError::Parse { format, message };
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string())),
        DocumentFormat::Toml => toml::from_str(text).map_err(|e| parse_err(e.to_string())),
        DocumentFormat::Json => serde_json::from_str(text).map_err(|e| parse_err(e.to_string())),
    }
}

/// Single-writer store holding the current settings snapshot.
pub struct SettingsStore<T> {
    current: ArcSwap<T>,
    write_lock: Mutex<()>,
    version: watch::Sender<u64>,
}

impl<T: Settings> SettingsStore<T> {
    pub fn new(initial: T) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
            version,
        }
    }

    /// Current settings. The returned value never changes underneath the caller.
    pub fn snapshot(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Validate `candidate` and, only if it passes, make it the current value.
    pub fn apply_if_valid(&self, candidate: T) -> Result<Arc<T>, SettingsError> {
        candidate.validate().map_err(SettingsError::Invalid)?;

        let next = Arc::new(candidate);
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.current.store(next.clone());
        self.version.send_modify(|v| *v += 1);
        Ok(next)
    }

    /// Number of successful applies so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver notified after every successful apply.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl<T: Settings + Default> Default for SettingsStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
