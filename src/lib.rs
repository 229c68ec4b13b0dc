//! Registry client library.
//!
//! Keeps a service process in sync with a configuration / service-discovery
//! registry: token login, config fetch with hot reload over long-polling,
//! instance registration, heartbeats and graceful de-registration.

pub mod config;
pub mod environment;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod settings;

pub use config::schema::AgentConfig;
pub use environment::{Environment, EnvironmentHandle};
pub use lifecycle::{RegistryAgent, RunningAgent, Shutdown};
pub use registry::RegistryError;
pub use settings::{AppSettings, SettingsStore};
