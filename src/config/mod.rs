//! Bootstrap configuration subsystem.
//!
//! # Data Flow
//! ```text
//! environment selector (dev/test/pre/prod)
//!     → loader.rs (pick registry.<env>.toml, parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → handed to RegistryAgent and its components
//! ```
//!
//! Remote configuration fetched from the registry is a separate concern and
//! lives in `settings`.
//!
//! # Design Decisions
//! - Bootstrap config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_for_environment, ConfigError};
pub use schema::{
    AgentConfig, EnvironmentConfig, HeartbeatConfig, InstanceConfig, ListenerConfig,
    ObservabilityConfig, RegistryConfig,
};
