//! Configuration schema definitions.
//!
//! This module defines the bootstrap configuration read at process start.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root bootstrap configuration for the registry client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Registry server, credentials and config document coordinates.
    pub registry: RegistryConfig,

    /// Identity of the local service instance.
    pub instance: InstanceConfig,

    /// Long-poll change listener settings.
    pub listener: ListenerConfig,

    /// Heartbeat cadence.
    pub heartbeat: HeartbeatConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shared environment selector settings.
    pub environment: EnvironmentConfig,
}

/// Registry connection and credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base address (e.g., "http://127.0.0.1:8848").
    pub server_addr: String,

    /// Path prefix in front of every API route.
    pub context_path: String,

    /// Login user.
    pub username: String,

    /// Login password.
    pub password: String,

    /// Namespace (tenant) id.
    pub namespace: String,

    /// Registry group.
    pub group: String,

    /// Config document extension, appended to the app name to form the data id.
    pub file_extension: String,

    /// Timeout for ordinary (non long-poll) requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            server_addr: "http://127.0.0.1:8848".to_string(),
            context_path: "nacos".to_string(),
            username: "nacos".to_string(),
            password: String::new(),
            namespace: "public".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            file_extension: "yml".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl RegistryConfig {
    /// Data id of the config document for the given app.
    pub fn data_id(&self, app_name: &str) -> String {
        format!("{}.{}", app_name, self.file_extension)
    }
}

/// Local instance identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Service (and app) name.
    pub app_name: String,

    /// Advertised IP. Detected from the default route when absent.
    pub ip: Option<IpAddr>,

    /// Advertised port.
    pub port: u16,

    /// Load balancing weight.
    pub weight: f64,

    /// Instance metadata sent on register and beat.
    pub metadata: HashMap<String, String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "preserved.register.source".to_string(),
            "SPRING_CLOUD".to_string(),
        );
        Self {
            app_name: "registry-client".to_string(),
            ip: None,
            port: 8000,
            weight: 1.0,
            metadata,
        }
    }
}

/// Change listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// How long the registry may hold a long-poll open, in seconds.
    pub long_poll_secs: u64,

    /// Extra client-side read timeout on top of the long-poll wait, in seconds.
    pub read_timeout_margin_secs: u64,

    /// Sleep after a failed long-poll before retrying, in seconds.
    pub error_cooldown_secs: u64,

    /// Fetch and apply the config document once during startup.
    pub load_on_start: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            long_poll_secs: 30,
            read_timeout_margin_secs: 10,
            error_cooldown_secs: 18,
            load_on_start: true,
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between beats in seconds.
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shared environment selector configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Selector file path. Defaults to a per-app file in the temp directory.
    pub selector_path: Option<PathBuf>,
}
