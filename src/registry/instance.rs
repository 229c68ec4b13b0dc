//! Instance registration, de-registration, detail query and heartbeat.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::AgentConfig;
use crate::registry::auth::TokenManager;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::http::{RegistryHttp, BEAT_PATH, INSTANCE_PATH};

/// Literal body the registry answers with on a successful write.
const SUCCESS_MARKER: &str = "ok";
const DEFAULT_CLUSTER: &str = "DEFAULT";

/// Static identity and network location of this service instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceDescriptor {
    pub service_name: String,
    pub group_name: String,
    pub namespace_id: String,
    pub ip: IpAddr,
    pub port: u16,
    pub weight: f64,
    pub metadata: HashMap<String, String>,
}

impl InstanceDescriptor {
    pub fn from_config(config: &AgentConfig, ip: IpAddr) -> Self {
        Self {
            service_name: config.instance.app_name.clone(),
            group_name: config.registry.group.clone(),
            namespace_id: config.registry.namespace.clone(),
            ip,
            port: config.instance.port,
            weight: config.instance.weight,
            metadata: config.instance.metadata.clone(),
        }
    }

    /// Service name qualified by group, as the heartbeat API expects.
    pub fn grouped_service_name(&self) -> String {
        format!("{}@@{}", self.group_name, self.service_name)
    }
}

/// Heartbeat payload, JSON-encoded into the `beat` parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatInfo {
    pub cluster: String,
    pub ip: String,
    pub metadata: HashMap<String, String>,
    pub period: u64,
    pub port: u16,
    pub scheduled: bool,
    pub service_name: String,
    pub stopped: bool,
    pub weight: f64,
}

impl BeatInfo {
    pub fn new(descriptor: &InstanceDescriptor, period: Duration) -> Self {
        Self {
            cluster: DEFAULT_CLUSTER.to_string(),
            ip: descriptor.ip.to_string(),
            metadata: descriptor.metadata.clone(),
            period: period.as_millis() as u64,
            port: descriptor.port,
            scheduled: false,
            service_name: descriptor.grouped_service_name(),
            stopped: false,
            weight: descriptor.weight,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeatResponse {
    #[serde(default)]
    light_beat_enabled: bool,
}

/// Registry-side view of this instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceDetail {
    pub instance_id: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub weight: Option<f64>,
    pub healthy: Option<bool>,
    pub enabled: Option<bool>,
    pub ephemeral: Option<bool>,
    pub cluster_name: Option<String>,
    pub service: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Registers, queries, beats for and deregisters one instance.
pub struct InstanceManager {
    http: RegistryHttp,
    tokens: Arc<TokenManager>,
    descriptor: InstanceDescriptor,
    beat_params: Vec<(&'static str, String)>,
    registered: AtomicBool,
    detail: OnceCell<InstanceDetail>,
}

impl InstanceManager {
    pub fn new(
        http: RegistryHttp,
        tokens: Arc<TokenManager>,
        descriptor: InstanceDescriptor,
        beat_period: Duration,
    ) -> RegistryResult<Self> {
        let beat = serde_json::to_string(&BeatInfo::new(&descriptor, beat_period))
            .map_err(|e| RegistryError::Decode(format!("beat payload: {}", e)))?;
        let beat_params = vec![
            ("encoding", "UTF-8".to_string()),
            ("serviceName", descriptor.grouped_service_name()),
            ("namespaceId", descriptor.namespace_id.clone()),
            ("app", "unknown".to_string()),
            ("beat", beat),
        ];

        Ok(Self {
            http,
            tokens,
            descriptor,
            beat_params,
            registered: AtomicBool::new(false),
            detail: OnceCell::new(),
        })
    }

    pub fn descriptor(&self) -> &InstanceDescriptor {
        &self.descriptor
    }

    /// Whether the registry acknowledged the last register call.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Register the instance. Returns whether the registry answered `ok`.
    pub async fn register(&self) -> RegistryResult<bool> {
        let token = self.tokens.get_token().await?;
        let metadata = serde_json::to_string(&self.descriptor.metadata)
            .map_err(|e| RegistryError::Decode(format!("instance metadata: {}", e)))?;
        let d = &self.descriptor;

        let response = self
            .http
            .client()
            .post(self.http.url(INSTANCE_PATH))
            .query(&[
                ("accessToken", token.clone()),
                ("port", d.port.to_string()),
                ("ip", d.ip.to_string()),
                ("weight", d.weight.to_string()),
                ("serviceName", d.service_name.clone()),
                ("groupName", d.group_name.clone()),
                ("encoding", "UTF-8".to_string()),
                ("enabled", "true".to_string()),
                ("healthy", "true".to_string()),
                ("namespaceId", d.namespace_id.clone()),
                ("metadata", metadata),
            ])
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        let body = self.tokens.check_rejection(&token, body).await?;

        let acknowledged = body == SUCCESS_MARKER;
        self.registered.store(acknowledged, Ordering::SeqCst);
        tracing::info!(
            service = %d.service_name,
            ip = %d.ip,
            port = d.port,
            acknowledged,
            "Registered instance with registry"
        );
        Ok(acknowledged)
    }

    /// Remove the instance from the registry. Returns whether the registry answered `ok`.
    pub async fn deregister(&self) -> RegistryResult<bool> {
        let token = self.tokens.get_token().await?;
        let d = &self.descriptor;

        let response = self
            .http
            .client()
            .delete(self.http.url(INSTANCE_PATH))
            .query(&[
                ("accessToken", token.clone()),
                ("serviceName", d.service_name.clone()),
                ("ip", d.ip.to_string()),
                ("port", d.port.to_string()),
                ("groupName", d.group_name.clone()),
                ("enabled", "false".to_string()),
                ("namespaceId", d.namespace_id.clone()),
            ])
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        let body = self.tokens.check_rejection(&token, body).await?;

        let acknowledged = body == SUCCESS_MARKER;
        if acknowledged {
            self.registered.store(false, Ordering::SeqCst);
        }
        tracing::info!(
            service = %d.service_name,
            acknowledged,
            "Deregistered instance from registry"
        );
        Ok(acknowledged)
    }

    /// Registry-side detail of this instance, fetched once and then memoized.
    ///
    /// A failed query is not cached; the next call tries again.
    pub async fn query_instance(&self) -> RegistryResult<InstanceDetail> {
        self.detail
            .get_or_try_init(|| self.fetch_detail())
            .await
            .cloned()
    }

    async fn fetch_detail(&self) -> RegistryResult<InstanceDetail> {
        let token = self.tokens.get_token().await?;
        let d = &self.descriptor;

        let response = self
            .http
            .client()
            .get(self.http.url(INSTANCE_PATH))
            .query(&[
                ("accessToken", token.clone()),
                ("serviceName", d.service_name.clone()),
                ("ip", d.ip.to_string()),
                ("port", d.port.to_string()),
                ("groupName", d.group_name.clone()),
                ("namespaceId", d.namespace_id.clone()),
            ])
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        let body = self.tokens.check_rejection(&token, body).await?;
        tracing::debug!(detail = %body, "Fetched instance detail");

        serde_json::from_str(&body)
            .map_err(|e| RegistryError::Decode(format!("instance detail: {}", e)))
    }

    /// Send one heartbeat. Returns whether the registry enabled light beats.
    pub async fn beat(&self) -> RegistryResult<bool> {
        let token = self.tokens.get_token().await?;

        let response = self
            .http
            .client()
            .put(self.http.url(BEAT_PATH))
            .query(&self.beat_params)
            .query(&[("accessToken", token.clone())])
            .send()
            .await?;
        let body = RegistryHttp::read_body(response).await;
        let body = self.tokens.check_rejection(&token, body).await?;

        let beat: BeatResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::Decode(format!("beat response: {}", e)))?;
        tracing::debug!(light_beat_enabled = beat.light_beat_enabled, "Heartbeat acknowledged");
        Ok(beat.light_beat_enabled)
    }
}
