//! Registry agent: wires the components together and owns their lifetime.
//!
//! # Responsibilities
//! - Build the shared HTTP client, token manager, config service and instance manager
//! - Startup: optional initial config load, register, spawn listener and heartbeat
//! - Shutdown: stop both loops, deregister exactly once, release connections

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::AgentConfig;
use crate::lifecycle::Shutdown;
use crate::net::advertised_ip;
use crate::registry::{
    ChangeListener, Clock, ConfigService, Heartbeat, InstanceDescriptor, InstanceManager,
    RegistryHttp, RegistryResult, SystemClock, TokenManager,
};
use crate::settings::{Settings, SettingsStore};

/// Registry client components, not yet started.
pub struct RegistryAgent<T> {
    config: AgentConfig,
    tokens: Arc<TokenManager>,
    config_service: Arc<ConfigService<T>>,
    instances: Arc<InstanceManager>,
    shutdown: Shutdown,
}

impl<T: Settings> RegistryAgent<T> {
    pub fn new(config: AgentConfig, store: Arc<SettingsStore<T>>) -> RegistryResult<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AgentConfig,
        store: Arc<SettingsStore<T>>,
        clock: Arc<dyn Clock>,
    ) -> RegistryResult<Self> {
        let http = RegistryHttp::new(&config.registry)?;
        let tokens = Arc::new(TokenManager::new(http.clone(), &config.registry, clock));
        let config_service = Arc::new(ConfigService::new(
            http.clone(),
            tokens.clone(),
            &config,
            store,
        )?);

        let ip = advertised_ip(config.instance.ip);
        let descriptor = InstanceDescriptor::from_config(&config, ip);
        let instances = Arc::new(InstanceManager::new(
            http,
            tokens.clone(),
            descriptor,
            Duration::from_secs(config.heartbeat.interval_secs),
        )?);

        Ok(Self {
            config,
            tokens,
            config_service,
            instances,
            shutdown: Shutdown::new(),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn config_service(&self) -> &Arc<ConfigService<T>> {
        &self.config_service
    }

    pub fn instances(&self) -> &Arc<InstanceManager> {
        &self.instances
    }

    pub fn store(&self) -> &Arc<SettingsStore<T>> {
        self.config_service.store()
    }

    /// Receiver fired when the agent shuts down, for host tasks tied to its lifetime.
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Register the instance and start the background loops.
    ///
    /// A failed initial config load is logged and the current settings keep
    /// serving. A failed registration is returned to the caller and nothing
    /// is spawned.
    pub async fn start(self) -> RegistryResult<RunningAgent<T>> {
        if self.config.listener.load_on_start {
            if let Err(e) = self.config_service.fetch_and_apply().await {
                tracing::warn!(error = %e, "Initial config load failed, continuing with current settings");
            }
        }

        let acknowledged = self.instances.register().await?;
        if !acknowledged {
            tracing::warn!("Registry did not acknowledge registration");
        }

        let listener = ChangeListener::new(
            self.config_service.clone(),
            Duration::from_secs(self.config.listener.error_cooldown_secs),
        );
        let listener = tokio::spawn(listener.run(self.shutdown.subscribe()));

        let heartbeat = Heartbeat::new(
            self.instances.clone(),
            Duration::from_secs(self.config.heartbeat.interval_secs),
        );
        let heartbeat = tokio::spawn(heartbeat.run(self.shutdown.subscribe()));

        tracing::info!(
            service = %self.instances.descriptor().service_name,
            data_id = %self.config_service.data_id(),
            "Registry agent started"
        );

        Ok(RunningAgent {
            agent: self,
            listener,
            heartbeat,
        })
    }
}

/// A started agent. Dropping it without [`shutdown`](Self::shutdown) leaves the
/// instance registered until the registry expires it.
pub struct RunningAgent<T> {
    agent: RegistryAgent<T>,
    listener: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl<T: Settings> RunningAgent<T> {
    pub fn agent(&self) -> &RegistryAgent<T> {
        &self.agent
    }

    /// Stop both loops, then deregister. Returns whether the registry acknowledged.
    pub async fn shutdown(self) -> RegistryResult<bool> {
        let Self {
            agent,
            listener,
            heartbeat,
        } = self;

        let notified = agent.shutdown.trigger();
        tracing::info!(tasks = notified, "Stopping background tasks");
        for (name, task) in [("listener", listener), ("heartbeat", heartbeat)] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Background task ended abnormally");
            }
        }

        let result = agent.instances.deregister().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to deregister instance");
        }

        drop(agent);
        tracing::info!("Registry agent stopped");
        result
    }
}
