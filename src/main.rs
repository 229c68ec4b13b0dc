//! Registry agent host process.
//!
//! # Architecture Overview
//!
//! ```text
//!   --env dev|test|pre|prod
//!        │
//!        ▼
//!   ┌────────────────────┐   writes    ┌──────────────────────────┐
//!   │ environment select │────────────▶│ shared selector file     │◀── worker processes
//!   └─────────┬──────────┘             │ (path in REGISTRY_ENV_FILE)│    read it
//!             │ registry.<env>.toml    └──────────────────────────┘
//!             ▼
//!   ┌────────────────────┐  login / fetch / register   ┌──────────┐
//!   │   RegistryAgent    │────────────────────────────▶│ registry │
//!   │  ┌──────────────┐  │◀──── long-poll changes ─────│          │
//!   │  │ listener task│  │───── heartbeat every 5s ───▶│          │
//!   │  │ heartbeat    │  │                             └──────────┘
//!   │  └──────────────┘  │
//!   │   SettingsStore ───┼──▶ host reads snapshots, log level follows reloads
//!   └────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use registry_client::config::{load_for_environment, AgentConfig};
use registry_client::environment::{Environment, EnvironmentHandle, ENV_FILE_VAR};
use registry_client::lifecycle::{signals, RegistryAgent};
use registry_client::observability::{logging, metrics};
use registry_client::settings::{AppSettings, SettingsStore};

#[derive(Parser)]
#[command(name = "registry-agent")]
#[command(about = "Keeps this service registered and its settings in sync with the registry", long_about = None)]
struct Cli {
    /// Environment whose bootstrap file is loaded.
    #[arg(short, long, default_value = "dev")]
    env: Environment,

    /// Directory containing registry.<env>.toml files.
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_for_environment(&cli.config_dir, cli.env)?;

    // Selector is written and exported before any runtime thread or child exists.
    let selector_path = config
        .environment
        .selector_path
        .clone()
        .unwrap_or_else(|| EnvironmentHandle::default_path(&config.instance.app_name));
    let selector = EnvironmentHandle::create(selector_path)?;
    selector.write(cli.env)?;
    std::env::set_var(ENV_FILE_VAR, selector.path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config, cli.env));

    selector.close()?;
    result
}

async fn run(config: AgentConfig, env: Environment) -> Result<(), Box<dyn std::error::Error>> {
    let log = logging::init_logging(&config.observability.log_level);

    tracing::info!(
        env = %env,
        registry = %config.registry.server_addr,
        service = %config.instance.app_name,
        "registry-agent v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(SettingsStore::<AppSettings>::default());
    let agent = RegistryAgent::new(config, store.clone())?;
    let follower = logging::follow_settings(store, log, agent.shutdown_signal());

    let running = agent.start().await?;

    signals::wait_for_termination().await;

    let deregistered = running.shutdown().await?;
    if !deregistered {
        tracing::warn!("Registry did not acknowledge deregistration");
    }
    let _ = follower.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
