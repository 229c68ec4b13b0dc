use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use registry_client::config::load_for_environment;
use registry_client::environment::{Environment, EnvironmentHandle};
use registry_client::settings::{AppSettings, SettingsStore};
use registry_client::RegistryAgent;

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "One-shot registry calls using the agent's bootstrap configuration", long_about = None)]
struct Cli {
    /// Environment to use. Falls back to the shared selector, then to dev.
    #[arg(short, long)]
    env: Option<Environment>,

    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the environment recorded by a running agent
    Env,
    /// Fetch and print the raw config document
    Config,
    /// Validate the remote config document without applying it anywhere
    Check,
    /// Show the registry-side view of this instance
    Instance,
    /// Send a single heartbeat
    Beat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Env = cli.command {
        let env = EnvironmentHandle::from_env()?.read()?;
        println!("{}", env);
        return Ok(());
    }

    let env = match cli.env {
        Some(env) => env,
        None => EnvironmentHandle::from_env()
            .and_then(|handle| handle.read())
            .unwrap_or_default(),
    };
    let config = load_for_environment(&cli.config_dir, env)?;
    let store = Arc::new(SettingsStore::<AppSettings>::default());
    let agent = RegistryAgent::new(config, store)?;

    match cli.command {
        Commands::Env => unreachable!("handled above"),
        Commands::Config => {
            let text = agent.config_service().fetch().await?;
            println!("{}", text);
        }
        Commands::Check => {
            agent.config_service().fetch_and_apply().await?;
            let settings = agent.store().snapshot();
            println!("{}", serde_json::to_string_pretty(&*settings)?);
        }
        Commands::Instance => {
            let detail = agent.instances().query_instance().await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        Commands::Beat => {
            let light = agent.instances().beat().await?;
            println!("lightBeatEnabled: {}", light);
        }
    }

    Ok(())
}
