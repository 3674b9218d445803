use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

mod catalog;
mod controller;
mod error;
mod models;
mod prompts;
mod server;
mod session;
mod settings;
mod storage;
#[cfg(test)]
mod testing;

use settings::{CliOverrides, FileSettings};

#[derive(Debug, Parser)]
#[command(name = "tripseek")]
#[command(about = "Travel itinerary chat service backed by a hosted LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Start {
        #[arg(long, default_value = "127.0.0.1:7272")]
        listen: String,
        /// JSON settings file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        /// Delay between streamed fragments, 0 disables pacing
        #[arg(long)]
        pacing_ms: Option<u64>,
    },
    /// Print the theme and destination catalog as JSON
    Catalog,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { listen, config, model, base_url, pacing_ms } => {
            let addr: SocketAddr = listen.parse()?;
            let file = match config {
                Some(path) => FileSettings::load(&path)?,
                None => FileSettings::default(),
            };
            let settings = settings::resolve_effective_settings(&file, &CliOverrides { model, base_url, pacing_ms })?;
            let api_key = settings::api_key_from_env()?;
            tracing::info!(model = %settings.model, base_url = %settings.base_url, "configuration resolved");

            let completions = Arc::new(models::OpenAICompatible::new(&settings.base_url, api_key));
            let mut state = server::AppState::new(completions, settings);
            state.metrics = Some(PrometheusBuilder::new().install_recorder()?);
            storage::spawn_sweeper(state.sessions.clone(), state.settings.session_ttl, state.settings.sweep_interval);
            server::serve(addr, state).await?;
        }
        Commands::Catalog => {
            println!("{}", serde_json::to_string_pretty(&catalog::catalog())?);
        }
    }
    Ok(())
}
