//! Fanout Proxy
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  FANOUT PROXY                    │
//!                         │                                                  │
//!   Client Request        │  ┌─────────┐    ┌──────────┐    ┌────────────┐   │      ┌────────┐
//!   ──────────────────────┼─▶│  http   │───▶│ registry │───▶│   fanout   │───┼─────▶│ master │
//!                         │  │ server  │    │ snapshot │    │   engine   │───┼──┐   └────────┘
//!                         │  └────┬────┘    └──────────┘    └─────┬──────┘   │  │   ┌────────┐
//!   Client Response       │       │ miss                          │          │  └──▶│ shadow │
//!   ◀─────────────────────┼───────┼───────────────────────────────┘          │      └────────┘
//!                         │       ▼                                          │
//!                         │  ┌─────────┐    ┌──────────────────────────┐     │
//!                         │  │  admin  │    │ api_<port>/<name>.json   │     │
//!                         │  │   API   │───▶│ + definition watcher     │     │
//!                         │  └─────────┘    └──────────────────────────┘     │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use fanout_proxy::config::load_config;
use fanout_proxy::lifecycle::{signals, start_servers, Shutdown};
use fanout_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "fanout-proxy", version, about = "Fanout reverse proxy")]
struct Args {
    /// Server configuration file.
    #[arg(short, long, default_value = "conf/server.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            tracing::error!(path = ?args.config, error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    logging::init(level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        servers = config.enabled_servers().count(),
        "fanout-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_socket() {
            Some(addr) => metrics::init_metrics(addr),
            None => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let running = start_servers(&config, &args.config, &shutdown).await?;

    tokio::spawn(signals::handle_signals(
        shutdown.clone(),
        running.registries().to_vec(),
    ));

    running.wait().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
