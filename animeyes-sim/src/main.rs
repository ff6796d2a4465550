use std::time::Duration;

use animeyes_sim::{AppState, SimOptions, serve};
use clap::Parser;
use tracing::{error, info, warn};

/// Stands in for the eye device on a workstation.
#[derive(Parser, Debug)]
#[command(name = "animeyes-sim")]
struct SimArgs {
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind_address: String,
    /// Require this admin PIN for protected commands.
    #[arg(long)]
    admin_pin: Option<String>,
    #[arg(long, default_value_t = 100)]
    broadcast_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = SimArgs::parse();
    let listener = match tokio::net::TcpListener::bind(&args.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", args.bind_address, err);
            std::process::exit(1);
        }
    };

    let state = AppState::new(SimOptions {
        admin_pin: args.admin_pin,
        broadcast_interval: Duration::from_millis(args.broadcast_ms.max(10)),
    });
    info!("simulated device starting on {}", args.bind_address);
    if let Err(err) = serve(listener, state).await {
        warn!("simulator exited: {}", err);
    }
}
