//! Request/reply proxy service
//!
//! Usage:
//!   proxy --front tcp://*:5559 --back tcp://*:5560
//!   proxy --config config/bus.toml
//!
//! Settings come from built-in defaults, then the config file, then `BUS_*`
//! environment variables, then the command line.

use anyhow::{Context as _, Result};
use clap::Parser;
use messaging::{Context, Proxy};
use messaging_config::BusConfig;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proxy")]
#[command(about = "Tether request/reply proxy")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address clients connect to
    #[arg(long)]
    front: Option<String>,

    /// Address servers connect to
    #[arg(long)]
    back: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting Tether proxy");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    info!(
        front = %config.proxy.front,
        back = %config.proxy.back,
        forward_timeout_ms = config.proxy.forward_timeout_ms,
        "Configuration loaded"
    );

    let ctx = Context::with_settings(config.transport.clone());
    let proxy = Proxy::from_settings(&ctx, &config.proxy)
        .await
        .context("Failed to bind proxy endpoints")?;
    info!(
        front = %proxy.front_address(),
        back = %proxy.back_address(),
        "Proxy running"
    );

    let outcome = proxy.run_until(shutdown_signal()).await;
    ctx.terminate();

    if let Err(e) = &outcome {
        error!("Proxy failed: {}", e);
    }
    outcome.context("Proxy terminated with an error")?;
    info!("Proxy shut down cleanly");
    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(args: &Args) -> Result<BusConfig> {
    let mut config = BusConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(front) = &args.front {
        config.proxy.front = front.clone();
    }
    if let Some(back) = &args.back {
        config.proxy.back = back.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for CTRL+C, shutting down: {}", e),
    }
}
