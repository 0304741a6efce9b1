//! bitcoind-ctl - HTTP server controlling one bitcoind instance.

use anyhow::{Context, Result};
use bitcoind_ctl::{build_controller, CancellationToken, ControllerConfig, Runtime};
use bitcoind_ctl_server::{start_server, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bitcoind-ctl")]
#[command(about = "Start, stop and report the status of a bitcoind instance")]
struct Args {
    /// bitcoind runtime environment (k8s|local)
    #[arg(long, default_value = "k8s", value_parser = parse_runtime)]
    runtime: Runtime,

    /// Path of the configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Host to bind to (overrides the configuration file)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upper bound in seconds for a single start/stop/status call
    #[arg(long, default_value = "60")]
    request_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_runtime(s: &str) -> std::result::Result<Runtime, String> {
    s.parse().map_err(|e: bitcoind_ctl::DaemonError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting bitcoind-ctl ({} runtime)", args.runtime);

    let config = ControllerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let controller = build_controller(args.runtime, &config).await?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        controller,
        shutdown: shutdown.clone(),
        request_timeout: Duration::from_secs(args.request_timeout),
    });

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.port);
    let (addr, server) = start_server(state, &host, port).await?;
    info!("bitcoind-ctl running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    shutdown.cancel();
    server.await?;

    Ok(())
}
