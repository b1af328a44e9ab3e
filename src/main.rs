use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use osintgate::config::GateConfig;
use osintgate::gateway::{GatewayServer, GatewayState};

/// Quota-gated proxy for an OSINT lookup API.
#[derive(Parser, Debug)]
#[command(name = "osintgate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "OSINTGATE_CONFIG")]
    config: Option<String>,

    /// Override the listen address from the configuration
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("osintgate=info,tower_http=info"));
    match args.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting osintgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        environment = ?config.environment,
        "Configuration loaded"
    );

    let state = GatewayState::from_config(&config)?;

    // Sweepers live until shutdown
    let shutdown = CancellationToken::new();
    state
        .tiers
        .start_sweepers(config.rate_limiting.sweep_interval(), &shutdown);

    let server = GatewayServer::new(config.server.listen_addr, state.clone());
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    shutdown.cancel();
    state.tiers.stop_sweepers().await;

    result?;
    info!("osintgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
