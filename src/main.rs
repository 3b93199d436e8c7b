use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postr_gateway::config::{AppEnv, GatewayConfig};
use postr_gateway::gateway::{AdmissionGateway, HttpServer};
use postr_gateway::ratelimit::LimiterRegistry;

/// Request admission gateway for the postr API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Optional YAML configuration file (environment variables take precedence)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The logger format depends on APP_ENV, which is read before full config
    let _ = dotenvy::dotenv();
    let app_env = std::env::var("APP_ENV")
        .map(|v| AppEnv::parse_lenient(&v))
        .unwrap_or_default();
    init_tracing(app_env);

    info!("Starting postr gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatewayConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let directory = Arc::new(config.directory()?);
    let registry = Arc::new(LimiterRegistry::new());
    let gateway = Arc::new(AdmissionGateway::new(
        directory,
        registry,
        config.quota(),
        config.app_env,
    ));
    info!(
        app_env = %gateway.app_env(),
        rate = gateway.quota().rate,
        capacity = gateway.quota().capacity,
        "Admission gateway initialized"
    );

    let server = HttpServer::new(config.server.addr(), gateway);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Postr gateway stopped");
    Ok(())
}

/// JSON logs in production, human-readable logs in development.
fn init_tracing(app_env: AppEnv) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if app_env.is_development() {
        registry
            .with(tracing_subscriber::fmt::layer().with_thread_ids(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    }
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
