use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use antibrute::cli::{Cli, Command};
use antibrute::config::AppConfig;
use antibrute::grpc::GrpcServer;
use antibrute::lists::IpLists;
use antibrute::ratelimit::{RateLimiter, WindowRegistry};
use antibrute::{ctl, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(cli.config.as_deref()).await,
        Command::Ctl(args) => ctl::run(args).await,
    }
}

async fn serve(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    telemetry::init_tracing(&config.logging);

    info!("Starting Antibrute Admission Control Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        grpc_addr = %config.server.grpc_addr,
        same_ip = config.policy.same_ip,
        same_login = config.policy.same_login,
        same_password = config.policy.same_password,
        "Configuration loaded"
    );

    let lists = IpLists::open(&config.database).await?;
    info!(database = %config.database.url, "IP lists opened");

    let registry = WindowRegistry::new(config.window_settings());
    let rate_limiter = Arc::new(RateLimiter::new(config.policy(), lists.clone(), registry));
    info!("Rate limiter initialized");

    let grpc_server = GrpcServer::new(config.server.grpc_addr, rate_limiter, lists);

    // Run the server with graceful shutdown on Ctrl+C
    grpc_server
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Antibrute Admission Control Service stopped");
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
