//! # Currency Service
//!
//! Binary that wires together the rate service:
//! - Load configuration from environment
//! - Bootstrap the rate store from the daily feed (fatal on failure)
//! - Start the gRPC server with the subscription stream
//! - Shut everything down in order on SIGINT/SIGTERM

mod config;
mod rates;
mod server;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use currency_proto::currency_server::CurrencyServer;

use crate::rates::RateStore;
use crate::server::CurrencyService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,currency_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    // Bootstrap the rate table; an unreachable or undecodable feed is fatal.
    let rates = Arc::new(
        RateStore::from_feed(&config.rate_feed_url)
            .await
            .context("unable to load exchange rates")?,
    );

    // Create the service; this starts the monitor, fan-out and reaper tasks.
    let service = Arc::new(CurrencyService::new(
        Arc::clone(&rates),
        config.monitor_interval,
    ));

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("invalid bind address")?;
    tracing::info!("Currency gRPC server listening on {}", addr);

    tonic::transport::Server::builder()
        .add_service(CurrencyServer::from_arc(Arc::clone(&service)))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    // The server has stopped accepting streams; drain the workers with a
    // deadline so a stuck task cannot hold the process open.
    tracing::info!("Server stopped, draining background tasks");
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        service.close().await;
        rates.close().await;
    })
    .await;

    if drained.is_err() {
        tracing::warn!("Graceful shutdown timed out, forcing exit");
    } else {
        tracing::info!("Graceful shutdown completed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
