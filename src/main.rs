//! shardbridge - multi-shard Discord client using Twilight
//!
//! Runs every recommended shard in one process, serves health/ready/metrics
//! endpoints and logs the normalized message stream.

use anyhow::{Context, Result};
use shardbridge::health::{self, AppState};
use shardbridge::{
    ChatMessage, Client, ClientConfig, GatewayMetrics, TwilightConnector, TwilightTransport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = ClientConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("shardbridge={}", config.log_level).parse()?)
                .add_directive("twilight_gateway=info".parse()?)
                .add_directive("twilight_http=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        shard_count = ?config.shard_count,
        "Starting shardbridge"
    );

    let metrics = Arc::new(GatewayMetrics::install().context("installing Prometheus recorder")?);
    info!("Prometheus metrics initialized");

    let intents = ClientConfig::intents();
    info!(?intents, "Using Discord intents");

    // One REST client for discovery and outbound actions
    let http = Arc::new(twilight_http::Client::new(config.discord_token.clone()));
    let connector = Arc::new(TwilightConnector::new(
        Arc::clone(&http),
        config.discord_token.clone(),
        intents,
    ));
    let transport = Arc::new(TwilightTransport::new(http));

    let http_port = config.http_port;
    let client = Client::new(config, connector, transport, Arc::clone(&metrics));
    let mut events = client.open().await.context("opening shards")?;

    let shard_state = client
        .shard_state()
        .context("shard state missing after open")?;
    info!(shard_count = shard_state.shard_count(), "Shards started");

    let app_state = AppState {
        shard_state,
        metrics: Arc::clone(&metrics),
    };
    let addr: SocketAddr = ([0, 0, 0, 0], http_port).into();
    info!(port = http_port, "Starting HTTP server");
    let http_server = axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        health::router(app_state),
    );

    let consume = async {
        while let Some(message) = events.recv().await {
            info!(
                event_id = %message.event_id(),
                shard_id = message.shard_id(),
                kind = %message.kind(),
                channel_id = %message.channel(),
                user = message.user_name(),
                is_me = client.is_me(&message),
                content = message.content(),
                "Message"
            );
        }
        warn!("Event queue closed");
    };

    tokio::select! {
        _ = consume => {}
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down...");
    client.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
