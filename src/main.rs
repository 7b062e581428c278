//! Audio hub daemon: wires the components onto the router and runs until
//! signalled.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiohub::backends::local::LocalBackend;
use audiohub::config;
use audiohub::playback::engine::NullEngine;
use audiohub::playback::Playback;
use audiohub::router::Router;
use audiohub::source::SourceArbiter;
use audiohub::tracklist::Tracklist;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so it can supply the default log filter.
    let config = config::load_config()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting audiohub v{}", env!("CARGO_PKG_VERSION"));
    if let Some(device) = &config.playback.output_device {
        tracing::info!("Output device: {device}");
    }

    let router = Router::new();

    // TODO: swap NullEngine for the GStreamer engine once it lands.
    let engine = Arc::new(NullEngine::new());
    router.register(SourceArbiter::new(router.clone()));
    router.register(Playback::new(router.clone(), engine));
    router.register(Tracklist::new(router.clone()));
    router.register(LocalBackend::new(
        router.clone(),
        config.local.library_path.clone(),
    ));

    tracing::info!(
        "Components registered: {}",
        router.component_names().join(", ")
    );

    shutdown_signal().await;

    router.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
