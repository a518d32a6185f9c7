//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bruno_api::{create_router, metrics, ApiConfig, AppState};
use bruno_pipeline::PipelineConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    init_tracing()?;
    info!("Starting bruno-api");

    let config = ApiConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        work_dir = %pipeline.work_dir.display(),
        output_dir = %pipeline.output_dir.display(),
        duration_ceiling_secs = pipeline.duration_ceiling_secs,
        "configuration loaded"
    );

    tokio::fs::create_dir_all(&pipeline.output_dir)
        .await
        .with_context(|| format!("creating {}", pipeline.output_dir.display()))?;

    let state = AppState::new(config.clone(), pipeline).context("creating application state")?;

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "metrics recorder not installed");
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bruno=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .try_init()?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
