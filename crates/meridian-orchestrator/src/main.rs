//! Meridian Service Binary
//!
//! Runs the autonomous cycle loop and serves the control surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meridian_common::VERSION;
use meridian_orchestrator::{create_router, run_loop, ApiState, MeridianConfig, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Meridian v{}", VERSION);

    // Load configuration
    let config = MeridianConfig::load()?;
    info!(
        target = %config.tracker.daily_target,
        warn = %config.risk.threshold_warn,
        halt = %config.risk.threshold_halt,
        max_agents = config.pool.max_agents,
        autorun = config.scheduler.autorun,
        "Loaded configuration"
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let autorun = config.scheduler.autorun;

    let orchestrator = Orchestrator::from_config(config)?;
    let handle = orchestrator.handle();
    let orchestrator = Arc::new(Mutex::new(orchestrator));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_task = autorun.then(|| tokio::spawn(run_loop(orchestrator.clone(), shutdown_rx)));

    let app = create_router(ApiState::new(orchestrator, handle));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control surface listening on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = loop_task {
        let _ = task.await;
    }

    info!("Shutting down Meridian");
    Ok(())
}
