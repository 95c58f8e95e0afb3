use anyhow::Result;
use clap::Parser;
use reachcast::{
    broadcaster::ChangeBroadcaster,
    cli::Args,
    config::Config,
    monitoring::setup_metrics,
    source::{ChangeSource, StdinSource},
    tracing_setup::setup_tracing,
    ReachcastError,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(&args.log_level, args.json_logs)?;
    info!("Starting reachcast v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_args(&args)?;

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    let source: Arc<dyn ChangeSource> = StdinSource::new();
    let broadcaster = ChangeBroadcaster::with_capacity(source, config.broadcast.capacity);

    let mut status = broadcaster.status()?;
    let mut connected = broadcaster.connected()?;
    let mut disconnected = broadcaster.disconnected()?;

    // Lagging is recoverable (the subscription resumes at the oldest event
    // still in flight); only terminal errors end a listener.
    let status_task = tokio::spawn(async move {
        loop {
            match status.recv().await {
                Ok(state) => {
                    info!(state = %state, reachable = state.is_reachable(), "connectivity changed")
                }
                Err(ReachcastError::Lagged(n)) => {
                    warn!("status listener lagged by {} events", n)
                }
                Err(e) => {
                    warn!("status stream ended: {}", e);
                    break;
                }
            }
        }
    });
    tokio::spawn(async move {
        loop {
            match connected.recv().await {
                Ok(()) => info!("network became reachable"),
                Err(ReachcastError::Lagged(n)) => {
                    warn!("connected listener lagged by {} events", n)
                }
                Err(_) => break,
            }
        }
    });
    tokio::spawn(async move {
        loop {
            match disconnected.recv().await {
                Ok(()) => warn!("network became unreachable"),
                Err(ReachcastError::Lagged(n)) => {
                    warn!("disconnected listener lagged by {} events", n)
                }
                Err(_) => break,
            }
        }
    });

    info!("Reading states from stdin (wifi | cellular | unavailable). Press Ctrl+C to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
        _ = status_task => {}
    }

    info!(health = %broadcaster.health().to_json(), "final broadcast stats");
    Ok(())
}
