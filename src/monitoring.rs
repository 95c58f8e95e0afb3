use crate::error::ReachcastError;
use crate::state::BroadcasterState;
use crate::types::ConnectionState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, Counter, Gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::atomic::Ordering;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static CHANGES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("reachcast_changes_total"));
pub static DUPLICATES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("reachcast_duplicates_collapsed_total"));
pub static SOURCE_FAILURE_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("reachcast_source_failures_total"));
pub static SUBSCRIBERS_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("reachcast_subscribers"));
pub static REACHABLE_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("reachcast_reachable"));

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "reachcast")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            // Initialize metrics with default values
            CHANGES_COUNTER.absolute(0);
            DUPLICATES_COUNTER.absolute(0);
            SOURCE_FAILURE_COUNTER.absolute(0);
            SUBSCRIBERS_GAUGE.set(0.0);
            REACHABLE_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(ReachcastError::MetricsError(e.to_string()).into())
        }
    }
}

#[derive(Debug)]
pub struct BroadcastHealth {
    pub is_active: bool,
    pub subscriber_count: usize,
    pub current_state: Option<ConnectionState>,
    pub changes_broadcast: u64,
    pub duplicates_collapsed: u64,
    pub source_failures: u64,
    pub activations: u64,
    pub last_change_time: Option<DateTime<Utc>>,
    pub uptime: chrono::Duration,
}

impl BroadcastHealth {
    pub fn from_state(state: &BroadcasterState, is_active: bool) -> Self {
        let last = state.last_change();
        Self {
            is_active,
            subscriber_count: state.subscriber_count.load(Ordering::Relaxed),
            current_state: last.map(|(_, s)| s),
            changes_broadcast: state.changes_broadcast.load(Ordering::Relaxed),
            duplicates_collapsed: state.duplicates_collapsed.load(Ordering::Relaxed),
            source_failures: state.source_failures.load(Ordering::Relaxed),
            activations: state.activations.load(Ordering::Relaxed),
            last_change_time: last.map(|(t, _)| t),
            uptime: Utc::now() - state.started_at,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_active { "observing" } else { "idle" },
            "subscribers": self.subscriber_count,
            "current_state": self.current_state,
            "changes_broadcast": self.changes_broadcast,
            "duplicates_collapsed": self.duplicates_collapsed,
            "source_failures": self.source_failures,
            "activations": self.activations,
            "last_change_time": self.last_change_time,
            "uptime_seconds": self.uptime.num_seconds(),
            "timestamp": Utc::now()
        })
    }
}
