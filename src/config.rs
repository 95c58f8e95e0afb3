// file: src/config.rs
// description: runtime configuration model built from CLI arguments

use crate::cli::Args;
use anyhow::{ensure, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub broadcast: BroadcastConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        ensure!(args.capacity > 0, "broadcast capacity must be at least 1");

        Ok(Config {
            broadcast: BroadcastConfig {
                capacity: args.capacity,
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            logging: LoggingConfig {
                log_level: args.log_level.clone(),
                json_logs: args.json_logs,
            },
        })
    }
}
