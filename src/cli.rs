use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "reachcast",
    about = "reachability change broadcaster reading state transitions from stdin",
    version
)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Broadcast channel capacity (in-flight events per subscriber)
    #[arg(long, default_value = "64")]
    pub capacity: usize,
}
