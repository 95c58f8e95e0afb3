use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReachcastError {
    #[error("reachability source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    #[error("subscription closed")]
    StreamClosed,

    #[error("subscriber lagged behind by {0} events")]
    Lagged(u64),

    #[error("unrecognized connection state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metrics server error: {0}")]
    MetricsError(String),
}
