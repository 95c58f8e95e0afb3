// file: src/types.rs
// description: connection state model and the reachable/unreachable partition

use crate::error::ReachcastError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport reported by the reachability detector. A closed set; anything
/// other than `Unavailable` counts as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Unavailable,
    Cellular,
    WiFi,
}

impl ConnectionState {
    pub fn is_reachable(self) -> bool {
        self != ConnectionState::Unavailable
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unavailable => "unavailable",
            ConnectionState::Cellular => "cellular",
            ConnectionState::WiFi => "wifi",
        };
        f.write_str(name)
    }
}

impl FromStr for ConnectionState {
    type Err = ReachcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unavailable" | "none" | "off" => Ok(ConnectionState::Unavailable),
            "cellular" | "cell" => Ok(ConnectionState::Cellular),
            "wifi" | "wi-fi" => Ok(ConnectionState::WiFi),
            other => Err(ReachcastError::InvalidState(other.to_string())),
        }
    }
}
