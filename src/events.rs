// file: src/events.rs
// description: change events and the multicast channel they travel on

use crate::types::ConnectionState;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One observed transition. `previous` is `None` for the first event of an
/// observation; `current` never equals the previous event's `current`
/// (strict de-duplication upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub previous: Option<ConnectionState>,
    pub current: ConnectionState,
}

/// What travels on the broadcast channel: transitions, or the terminal
/// signal when the underlying source dies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Change(ChangeEvent),
    SourceLost { reason: String },
}

// Reachability transitions are sparse; 64 in-flight events absorbs a slow
// subscriber without granting it replay semantics.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 64;

pub type EventSender = broadcast::Sender<StreamEvent>;
pub type EventReceiver = broadcast::Receiver<StreamEvent>;

pub fn create_broadcast_channel(capacity: usize) -> EventSender {
    let (tx, _) = broadcast::channel(capacity);
    tx
}
