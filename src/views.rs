// file: src/views.rs
// description: stateless projections over the de-duplicated transition stream

use crate::broadcaster::Subscription;
use crate::error::ReachcastError;
use crate::events::ChangeEvent;
use crate::types::ConnectionState;

/// `Status`: the transport carried by each transition.
pub fn status(event: &ChangeEvent) -> ConnectionState {
    event.current
}

/// `IsReachable`: the coarse two-way partition, emitted on every transition.
pub fn reachable(event: &ChangeEvent) -> bool {
    event.current.is_reachable()
}

/// `BecameConnected`: unit pulse on the unreachable -> reachable edge only.
/// The first event of an observation has no previous state and never fires.
/// Checking the edge through `previous` keeps the pulse correct even for
/// transitions within the reachable partition (wifi -> cellular) or if
/// upstream de-duplication were bypassed.
pub fn connected_pulse(event: &ChangeEvent) -> Option<()> {
    match event.previous {
        Some(previous) if !previous.is_reachable() && event.current.is_reachable() => Some(()),
        _ => None,
    }
}

/// `BecameDisconnected`: unit pulse on the reachable -> unreachable edge only.
pub fn disconnected_pulse(event: &ChangeEvent) -> Option<()> {
    match event.previous {
        Some(previous) if previous.is_reachable() && !event.current.is_reachable() => Some(()),
        _ => None,
    }
}

pub struct StatusView {
    subscription: Subscription,
}

impl StatusView {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    pub async fn recv(&mut self) -> Result<ConnectionState, ReachcastError> {
        self.subscription.recv().await.map(|e| status(&e))
    }
}

pub struct ReachableView {
    subscription: Subscription,
}

impl ReachableView {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    pub async fn recv(&mut self) -> Result<bool, ReachcastError> {
        self.subscription.recv().await.map(|e| reachable(&e))
    }
}

pub struct ConnectedPulse {
    subscription: Subscription,
}

impl ConnectedPulse {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Waits for the next transition into the reachable partition.
    pub async fn recv(&mut self) -> Result<(), ReachcastError> {
        loop {
            let event = self.subscription.recv().await?;
            if connected_pulse(&event).is_some() {
                return Ok(());
            }
        }
    }
}

pub struct DisconnectedPulse {
    subscription: Subscription,
}

impl DisconnectedPulse {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Waits for the next transition out of the reachable partition.
    pub async fn recv(&mut self) -> Result<(), ReachcastError> {
        loop {
            let event = self.subscription.recv().await?;
            if disconnected_pulse(&event).is_some() {
                return Ok(());
            }
        }
    }
}
