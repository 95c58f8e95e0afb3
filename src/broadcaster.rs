// file: src/broadcaster.rs
// description: de-duplicating multicast of reachability transitions

use crate::{
    error::ReachcastError,
    events::{
        create_broadcast_channel, ChangeEvent, EventReceiver, EventSender, StreamEvent,
        BROADCAST_CHANNEL_CAPACITY,
    },
    monitoring,
    source::{ChangeSource, ObservationToken, SourceMessage, StateSink},
    state::{BroadcasterState, SharedBroadcasterState},
    types::ConnectionState,
    views::{ConnectedPulse, DisconnectedPulse, ReachableView, StatusView},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveObservation {
    token: ObservationToken,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct ControlState {
    subscribers: usize,
    observation: Option<ActiveObservation>,
}

/// Owns the single observation of a `ChangeSource` and fans each distinct
/// transition out to every subscriber. Observation is reference-counted:
/// the first subscriber activates it, the last one detaching deactivates it.
/// Nothing is buffered across subscriptions and nothing is replayed.
pub struct ChangeBroadcaster {
    source: Arc<dyn ChangeSource>,
    sender: EventSender,
    control: Arc<Mutex<ControlState>>,
    state: SharedBroadcasterState,
}

impl ChangeBroadcaster {
    pub fn new(source: Arc<dyn ChangeSource>) -> Self {
        Self::with_capacity(source, BROADCAST_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(source: Arc<dyn ChangeSource>, capacity: usize) -> Self {
        Self {
            source,
            sender: create_broadcast_channel(capacity),
            control: Arc::new(Mutex::new(ControlState::default())),
            state: Arc::new(BroadcasterState::new()),
        }
    }

    /// Attaches a subscriber to the raw transition stream. The first
    /// subscriber (re)activates the source observation; an activation
    /// failure is returned to the caller and leaves the broadcaster idle.
    pub fn subscribe(&self) -> Result<Subscription, ReachcastError> {
        let mut control = self.control.lock();
        // Receiver is created before activation so the activating subscriber
        // cannot miss a state the source emits immediately on start.
        let rx = self.sender.subscribe();
        if control.observation.is_none() {
            control.observation = Some(self.activate()?);
        }
        control.subscribers += 1;
        self.state.set_subscribers(control.subscribers);
        monitoring::SUBSCRIBERS_GAUGE.set(control.subscribers as f64);
        debug!(subscribers = control.subscribers, "subscriber attached");
        Ok(Subscription {
            rx,
            terminated: false,
            _guard: DetachGuard {
                source: Arc::clone(&self.source),
                control: Arc::clone(&self.control),
                state: Arc::clone(&self.state),
            },
        })
    }

    /// `Status` view: the transport carried by every transition.
    pub fn status(&self) -> Result<StatusView, ReachcastError> {
        Ok(StatusView::new(self.subscribe()?))
    }

    /// `IsReachable` view: the coarse boolean partition, one per transition.
    pub fn is_reachable(&self) -> Result<ReachableView, ReachcastError> {
        Ok(ReachableView::new(self.subscribe()?))
    }

    /// `BecameConnected` view: unit pulse per unreachable -> reachable edge.
    pub fn connected(&self) -> Result<ConnectedPulse, ReachcastError> {
        Ok(ConnectedPulse::new(self.subscribe()?))
    }

    /// `BecameDisconnected` view: unit pulse per reachable -> unreachable edge.
    pub fn disconnected(&self) -> Result<DisconnectedPulse, ReachcastError> {
        Ok(DisconnectedPulse::new(self.subscribe()?))
    }

    pub fn subscriber_count(&self) -> usize {
        self.control.lock().subscribers
    }

    pub fn is_active(&self) -> bool {
        self.control.lock().observation.is_some()
    }

    pub fn health(&self) -> monitoring::BroadcastHealth {
        monitoring::BroadcastHealth::from_state(&self.state, self.is_active())
    }

    fn activate(&self) -> Result<ActiveObservation, ReachcastError> {
        let (sink, rx) = StateSink::new();
        let token = self.source.start_observing(sink)?;
        let pump = tokio::spawn(pump_loop(
            rx,
            token,
            Arc::clone(&self.source),
            self.sender.clone(),
            Arc::clone(&self.control),
            Arc::clone(&self.state),
        ));
        self.state.record_activation();
        info!("reachability observation activated");
        Ok(ActiveObservation { token, pump })
    }
}

/// Moves raw states from the source into the broadcast channel. The de-dup
/// memory is pump-local, so every activation starts with a clean slate and
/// the first event carries `previous = None`.
async fn pump_loop(
    mut rx: mpsc::UnboundedReceiver<SourceMessage>,
    token: ObservationToken,
    source: Arc<dyn ChangeSource>,
    sender: EventSender,
    control: Arc<Mutex<ControlState>>,
    state: SharedBroadcasterState,
) {
    let mut last: Option<ConnectionState> = None;
    loop {
        match rx.recv().await {
            Some(SourceMessage::State(current)) => {
                if last == Some(current) {
                    state.record_duplicate();
                    monitoring::DUPLICATES_COUNTER.increment(1);
                    continue;
                }
                let event = ChangeEvent {
                    previous: last,
                    current,
                };
                last = Some(current);
                state.record_change(current);
                monitoring::CHANGES_COUNTER.increment(1);
                monitoring::REACHABLE_GAUGE.set(if current.is_reachable() { 1.0 } else { 0.0 });
                debug!(previous = ?event.previous, current = %event.current, "broadcasting transition");
                let _ = sender.send(StreamEvent::Change(event));
            }
            Some(SourceMessage::Failed(reason)) => {
                warn!(%reason, "reachability source failed");
                terminate(token, &source, &sender, &control, &state, reason);
                break;
            }
            None => {
                warn!("reachability source channel closed");
                terminate(
                    token,
                    &source,
                    &sender,
                    &control,
                    &state,
                    "source terminated".to_string(),
                );
                break;
            }
        }
    }
}

/// Tears down the observation on source failure. The control lock is held
/// across the clear and the terminal send (both non-blocking) so a concurrent
/// `subscribe` cannot attach a fresh receiver in between; the token check
/// keeps a stale pump from tearing down a successor observation.
fn terminate(
    token: ObservationToken,
    source: &Arc<dyn ChangeSource>,
    sender: &EventSender,
    control: &Arc<Mutex<ControlState>>,
    state: &SharedBroadcasterState,
    reason: String,
) {
    let mut control = control.lock();
    if control.observation.as_ref().map(|o| o.token) != Some(token) {
        return;
    }
    control.observation = None;
    state.record_failure();
    monitoring::SOURCE_FAILURE_COUNTER.increment(1);
    // Release the dead registration; stop is idempotent even after failure.
    source.stop_observing(token);
    let _ = sender.send(StreamEvent::SourceLost { reason });
}

struct DetachGuard {
    source: Arc<dyn ChangeSource>,
    control: Arc<Mutex<ControlState>>,
    state: SharedBroadcasterState,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let mut control = self.control.lock();
        control.subscribers = control.subscribers.saturating_sub(1);
        self.state.set_subscribers(control.subscribers);
        monitoring::SUBSCRIBERS_GAUGE.set(control.subscribers as f64);
        if control.subscribers == 0 {
            if let Some(observation) = control.observation.take() {
                observation.pump.abort();
                self.source.stop_observing(observation.token);
                info!("last subscriber detached, observation deactivated");
            }
        }
    }
}

/// One subscriber's handle on the transition stream. Dropping it detaches
/// immediately; dropping the last one deactivates the source observation.
pub struct Subscription {
    rx: EventReceiver,
    terminated: bool,
    _guard: DetachGuard,
}

impl Subscription {
    /// Waits for the next de-duplicated transition.
    ///
    /// `SourceUnavailable` is terminal: once returned, every later call
    /// yields `StreamClosed`. `Lagged` is not terminal; the subscriber
    /// resumes at the oldest event still in flight.
    pub async fn recv(&mut self) -> Result<ChangeEvent, ReachcastError> {
        if self.terminated {
            return Err(ReachcastError::StreamClosed);
        }
        match self.rx.recv().await {
            Ok(StreamEvent::Change(event)) => Ok(event),
            Ok(StreamEvent::SourceLost { reason }) => {
                self.terminated = true;
                Err(ReachcastError::SourceUnavailable { reason })
            }
            Err(broadcast::error::RecvError::Lagged(n)) => Err(ReachcastError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => {
                self.terminated = true;
                Err(ReachcastError::StreamClosed)
            }
        }
    }
}
