// file: src/source.rs
// description: the external reachability detector seam and bundled sources

use crate::error::ReachcastError;
use crate::types::ConnectionState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub(crate) enum SourceMessage {
    State(ConnectionState),
    Failed(String),
}

/// Handle a source pushes raw states through while an observation is active.
/// Unbounded on purpose: transitions are sparse and the terminal failure
/// signal must never be dropped.
#[derive(Clone, Debug)]
pub struct StateSink {
    tx: mpsc::UnboundedSender<SourceMessage>,
}

impl StateSink {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SourceMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Delivers a raw state. Returns false once the observation has stopped;
    /// the source may stop pushing at that point.
    pub fn push(&self, state: ConnectionState) -> bool {
        self.tx.send(SourceMessage::State(state)).is_ok()
    }

    /// Reports abnormal termination of the detector.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(SourceMessage::Failed(reason.into()));
    }
}

/// Opaque id for one active observation registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationToken(Uuid);

impl ObservationToken {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Seam for the external reachability detector. Implementations deliver raw
/// `ConnectionState` values into the sink on a single logical timeline, and
/// must tolerate repeated start/stop cycles and stale-token stops.
pub trait ChangeSource: Send + Sync {
    fn start_observing(&self, sink: StateSink) -> Result<ObservationToken, ReachcastError>;
    fn stop_observing(&self, token: ObservationToken);
}

/// Manually driven source for tests and demos.
#[derive(Default)]
pub struct ScriptedSource {
    sink: Mutex<Option<(ObservationToken, StateSink)>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pushes a raw state into the active observation, if any.
    pub fn emit(&self, state: ConnectionState) -> bool {
        match &*self.sink.lock() {
            Some((_, sink)) => sink.push(state),
            None => false,
        }
    }

    /// Terminates the active observation abnormally.
    pub fn fail(&self, reason: &str) {
        if let Some((_, sink)) = &*self.sink.lock() {
            sink.fail(reason);
        }
    }

    pub fn is_observed(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl ChangeSource for ScriptedSource {
    fn start_observing(&self, sink: StateSink) -> Result<ObservationToken, ReachcastError> {
        let token = ObservationToken::new();
        *self.sink.lock() = Some((token, sink));
        self.starts.fetch_add(1, Ordering::Relaxed);
        Ok(token)
    }

    fn stop_observing(&self, token: ObservationToken) {
        let mut guard = self.sink.lock();
        if matches!(&*guard, Some((active, _)) if *active == token) {
            *guard = None;
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Reads one state per line from stdin. Used by the bundled binary; real
/// deployments plug an OS-level detector in behind `ChangeSource` instead.
#[derive(Default)]
pub struct StdinSource {
    task: Mutex<Option<(ObservationToken, tokio::task::JoinHandle<()>)>>,
}

impl StdinSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ChangeSource for StdinSource {
    fn start_observing(&self, sink: StateSink) -> Result<ObservationToken, ReachcastError> {
        let token = ObservationToken::new();
        let handle = tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match line.parse::<ConnectionState>() {
                            Ok(state) => {
                                if !sink.push(state) {
                                    break;
                                }
                            }
                            Err(e) => warn!("ignoring input line: {}", e),
                        }
                    }
                    Ok(None) => {
                        sink.fail("input stream ended");
                        break;
                    }
                    Err(e) => {
                        sink.fail(format!("input read failed: {}", e));
                        break;
                    }
                }
            }
        });
        *self.task.lock() = Some((token, handle));
        Ok(token)
    }

    fn stop_observing(&self, token: ObservationToken) {
        let mut guard = self.task.lock();
        if matches!(&*guard, Some((active, _)) if *active == token) {
            if let Some((_, handle)) = guard.take() {
                handle.abort();
                debug!("stdin source observation stopped");
            }
        }
    }
}
