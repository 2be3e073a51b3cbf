//! Channels connecting pipeline stages.
//!
//! Items travel over bounded channels sized by `pipeline.buffer_size`; a full
//! channel suspends the sender, which is the pipeline's only flow control.
//! Faults travel over a separate capacity-1 side channel that is written at
//! most once per stage and read at most once per run.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::StageError;

/// Create a bounded item channel holding at most `capacity` items (minimum 1).
///
/// When the buffer is full, the sender waits, providing backpressure
/// between adjacent stages.
pub fn bounded_channel<T>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(1))
}

/// Create the fault side channel for one pipeline run.
pub fn fault_channel() -> (FaultSender, FaultReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (FaultSender { tx }, FaultReceiver { rx })
}

/// A stage's handle for raising the run's fatal error.
///
/// Each stage owns one clone. Raising consumes it, so a stage can report at
/// most one fault.
#[derive(Clone, Debug)]
pub struct FaultSender {
    tx: mpsc::Sender<StageError>,
}

impl FaultSender {
    /// Record `fault` as the reason the run stopped.
    ///
    /// Never waits. If another stage already filled the slot, this fault is
    /// logged and dropped.
    pub fn raise(self, fault: StageError) {
        tracing::error!("{}", fault);
        match self.tx.try_send(fault) {
            Ok(()) => {}
            Err(TrySendError::Full(fault)) => {
                tracing::warn!("Dropping secondary fault ({}): run already aborted", fault);
            }
            Err(TrySendError::Closed(fault)) => {
                tracing::debug!("Fault receiver gone, dropping: {}", fault);
            }
        }
    }
}

/// The orchestrator's end of the fault channel.
#[derive(Debug)]
pub struct FaultReceiver {
    rx: mpsc::Receiver<StageError>,
}

impl FaultReceiver {
    /// Wait for the run's fault.
    ///
    /// Resolves with the first raised fault, or `None` once every stage has
    /// finished without raising one. Consumes the receiver, so a run
    /// delivers at most one fault.
    pub async fn recv(mut self) -> Option<StageError> {
        self.rx.recv().await
    }
}
