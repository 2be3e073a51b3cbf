//! Spawning pipeline workers so that a crash still produces a fault.

use std::future::Future;

use crate::error::{PipelineError, StageError};

use super::channel::FaultSender;

/// Spawn `body` as the worker for stage `name`.
///
/// A watcher task holds its own fault handle until the worker ends. If the
/// worker panics or is cancelled, the watcher raises `WorkerLost` for it, so
/// the run never ends with a truncated stream and no error.
pub(crate) fn spawn_supervised<F>(name: impl Into<String>, faults: FaultSender, body: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let worker = tokio::spawn(body);

    tokio::spawn(async move {
        if let Err(e) = worker.await {
            faults.raise(StageError::new(
                name.clone(),
                None,
                PipelineError::WorkerLost {
                    stage: name,
                    message: e.to_string(),
                },
            ));
        }
    });
}
