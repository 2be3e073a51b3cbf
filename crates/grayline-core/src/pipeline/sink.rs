//! The pipeline sink: writes finished items and reports one boolean each.

use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{PipelineError, StageError};
use crate::types::WorkItem;

use super::channel::{bounded_channel, FaultSender};
use super::worker::spawn_supervised;
use super::encode::ImageEncoder;

/// Stage name reported in faults raised by the sink.
pub const SINK_STAGE: &str = "sink";

/// Encodes each item's payload and writes it to the item's destination.
///
/// Write failures are not swallowed: the sink reports `false` for the
/// failing item, raises an `Encode` fault, and stops like any other stage.
#[derive(Debug, Clone)]
pub struct Sink {
    encoder: ImageEncoder,
}

impl Sink {
    pub fn new(config: &Config) -> Self {
        Self {
            encoder: ImageEncoder::from_config(&config.output),
        }
    }

    /// Spawn the sink worker reading from `input`; returns the results receiver.
    pub fn run(
        self,
        mut input: mpsc::Receiver<WorkItem>,
        faults: FaultSender,
        capacity: usize,
    ) -> mpsc::Receiver<bool> {
        let (tx, rx) = bounded_channel(capacity);

        spawn_supervised(SINK_STAGE, faults.clone(), async move {
            while let Some(item) = input.recv().await {
                let source = item.source().to_path_buf();
                let destination = item.destination().to_path_buf();

                match self.write(item).await {
                    Ok(()) => {
                        tracing::debug!("Wrote {:?}", destination);
                        if tx.send(true).await.is_err() {
                            tracing::debug!("Sink: results receiver gone, stopping");
                            return;
                        }
                    }
                    Err(cause) => {
                        let _ = tx.send(false).await;
                        faults.raise(StageError::new(SINK_STAGE, Some(source), cause));
                        return;
                    }
                }
            }
            tracing::debug!("Sink drained");
        });

        rx
    }

    async fn write(&self, item: WorkItem) -> Result<(), PipelineError> {
        let encoder = self.encoder.clone();
        let destination = item.destination().to_path_buf();

        tokio::task::spawn_blocking(move || encoder.write(&item.payload, item.destination()))
            .await
            .map_err(|e| PipelineError::Encode {
                path: destination,
                message: format!("Task join error: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::fault_channel;
    use image::DynamicImage;
    use std::path::Path;

    fn item(dir: &Path, name: &str) -> WorkItem {
        WorkItem::new(
            dir.join(name),
            dir.join("output").join(name),
            DynamicImage::new_luma8(6, 6),
        )
    }

    #[tokio::test]
    async fn test_sink_writes_and_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("output")).unwrap();

        let (input_tx, input_rx) = mpsc::channel(1);
        let (faults_tx, faults_rx) = fault_channel();
        let mut results = Sink::new(&Config::default()).run(input_rx, faults_tx, 1);

        let root = dir.path().to_path_buf();
        tokio::spawn(async move {
            input_tx.send(item(&root, "a.jpg")).await.unwrap();
            input_tx.send(item(&root, "b.png")).await.unwrap();
        });

        assert_eq!(results.recv().await, Some(true));
        assert_eq!(results.recv().await, Some(true));
        assert_eq!(results.recv().await, None);
        assert!(faults_rx.recv().await.is_none());

        assert!(image::open(dir.path().join("output/a.jpg")).is_ok());
        assert!(image::open(dir.path().join("output/b.png")).is_ok());
    }

    #[tokio::test]
    async fn test_sink_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // No output/ directory: the write must fail.
        let (input_tx, input_rx) = mpsc::channel(2);
        let (faults_tx, faults_rx) = fault_channel();
        let mut results = Sink::new(&Config::default()).run(input_rx, faults_tx, 1);

        input_tx.send(item(dir.path(), "a.jpg")).await.unwrap();
        input_tx.send(item(dir.path(), "b.jpg")).await.unwrap();

        assert_eq!(results.recv().await, Some(false));
        assert_eq!(results.recv().await, None);

        let fault = faults_rx.recv().await.unwrap();
        assert_eq!(fault.origin, SINK_STAGE);
        assert_eq!(fault.subject, Some(dir.path().join("a.jpg")));
        assert!(matches!(fault.cause, PipelineError::Encode { .. }));
    }
}
