//! Intermediate pipeline stages.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{PipelineError, StageError};
use crate::types::WorkItem;

use super::channel::{bounded_channel, FaultSender};
use super::transform::{FnTransform, Transform};
use super::worker::spawn_supervised;

/// A named transform, run by one dedicated worker between two channels.
///
/// Cloning is cheap: the transform is shared, not copied.
#[derive(Clone)]
pub struct Stage {
    name: String,
    transform: Arc<dyn Transform>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

impl Stage {
    pub fn new(name: impl Into<String>, transform: Arc<dyn Transform>) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }

    /// Build a stage from a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(image::DynamicImage) -> Result<image::DynamicImage, crate::error::TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, Arc::new(FnTransform::new(f)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the stage worker reading from `input`; returns the output receiver.
    ///
    /// The worker handles one item at a time, in arrival order. It closes its
    /// output once `input` is closed and drained. A transform failure raises
    /// a fault and stops the worker, which closes the output and drops the
    /// input so upstream stops on its next send.
    pub fn run(
        self,
        mut input: mpsc::Receiver<WorkItem>,
        faults: FaultSender,
        capacity: usize,
    ) -> mpsc::Receiver<WorkItem> {
        let (tx, rx) = bounded_channel(capacity);

        spawn_supervised(self.name.clone(), faults.clone(), async move {
            let mut processed = 0usize;
            while let Some(item) = input.recv().await {
                let item = match self.apply(item).await {
                    Ok(item) => item,
                    Err(fault) => {
                        faults.raise(fault);
                        return;
                    }
                };
                processed += 1;

                if tx.send(item).await.is_err() {
                    tracing::debug!("Stage '{}': downstream closed, stopping", self.name);
                    return;
                }
            }
            tracing::debug!("Stage '{}' drained after {} item(s)", self.name, processed);
        });

        rx
    }

    /// Run the transform on the blocking pool, moving the item there and back.
    async fn apply(&self, item: WorkItem) -> Result<WorkItem, StageError> {
        let start = std::time::Instant::now();
        let subject = item.source().to_path_buf();
        let transform = Arc::clone(&self.transform);

        let result = tokio::task::spawn_blocking(move || {
            let WorkItem {
                source,
                destination,
                payload,
            } = item;
            transform
                .apply(payload)
                .map(|payload| WorkItem::new(source, destination, payload))
        })
        .await;

        let message = match result {
            Ok(Ok(item)) => {
                tracing::trace!("  {} {:?}: {:?}", self.name, subject, start.elapsed());
                return Ok(item);
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("worker task failed: {}", e),
        };

        Err(StageError::new(
            self.name.clone(),
            Some(subject.clone()),
            PipelineError::Transform {
                stage: self.name.clone(),
                path: subject,
                message,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::pipeline::channel::fault_channel;
    use crate::pipeline::transform::Grayscale;
    use image::DynamicImage;
    use std::path::PathBuf;

    fn item(name: &str, width: u32) -> WorkItem {
        WorkItem::new(
            PathBuf::from(format!("images/{name}")),
            PathBuf::from(format!("images/output/{name}")),
            DynamicImage::new_rgb8(width, 4),
        )
    }

    #[tokio::test]
    async fn test_stage_transforms_in_order() {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (faults_tx, faults_rx) = fault_channel();
        let mut output = Stage::new("grayscale", Arc::new(Grayscale)).run(input_rx, faults_tx, 1);

        tokio::spawn(async move {
            for (i, name) in ["a.jpg", "b.jpg", "c.jpg"].iter().enumerate() {
                input_tx.send(item(name, i as u32 + 1)).await.unwrap();
            }
        });

        let mut widths = Vec::new();
        while let Some(out) = output.recv().await {
            assert!(matches!(out.payload, DynamicImage::ImageLuma8(_)));
            widths.push(out.payload.width());
        }
        assert_eq!(widths, vec![1, 2, 3]);
        assert!(faults_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stage_closes_output_when_input_closes() {
        let (input_tx, input_rx) = mpsc::channel::<WorkItem>(1);
        let (faults_tx, _faults_rx) = fault_channel();
        let mut output = Stage::new("grayscale", Arc::new(Grayscale)).run(input_rx, faults_tx, 1);

        drop(input_tx);
        assert!(output.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stage_failure_raises_fault_and_stops() {
        let (input_tx, input_rx) = mpsc::channel(4);
        let (faults_tx, faults_rx) = fault_channel();
        let stage = Stage::from_fn("picky", |img: DynamicImage| {
            if img.width() == 2 {
                Err(TransformError::msg("width 2 is not allowed"))
            } else {
                Ok(img)
            }
        });
        let mut output = stage.run(input_rx, faults_tx, 4);

        input_tx.send(item("a.jpg", 1)).await.unwrap();
        input_tx.send(item("b.jpg", 2)).await.unwrap();
        input_tx.send(item("c.jpg", 3)).await.unwrap();

        assert_eq!(
            output.recv().await.unwrap().source(),
            std::path::Path::new("images/a.jpg")
        );
        assert!(output.recv().await.is_none());

        let fault = faults_rx.recv().await.unwrap();
        assert_eq!(fault.origin, "picky");
        assert_eq!(fault.subject, Some(PathBuf::from("images/b.jpg")));
        match fault.cause {
            PipelineError::Transform { stage, message, .. } => {
                assert_eq!(stage, "picky");
                assert!(message.contains("width 2"));
            }
            other => panic!("unexpected cause: {other}"),
        }
        // The stage dropped its input, so upstream sends now fail.
        assert!(input_tx.send(item("d.jpg", 4)).await.is_err());
    }

    #[tokio::test]
    async fn test_stage_panic_becomes_fault() {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (faults_tx, faults_rx) = fault_channel();
        let stage = Stage::from_fn("explode", |_img: DynamicImage| -> Result<_, TransformError> {
            panic!("boom")
        });
        let mut output = stage.run(input_rx, faults_tx, 1);

        input_tx.send(item("a.jpg", 1)).await.unwrap();
        assert!(output.recv().await.is_none());
        let fault = faults_rx.recv().await.unwrap();
        assert!(matches!(fault.cause, PipelineError::Transform { .. }));
    }

    #[tokio::test]
    async fn test_stage_stops_when_downstream_dropped() {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (faults_tx, faults_rx) = fault_channel();
        let output = Stage::new("grayscale", Arc::new(Grayscale)).run(input_rx, faults_tx, 1);
        drop(output);

        input_tx.send(item("a.jpg", 1)).await.unwrap();
        // The worker exits on its failed send and releases its fault handle.
        assert!(faults_rx.recv().await.is_none());
        assert!(input_tx.is_closed());
    }
}
