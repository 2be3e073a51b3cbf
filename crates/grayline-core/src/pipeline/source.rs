//! The pipeline source: turns an ordered list of paths into work items.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::{Config, OutputConfig};
use crate::error::{PipelineError, StageError};
use crate::types::WorkItem;

use super::channel::{bounded_channel, FaultSender};
use super::decode::{format_name, ImageDecoder};
use super::validate::Validator;
use super::worker::spawn_supervised;

/// Stage name reported in faults raised by the source.
pub const SOURCE_STAGE: &str = "source";

/// Derives an output path from an input path by substituting the first
/// occurrence of a path fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRule {
    replace: String,
    with: String,
}

impl DestinationRule {
    pub fn new(replace: impl Into<String>, with: impl Into<String>) -> Self {
        Self {
            replace: replace.into(),
            with: with.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.replace.clone(), config.with.clone())
    }

    /// Apply the substitution to `source`.
    ///
    /// A path the rule does not match would map onto itself; that is refused
    /// so an input is never overwritten by its own output.
    pub fn derive(&self, source: &Path) -> Result<PathBuf, PipelineError> {
        let text = source.to_string_lossy();
        if self.replace.is_empty() || !text.contains(self.replace.as_str()) {
            return Err(PipelineError::WriteTarget {
                path: source.to_path_buf(),
                message: format!(
                    "destination would overwrite the input ('{}' not found in path)",
                    self.replace
                ),
            });
        }
        Ok(PathBuf::from(text.replacen(
            self.replace.as_str(),
            self.with.as_str(),
            1,
        )))
    }
}

/// Open-or-create `destination` for writing, then release it immediately.
///
/// The file is not truncated; this only proves the sink will be able to
/// write there.
pub fn probe_writable(destination: &Path) -> Result<(), PipelineError> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(destination)
        .map(drop)
        .map_err(|e| PipelineError::WriteTarget {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })
}

/// Loads inputs in order and emits one [`WorkItem`] per valid input.
///
/// The first invalid input aborts the run: the source raises a fault,
/// closes its output and never looks at the remaining paths.
#[derive(Debug, Clone)]
pub struct Source {
    validator: Validator,
    decoder: ImageDecoder,
    rule: DestinationRule,
    create_dirs: bool,
}

impl Source {
    pub fn new(config: &Config) -> Self {
        Self {
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(config.limits.clone()),
            rule: DestinationRule::from_config(&config.output),
            create_dirs: config.output.create_dirs,
        }
    }

    /// Use `rule` instead of the `[output]` substitution.
    pub fn with_rule(mut self, rule: DestinationRule) -> Self {
        self.rule = rule;
        self
    }

    /// Spawn the source worker over `paths`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(
        self,
        paths: Vec<PathBuf>,
        faults: FaultSender,
        capacity: usize,
    ) -> mpsc::Receiver<WorkItem> {
        let (tx, rx) = bounded_channel(capacity);

        spawn_supervised(SOURCE_STAGE, faults.clone(), async move {
            let total = paths.len();
            for (index, path) in paths.into_iter().enumerate() {
                let item = match self.admit(&path).await {
                    Ok(item) => item,
                    Err(cause) => {
                        faults.raise(StageError::new(SOURCE_STAGE, Some(path), cause));
                        return;
                    }
                };
                tracing::debug!("[{}/{}] Loaded {:?}", index + 1, total, path);

                if tx.send(item).await.is_err() {
                    tracing::debug!("Source: downstream closed, stopping at {:?}", path);
                    return;
                }
            }
            tracing::debug!("Source exhausted after {} input(s)", total);
        });

        rx
    }

    /// Validate, derive, probe and decode one input.
    async fn admit(&self, path: &Path) -> Result<WorkItem, PipelineError> {
        let start = std::time::Instant::now();

        let destination = self.prepare(path).await?;
        let decoded = self.decoder.decode(path).await?;
        tracing::trace!(
            "  Admit {:?} ({}, {}x{}) in {:?}",
            path,
            format_name(decoded.format),
            decoded.image.width(),
            decoded.image.height(),
            start.elapsed()
        );

        Ok(WorkItem::new(path.to_path_buf(), destination, decoded.image))
    }

    /// Run the filesystem checks on the blocking pool; returns the destination.
    async fn prepare(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        let validator = self.validator.clone();
        let rule = self.rule.clone();
        let create_dirs = self.create_dirs;
        let path_owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            Self::prepare_sync(&validator, &rule, create_dirs, &path_owned)
        })
        .await
        .map_err(|e| PipelineError::WorkerLost {
            stage: SOURCE_STAGE.to_string(),
            message: format!("checks for {:?} failed: {}", path, e),
        })?
    }

    /// Readable check, destination derivation, probe, then content check.
    fn prepare_sync(
        validator: &Validator,
        rule: &DestinationRule,
        create_dirs: bool,
        path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        validator.check_readable(path)?;

        let destination = rule.derive(path)?;
        if create_dirs {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::WriteTarget {
                    path: destination.clone(),
                    message: format!("Cannot create directory: {}", e),
                })?;
            }
        }
        probe_writable(&destination)?;

        validator.check_content(path)?;
        Ok(destination)
    }
}
