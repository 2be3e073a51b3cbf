//! Pipeline orchestration: wires source, stages and sink, then drives a run.
//!
//! ```text
//! paths → Source → Stage₁ → … → Stageₙ → Sink → results (bool per item)
//!            └──────────┴── faults (at most one) ──┘
//! ```
//!
//! Each component runs as a single Tokio task. Items move between tasks over
//! bounded channels; a run ends when the results channel closes, which
//! happens when the source is exhausted (and everything drains) or when any
//! stage stops after raising a fault.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{ConfigError, PipelineError, StageError};
use crate::types::{ItemOutcome, ProcessingStats, RunSummary};

use super::channel::{fault_channel, FaultReceiver};
use super::sink::Sink;
use super::source::Source;
use super::stage::Stage;
use super::transform;

/// Origin reported when the run ends short without any stage raising a fault.
const PIPELINE_ORIGIN: &str = "pipeline";

/// An ordered chain of stages between a source and a sink.
///
/// A `Pipeline` is a reusable description; [`Pipeline::start`] spawns a
/// fresh set of workers for every run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Source,
    stages: Vec<Stage>,
    sink: Sink,
    buffer_size: usize,
}

/// Builder for [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder {
    source: Source,
    stages: Vec<Stage>,
    sink: Sink,
    buffer_size: usize,
}

impl PipelineBuilder {
    pub fn new(source: Source, sink: Sink) -> Self {
        Self {
            source,
            stages: Vec::new(),
            sink,
            buffer_size: 1,
        }
    }

    /// Append a stage after the ones already added.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append several stages, in order.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Capacity of every inter-stage channel (minimum 1).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            source: self.source,
            stages: self.stages,
            sink: self.sink,
            buffer_size: self.buffer_size,
        }
    }
}

impl Pipeline {
    pub fn builder(source: Source, sink: Sink) -> PipelineBuilder {
        PipelineBuilder::new(source, sink)
    }

    /// Build the pipeline described by `config`, resolving `pipeline.stages`
    /// against the built-in transforms.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let stages = config
            .pipeline
            .stages
            .iter()
            .map(|name| {
                transform::builtin(name, &config.resize)
                    .map(|t| Stage::new(name.clone(), t))
                    .ok_or_else(|| {
                        ConfigError::ValidationError(format!("unknown stage '{}'", name))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::builder(Source::new(config), Sink::new(config))
            .stages(stages)
            .buffer_size(config.pipeline.buffer_size)
            .build())
    }

    /// Names of the intermediate stages, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of concurrent workers a run uses (source + stages + sink).
    pub fn worker_count(&self) -> usize {
        self.stages.len() + 2
    }

    /// Spawn the workers for one run over `paths`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, paths: Vec<PathBuf>) -> PipelineRun {
        tracing::debug!(
            "Starting pipeline: source → {} → sink ({} input(s), buffer {})",
            self.stage_names().join(" → "),
            paths.len(),
            self.buffer_size
        );

        let (faults_tx, faults_rx) = fault_channel();
        let mut items = self
            .source
            .clone()
            .run(paths.clone(), faults_tx.clone(), self.buffer_size);
        for stage in &self.stages {
            items = stage
                .clone()
                .run(items, faults_tx.clone(), self.buffer_size);
        }
        // The sink takes the last fault handle; the orchestrator keeps none.
        let results = self.sink.clone().run(items, faults_tx, self.buffer_size);

        PipelineRun {
            paths,
            results,
            faults: faults_rx,
            next_index: 0,
            started: Instant::now(),
        }
    }

    /// Run to completion and collect the report.
    pub async fn run(&self, paths: Vec<PathBuf>) -> RunReport {
        self.start(paths).finish(|_| {}).await
    }
}

/// A pipeline run in progress.
#[derive(Debug)]
pub struct PipelineRun {
    paths: Vec<PathBuf>,
    results: mpsc::Receiver<bool>,
    faults: FaultReceiver,
    next_index: usize,
    started: Instant,
}

impl PipelineRun {
    /// Wait for the next sink result, paired with the input it belongs to.
    ///
    /// Results arrive in input order. `None` means the sink closed: either
    /// every input was handled or the run aborted.
    pub async fn next(&mut self) -> Option<ItemOutcome> {
        let success = self.results.recv().await?;
        let index = self.next_index;
        self.next_index += 1;
        Some(ItemOutcome {
            index,
            source: self.paths.get(index).cloned().unwrap_or_default(),
            success,
        })
    }

    /// Drive the run until the sink closes, calling `on_outcome` per item,
    /// then collect the fault if one was raised.
    pub async fn finish<F>(mut self, mut on_outcome: F) -> RunReport
    where
        F: FnMut(&ItemOutcome),
    {
        let mut outcomes = Vec::with_capacity(self.paths.len());
        while let Some(outcome) = self.next().await {
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        let total_inputs = self.paths.len();
        let fault = self.faults.recv().await.or_else(|| {
            // Results stopped early but nobody reported why.
            (outcomes.len() < total_inputs).then(|| {
                StageError::new(
                    PIPELINE_ORIGIN,
                    self.paths.get(outcomes.len()).cloned(),
                    PipelineError::WorkerLost {
                        stage: PIPELINE_ORIGIN.to_string(),
                        message: format!(
                            "results closed after {} of {} input(s) without an error",
                            outcomes.len(),
                            total_inputs
                        ),
                    },
                )
            })
        });
        let elapsed = self.started.elapsed();
        if let Some(fault) = &fault {
            tracing::debug!("Run aborted by {} stage", fault.origin);
        }

        RunReport {
            outcomes,
            fault,
            total_inputs,
            elapsed,
        }
    }
}

/// Everything observed during one run.
#[derive(Debug)]
pub struct RunReport {
    /// Sink results in input order
    pub outcomes: Vec<ItemOutcome>,
    /// The fault that aborted the run, if any
    pub fault: Option<StageError>,
    /// Number of inputs the run was started with
    pub total_inputs: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// True when every input was written and no stage faulted.
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
            && self.outcomes.len() == self.total_inputs
            && self.outcomes.iter().all(|o| o.success)
    }

    pub fn stats(&self) -> ProcessingStats {
        let succeeded = self.outcomes.iter().filter(|o| o.success).count();
        let failed = self.outcomes.len() - succeeded;
        let total_seconds = self.elapsed.as_secs_f64();
        ProcessingStats {
            succeeded,
            failed,
            not_reached: self.total_inputs.saturating_sub(self.outcomes.len()),
            images_per_second: if total_seconds > 0.0 {
                succeeded as f64 / total_seconds
            } else {
                0.0
            },
            total_seconds,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            stats: self.stats(),
            failed_stage: self.fault.as_ref().map(|f| f.origin.clone()),
            failed_input: self.fault.as_ref().and_then(|f| f.subject.clone()),
            error: self.fault.as_ref().map(|f| f.cause.to_string()),
        }
    }

    /// The outcomes, or the fault that aborted the run.
    pub fn into_result(self) -> Result<Vec<ItemOutcome>, StageError> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.outcomes),
        }
    }
}
