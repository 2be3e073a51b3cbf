//! grayline core - a concurrent, fail-fast image pipeline.
//!
//! Images flow through a linear chain of workers, one Tokio task per stage,
//! connected by bounded channels:
//!
//! ```text
//! paths → Source (validate, probe, decode) → Resize → Grayscale → Sink (encode, write) → bool
//! ```
//!
//! The first unrecoverable error anywhere stops the run: the failing stage
//! raises a single fault and closes its output, and the closure cascades
//! through every downstream stage.
//!
//! # Usage
//!
//! ```rust,ignore
//! use grayline_core::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> grayline_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let report = pipeline
//!         .start(vec!["images/a.jpg".into(), "images/b.jpg".into()])
//!         .finish(|outcome| println!("{}: {}", outcome.source.display(), outcome.success))
//!         .await;
//!     report.into_result()?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, GraylineError, PipelineError, Result, StageError, TransformError};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{
    FileDiscovery, Grayscale, Pipeline, PipelineBuilder, PipelineRun, Resize, RunReport, Sink,
    Source, Stage, Transform,
};
pub use types::{ItemOutcome, OutputRecord, ProcessingStats, RunSummary, WorkItem};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
