//! The concurrent image pipeline.
//!
//! - **source**: validate, probe and decode inputs into work items
//! - **stage**: one worker per transform between two channels
//! - **transform**: the per-item transforms (resize, grayscale, closures)
//! - **sink**: encode and write items, one boolean result each
//! - **orchestrator**: wire everything together and drive a run
//! - **channel**: bounded item channels and the fault side channel
//! - **decode** / **encode** / **validate**: image I/O used by source and sink
//! - **discovery**: expand directory inputs into image files
//! - **worker**: spawn workers so a crash still surfaces as a fault

pub mod channel;
pub mod decode;
pub mod discovery;
pub mod encode;
pub mod orchestrator;
pub mod sink;
pub mod source;
pub mod stage;
pub mod transform;
pub mod validate;
mod worker;

// Re-exports for convenient access
pub use channel::{bounded_channel, fault_channel, FaultReceiver, FaultSender};
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::FileDiscovery;
pub use encode::ImageEncoder;
pub use orchestrator::{Pipeline, PipelineBuilder, PipelineRun, RunReport};
pub use sink::{Sink, SINK_STAGE};
pub use source::{probe_writable, DestinationRule, Source, SOURCE_STAGE};
pub use stage::Stage;
pub use transform::{FnTransform, Grayscale, Resize, Transform};
pub use validate::Validator;
