//! Error types for the grayline image pipeline.
//!
//! Errors are organized by stage so a fault names where it happened, which
//! input caused it, and what went wrong underneath.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for grayline operations.
#[derive(Error, Debug)]
pub enum GraylineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A stage aborted the run
    #[error(transparent)]
    Stage(#[from] StageError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item pipeline failures, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input file does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Input file exists but cannot be read
    #[error("Cannot access {path}: {message}")]
    Access { path: PathBuf, message: String },

    /// Destination cannot be opened for writing
    #[error("Cannot write to {path}: {message}")]
    WriteTarget { path: PathBuf, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// Encoding or writing the output image failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// An intermediate transform rejected the item
    #[error("{stage} failed for {path}: {message}")]
    Transform {
        stage: String,
        path: PathBuf,
        message: String,
    },

    /// A worker stopped without reporting an error (panic or cancellation)
    #[error("{stage} worker stopped unexpectedly: {message}")]
    WorkerLost { stage: String, message: String },
}

impl PipelineError {
    /// True for the decode family (`Decode` and its size/format refinements).
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            PipelineError::Decode { .. }
                | PipelineError::FileTooLarge { .. }
                | PipelineError::ImageTooLarge { .. }
                | PipelineError::UnsupportedFormat { .. }
        )
    }
}

/// The fatal error signal of a pipeline run.
///
/// Raised by whichever stage hit an unrecoverable condition; at most one is
/// ever delivered to the orchestrator.
#[derive(Error, Debug)]
#[error("{origin} stage failed: {cause}")]
pub struct StageError {
    /// Name of the stage that raised the fault
    pub origin: String,
    /// The input that caused it, if any
    pub subject: Option<PathBuf>,
    /// Underlying failure
    pub cause: PipelineError,
}

impl StageError {
    pub fn new(origin: impl Into<String>, subject: Option<PathBuf>, cause: PipelineError) -> Self {
        Self {
            origin: origin.into(),
            subject,
            cause,
        }
    }
}

/// Failure returned by a [`Transform`](crate::pipeline::Transform).
#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Message(String),
}

impl TransformError {
    pub fn msg(message: impl Into<String>) -> Self {
        TransformError::Message(message.into())
    }
}

/// Convenience type alias for grayline results.
pub type Result<T> = std::result::Result<T, GraylineError>;
