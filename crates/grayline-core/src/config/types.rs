//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Pipeline wiring and channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max items buffered between two adjacent stages
    pub buffer_size: usize,

    /// Ordered list of intermediate stages between source and sink
    pub stages: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            stages: vec!["resize".to_string(), "grayscale".to_string()],
        }
    }
}

/// Default inputs used when none are given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Input image paths, processed in this order (supports `~`)
    pub paths: Vec<String>,
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Extensions picked up when a directory is given as input
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "gif".to_string(),
                "bmp".to_string(),
                "tiff".to_string(),
                "webp".to_string(),
            ],
        }
    }
}

/// Resize stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Target width in pixels
    pub width: u32,

    /// Target height in pixels
    pub height: u32,

    /// Sampling filter: nearest, triangle, catmullrom, gaussian, lanczos3
    pub filter: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            filter: "lanczos3".to_string(),
        }
    }
}

/// Destination derivation and encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path fragment replaced (first occurrence) to derive the destination
    pub replace: String,

    /// Replacement fragment
    pub with: String,

    /// JPEG encoding quality (1-100)
    pub jpeg_quality: u8,

    /// Create the destination's parent directory before probing it
    pub create_dirs: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            replace: "images/".to_string(),
            with: "images/output/".to_string(),
            jpeg_quality: 90,
            create_dirs: false,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
