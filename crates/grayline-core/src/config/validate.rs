//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::pipeline::transform::{parse_filter, BUILTIN_TRANSFORMS};

use super::Config;

/// Upper bound for `limits.max_file_size_mb` (1 TiB).
const MAX_FILE_SIZE_MB: u64 = 1024 * 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        if self.pipeline.stages.is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.stages must name at least one stage".into(),
            ));
        }
        if let Some(unknown) = self
            .pipeline
            .stages
            .iter()
            .find(|s| !BUILTIN_TRANSFORMS.contains(&s.as_str()))
        {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.stages: unknown stage '{}' (expected one of: {})",
                unknown,
                BUILTIN_TRANSFORMS.join(", ")
            )));
        }
        if self.resize.width == 0 || self.resize.height == 0 {
            return Err(ConfigError::ValidationError(
                "resize.width and resize.height must be > 0".into(),
            ));
        }
        if parse_filter(&self.resize.filter).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "resize.filter: unknown filter '{}'",
                self.resize.filter
            )));
        }
        if self.output.replace.is_empty() {
            return Err(ConfigError::ValidationError(
                "output.replace must not be empty".into(),
            ));
        }
        if self.output.replace == self.output.with {
            return Err(ConfigError::ValidationError(
                "output.with must differ from output.replace".into(),
            ));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "output.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 || self.limits.max_file_size_mb > MAX_FILE_SIZE_MB {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_file_size_mb must be between 1 and {}",
                MAX_FILE_SIZE_MB
            )));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        Ok(())
    }
}
