//! Input checks the source runs before decoding.

use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Validates input files ahead of decode.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check the input exists, is a regular file, and can be opened for reading.
    pub fn check_readable(&self, path: &Path) -> Result<(), PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PipelineError::NotFound(path.to_path_buf()),
            _ => PipelineError::Access {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

        if !metadata.is_file() {
            return Err(PipelineError::Access {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }

        std::fs::File::open(path).map_err(|e| PipelineError::Access {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// Check size limit and image signature.
    ///
    /// Failures here belong to the decode family: the file is readable but
    /// not something the decoder should be handed.
    pub fn check_content(&self, path: &Path) -> Result<(), PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {}", e),
        })?;

        let max_bytes = self
            .limits
            .max_file_size_mb
            .checked_mul(BYTES_PER_MB)
            .unwrap_or(u64::MAX);
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / BYTES_PER_MB,
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut file = std::fs::File::open(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {}", e),
        })?;
        let mut header = [0u8; 12];
        let bytes_read = file.read(&mut header).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read header: {}", e),
        })?;

        if bytes_read < 4 {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "File too small to be a valid image".to_string(),
            });
        }
        if !Self::has_image_signature(&header[..bytes_read]) {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }

    /// Match the header against signatures of the formats the decoder handles.
    fn has_image_signature(header: &[u8]) -> bool {
        match header {
            [0xFF, 0xD8, 0xFF, ..] => true,
            [0x89, b'P', b'N', b'G', ..] => true,
            [b'G', b'I', b'F', b'8', ..] => true,
            [b'B', b'M', ..] => true,
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
            // WebP: RIFF....WEBP; a truncated RIFF header is left to the decoder
            [b'R', b'I', b'F', b'F', rest @ ..] => {
                rest.len() < 8 || &rest[4..8] == b"WEBP"
            }
            _ => false,
        }
    }
}
