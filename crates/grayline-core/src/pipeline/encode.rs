//! Encoding and writing output images.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::OutputConfig;
use crate::error::PipelineError;

/// Writes images to disk in the format implied by the destination path.
#[derive(Debug, Clone)]
pub struct ImageEncoder {
    jpeg_quality: u8,
}

impl ImageEncoder {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.jpeg_quality)
    }

    /// Encode `image` and write it to `path`, replacing any existing file.
    pub fn write(&self, image: &DynamicImage, path: &Path) -> Result<(), PipelineError> {
        let encode_err = |message: String| PipelineError::Encode {
            path: path.to_path_buf(),
            message,
        };

        let format = ImageFormat::from_path(path)
            .map_err(|e| encode_err(format!("Cannot pick output format: {}", e)))?;

        let file = File::create(path).map_err(|e| encode_err(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
                match image.color() {
                    ColorType::L8 | ColorType::Rgb8 => image.write_with_encoder(encoder),
                    _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder),
                }
            }
            other => image.write_to(&mut writer, other),
        }
        .map_err(|e| encode_err(e.to_string()))?;

        writer.flush().map_err(|e| encode_err(e.to_string()))?;
        Ok(())
    }
}
