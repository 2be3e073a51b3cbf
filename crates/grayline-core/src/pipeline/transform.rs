//! Per-item image transforms run by intermediate stages.
//!
//! A transform is a synchronous function from one image to the next. It sees
//! nothing but the payload it is handed, which keeps stages independent of
//! each other and trivially swappable.

use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;

use crate::config::ResizeConfig;
use crate::error::TransformError;

/// Names accepted in `pipeline.stages`.
pub const BUILTIN_TRANSFORMS: &[&str] = &["resize", "grayscale"];

/// A payload transformation applied by a [`Stage`](super::Stage).
pub trait Transform: Send + Sync {
    /// Produce the next payload, or fail the item.
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, TransformError>;
}

/// Adapter turning a closure into a [`Transform`].
pub struct FnTransform<F>(F);

impl<F> FnTransform<F>
where
    F: Fn(DynamicImage) -> Result<DynamicImage, TransformError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(DynamicImage) -> Result<DynamicImage, TransformError> + Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        (self.0)(image)
    }
}

/// Resize to exact target dimensions, ignoring aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Build from the `[resize]` section. Unknown filters fall back to Lanczos3;
    /// config validation rejects them before this point.
    pub fn from_config(config: &ResizeConfig) -> Self {
        let filter = parse_filter(&config.filter).unwrap_or(FilterType::Lanczos3);
        Self::new(config.width, config.height).with_filter(filter)
    }
}

impl Transform for Resize {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(TransformError::msg("cannot resize an empty image"));
        }
        // Already at target size: hand the buffer back untouched.
        if image.width() == self.width && image.height() == self.height {
            return Ok(image);
        }
        Ok(image.resize_exact(self.width, self.height, self.filter))
    }
}

/// Convert to 8-bit single-channel luma.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl Transform for Grayscale {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        match image {
            DynamicImage::ImageLuma8(_) => Ok(image),
            other => Ok(DynamicImage::ImageLuma8(other.to_luma8())),
        }
    }
}

/// Parse a resize filter name (case-insensitive).
pub fn parse_filter(name: &str) -> Option<FilterType> {
    match name.to_lowercase().as_str() {
        "nearest" => Some(FilterType::Nearest),
        "triangle" | "linear" => Some(FilterType::Triangle),
        "catmullrom" | "cubic" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" | "lanczos" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

/// Look up a built-in transform by its stage name.
pub fn builtin(name: &str, resize: &ResizeConfig) -> Option<Arc<dyn Transform>> {
    match name {
        "resize" => Some(Arc::new(Resize::from_config(resize))),
        "grayscale" => Some(Arc::new(Grayscale)),
        _ => None,
    }
}
