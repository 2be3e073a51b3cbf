//! Core data types for the grayline pipeline.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One image traveling through the pipeline.
///
/// Only the source stage creates a `WorkItem`, so the payload is always a
/// decoded image. Items are moved from stage to stage; no two stages hold
/// the same item at once.
#[derive(Debug)]
pub struct WorkItem {
    pub(crate) source: PathBuf,
    pub(crate) destination: PathBuf,
    /// Current image data, replaced by every stage
    pub payload: DynamicImage,
}

impl WorkItem {
    pub(crate) fn new(source: PathBuf, destination: PathBuf, payload: DynamicImage) -> Self {
        Self {
            source,
            destination,
            payload,
        }
    }

    /// Path the item was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path the sink writes the item to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Result of one input as observed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position in the input list
    pub index: usize,

    /// Input path
    pub source: PathBuf,

    /// Whether the sink wrote the image
    pub success: bool,
}

/// Processing statistics for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessingStats {
    /// Images written successfully
    pub succeeded: usize,

    /// Images the sink failed to write
    pub failed: usize,

    /// Inputs never reached because the run aborted
    pub not_reached: usize,

    /// Processing rate in images per second
    pub images_per_second: f64,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

/// Serializable end-of-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub stats: ProcessingStats,

    /// Stage that aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,

    /// Input that caused the abort
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_input: Option<PathBuf>,

    /// Error message of the abort
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tagged union for machine-readable run output.
/// Internally tagged: `{"type":"item",...}` or `{"type":"summary",...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputRecord {
    Item(ItemOutcome),
    Summary(RunSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_accessors() {
        let item = WorkItem::new(
            PathBuf::from("images/a.jpg"),
            PathBuf::from("images/output/a.jpg"),
            DynamicImage::new_rgb8(4, 4),
        );
        assert_eq!(item.source(), Path::new("images/a.jpg"));
        assert_eq!(item.destination(), Path::new("images/output/a.jpg"));
        assert_eq!(item.payload.width(), 4);
    }

    #[test]
    fn test_summary_skips_absent_fault() {
        let summary = RunSummary {
            stats: ProcessingStats {
                succeeded: 2,
                ..Default::default()
            },
            failed_stage: None,
            failed_input: None,
            error: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"succeeded\":2"));
        assert!(!json.contains("error"));
        assert!(!json.contains("failed_stage"));
    }

    #[test]
    fn test_item_outcome_roundtrip() {
        let outcome = ItemOutcome {
            index: 1,
            source: PathBuf::from("images/b.jpg"),
            success: true,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: ItemOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
