//! Expanding user-supplied inputs into an ordered list of image files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;

/// Turns file and directory arguments into pipeline inputs.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    config: ProcessingConfig,
    skip_fragment: Option<String>,
}

impl FileDiscovery {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            skip_fragment: None,
        }
    }

    /// Leave out walked files whose path contains `fragment`.
    ///
    /// Used with `output.with` so a directory run does not pick up images
    /// written by an earlier run. Explicit file arguments are never skipped.
    pub fn skip_containing(mut self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        self.skip_fragment = (!fragment.is_empty()).then_some(fragment);
        self
    }

    /// Expand `inputs` into the pipeline's input list.
    ///
    /// Anything that is not a directory is passed through unchanged, missing
    /// files included: rejecting bad inputs is the source stage's job, and it
    /// must see them in the order given. Directories are walked recursively
    /// and contribute their supported files sorted by path.
    pub fn expand(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for input in inputs {
            if input.is_dir() {
                paths.extend(self.walk(input));
            } else {
                paths.push(input.clone());
            }
        }
        paths
    }

    fn walk(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && self.is_supported(p) && !self.is_skipped(p))
            .collect();

        // Sort by path for deterministic ordering
        files.sort();
        files
    }

    fn is_skipped(&self, path: &Path) -> bool {
        self.skip_fragment
            .as_deref()
            .is_some_and(|fragment| path.to_string_lossy().contains(fragment))
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        let discovery = FileDiscovery::new(ProcessingConfig::default());

        assert!(discovery.is_supported(Path::new("test.jpg")));
        assert!(discovery.is_supported(Path::new("test.JPG")));
        assert!(discovery.is_supported(Path::new("test.jpeg")));
        assert!(discovery.is_supported(Path::new("test.png")));
        assert!(!discovery.is_supported(Path::new("test.txt")));
        assert!(!discovery.is_supported(Path::new("noext")));
    }

    #[test]
    fn test_expand_keeps_files_in_given_order() {
        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let inputs = vec![PathBuf::from("z.jpg"), PathBuf::from("missing.jpg")];
        assert_eq!(discovery.expand(&inputs), inputs);
    }

    #[test]
    fn test_expand_walks_directories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["b.jpg", "a.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.jpeg"), b"x").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let expanded = discovery.expand(&[dir.path().to_path_buf()]);

        assert_eq!(
            expanded,
            vec![
                dir.path().join("a.png"),
                dir.path().join("b.jpg"),
                nested.join("c.jpeg"),
            ]
        );
    }

    #[test]
    fn test_expand_skips_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(images.join("output")).unwrap();
        std::fs::write(images.join("a.jpg"), b"x").unwrap();
        std::fs::write(images.join("output").join("a.jpg"), b"x").unwrap();

        let discovery =
            FileDiscovery::new(ProcessingConfig::default()).skip_containing("images/output/");
        assert_eq!(discovery.expand(&[images.clone()]), vec![images.join("a.jpg")]);

        // Explicit files pass through even when they match.
        let explicit = images.join("output").join("a.jpg");
        assert_eq!(discovery.expand(&[explicit.clone()]), vec![explicit]);
    }
}
