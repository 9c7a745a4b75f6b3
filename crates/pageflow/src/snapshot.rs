//! Visual snapshot testing.
//!
//! A screenshot is compared byte by byte against a stored baseline. The first
//! run of a snapshot writes its baseline; later runs fail when the share of
//! differing bytes exceeds the threshold, and leave the rejected capture
//! next to the baseline as `<name>.actual.<ext>`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::driver::Screenshot;
use crate::result::{PageflowError, PageflowResult};

/// Configuration for snapshot testing
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    /// Rewrite baselines instead of comparing
    pub update: bool,
    /// Tolerated share of differing bytes (0.0-1.0)
    pub threshold: f64,
    /// Directory holding the baselines
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            update: false,
            threshold: 0.0,
            dir: PathBuf::from("target/pageflow/snapshots"),
        }
    }
}

impl SnapshotConfig {
    /// Set update mode
    #[must_use]
    pub const fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Set threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set baseline directory
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Baseline path for `name` captured as `shot`
    #[must_use]
    pub fn baseline_path(&self, name: &str, shot: &Screenshot) -> PathBuf {
        self.dir.join(format!("{name}.{}", shot.extension()))
    }

    /// Compare `shot` with the baseline called `name`, writing the baseline
    /// when it is missing or when updating
    pub fn check(&self, name: &str, shot: &Screenshot) -> PageflowResult<SnapshotOutcome> {
        let path = self.baseline_path(name, shot);
        let exists = path.exists();
        if self.update || !exists {
            write(&path, &shot.data)?;
            let outcome = if exists {
                SnapshotOutcome::Updated
            } else {
                SnapshotOutcome::Created
            };
            info!(snapshot = name, path = %path.display(), ?outcome, "wrote baseline");
            return Ok(outcome);
        }

        let baseline = Snapshot::new(name, std::fs::read(&path)?);
        let diff = baseline.diff(&Snapshot::new(name, shot.data.clone()));
        debug!(snapshot = name, percent = diff.difference_percent, "compared");
        if diff.within_threshold(self.threshold) {
            return Ok(SnapshotOutcome::Matched);
        }

        let actual = self.dir.join(format!("{name}.actual.{}", shot.extension()));
        write(&actual, &shot.data)?;
        Err(PageflowError::SnapshotMismatch {
            name: name.to_string(),
            percent: diff.difference_percent,
            actual: actual.display().to_string(),
        })
    }
}

fn write(path: &Path, data: &[u8]) -> PageflowResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

/// What a snapshot check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// No baseline existed; this capture became it
    Created,
    /// Baseline rewritten in update mode
    Updated,
    /// Capture matched the baseline within the threshold
    Matched,
}

/// A visual snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Snapshot name/identifier
    pub name: String,
    /// Raw capture bytes
    pub data: Vec<u8>,
}

impl Snapshot {
    /// Create a new snapshot
    #[must_use]
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Compare this snapshot to another
    #[must_use]
    pub fn diff(&self, other: &Self) -> SnapshotDiff {
        let max_len = self.data.len().max(other.data.len());
        if max_len == 0 {
            return SnapshotDiff {
                identical: true,
                difference_count: 0,
                difference_percent: 0.0,
            };
        }

        let difference_count = (0..max_len)
            .filter(|&i| self.data.get(i) != other.data.get(i))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let difference_percent = (difference_count as f64 / max_len as f64) * 100.0;

        SnapshotDiff {
            identical: difference_count == 0,
            difference_count,
            difference_percent,
        }
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDiff {
    /// Whether snapshots are identical
    pub identical: bool,
    /// Number of differing bytes
    pub difference_count: usize,
    /// Percentage of difference
    pub difference_percent: f64,
}

impl SnapshotDiff {
    /// Check if snapshots are identical
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.identical
    }

    /// Check if difference is within threshold
    #[must_use]
    pub fn within_threshold(&self, threshold: f64) -> bool {
        self.difference_percent <= threshold * 100.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> SnapshotConfig {
        SnapshotConfig::default().with_dir(dir)
    }

    mod diff_tests {
        use super::*;

        #[test]
        fn test_identical() {
            let a = Snapshot::new("a", b"<ul>".to_vec());
            let diff = a.diff(&a.clone());
            assert!(diff.is_identical());
            assert_eq!(diff.difference_count, 0);
        }

        #[test]
        fn test_length_difference_counts() {
            let a = Snapshot::new("a", b"abcd".to_vec());
            let b = Snapshot::new("b", b"ab".to_vec());
            let diff = a.diff(&b);
            assert_eq!(diff.difference_count, 2);
            assert!((diff.difference_percent - 50.0).abs() < f64::EPSILON);
            assert!(diff.within_threshold(0.5));
            assert!(!diff.within_threshold(0.49));
        }

        #[test]
        fn test_empty_is_identical() {
            let diff = Snapshot::new("a", vec![]).diff(&Snapshot::new("b", vec![]));
            assert!(diff.is_identical());
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_first_check_creates_baseline() {
            let dir = tempfile::tempdir().unwrap();
            let shot = Screenshot::text("<ul>\n");
            let outcome = config(dir.path()).check("empty", &shot).unwrap();
            assert_eq!(outcome, SnapshotOutcome::Created);
            assert_eq!(std::fs::read_to_string(dir.path().join("empty.txt")).unwrap(), "<ul>\n");
        }

        #[test]
        fn test_same_capture_matches() {
            let dir = tempfile::tempdir().unwrap();
            let shot = Screenshot::text("<li>a</li>");
            config(dir.path()).check("list", &shot).unwrap();
            assert_eq!(config(dir.path()).check("list", &shot).unwrap(), SnapshotOutcome::Matched);
        }

        #[test]
        fn test_mismatch_fails_and_keeps_actual() {
            let dir = tempfile::tempdir().unwrap();
            config(dir.path()).check("list", &Screenshot::text("<li>a</li>")).unwrap();
            let err = config(dir.path())
                .check("list", &Screenshot::text("<li>b</li>"))
                .unwrap_err();
            assert_eq!(err.kind(), "snapshot_mismatch");
            let actual = dir.path().join("list.actual.txt");
            assert_eq!(std::fs::read_to_string(actual).unwrap(), "<li>b</li>");
            assert_eq!(std::fs::read_to_string(dir.path().join("list.txt")).unwrap(), "<li>a</li>");
        }

        #[test]
        fn test_threshold_tolerates_small_change() {
            let dir = tempfile::tempdir().unwrap();
            config(dir.path()).check("n", &Screenshot::text("0123456789")).unwrap();
            let loose = config(dir.path()).with_threshold(0.1);
            assert_eq!(loose.check("n", &Screenshot::text("0123456780")).unwrap(), SnapshotOutcome::Matched);
        }

        #[test]
        fn test_update_rewrites_baseline() {
            let dir = tempfile::tempdir().unwrap();
            config(dir.path()).check("list", &Screenshot::text("old")).unwrap();
            let outcome = config(dir.path())
                .with_update(true)
                .check("list", &Screenshot::text("new"))
                .unwrap();
            assert_eq!(outcome, SnapshotOutcome::Updated);
            assert_eq!(
                config(dir.path()).check("list", &Screenshot::text("new")).unwrap(),
                SnapshotOutcome::Matched
            );
        }

        #[test]
        fn test_png_extension() {
            let shot = Screenshot::png(vec![0x89, b'P', b'N', b'G']);
            let path = SnapshotConfig::default().baseline_path("home", &shot);
            assert!(path.ends_with("home.png"));
        }
    }
}
