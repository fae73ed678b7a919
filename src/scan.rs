//! Scan engine: walks the non-person class directory and asks the detector
//! about each candidate image.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use crate::dataset::{is_candidate_image, DatasetLayout};
use crate::detect::{Detection, DetectorBackend};
use crate::error::{DetectionError, RelabelError};

/// Decision rule: a detection qualifies when its class is the person class
/// and its confidence is strictly greater than the threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionRule {
    pub threshold: f32,
    pub person_class_id: u32,
}

impl DecisionRule {
    pub fn new(threshold: f32, person_class_id: u32) -> Self {
        Self {
            threshold,
            person_class_id,
        }
    }

    pub fn qualifies(&self, detection: &Detection) -> bool {
        detection.class_id == self.person_class_id && detection.confidence > self.threshold
    }

    /// First qualifying detection, in the order the detector returned them.
    pub fn first_match<'d>(&self, detections: &'d [Detection]) -> Option<&'d Detection> {
        detections.iter().find(|d| self.qualifies(d))
    }
}

/// A candidate image that should be relabeled as "person".
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub path: PathBuf,
    /// Exact on-disk name; the move target keeps it byte for byte.
    pub file_name: OsString,
    /// Lossy rendering of `file_name` for logs and progress lines.
    pub filename: String,
    pub confidence: f32,
}

/// Result of scanning one candidate image.
#[derive(Debug)]
pub enum ScanOutcome {
    Matched(Match),
    Clean {
        path: PathBuf,
        filename: String,
    },
    Failed {
        path: PathBuf,
        filename: String,
        error: DetectionError,
    },
}

impl ScanOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Matched(m) => &m.filename,
            Self::Clean { filename, .. } | Self::Failed { filename, .. } => filename,
        }
    }

    pub fn as_match(&self) -> Option<&Match> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }
}

/// Lazy, single-pass scan over the non-person directory.
///
/// Each `next()` lists one more directory entry and, if it is a candidate
/// image, runs detection on it. Restarting means constructing a new `Scan`,
/// which re-lists the directory from scratch. The person directory is never
/// visited.
pub struct Scan<'a> {
    backend: &'a mut dyn DetectorBackend,
    entries: fs::ReadDir,
    rule: DecisionRule,
}

impl<'a> Scan<'a> {
    pub fn new(
        backend: &'a mut dyn DetectorBackend,
        layout: &DatasetLayout,
        rule: DecisionRule,
    ) -> Result<Self, RelabelError> {
        let dir = layout.non_person_dir();
        let entries =
            fs::read_dir(dir).map_err(|_| RelabelError::DatasetLayout(dir.to_path_buf()))?;
        Ok(Self {
            backend,
            entries,
            rule,
        })
    }

    fn evaluate(&mut self, path: PathBuf, file_name: OsString) -> ScanOutcome {
        let filename = file_name.to_string_lossy().into_owned();
        log::debug!("scanning {}", filename);
        match self.backend.detect(&path) {
            Ok(detections) => match self.rule.first_match(&detections) {
                Some(hit) => ScanOutcome::Matched(Match {
                    path,
                    file_name,
                    filename,
                    confidence: hit.confidence,
                }),
                None => ScanOutcome::Clean { path, filename },
            },
            Err(error) => ScanOutcome::Failed {
                path,
                filename,
                error,
            },
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = ScanOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let file_name = entry.file_name();
            if !is_candidate_image(&file_name.to_string_lossy()) || !is_regular_file(&entry) {
                continue;
            }
            return Some(self.evaluate(entry.path(), file_name));
        }
    }
}

fn is_regular_file(entry: &fs::DirEntry) -> bool {
    match entry.file_type() {
        Ok(ft) if ft.is_symlink() => entry.path().is_file(),
        Ok(ft) => ft.is_file(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> DecisionRule {
        DecisionRule::new(0.4, 0)
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!rule().qualifies(&Detection::new(0, 0.4)));
        assert!(rule().qualifies(&Detection::new(0, 0.41)));
    }

    #[test]
    fn other_classes_never_qualify() {
        assert!(!rule().qualifies(&Detection::new(2, 0.99)));
    }

    #[test]
    fn first_match_short_circuits_in_detector_order() {
        let detections = vec![
            Detection::new(16, 0.95),
            Detection::new(0, 0.35),
            Detection::new(0, 0.45),
            Detection::new(0, 0.90),
        ];
        let hit = rule().first_match(&detections).unwrap();
        assert_eq!(hit.confidence, 0.45);
    }

    #[test]
    fn raising_threshold_never_adds_matches() {
        let detections = vec![Detection::new(0, 0.5), Detection::new(0, 0.7)];
        let mut previous = true;
        for step in 0..=10 {
            let t = step as f32 / 10.0;
            let now = DecisionRule::new(t, 0).first_match(&detections).is_some();
            assert!(previous || !now, "match reappeared at threshold {t}");
            previous = now;
        }
    }
}
