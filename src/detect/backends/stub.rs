use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::error::{DetectionError, RelabelError};

/// Stub backend for tests and dry runs.
///
/// Answers are keyed by file name. Files without an entry produce no
/// detections. Files that do not exist on disk fail as unreadable, like a
/// real decoder would.
#[derive(Debug, Default)]
pub struct StubBackend {
    outcomes: HashMap<String, StubOutcome>,
    calls: usize,
}

#[derive(Debug, Clone)]
enum StubOutcome {
    Detections(Vec<Detection>),
    Failure(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    Detections(Vec<ManifestDetection>),
    Failure { error: String },
}

#[derive(Debug, Deserialize)]
struct ManifestDetection {
    class_id: u32,
    confidence: f32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load canned answers from a JSON manifest:
    ///
    /// ```json
    /// { "a.jpg": [{ "class_id": 0, "confidence": 0.52 }], "b.png": { "error": "truncated" } }
    /// ```
    pub fn from_manifest<P: AsRef<Path>>(path: P) -> Result<Self, RelabelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RelabelError::model_load(path, e))?;
        let entries: HashMap<String, ManifestEntry> =
            serde_json::from_str(&raw).map_err(|e| RelabelError::model_load(path, e))?;

        let outcomes = entries
            .into_iter()
            .map(|(name, entry)| {
                let outcome = match entry {
                    ManifestEntry::Detections(list) => StubOutcome::Detections(
                        list.into_iter()
                            .map(|d| Detection::new(d.class_id, d.confidence))
                            .collect(),
                    ),
                    ManifestEntry::Failure { error } => StubOutcome::Failure(error),
                };
                (name, outcome)
            })
            .collect();
        Ok(Self { outcomes, calls: 0 })
    }

    pub fn with_detections(mut self, file_name: &str, detections: Vec<Detection>) -> Self {
        self.outcomes
            .insert(file_name.to_string(), StubOutcome::Detections(detections));
        self
    }

    pub fn with_failure(mut self, file_name: &str, message: &str) -> Self {
        self.outcomes
            .insert(file_name.to_string(), StubOutcome::Failure(message.to_string()));
        self
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        self.calls += 1;
        if !image_path.is_file() {
            return Err(DetectionError::Unreadable {
                path: image_path.to_path_buf(),
                message: "no such file".to_string(),
            });
        }
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.outcomes.get(&name) {
            Some(StubOutcome::Detections(list)) => Ok(list.clone()),
            Some(StubOutcome::Failure(message)) => {
                Err(DetectionError::Inference(message.clone()))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn manifest_entries_become_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("canned.json");
        let mut file = std::fs::File::create(&manifest).unwrap();
        write!(
            file,
            r#"{{"a.jpg": [{{"class_id": 0, "confidence": 0.52}}], "b.jpg": {{"error": "truncated"}}}}"#
        )
        .unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("c.jpg"), b"x").unwrap();

        let mut backend = StubBackend::from_manifest(&manifest).unwrap();
        let a = backend.detect(&dir.path().join("a.jpg")).unwrap();
        assert_eq!(a, vec![Detection::new(0, 0.52)]);
        let b = backend.detect(&dir.path().join("b.jpg")).unwrap_err();
        assert!(b.to_string().contains("truncated"));
        assert!(backend.detect(&dir.path().join("c.jpg")).unwrap().is_empty());
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn missing_manifest_is_a_model_load_error() {
        let err = StubBackend::from_manifest("/nonexistent/canned.json").unwrap_err();
        assert!(matches!(err, RelabelError::ModelLoad { .. }));
    }

    #[test]
    fn missing_image_is_unreadable() {
        let mut backend = StubBackend::new();
        let err = backend.detect(Path::new("/nonexistent/x.jpg")).unwrap_err();
        assert!(matches!(err, DetectionError::Unreadable { .. }));
    }
}
