use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RelabelError;
use crate::{DEFAULT_THRESHOLD, PERSON_CLASS_ID};

const DEFAULT_DATASET_ROOT: &str = "./wake_vision/train_quality";
const DEFAULT_MODEL_PATH: &str = "yolo11x.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_MIN_SCORE: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_REVIEW_MAX_IMAGES: usize = 20;
const DEFAULT_REVIEW_COLUMNS: u32 = 5;
const DEFAULT_REVIEW_THUMB_SIZE: u32 = 160;
const DEFAULT_REVIEW_OUTPUT: &str = "review_sheet.png";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RelabelConfigFile {
    dataset_root: Option<PathBuf>,
    threshold: Option<f32>,
    person_class_id: Option<u32>,
    detector: Option<DetectorConfigFile>,
    review: Option<ReviewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    min_score: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ReviewConfigFile {
    max_images: Option<usize>,
    columns: Option<u32>,
    thumb_size: Option<u32>,
    output: Option<PathBuf>,
}

/// Which detector implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ONNX YOLO export run through tract.
    Tract,
    /// JSON manifest of canned detections.
    Stub,
}

impl FromStr for BackendKind {
    type Err = RelabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "stub" => Ok(Self::Stub),
            other => Err(RelabelError::Config(format!(
                "unknown detector backend '{}' (expected tract|stub)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tract => f.write_str("tract"),
            Self::Stub => f.write_str("stub"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelabelConfig {
    /// Directory holding the `0` and `1` class directories.
    pub dataset_root: PathBuf,
    /// A person detection must score strictly above this to trigger a move.
    pub threshold: f32,
    pub person_class_id: u32,
    pub detector: DetectorSettings,
    pub review: ReviewSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    /// ONNX weights for `tract`, JSON manifest for `stub`.
    pub model_path: PathBuf,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Candidates below this score are dropped before NMS.
    pub min_score: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub max_images: usize,
    pub columns: u32,
    pub thumb_size: u32,
    pub output: PathBuf,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Tract,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            min_score: DEFAULT_MIN_SCORE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_REVIEW_MAX_IMAGES,
            columns: DEFAULT_REVIEW_COLUMNS,
            thumb_size: DEFAULT_REVIEW_THUMB_SIZE,
            output: PathBuf::from(DEFAULT_REVIEW_OUTPUT),
        }
    }
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from(DEFAULT_DATASET_ROOT),
            threshold: DEFAULT_THRESHOLD,
            person_class_id: PERSON_CLASS_ID,
            detector: DetectorSettings::default(),
            review: ReviewSettings::default(),
        }
    }
}

impl RelabelConfig {
    /// Load defaults, then the TOML file named by `RELABEL_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self, RelabelError> {
        let file_cfg = match std::env::var("RELABEL_CONFIG").ok().as_deref() {
            Some(path) if !path.trim().is_empty() => read_config_file(Path::new(path))?,
            _ => RelabelConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document on top of the defaults. Environment is ignored.
    pub fn from_toml_str(raw: &str) -> Result<Self, RelabelError> {
        let file_cfg: RelabelConfigFile =
            toml::from_str(raw).map_err(|e| RelabelError::Config(e.to_string()))?;
        let mut cfg = Self::from_file(file_cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelabelConfigFile) -> Self {
        let defaults = Self::default();
        let detector_file = file.detector.unwrap_or_default();
        let review_file = file.review.unwrap_or_default();
        Self {
            dataset_root: file.dataset_root.unwrap_or(defaults.dataset_root),
            threshold: file.threshold.unwrap_or(defaults.threshold),
            person_class_id: file.person_class_id.unwrap_or(defaults.person_class_id),
            detector: DetectorSettings {
                backend: detector_file.backend.unwrap_or(defaults.detector.backend),
                model_path: detector_file
                    .model_path
                    .unwrap_or(defaults.detector.model_path),
                input_size: detector_file
                    .input_size
                    .unwrap_or(defaults.detector.input_size),
                min_score: detector_file
                    .min_score
                    .unwrap_or(defaults.detector.min_score),
                iou_threshold: detector_file
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
            },
            review: ReviewSettings {
                max_images: review_file
                    .max_images
                    .unwrap_or(defaults.review.max_images),
                columns: review_file.columns.unwrap_or(defaults.review.columns),
                thumb_size: review_file
                    .thumb_size
                    .unwrap_or(defaults.review.thumb_size),
                output: review_file.output.unwrap_or(defaults.review.output),
            },
        }
    }

    fn apply_env(&mut self) -> Result<(), RelabelError> {
        if let Some(root) = non_empty_env("RELABEL_DATASET_ROOT") {
            self.dataset_root = PathBuf::from(root);
        }
        if let Some(threshold) = non_empty_env("RELABEL_THRESHOLD") {
            self.threshold = threshold.trim().parse().map_err(|_| {
                RelabelError::Config("RELABEL_THRESHOLD must be a number".to_string())
            })?;
        }
        if let Some(model) = non_empty_env("RELABEL_MODEL_PATH") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(backend) = non_empty_env("RELABEL_BACKEND") {
            self.detector.backend = backend.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RelabelError> {
        check_unit_range("threshold", self.threshold)?;
        check_unit_range("detector.min_score", self.detector.min_score)?;
        check_unit_range("detector.iou_threshold", self.detector.iou_threshold)?;
        if self.detector.input_size == 0 || self.detector.input_size % 32 != 0 {
            return Err(RelabelError::Config(format!(
                "detector.input_size must be a positive multiple of 32, got {}",
                self.detector.input_size
            )));
        }
        if self.review.max_images == 0 {
            return Err(RelabelError::Config(
                "review.max_images must be greater than zero".to_string(),
            ));
        }
        if self.review.columns == 0 || self.review.thumb_size == 0 {
            return Err(RelabelError::Config(
                "review.columns and review.thumb_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RelabelConfigFile, RelabelError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RelabelError::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&raw).map_err(|e| {
        RelabelError::Config(format!("invalid config file {}: {}", path.display(), e))
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn check_unit_range(name: &str, value: f32) -> Result<(), RelabelError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RelabelError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
