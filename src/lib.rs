//! Person-presence dataset label correction.
//!
//! A two-class image dataset keeps "no person" images under `0/` and
//! "person" images under `1/`. This crate finds images filed under `0/` that
//! a general-purpose object detector says contain a person, and moves them
//! to `1/`, logging every move.
//!
//! # Module Structure
//!
//! - `detect`: detector backends (`DetectorBackend`, stub and tract/ONNX)
//! - `dataset`: class directory layout and candidate filtering
//! - `scan`: lazy scan of the non-person directory and the match rule
//! - `relocate`: file moves, move log, run summary
//! - `workflow`: entry points tying the above together
//! - `review`: capped, read-only candidate listing and contact sheets
//! - `config`: layered configuration (defaults, TOML file, environment)

pub mod config;
pub mod dataset;
pub mod detect;
pub mod error;
pub mod relocate;
pub mod review;
pub mod scan;
pub mod workflow;

/// COCO class index for "person" in stock YOLO weights.
pub const PERSON_CLASS_ID: u32 = 0;

/// Default confidence threshold. A detection must score strictly above it.
pub const DEFAULT_THRESHOLD: f32 = 0.4;

pub use config::{BackendKind, DetectorSettings, RelabelConfig, ReviewSettings};
pub use dataset::DatasetLayout;
pub use detect::{open_backend, BoundingBox, Detection, DetectorBackend, StubBackend};
pub use error::{DetectionError, RelabelError, RelocationError};
pub use relocate::{ItemOutcome, ItemReport, MoveLog, Relocator, RunSummary, LOG_HEADER};
pub use review::{collect_review_candidates, review_mislabeled, ReviewItem};
pub use scan::{DecisionRule, Match, Scan, ScanOutcome};
pub use workflow::{process_mislabeled, process_mislabeled_with_progress, process_with_backend};
