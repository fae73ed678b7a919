use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum RelabelError {
    #[error("failed to load detection model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("dataset directory not found: {0}")]
    DatasetLayout(PathBuf),

    #[error("failed to open move log {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelabelError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Per-file detection failure. The file is skipped and the run continues.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("unreadable image {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Per-file move failure. The file stays where it was and is not counted.
#[derive(Error, Debug)]
pub enum RelocationError {
    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("source file missing: {0}")]
    SourceMissing(PathBuf),

    #[error("move {from} -> {to} failed: {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
