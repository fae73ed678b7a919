//! Two-class image dataset layout.
//!
//! A dataset root holds exactly two class directories, `0` (no person) and
//! `1` (person), plus a `logs` directory created on demand for move logs.

use std::path::{Path, PathBuf};

use crate::error::RelabelError;

pub const NON_PERSON_DIR: &str = "0";
pub const PERSON_DIR: &str = "1";
pub const LOGS_DIR: &str = "logs";

/// Extensions accepted as candidate images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Clone, Debug)]
pub struct DatasetLayout {
    root: PathBuf,
    non_person_dir: PathBuf,
    person_dir: PathBuf,
}

impl DatasetLayout {
    /// Validate that both class directories exist under `root`.
    ///
    /// Nothing under `root` is touched when validation fails.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, RelabelError> {
        let root = root.as_ref().to_path_buf();
        let non_person_dir = root.join(NON_PERSON_DIR);
        let person_dir = root.join(PERSON_DIR);
        for dir in [&non_person_dir, &person_dir] {
            if !dir.is_dir() {
                return Err(RelabelError::DatasetLayout(dir.clone()));
            }
        }
        Ok(Self {
            root,
            non_person_dir,
            person_dir,
        })
    }

    /// Validate only the non-person directory, for read-only passes that
    /// never write into the person directory.
    pub fn open_non_person<P: AsRef<Path>>(root: P) -> Result<Self, RelabelError> {
        let root = root.as_ref().to_path_buf();
        let non_person_dir = root.join(NON_PERSON_DIR);
        if !non_person_dir.is_dir() {
            return Err(RelabelError::DatasetLayout(non_person_dir));
        }
        Ok(Self {
            person_dir: root.join(PERSON_DIR),
            root,
            non_person_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn non_person_dir(&self) -> &Path {
        &self.non_person_dir
    }

    pub fn person_dir(&self) -> &Path {
        &self.person_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }
}

/// True when the file name carries one of the accepted image extensions.
pub fn is_candidate_image(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}
