//! Relocation and move-log bookkeeping.
//!
//! Every matched file is renamed from the non-person directory into the
//! person directory, and each event is appended to a per-run log file as it
//! happens. A move and its log line form the unit of progress: if the process
//! dies mid-run, everything already moved is recorded in the log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{RelabelError, RelocationError};
use crate::scan::{Match, ScanOutcome};

pub const LOG_HEADER: &str = "Moved Files (Person Detected in Non-Person Directory):";
const LOG_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_LOG_NAME_ATTEMPTS: u32 = 100;

/// `moved_files_<YYYYMMDD_HHMMSS>.txt`
pub fn log_file_name(started: NaiveDateTime) -> String {
    format!("moved_files_{}.txt", started.format(LOG_TIMESTAMP_FORMAT))
}

/// Append-only move log for one run.
pub struct MoveLog {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl MoveLog {
    /// Create `logs_dir` if needed and open a fresh log named after `started`.
    ///
    /// An existing log with the same name is never truncated; a numeric
    /// suffix is added instead.
    pub fn create(logs_dir: &Path, started: NaiveDateTime) -> Result<Self, RelabelError> {
        fs::create_dir_all(logs_dir).map_err(|source| RelabelError::LogFile {
            path: logs_dir.to_path_buf(),
            source,
        })?;

        let base = log_file_name(started);
        let stem = base.trim_end_matches(".txt");
        let mut path = logs_dir.join(&base);
        let mut attempt = 0;
        let file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    if attempt >= MAX_LOG_NAME_ATTEMPTS {
                        return Err(RelabelError::LogFile { path, source: e });
                    }
                    path = logs_dir.join(format!("{}_{}.txt", stem, attempt));
                }
                Err(source) => return Err(RelabelError::LogFile { path, source }),
            }
        };

        let mut log = Self {
            path,
            writer: LineWriter::new(file),
        };
        log.write_line(LOG_HEADER)?;
        log.write_line("")?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_moved(&mut self, filename: &str, confidence: f32) -> Result<(), RelabelError> {
        self.write_line(&format!(
            "Moved {} (confidence: {:.2})",
            filename, confidence
        ))
    }

    pub fn record_error(&mut self, filename: &str, message: &str) -> Result<(), RelabelError> {
        self.write_line(&format!("Error processing {}: {}", filename, message))
    }

    fn write_line(&mut self, line: &str) -> Result<(), RelabelError> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|source| RelabelError::LogFile {
                path: self.path.clone(),
                source,
            })
    }
}

/// Moves matched files into the person directory.
#[derive(Clone, Debug)]
pub struct Relocator {
    person_dir: PathBuf,
}

impl Relocator {
    pub fn new<P: Into<PathBuf>>(person_dir: P) -> Self {
        Self {
            person_dir: person_dir.into(),
        }
    }

    /// Rename the matched file into the person directory, keeping its name.
    /// Never overwrites an existing file.
    pub fn relocate(&self, matched: &Match) -> Result<PathBuf, RelocationError> {
        let target = self.person_dir.join(&matched.file_name);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(RelocationError::TargetExists(target));
        }
        if fs::symlink_metadata(&matched.path).is_err() {
            return Err(RelocationError::SourceMissing(matched.path.clone()));
        }
        fs::rename(&matched.path, &target).map_err(|source| RelocationError::Io {
            from: matched.path.clone(),
            to: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome {
    Moved { confidence: f32 },
    Clean,
    DetectionFailed(String),
    RelocationFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ItemReport {
    pub filename: String,
    pub outcome: ItemOutcome,
}

/// What a run did.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub moved_count: usize,
    pub log_path: PathBuf,
    /// Candidate images handed to the detector.
    pub scanned: usize,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn detection_failures(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::DetectionFailed(_)))
    }

    pub fn relocation_failures(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::RelocationFailed(_)))
    }

    pub fn moved(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Moved { .. }))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

/// Drain scan outcomes in arrival order, moving matches and logging every
/// match and failure. Per-file failures are recorded and skipped; only a log
/// write failure ends the run early.
///
/// `on_item` sees each item report as soon as it is final.
pub fn run_relocation<I, F>(
    outcomes: I,
    relocator: &Relocator,
    mut log: MoveLog,
    mut on_item: F,
) -> Result<RunSummary, RelabelError>
where
    I: IntoIterator<Item = ScanOutcome>,
    F: FnMut(&ItemReport),
{
    let mut moved_count = 0usize;
    let mut scanned = 0usize;
    let mut items = Vec::new();

    for outcome in outcomes {
        scanned += 1;
        let report = match outcome {
            ScanOutcome::Matched(matched) => match relocator.relocate(&matched) {
                Ok(target) => {
                    log.record_moved(&matched.filename, matched.confidence)?;
                    moved_count += 1;
                    log::info!(
                        "moved {} -> {} (confidence: {:.2})",
                        matched.filename,
                        target.display(),
                        matched.confidence
                    );
                    ItemReport {
                        filename: matched.filename,
                        outcome: ItemOutcome::Moved {
                            confidence: matched.confidence,
                        },
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    log::warn!("could not move {}: {}", matched.filename, message);
                    log.record_error(&matched.filename, &message)?;
                    ItemReport {
                        filename: matched.filename,
                        outcome: ItemOutcome::RelocationFailed(message),
                    }
                }
            },
            ScanOutcome::Failed {
                filename, error, ..
            } => {
                let message = error.to_string();
                log::warn!("error processing {}: {}", filename, message);
                log.record_error(&filename, &message)?;
                ItemReport {
                    filename,
                    outcome: ItemOutcome::DetectionFailed(message),
                }
            }
            ScanOutcome::Clean { filename, .. } => ItemReport {
                filename,
                outcome: ItemOutcome::Clean,
            },
        };
        on_item(&report);
        items.push(report);
    }

    Ok(RunSummary {
        moved_count,
        log_path: log.path().to_path_buf(),
        scanned,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap()
    }

    #[test]
    fn log_name_uses_compact_timestamp() {
        assert_eq!(log_file_name(started()), "moved_files_20250307_090501.txt");
    }

    #[test]
    fn log_lines_follow_fixed_format() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let mut log = MoveLog::create(&logs, started()).unwrap();
        log.record_moved("a.jpg", 0.456).unwrap();
        log.record_error("b.png", "inference failed: boom").unwrap();
        let path = log.path().to_path_buf();
        drop(log);

        let text = fs::read_to_string(path).unwrap();
        assert_eq!(
            text,
            "Moved Files (Person Detected in Non-Person Directory):\n\n\
             Moved a.jpg (confidence: 0.46)\n\
             Error processing b.png: inference failed: boom\n"
        );
    }

    #[test]
    fn same_second_runs_do_not_clobber_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let first = MoveLog::create(dir.path(), started()).unwrap();
        let second = MoveLog::create(dir.path(), started()).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(second
            .path()
            .ends_with("moved_files_20250307_090501_1.txt"));
    }

    #[test]
    fn relocate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("0");
        let dst_dir = dir.path().join("1");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&dst_dir).unwrap();
        fs::write(src_dir.join("a.jpg"), b"new").unwrap();
        fs::write(dst_dir.join("a.jpg"), b"old").unwrap();

        let relocator = Relocator::new(&dst_dir);
        let err = relocator
            .relocate(&Match {
                path: src_dir.join("a.jpg"),
                file_name: "a.jpg".into(),
                filename: "a.jpg".to_string(),
                confidence: 0.9,
            })
            .unwrap_err();
        assert!(matches!(err, RelocationError::TargetExists(_)));
        assert_eq!(fs::read(dst_dir.join("a.jpg")).unwrap(), b"old");
        assert!(src_dir.join("a.jpg").exists());
    }
}
