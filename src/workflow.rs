//! Top-level scan-and-relocate runs.

use std::path::Path;

use chrono::Local;

use crate::config::RelabelConfig;
use crate::dataset::DatasetLayout;
use crate::detect::{open_backend, DetectorBackend};
use crate::error::RelabelError;
use crate::relocate::{run_relocation, ItemReport, MoveLog, Relocator, RunSummary};
use crate::scan::{DecisionRule, Scan};

/// Load the configured detector and relabel the configured dataset.
pub fn process_mislabeled(config: &RelabelConfig) -> Result<RunSummary, RelabelError> {
    process_mislabeled_with_progress(config, |_| {})
}

/// Same as [`process_mislabeled`], reporting each item as it completes.
pub fn process_mislabeled_with_progress<F>(
    config: &RelabelConfig,
    on_item: F,
) -> Result<RunSummary, RelabelError>
where
    F: FnMut(&ItemReport),
{
    config.validate()?;
    let mut backend = open_backend(&config.detector)?;
    backend
        .warm_up()
        .map_err(|e| RelabelError::model_load(&config.detector.model_path, e))?;
    process_with_backend(
        backend.as_mut(),
        &config.dataset_root,
        DecisionRule::new(config.threshold, config.person_class_id),
        on_item,
    )
}

/// Run one relabel pass with an already constructed detector.
///
/// The dataset layout is validated before any log is created or any file is
/// touched. Only the non-person directory is scanned, so files moved by an
/// earlier run are never reconsidered.
pub fn process_with_backend<F>(
    backend: &mut dyn DetectorBackend,
    dataset_root: &Path,
    rule: DecisionRule,
    on_item: F,
) -> Result<RunSummary, RelabelError>
where
    F: FnMut(&ItemReport),
{
    let started = Local::now().naive_local();
    let layout = DatasetLayout::open(dataset_root)?;
    let log = MoveLog::create(&layout.logs_dir(), started)?;
    log::info!(
        "scanning {} with {} backend (threshold {:.2})",
        layout.non_person_dir().display(),
        backend.name(),
        rule.threshold
    );

    let relocator = Relocator::new(layout.person_dir());
    let scan = Scan::new(backend, &layout, rule)?;
    let summary = run_relocation(scan, &relocator, log, on_item)?;

    log::info!(
        "run complete: scanned={} moved={} detection_errors={} relocation_errors={}",
        summary.scanned,
        summary.moved_count,
        summary.detection_failures(),
        summary.relocation_failures()
    );
    Ok(summary)
}
