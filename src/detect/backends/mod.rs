pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use crate::config::{BackendKind, DetectorSettings};
use crate::detect::backend::DetectorBackend;
use crate::error::RelabelError;

/// Construct the configured backend. Any failure here is fatal to the run.
pub fn open_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>, RelabelError> {
    match settings.backend {
        BackendKind::Stub => Ok(Box::new(StubBackend::from_manifest(&settings.model_path)?)),
        #[cfg(feature = "backend-tract")]
        BackendKind::Tract => Ok(Box::new(TractBackend::new(settings)?)),
        #[cfg(not(feature = "backend-tract"))]
        BackendKind::Tract => Err(RelabelError::model_load(
            &settings.model_path,
            "tract backend requires the backend-tract feature",
        )),
    }
}
