use std::path::Path;

use crate::detect::result::Detection;
use crate::error::DetectionError;

/// Detector backend trait.
///
/// A backend wraps a pretrained object detector. It is constructed once per
/// run (construction failures are fatal `ModelLoad` errors) and then asked to
/// detect objects in one image at a time.
///
/// Implementations must not modify or move the image file.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on the image at `image_path`.
    ///
    /// Returned detections carry no implied ranking; callers evaluate them in
    /// the order given.
    fn detect(&mut self, image_path: &Path) -> Result<Vec<Detection>, DetectionError>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
}
