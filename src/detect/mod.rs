mod backend;
mod backends;
pub mod postprocess;
mod result;

pub use backend::DetectorBackend;
pub use backends::{open_backend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection};
