mod registry;
mod selectors;

pub use registry::{ModeRegistry, RequestShape, TransformMode, DEFAULT_API_BASE, DEFAULT_MODE_ID};
pub use selectors::{ModeSelection, ModeSelector};
