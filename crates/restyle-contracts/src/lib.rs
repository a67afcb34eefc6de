pub mod errors;
pub mod modes;
pub mod outcome;
pub mod payloads;
pub mod polling;
pub mod requests;

pub use errors::{FailureCategory, FailureKind, OrchestrationError, Stage};
pub use modes::{ModeRegistry, ModeSelection, ModeSelector, RequestShape, TransformMode};
pub use outcome::{Generated, OrchestrationResult};
pub use polling::{PollAttempt, PollMachine, PollPolicy, PollState, StatusObservation};
pub use requests::{build_generation_request, GenerationRequest};
