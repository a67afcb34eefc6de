//! Async pipeline that turns an image and a mode into a provider result URL:
//! upload slot, binary upload, job submission, then bounded status polling.

pub mod account;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod orchestrator;
pub mod poller;
pub mod submitter;
pub mod transport;
pub mod uploader;

#[cfg(test)]
mod testing;

pub use cancel::{cancel_after, cancellable};
pub use clock::{Sleeper, TokioSleeper};
pub use config::{ApiKey, EngineConfig};
pub use orchestrator::{GenerateInput, Orchestrator};
pub use submitter::Job;
pub use transport::{HttpReply, HttpTransport, ReqwestTransport, TransportFailure};
pub use uploader::Asset;
