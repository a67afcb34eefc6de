use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// The caller-facing taxonomy of orchestration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    UnknownMode,
    UploadSlotError,
    UploadTransferError,
    InvalidUploadResponse,
    MissingStyleImage,
    ProviderRejected,
    TransportError,
    Failed,
    TimedOut,
    Cancelled,
}

/// What a UI should tell the user to do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    FixInput,
    RetryLater,
    Untransformable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownMode => "UnknownMode",
            Self::UploadSlotError => "UploadSlotError",
            Self::UploadTransferError => "UploadTransferError",
            Self::InvalidUploadResponse => "InvalidUploadResponse",
            Self::MissingStyleImage => "MissingStyleImage",
            Self::ProviderRejected => "ProviderRejected",
            Self::TransportError => "TransportError",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn category(self) -> FailureCategory {
        match self {
            Self::UnknownMode | Self::MissingStyleImage => FailureCategory::FixInput,
            Self::TransportError
            | Self::TimedOut
            | Self::UploadSlotError
            | Self::UploadTransferError
            | Self::Cancelled => FailureCategory::RetryLater,
            Self::Failed | Self::ProviderRejected | Self::InvalidUploadResponse => {
                FailureCategory::Untransformable
            }
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::UnknownMode => "The selected transformation is not available.",
            Self::MissingStyleImage => "This transformation needs a style or reference image.",
            Self::UploadSlotError => "The image service could not accept an upload right now.",
            Self::UploadTransferError => "Uploading the image failed. Please try again.",
            Self::InvalidUploadResponse => "The image service returned an unusable upload slot.",
            Self::ProviderRejected => "The image service rejected this request.",
            Self::TransportError => "The image service could not be reached. Try again later.",
            Self::Failed => "This image could not be transformed.",
            Self::TimedOut => "The transformation is taking too long. Try again later.",
            Self::Cancelled => "The transformation was cancelled.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage a transport failure or cancellation interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    UploadSlot,
    UploadTransfer,
    Submit,
    Poll,
    Account,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UploadSlot => "upload_slot",
            Self::UploadTransfer => "upload_transfer",
            Self::Submit => "submit",
            Self::Poll => "poll",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("unknown transformation mode '{mode}'")]
    UnknownMode { mode: String },
    #[error("upload slot request failed ({status})")]
    UploadSlot { status: u16, detail: Value },
    #[error("asset upload failed ({status})")]
    UploadTransfer { status: u16, detail: Value },
    #[error("upload slot response is missing required URLs")]
    InvalidUploadResponse { detail: Value },
    #[error("mode '{mode}' requires a style image")]
    MissingStyleImage { mode: String },
    #[error("provider rejected the request")]
    ProviderRejected { status: Option<u16>, detail: Value },
    #[error("transport failure during {stage}: {message}")]
    Transport { stage: Stage, message: String },
    #[error("job {job_id} failed at the provider")]
    Failed { job_id: String, detail: Value },
    #[error("job {job_id} reached no terminal state after {attempts} status checks")]
    TimedOut { job_id: String, attempts: u32 },
    #[error("cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl OrchestrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownMode { .. } => FailureKind::UnknownMode,
            Self::UploadSlot { .. } => FailureKind::UploadSlotError,
            Self::UploadTransfer { .. } => FailureKind::UploadTransferError,
            Self::InvalidUploadResponse { .. } => FailureKind::InvalidUploadResponse,
            Self::MissingStyleImage { .. } => FailureKind::MissingStyleImage,
            Self::ProviderRejected { .. } => FailureKind::ProviderRejected,
            Self::Transport { .. } => FailureKind::TransportError,
            Self::Failed { .. } => FailureKind::Failed,
            Self::TimedOut { .. } => FailureKind::TimedOut,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// HTTP status a caller-facing surface should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnknownMode { .. } | Self::MissingStyleImage { .. } => 400,
            Self::UploadSlot { status, .. } | Self::UploadTransfer { status, .. } => {
                error_status_or(*status, 502)
            }
            Self::ProviderRejected { status, .. } => status
                .map(|code| error_status_or(code, 502))
                .unwrap_or(502),
            Self::InvalidUploadResponse { .. } | Self::Failed { .. } => 500,
            Self::Transport { .. } => 503,
            Self::TimedOut { .. } => 408,
            Self::Cancelled { .. } => 499,
        }
    }

    /// Diagnostic payload surfaced next to the kind, provider text included.
    pub fn detail(&self) -> Value {
        match self {
            Self::UploadSlot { detail, .. }
            | Self::UploadTransfer { detail, .. }
            | Self::InvalidUploadResponse { detail }
            | Self::ProviderRejected { detail, .. }
            | Self::Failed { detail, .. } => detail.clone(),
            Self::UnknownMode { mode } | Self::MissingStyleImage { mode } => json!({
                "mode": mode,
                "message": self.to_string(),
            }),
            Self::Transport { stage, message } => json!({
                "stage": stage.as_str(),
                "message": message,
            }),
            Self::TimedOut { attempts, .. } => json!({
                "attempts": attempts,
                "message": self.to_string(),
            }),
            Self::Cancelled { stage } => json!({
                "stage": stage.as_str(),
                "message": self.to_string(),
            }),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Failed { job_id, .. } | Self::TimedOut { job_id, .. } => Some(job_id.as_str()),
            _ => None,
        }
    }
}

fn error_status_or(status: u16, fallback: u16) -> u16 {
    if (400..=599).contains(&status) {
        status
    } else {
        fallback
    }
}
