use serde::Serialize;
use serde_json::Value;

use crate::errors::{FailureCategory, FailureKind, OrchestrationError};

/// A finished job as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub output_url: String,
    pub job_id: String,
}

/// The only value that crosses back to the external caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "outcome",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum OrchestrationResult {
    Success {
        output_url: String,
        job_id: String,
    },
    Failure {
        kind: FailureKind,
        category: FailureCategory,
        message: String,
        detail: Value,
        http_status: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
    },
}

impl OrchestrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output_url(&self) -> Option<&str> {
        match self {
            Self::Success { output_url, .. } => Some(output_url.as_str()),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Generated> for OrchestrationResult {
    fn from(value: Generated) -> Self {
        Self::Success {
            output_url: value.output_url,
            job_id: value.job_id,
        }
    }
}

impl From<OrchestrationError> for OrchestrationResult {
    fn from(err: OrchestrationError) -> Self {
        let kind = err.kind();
        Self::Failure {
            kind,
            category: kind.category(),
            message: kind.user_message().to_string(),
            detail: err.detail(),
            http_status: err.http_status(),
            job_id: err.job_id().map(str::to_string),
        }
    }
}

impl From<Result<Generated, OrchestrationError>> for OrchestrationResult {
    fn from(value: Result<Generated, OrchestrationError>) -> Self {
        match value {
            Ok(generated) => generated.into(),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_serializes_camel_case() {
        let result = OrchestrationResult::from(Generated {
            output_url: "https://cdn.test/out.jpg".to_string(),
            job_id: "ord-1".to_string(),
        });
        assert!(result.is_success());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"outcome": "success", "outputUrl": "https://cdn.test/out.jpg", "jobId": "ord-1"})
        );
    }

    #[test]
    fn failure_carries_kind_detail_and_status() {
        let result = OrchestrationResult::from(OrchestrationError::TimedOut {
            job_id: "ord-2".to_string(),
            attempts: 10,
        });
        assert_eq!(result.failure_kind(), Some(FailureKind::TimedOut));
        assert_eq!(result.output_url(), None);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], json!("failure"));
        assert_eq!(value["kind"], json!("TimedOut"));
        assert_eq!(value["category"], json!("retry_later"));
        assert_eq!(value["httpStatus"], json!(408));
        assert_eq!(value["jobId"], json!("ord-2"));
        assert_eq!(value["detail"]["attempts"], json!(10));
    }

    #[test]
    fn failure_without_job_omits_job_id() {
        let result = OrchestrationResult::from(OrchestrationError::MissingStyleImage {
            mode: "faceswap".to_string(),
        });
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("jobId").is_none());
        assert_eq!(value["category"], json!("fix_input"));
    }
}
