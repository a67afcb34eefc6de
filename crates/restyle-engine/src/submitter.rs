use chrono::{DateTime, Utc};
use restyle_contracts::errors::{OrchestrationError, Stage};
use restyle_contracts::modes::TransformMode;
use restyle_contracts::payloads::{error_detail_from_text, parse_job_id, truncate_text};
use restyle_contracts::requests::GenerationRequest;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel::cancellable;
use crate::transport::HttpTransport;

/// A generation job the provider accepted. Lives only for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub mode: TransformMode,
    pub created_at: DateTime<Utc>,
}

/// Posts `request` to the mode's generation endpoint, once. A failed or
/// timed-out submission is never resent: the job may already be billed.
pub async fn submit_job<T>(
    transport: &T,
    mode: &TransformMode,
    request: &GenerationRequest,
    cancel: &CancellationToken,
) -> Result<Job, OrchestrationError>
where
    T: HttpTransport + ?Sized,
{
    let body = request.to_json();
    debug!(
        endpoint = %mode.generation_endpoint,
        fields = ?request.field_names(),
        "submitting generation"
    );
    let reply = cancellable(
        cancel,
        Stage::Submit,
        transport.post_json(&mode.generation_endpoint, &body),
    )
    .await?
    .map_err(|err| err.into_error(Stage::Submit))?;

    if !reply.is_success() {
        return Err(OrchestrationError::ProviderRejected {
            status: Some(reply.status),
            detail: error_detail_from_text(&reply.body),
        });
    }
    let Some(payload) = reply.json() else {
        return Err(OrchestrationError::ProviderRejected {
            status: Some(reply.status),
            detail: json!({
                "message": "generation response was not JSON",
                "body": truncate_text(&reply.body, 512),
            }),
        });
    };
    let id = parse_job_id(&payload)?;

    info!(job_id = %id, mode = %mode.id, "generation job accepted");
    Ok(Job {
        id,
        mode: mode.clone(),
        created_at: Utc::now(),
    })
}
