use restyle_contracts::errors::{OrchestrationError, Stage};
use restyle_contracts::payloads::{error_detail_from_text, failure_marker, provider_status_code};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::transport::HttpTransport;

/// Remaining account credits as reported by the provider.
pub async fn fetch_credits<T>(
    transport: &T,
    credits_endpoint: &str,
    cancel: &CancellationToken,
) -> Result<Value, OrchestrationError>
where
    T: HttpTransport + ?Sized,
{
    let reply = cancellable(cancel, Stage::Account, transport.get_json(credits_endpoint))
        .await?
        .map_err(|err| err.into_error(Stage::Account))?;
    if !reply.is_success() {
        return Err(OrchestrationError::ProviderRejected {
            status: Some(reply.status),
            detail: error_detail_from_text(&reply.body),
        });
    }
    let payload = error_detail_from_text(&reply.body);
    if let Some(detail) = failure_marker(&payload) {
        return Err(OrchestrationError::ProviderRejected {
            status: provider_status_code(&payload),
            detail,
        });
    }
    Ok(payload)
}
