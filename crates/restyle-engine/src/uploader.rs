use restyle_contracts::errors::{OrchestrationError, Stage};
use restyle_contracts::payloads::{
    error_detail_from_text, failure_marker, parse_upload_slot, provider_status_code, truncate_text,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancel::cancellable;
use crate::transport::HttpTransport;

/// Raw image bytes with the content type they will be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Asset {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Acquires a one-time upload slot sized to `asset` and PUTs the bytes to
/// it. Returns the slot's public URL. Nothing here is retried.
pub async fn upload_asset<T>(
    transport: &T,
    upload_endpoint: &str,
    asset: &Asset,
    cancel: &CancellationToken,
) -> Result<String, OrchestrationError>
where
    T: HttpTransport + ?Sized,
{
    let request = json!({
        "uploadType": "imageUrl",
        "size": asset.size(),
        "contentType": asset.content_type,
    });
    debug!(
        size = asset.size(),
        content_type = %asset.content_type,
        "requesting upload slot"
    );
    let reply = cancellable(
        cancel,
        Stage::UploadSlot,
        transport.post_json(upload_endpoint, &request),
    )
    .await?
    .map_err(|err| err.into_error(Stage::UploadSlot))?;
    if !reply.is_success() {
        return Err(OrchestrationError::UploadSlot {
            status: reply.status,
            detail: error_detail_from_text(&reply.body),
        });
    }
    let Some(payload) = reply.json() else {
        return Err(OrchestrationError::InvalidUploadResponse {
            detail: json!({
                "message": "upload slot response was not JSON",
                "body": truncate_text(&reply.body, 512),
            }),
        });
    };
    if let Some(detail) = failure_marker(&payload) {
        return Err(OrchestrationError::UploadSlot {
            status: provider_status_code(&payload).unwrap_or(reply.status),
            detail,
        });
    }
    let slot = parse_upload_slot(&payload)?;

    let transfer = cancellable(
        cancel,
        Stage::UploadTransfer,
        transport.put_bytes(&slot.upload_target_url, &asset.content_type, &asset.bytes),
    )
    .await?
    .map_err(|err| err.into_error(Stage::UploadTransfer))?;
    if !transfer.is_success() {
        return Err(OrchestrationError::UploadTransfer {
            status: transfer.status,
            detail: error_detail_from_text(&transfer.body),
        });
    }

    info!(asset_url = %slot.public_asset_url, "asset uploaded");
    Ok(slot.public_asset_url)
}

#[cfg(test)]
mod tests {
    use restyle_contracts::FailureKind;
    use serde_json::{json, Value};

    use super::*;
    use crate::testing::{upload_slot_reply, FakeTransport, UPLOAD_ENDPOINT};
    use crate::transport::{HttpReply, TransportFailure};

    fn jpeg() -> Asset {
        Asset::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10], "image/jpeg")
    }

    async fn upload(transport: &FakeTransport) -> Result<String, OrchestrationError> {
        upload_asset(transport, UPLOAD_ENDPOINT, &jpeg(), &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn declares_size_then_puts_exact_bytes() {
        let transport = FakeTransport::new();
        transport.respond_json(UPLOAD_ENDPOINT, 200, upload_slot_reply(1));
        transport.respond(
            "https://bucket.test/put/1?sig=abc",
            Ok(HttpReply::new(200, "")),
        );

        let url = upload(&transport).await.unwrap();
        assert_eq!(url, "https://cdn.test/assets/1.jpg");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].body,
            Some(json!({
                "uploadType": "imageUrl",
                "size": 6,
                "contentType": "image/jpeg"
            }))
        );
        assert_eq!(calls[1].method, "PUT");
        assert_eq!(calls[1].content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(calls[1].bytes, jpeg().bytes);
    }

    #[tokio::test]
    async fn missing_public_url_skips_transfer() {
        let transport = FakeTransport::new();
        transport.respond_json(
            UPLOAD_ENDPOINT,
            200,
            json!({"body": {"uploadImage": "https://bucket.test/put/1"}}),
        );
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::InvalidUploadResponse {
                detail: json!({"uploadImage": true, "imageUrl": false})
            }
        );
        assert_eq!(transport.count("PUT"), 0);
    }

    #[tokio::test]
    async fn slot_rejection_keeps_provider_status_and_detail() {
        let transport = FakeTransport::new();
        transport.respond(
            UPLOAD_ENDPOINT,
            Ok(HttpReply::new(401, "{\"message\":\"Invalid API key\"}")),
        );
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::UploadSlot {
                status: 401,
                detail: json!({"message": "Invalid API key"})
            }
        );
    }

    #[tokio::test]
    async fn slot_failure_marker_keeps_provider_detail() {
        let transport = FakeTransport::new();
        transport.respond_json(
            UPLOAD_ENDPOINT,
            200,
            json!({
                "statusCode": 5040,
                "message": "API_CREDITS_CONSUMED",
                "status": "FAIL",
                "description": "Not enough credits"
            }),
        );
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::UploadSlot {
                status: 200,
                detail: json!({
                    "status": "FAIL",
                    "message": "API_CREDITS_CONSUMED",
                    "description": "Not enough credits",
                    "statusCode": 5040
                })
            }
        );
        assert_eq!(err.kind(), FailureKind::UploadSlotError);
        assert_eq!(err.http_status(), 502);
        assert_eq!(transport.count("PUT"), 0);
    }

    #[tokio::test]
    async fn non_json_slot_reply_is_invalid() {
        let transport = FakeTransport::new();
        transport.respond(UPLOAD_ENDPOINT, Ok(HttpReply::new(200, "<html>")));
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidUploadResponse);
        assert_eq!(err.detail()["body"], Value::String("<html>".to_string()));
    }

    #[tokio::test]
    async fn failed_put_is_terminal() {
        let transport = FakeTransport::new();
        transport.respond_json(UPLOAD_ENDPOINT, 200, upload_slot_reply(1));
        transport.respond(
            "https://bucket.test/put/1?sig=abc",
            Ok(HttpReply::new(403, "SignatureDoesNotMatch")),
        );
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::UploadTransfer {
                status: 403,
                detail: json!({"message": "SignatureDoesNotMatch"})
            }
        );
        assert_eq!(transport.count("POST"), 1);
        assert_eq!(transport.count("PUT"), 1);
    }

    #[tokio::test]
    async fn transport_failure_names_its_stage() {
        let transport = FakeTransport::new();
        let reset = TransportFailure::new("connection reset");
        transport.respond(UPLOAD_ENDPOINT, Err(reset));
        let err = upload(&transport).await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::Transport {
                stage: Stage::UploadSlot,
                message: "connection reset".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let transport = FakeTransport::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = upload_asset(&transport, UPLOAD_ENDPOINT, &jpeg(), &token)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::Cancelled {
                stage: Stage::UploadSlot
            }
        );
        assert!(transport.calls().is_empty());
    }
}
