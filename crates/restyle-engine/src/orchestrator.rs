use restyle_contracts::errors::OrchestrationError;
use restyle_contracts::modes::{ModeRegistry, ModeSelector};
use restyle_contracts::outcome::{Generated, OrchestrationResult};
use restyle_contracts::polling::PollPolicy;
use restyle_contracts::requests::build_generation_request;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::account::fetch_credits;
use crate::clock::{Sleeper, TokioSleeper};
use crate::config::{ApiKey, EngineConfig};
use crate::poller::poll_job;
use crate::submitter::submit_job;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::uploader::{upload_asset, Asset};

/// Everything a caller hands to one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateInput {
    pub file: Asset,
    pub mode: Option<String>,
    pub style: Option<Asset>,
    pub text_prompt: Option<String>,
}

impl GenerateInput {
    pub fn new(file: Asset) -> Self {
        Self {
            file,
            mode: None,
            style: None,
            text_prompt: None,
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn style(mut self, style: Asset) -> Self {
        self.style = Some(style);
        self
    }

    pub fn text_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.text_prompt = Some(prompt.into());
        self
    }
}

/// Sequences upload, optional style upload, request shaping, submission and
/// polling. Any stage failure ends the call; nothing is retried here.
pub struct Orchestrator<T, S = TokioSleeper> {
    selector: ModeSelector,
    transport: T,
    sleeper: S,
    poll: PollPolicy,
    secret: Option<ApiKey>,
}

impl Orchestrator<ReqwestTransport, TokioSleeper> {
    /// Production wiring: `reqwest` transport, tokio timers, and the key
    /// scrubbed from every surfaced failure.
    pub fn from_config(config: &EngineConfig) -> Self {
        Orchestrator::new(
            ModeRegistry::new(Some(&config.api_base)),
            ReqwestTransport::from_config(config),
            TokioSleeper,
            config.poll,
        )
        .with_secret(config.api_key.clone())
    }
}

impl<T: HttpTransport, S: Sleeper> Orchestrator<T, S> {
    pub fn new(registry: ModeRegistry, transport: T, sleeper: S, poll: PollPolicy) -> Self {
        Self {
            selector: ModeSelector::new(Some(registry)),
            transport,
            sleeper,
            poll,
            secret: None,
        }
    }

    /// Scrubs `secret` from every failure detail before it leaves.
    pub fn with_secret(mut self, secret: ApiKey) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.selector.registry
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub async fn generate(
        &self,
        input: &GenerateInput,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let invocation = Uuid::new_v4();
        let span = info_span!("generate", %invocation);
        let outcome = self.try_generate(input, cancel).instrument(span).await;
        match outcome {
            Ok(generated) => generated.into(),
            Err(err) => {
                warn!(%invocation, kind = %err.kind(), "generation failed: {err}");
                self.scrub(err).into()
            }
        }
    }

    pub async fn try_generate(
        &self,
        input: &GenerateInput,
        cancel: &CancellationToken,
    ) -> Result<Generated, OrchestrationError> {
        let selection = self.selector.select(input.mode.as_deref())?;
        if let Some(reason) = &selection.fallback_reason {
            info!(mode = %selection.mode.id, "{reason}");
        }
        let mode = selection.mode;

        let style = input.style.as_ref().filter(|asset| !asset.bytes.is_empty());
        if mode.requires_style_image && style.is_none() {
            return Err(OrchestrationError::MissingStyleImage {
                mode: mode.id.clone(),
            });
        }

        let upload_endpoint = self.registry().upload_endpoint();
        info!(mode = %mode.id, size = input.file.size(), "uploading primary image");
        let primary_url =
            upload_asset(&self.transport, &upload_endpoint, &input.file, cancel).await?;

        let mut style_url = None;
        if let Some(style) = style.filter(|_| mode.shape.accepts_style_image()) {
            info!(mode = %mode.id, size = style.size(), "uploading style image");
            match upload_asset(&self.transport, &upload_endpoint, style, cancel).await {
                Ok(url) => style_url = Some(url),
                Err(err) if mode.requires_style_image => return Err(err),
                Err(err @ OrchestrationError::Cancelled { .. }) => return Err(err),
                Err(err) => {
                    warn!(mode = %mode.id, "style upload failed, continuing without it: {err}");
                }
            }
        }
        if style_url.is_none() && mode.shape.accepts_style_image() && !mode.requires_style_image {
            info!(mode = %mode.id, "no style image; primary image stands in for the mask");
        }

        let request = build_generation_request(
            &mode,
            &primary_url,
            style_url.as_deref(),
            input.text_prompt.as_deref(),
        )?;
        let job = submit_job(&self.transport, &mode, &request, cancel).await?;
        poll_job(&self.transport, &self.sleeper, &job, self.poll, cancel).await
    }

    /// Provider account credits; shares the orchestrator's transport.
    pub async fn credits(&self, cancel: &CancellationToken) -> Result<Value, OrchestrationError> {
        let endpoint = self.registry().credits_endpoint();
        fetch_credits(&self.transport, &endpoint, cancel)
            .await
            .map_err(|err| self.scrub(err))
    }

    fn scrub(&self, err: OrchestrationError) -> OrchestrationError {
        let Some(secret) = &self.secret else {
            return err;
        };
        match err {
            OrchestrationError::UploadSlot { status, detail } => OrchestrationError::UploadSlot {
                status,
                detail: secret.scrub_value(detail),
            },
            OrchestrationError::UploadTransfer { status, detail } => {
                OrchestrationError::UploadTransfer {
                    status,
                    detail: secret.scrub_value(detail),
                }
            }
            OrchestrationError::InvalidUploadResponse { detail } => {
                OrchestrationError::InvalidUploadResponse {
                    detail: secret.scrub_value(detail),
                }
            }
            OrchestrationError::ProviderRejected { status, detail } => {
                OrchestrationError::ProviderRejected {
                    status,
                    detail: secret.scrub_value(detail),
                }
            }
            OrchestrationError::Failed { job_id, detail } => OrchestrationError::Failed {
                job_id,
                detail: secret.scrub_value(detail),
            },
            OrchestrationError::Transport { stage, message } => OrchestrationError::Transport {
                stage,
                message: secret.scrub(&message),
            },
            other => other,
        }
    }
}
