use restyle_contracts::errors::{OrchestrationError, Stage};
use restyle_contracts::outcome::Generated;
use restyle_contracts::payloads::classify_status;
use restyle_contracts::polling::{PollMachine, PollPolicy, PollState, StatusObservation};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::cancellable;
use crate::clock::Sleeper;
use crate::submitter::Job;
use crate::transport::HttpTransport;

/// Polls the job's status endpoint every `policy.interval` until it turns
/// active, fails, or the attempt budget runs out. Each wait and each query
/// race `cancel`.
pub async fn poll_job<T, S>(
    transport: &T,
    sleeper: &S,
    job: &Job,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<Generated, OrchestrationError>
where
    T: HttpTransport + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut machine = PollMachine::new(policy);
    let request = json!({ "orderId": job.id });

    while let Some(wait) = machine.next_wait() {
        cancellable(cancel, Stage::Poll, sleeper.sleep(wait)).await?;
        let reply = cancellable(
            cancel,
            Stage::Poll,
            transport.post_json(&job.mode.status_endpoint, &request),
        )
        .await?;

        let observation = match reply {
            Ok(reply) if reply.is_success() => match reply.json() {
                Some(payload) => classify_status(&payload),
                None => StatusObservation::Unreachable {
                    reason: format!("status {} with a non-JSON body", reply.status),
                },
            },
            Ok(reply) => StatusObservation::Unreachable {
                reason: format!("status {}", reply.status),
            },
            Err(err) => StatusObservation::Unreachable {
                reason: err.message,
            },
        };
        if let StatusObservation::Unreachable { reason } = &observation {
            warn!(
                job_id = %job.id,
                attempt = machine.attempts() + 1,
                %reason,
                "status check failed; continuing"
            );
        }

        if let Some(attempt) = machine.observe(observation) {
            debug!(
                job_id = %job.id,
                attempt = attempt.attempt,
                elapsed_s = attempt.elapsed.as_secs_f64(),
                provider_state = attempt.provider_state.as_deref().unwrap_or("unknown"),
                "status checked"
            );
        }
    }

    match machine.state() {
        PollState::Active { output_url } => {
            info!(job_id = %job.id, attempts = machine.attempts(), "job active");
            Ok(Generated {
                output_url: output_url.clone(),
                job_id: job.id.clone(),
            })
        }
        PollState::Failed { detail } => Err(OrchestrationError::Failed {
            job_id: job.id.clone(),
            detail: detail.clone(),
        }),
        _ => {
            warn!(
                job_id = %job.id,
                attempts = machine.attempts(),
                unreachable = machine.unreachable_total(),
                "no terminal status before the attempt budget ran out"
            );
            Err(OrchestrationError::TimedOut {
                job_id: job.id.clone(),
                attempts: machine.attempts(),
            })
        }
    }
}
