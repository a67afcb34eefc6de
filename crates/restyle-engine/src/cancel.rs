use std::future::Future;
use std::time::Duration;

use restyle_contracts::errors::{OrchestrationError, Stage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs `work` unless `cancel` fires first. An already-cancelled token wins
/// without polling `work` at all.
pub async fn cancellable<F, T>(
    cancel: &CancellationToken,
    stage: Stage,
    work: F,
) -> Result<T, OrchestrationError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestrationError::Cancelled { stage }),
        output = work => Ok(output),
    }
}

/// Cancels `token` once `deadline` elapses. The task ends early if the
/// token is cancelled by someone else.
pub fn cancel_after(token: CancellationToken, deadline: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(deadline) => token.cancel(),
        }
    })
}
