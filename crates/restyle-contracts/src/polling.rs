//! Bounded job-status polling as a pure state machine.
//!
//! The machine never sleeps or performs I/O. A driver asks it for the next
//! wait, performs one status query, and feeds the observation back until a
//! terminal state is reached.

use std::time::Duration;

use serde_json::Value;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// What a single status query reported.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusObservation {
    InProgress { status: String },
    Active { output_url: String },
    Failed { detail: Value },
    /// Transport failure or non-2xx answer; tolerated until the budget ends.
    Unreachable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Pending,
    TransportFlaky {
        consecutive: u32,
        last_reason: String,
    },
    Active { output_url: String },
    Failed { detail: Value },
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Active { .. } | Self::Failed { .. } | Self::TimedOut
        )
    }
}

/// Record of one status check.
#[derive(Debug, Clone, PartialEq)]
pub struct PollAttempt {
    pub attempt: u32,
    pub elapsed: Duration,
    pub provider_state: Option<String>,
    pub output_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollMachine {
    policy: PollPolicy,
    attempts: u32,
    elapsed: Duration,
    unreachable_total: u32,
    state: PollState,
}

impl PollMachine {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy: PollPolicy {
                interval: policy.interval,
                max_attempts: policy.max_attempts.max(1),
            },
            attempts: 0,
            elapsed: Duration::ZERO,
            unreachable_total: 0,
            state: PollState::Pending,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn unreachable_total(&self) -> u32 {
        self.unreachable_total
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Wait before the next query, or `None` once polling is over.
    pub fn next_wait(&self) -> Option<Duration> {
        if self.is_terminal() || self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.interval)
    }

    /// Applies the outcome of one query made after waiting one interval.
    /// Returns `None` when polling was already over.
    pub fn observe(&mut self, observation: StatusObservation) -> Option<PollAttempt> {
        self.next_wait()?;
        self.attempts += 1;
        self.elapsed += self.policy.interval;

        let (provider_state, output_url) = match observation {
            StatusObservation::Active { output_url } => {
                self.state = PollState::Active {
                    output_url: output_url.clone(),
                };
                (Some("active".to_string()), Some(output_url))
            }
            StatusObservation::Failed { detail } => {
                self.state = PollState::Failed { detail };
                (Some("failed".to_string()), None)
            }
            StatusObservation::InProgress { status } => {
                self.state = PollState::Pending;
                (Some(status), None)
            }
            StatusObservation::Unreachable { reason } => {
                self.unreachable_total += 1;
                let consecutive = match &self.state {
                    PollState::TransportFlaky { consecutive, .. } => consecutive + 1,
                    _ => 1,
                };
                self.state = PollState::TransportFlaky {
                    consecutive,
                    last_reason: reason,
                };
                (None, None)
            }
        };

        if !self.is_terminal() && self.attempts >= self.policy.max_attempts {
            self.state = PollState::TimedOut;
        }

        Some(PollAttempt {
            attempt: self.attempts,
            elapsed: self.elapsed,
            provider_state,
            output_url,
        })
    }
}
