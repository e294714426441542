//! Concurrent relay publishing with bounded per-relay retries.
//!
//! Each unique relay gets its own retry loop, run concurrently with the
//! others; one relay failing, stalling or backing off never delays the
//! rest, and no relay failure escalates past its own outcome. The loop is
//! an explicit state machine driven by a cancellation token, a per-attempt
//! timeout and linear backoff.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use openmods_core::Event;

use crate::sender::{RelaySender, WsRelaySender};

/// Failure detail recorded when cancellation stops a relay loop.
const ABORTED: &str = "publish aborted";

/// Options governing each relay's retry loop.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Budget for a single delivery attempt.
    pub timeout: Duration,
    /// Attempts per relay; a floor of 1 is enforced.
    pub max_attempts: u32,
    /// The wait before attempt `n + 1` is `backoff_unit * n`.
    pub backoff_unit: Duration,
    /// Cooperative cancellation observed before attempts, during
    /// attempts and during backoff waits.
    pub cancel: Option<CancellationToken>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(7),
            max_attempts: 3,
            backoff_unit: Duration::from_millis(500),
            cancel: None,
        }
    }
}

/// Terminal status of one relay's publish loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Ok,
    Error,
}

/// One outcome per unique relay, however many attempts it took.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub relay: String,
    pub status: PublishStatus,
    /// Attempts actually started. Zero only when cancellation was
    /// observed before the first attempt.
    pub attempts: u32,
    /// From first attempt start to final resolution, backoff included.
    pub elapsed: Duration,
    /// The last failure detail; `None` on success.
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == PublishStatus::Ok
    }
}

/// Per-relay loop states.
enum RelayState {
    Pending,
    Attempting(u32),
    Retrying { attempt: u32, error: String },
    Succeeded(u32),
    Aborted(u32),
    Exhausted { attempt: u32, error: String },
}

/// What a single raced attempt produced.
enum AttemptResult {
    Sent,
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Publishes a signed event to many relays at once.
pub struct RelayPublisher {
    sender: Arc<dyn RelaySender>,
}

impl RelayPublisher {
    /// Publisher over an injected transport.
    pub fn new(sender: Arc<dyn RelaySender>) -> Self {
        Self { sender }
    }

    /// Publisher over pooled WebSocket connections.
    pub fn websocket() -> Self {
        Self::new(Arc::new(WsRelaySender::new()))
    }

    /// Publish to every unique relay concurrently. Always resolves with
    /// one outcome per unique relay; failures are data, never panics or
    /// errors.
    pub async fn publish(
        &self,
        event: &Event,
        relays: &[String],
        options: &PublishOptions,
    ) -> Vec<PublishOutcome> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = relays.iter().filter(|r| seen.insert(r.as_str())).collect();
        if unique.is_empty() {
            return Vec::new();
        }

        let cancel = options.cancel.clone().unwrap_or_default();

        join_all(
            unique
                .into_iter()
                .map(|relay| self.publish_to_relay(relay.clone(), event, options, cancel.clone())),
        )
        .await
    }

    /// Release pooled transport resources. Safe without a prior publish;
    /// do not call while publishes are in flight unless the intent is to
    /// force-abort them.
    pub async fn close(&self) {
        self.sender.close().await;
    }

    async fn publish_to_relay(
        &self,
        relay: String,
        event: &Event,
        options: &PublishOptions,
        cancel: CancellationToken,
    ) -> PublishOutcome {
        let max_attempts = options.max_attempts.max(1);
        let start = Instant::now();
        let mut state = RelayState::Pending;

        loop {
            state = match state {
                RelayState::Pending => RelayState::Attempting(1),

                // Cancellation observed before the attempt starts reports
                // only the attempts that actually ran; once the race is
                // underway the attempt counts.
                RelayState::Attempting(attempt) if cancel.is_cancelled() => {
                    RelayState::Aborted(attempt - 1)
                }

                RelayState::Attempting(attempt) => {
                    debug!("Publishing to {} (attempt {}/{})", relay, attempt, max_attempts);
                    match self.attempt(&relay, event, options.timeout, &cancel).await {
                        AttemptResult::Sent => RelayState::Succeeded(attempt),
                        AttemptResult::Cancelled => RelayState::Aborted(attempt),
                        AttemptResult::Failed(error) => {
                            self.after_failure(&relay, attempt, max_attempts, error, &cancel)
                        }
                        AttemptResult::TimedOut => {
                            let error =
                                format!("publish timed out after {:?}", options.timeout);
                            self.after_failure(&relay, attempt, max_attempts, error, &cancel)
                        }
                    }
                }

                RelayState::Retrying { attempt, error } => {
                    warn!(
                        "Publish to {} failed (attempt {}/{}): {}",
                        relay, attempt, max_attempts, error
                    );
                    let delay = options.backoff_unit * attempt;
                    if delay > Duration::ZERO {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                state = RelayState::Aborted(attempt);
                                continue;
                            }
                            _ = sleep(delay) => {}
                        }
                    }
                    RelayState::Attempting(attempt + 1)
                }

                RelayState::Succeeded(attempts) => {
                    return PublishOutcome {
                        relay,
                        status: PublishStatus::Ok,
                        attempts,
                        elapsed: start.elapsed(),
                        error: None,
                    };
                }

                RelayState::Aborted(attempts) => {
                    return PublishOutcome {
                        relay,
                        status: PublishStatus::Error,
                        attempts,
                        elapsed: start.elapsed(),
                        error: Some(ABORTED.to_string()),
                    };
                }

                RelayState::Exhausted { attempt, error } => {
                    warn!(
                        "Publish to {} failed after {} attempt(s): {}",
                        relay, attempt, error
                    );
                    return PublishOutcome {
                        relay,
                        status: PublishStatus::Error,
                        attempts: attempt,
                        elapsed: start.elapsed(),
                        error: Some(error),
                    };
                }
            };
        }
    }

    /// Race one delivery attempt against the timeout and cancellation.
    /// A cancelled in-flight send keeps running in the transport but its
    /// result is discarded.
    async fn attempt(
        &self,
        relay: &str,
        event: &Event,
        per_attempt: Duration,
        cancel: &CancellationToken,
    ) -> AttemptResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => AttemptResult::Cancelled,
            outcome = timeout(per_attempt, self.sender.send(relay, event)) => match outcome {
                Ok(Ok(())) => AttemptResult::Sent,
                Ok(Err(e)) => AttemptResult::Failed(e.to_string()),
                Err(_) => AttemptResult::TimedOut,
            }
        }
    }

    fn after_failure(
        &self,
        _relay: &str,
        attempt: u32,
        max_attempts: u32,
        error: String,
        cancel: &CancellationToken,
    ) -> RelayState {
        if cancel.is_cancelled() {
            RelayState::Aborted(attempt)
        } else if attempt >= max_attempts {
            RelayState::Exhausted { attempt, error }
        } else {
            RelayState::Retrying { attempt, error }
        }
    }
}
