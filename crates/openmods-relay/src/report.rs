//! Aggregation of per-relay publish outcomes.

use std::time::Duration;

use crate::publisher::PublishOutcome;

/// Per-relay diagnostic line for report rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayDiagnostic {
    pub relay: String,
    pub attempts: u32,
    pub elapsed: Duration,
    /// Failure detail; empty for successes.
    pub detail: String,
}

/// Reduced view over a publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub diagnostics: Vec<RelayDiagnostic>,
}

impl PublishSummary {
    /// True when not a single relay accepted the event; callers decide
    /// whether that constitutes an overall failure.
    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && self.failed > 0
    }
}

/// Reduce outcomes to counts plus per-relay diagnostics. Pure; no I/O.
/// `succeeded + failed` always equals `outcomes.len()`.
pub fn summarize(outcomes: &[PublishOutcome]) -> PublishSummary {
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
    let diagnostics = outcomes
        .iter()
        .map(|outcome| RelayDiagnostic {
            relay: outcome.relay.clone(),
            attempts: outcome.attempts,
            elapsed: outcome.elapsed,
            detail: outcome.error.clone().unwrap_or_default(),
        })
        .collect();

    PublishSummary {
        succeeded,
        failed: outcomes.len() - succeeded,
        diagnostics,
    }
}
