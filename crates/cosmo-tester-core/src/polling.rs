// crates/cosmo-tester-core/src/polling.rs
// ============================================================================
// Module: Polling
// Description: Fixed-interval wait loops with wall-clock deadlines.
// Purpose: Wait for executions, snapshots and retried checks to settle.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! Every wait in the harness is a fixed-interval loop bounded by a wall-clock
//! deadline. Probes run at least once, even with a zero timeout. When the
//! deadline passes the wait fails with [`WaitError::Timeout`]; execution waits
//! first dump the execution's recent events and logs for diagnosis.
//! Invariants:
//! - `failed` and `cancelled` executions fail immediately.
//! - `terminated` executions succeed immediately.
//! - There is no cancellation of an in-flight wait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::error::HarnessError;
use crate::rest::Execution;
use crate::rest::ExecutionStatus;
use crate::rest::ManagerClient;
use crate::rest::Snapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of events dumped when an execution wait times out.
pub const EVENTS_DUMP_BATCH: usize = 1000;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot status while creation is in progress.
const SNAPSHOT_CREATING: &str = "creating";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by wait loops.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The deadline passed before the condition held.
    #[error("timed out after {}s waiting for {what}", .waited.as_secs())]
    Timeout {
        /// What was being waited for.
        what: String,
        /// Configured timeout.
        waited: Duration,
    },
    /// The execution reached a failed end state.
    #[error("Execution \"{execution_id}\" {status}: {error}")]
    ExecutionFailed {
        /// Execution identifier.
        execution_id: String,
        /// End-state label.
        status: String,
        /// Error reported by the manager.
        error: String,
    },
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// The condition holds.
    Ready(T),
    /// Not yet; probe again after the interval.
    Pending,
}

/// Interval and deadline for a wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between probes.
    pub interval: Duration,
    /// Total wall-clock budget.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
        }
    }

    /// Creates a policy with the default one-second interval.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, timeout)
    }
}

// ============================================================================
// SECTION: Wait Loops
// ============================================================================

/// Probes until it reports [`Poll::Ready`] or the deadline passes.
///
/// # Errors
///
/// Returns the probe's error unchanged, or [`WaitError::Timeout`] when the
/// deadline passes.
pub fn poll_until<T, F>(what: &str, policy: PollPolicy, mut probe: F) -> Result<T, HarnessError>
where
    F: FnMut() -> Result<Poll<T>, HarnessError>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Poll::Ready(value) = probe()? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                what: what.to_string(),
                waited: policy.timeout,
            }
            .into());
        }
        thread::sleep(policy.interval.min(deadline - now));
    }
}

/// Waits for an execution to terminate.
///
/// # Errors
///
/// Returns [`WaitError::ExecutionFailed`] for `failed` or `cancelled`
/// executions, [`WaitError::Timeout`] after dumping recent events, or the REST
/// error raised while polling.
pub fn wait_for_execution(
    client: &dyn ManagerClient,
    execution_id: &str,
    policy: PollPolicy,
) -> Result<Execution, HarnessError> {
    let what = format!("execution \"{execution_id}\"");
    let outcome = poll_until(&what, policy, || {
        let execution = client.execution(execution_id)?;
        match execution.status() {
            ExecutionStatus::Terminated => Ok(Poll::Ready(execution)),
            ExecutionStatus::Failed | ExecutionStatus::Cancelled => {
                Err(WaitError::ExecutionFailed {
                    execution_id: execution.id.clone(),
                    status: execution.status.clone(),
                    error: execution.error.clone(),
                }
                .into())
            }
            _ => Ok(Poll::Pending),
        }
    });
    if let Err(HarnessError::Wait(WaitError::Timeout {
        ..
    })) = &outcome
    {
        dump_events(client, execution_id);
    }
    outcome
}

/// Logs the most recent events and logs of an execution.
pub fn dump_events(client: &dyn ManagerClient, execution_id: &str) {
    match client.events(execution_id, EVENTS_DUMP_BATCH, true) {
        Ok(events) => {
            info!(execution_id, count = events.len(), "execution events & logs:");
            for event in events {
                info!(execution_id, event = %event, "execution event");
            }
        }
        Err(err) => warn!(execution_id, error = %err, "failed to fetch execution events"),
    }
}

/// Waits while a snapshot is still being created and returns its final record.
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] or the REST error raised while polling.
pub fn wait_for_snapshot(
    client: &dyn ManagerClient,
    snapshot_id: &str,
    policy: PollPolicy,
) -> Result<Snapshot, HarnessError> {
    let what = format!("snapshot \"{snapshot_id}\"");
    poll_until(&what, policy, || {
        let snapshot = client.snapshot(snapshot_id)?;
        if snapshot.status == SNAPSHOT_CREATING {
            Ok(Poll::Pending)
        } else {
            Ok(Poll::Ready(snapshot))
        }
    })
}

/// Retries `attempt` until it succeeds or the deadline passes.
///
/// # Errors
///
/// Returns the last error once the deadline has passed.
pub fn repetitive<T, E, F>(policy: PollPolicy, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(err);
                }
                thread::sleep(policy.interval.min(deadline - now));
            }
        }
    }
}
