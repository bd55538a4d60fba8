// crates/cosmo-tester-core/src/cleanup.rs
// ============================================================================
// Module: Cleanup Context
// Description: Ordered stack of deferred resource-release actions.
// Purpose: Release externally provisioned resources on every exit path.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! A [`CleanupContext`] is a named stack of deferred actions. Actions are
//! registered before the resource-creating call they protect and run exactly
//! once, newest first, when the context is run or dropped. A failing action is
//! logged and the remaining actions still run.
//! Invariants:
//! - Execution order is the strict reverse of registration order.
//! - Each action runs at most once.
//! - Nested contexts run as a single action of their parent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;

use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Error type returned by cleanup actions.
pub type CleanupFailure = Box<dyn Error + Send + Sync>;

/// Result of one cleanup action.
pub type CleanupResult = Result<(), CleanupFailure>;

/// A deferred cleanup action.
type CleanupAction<'a> = Box<dyn FnOnce() -> CleanupResult + 'a>;

/// A labelled action on the stack.
struct Entry<'a> {
    /// Label used in logs and reports.
    label: String,
    /// Deferred action.
    action: CleanupAction<'a>,
}

/// Outcome of running a cleanup context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Labels of the actions that ran, in execution order.
    pub executed: Vec<String>,
    /// Labels and messages of the actions that failed.
    pub failures: Vec<(String, String)>,
}

impl CleanupReport {
    /// Returns whether every action succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Simple message error for ad hoc cleanup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupMessage(pub String);

impl fmt::Display for CleanupMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for CleanupMessage {}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Named stack of cleanup actions.
pub struct CleanupContext<'a> {
    /// Context name, usually the test or environment name.
    name: String,
    /// Registered actions, oldest first.
    entries: Vec<Entry<'a>>,
}

impl<'a> CleanupContext<'a> {
    /// Creates an empty context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no actions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers an action to run at cleanup time.
    pub fn register<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> CleanupResult + 'a,
    {
        let label = label.into();
        debug!(context = %self.name, action = %label, "registered cleanup action");
        self.entries.push(Entry {
            label,
            action: Box::new(action),
        });
    }

    /// Registers a child context that runs as one action of this context.
    pub fn nest(&mut self, child: Self) {
        let label = format!("context:{}", child.name);
        self.register(label, move || {
            let report = child.run();
            if report.is_clean() {
                Ok(())
            } else {
                let failed: Vec<&str> = report.failures.iter().map(|(label, _)| label.as_str()).collect();
                Err(Box::new(CleanupMessage(format!("failed actions: {}", failed.join(", ")))))
            }
        });
    }

    /// Runs every pending action, newest first.
    pub fn run(mut self) -> CleanupReport {
        self.drain()
    }

    /// Drops every pending action without running it, returning the labels
    /// newest first.
    pub fn dismiss(mut self) -> Vec<String> {
        let entries = std::mem::take(&mut self.entries);
        entries.into_iter().rev().map(|entry| entry.label).collect()
    }

    /// Pops and runs actions until the stack is empty.
    fn drain(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        while let Some(entry) = self.entries.pop() {
            debug!(context = %self.name, action = %entry.label, "running cleanup action");
            if let Err(err) = (entry.action)() {
                warn!(
                    context = %self.name,
                    action = %entry.label,
                    error = %err,
                    "cleanup action failed"
                );
                report.failures.push((entry.label.clone(), err.to_string()));
            }
            report.executed.push(entry.label);
        }
        report
    }
}

impl Drop for CleanupContext<'_> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let _ = self.drain();
        }
    }
}

impl fmt::Debug for CleanupContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupContext")
            .field("name", &self.name)
            .field("pending", &self.entries.len())
            .finish()
    }
}
