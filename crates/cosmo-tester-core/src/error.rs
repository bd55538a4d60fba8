// crates/cosmo-tester-core/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Umbrella error type for environment, helper and test layers.
// Purpose: Keep the fault taxonomy explicit across the harness.
// Dependencies: thiserror, cosmo-tester-config
// ============================================================================

//! ## Overview
//! [`HarnessError`] unifies the harness fault taxonomy:
//! - configuration faults (fatal, raised at construction),
//! - external-command failures carrying captured output,
//! - REST failures,
//! - polling timeouts and failed executions,
//! - lifecycle misuse and local IO faults.
//!
//! Best-effort steps never surface their failures through this type; they log
//! and continue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use cosmo_tester_config::ConfigError;
use thiserror::Error;

use crate::cli::CommandError;
use crate::cli::CommandExecutionError;
use crate::polling::WaitError;
use crate::rest::RestError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by the harness.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration fault.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// External CLI invocation failed.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// REST call failed.
    #[error(transparent)]
    Rest(#[from] RestError),
    /// Wait loop failed or timed out.
    #[error(transparent)]
    Wait(#[from] WaitError),
    /// Local filesystem fault.
    #[error("{context}: {source}")]
    Io {
        /// Operation being performed.
        context: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// JSON or YAML (de)serialization fault.
    #[error("{context}: {detail}")]
    Serialization {
        /// Operation being performed.
        context: String,
        /// Underlying error text.
        detail: String,
    },
    /// The manager did not report a running status.
    #[error("Manager at {endpoint} is not running (status: {status})")]
    ManagerNotRunning {
        /// Management endpoint queried.
        endpoint: String,
        /// Status reported by the manager.
        status: String,
    },
    /// A lifecycle operation was invoked in a state that does not allow it.
    #[error("cannot {operation} while the environment is {state}")]
    Lifecycle {
        /// Attempted operation.
        operation: &'static str,
        /// Current state label.
        state: &'static str,
    },
    /// Required context is missing (for example no management endpoint).
    #[error("{0}")]
    MissingContext(String),
    /// A provider hook failed.
    #[error("provider {provider} {hook} hook failed: {detail}")]
    ProviderHook {
        /// Provider handler name.
        provider: String,
        /// Hook name.
        hook: &'static str,
        /// Failure detail.
        detail: String,
    },
}

impl HarnessError {
    /// Builds an IO error with operation context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the command failure payload when this error wraps one.
    #[must_use]
    pub const fn command_failure(&self) -> Option<&CommandExecutionError> {
        match self {
            Self::Command(CommandError::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    /// Returns a stable label for the error class.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Config,
            Self::Command(CommandError::Failed(_)) => FailureKind::CommandExecution,
            Self::Command(CommandError::Spawn { .. }) => FailureKind::Spawn,
            Self::Rest(_) => FailureKind::Rest,
            Self::Wait(WaitError::Timeout { .. }) => FailureKind::Timeout,
            Self::Wait(WaitError::ExecutionFailed { .. }) => FailureKind::ExecutionFailed,
            Self::Io { .. } | Self::Serialization { .. } => FailureKind::Local,
            Self::ManagerNotRunning { .. } => FailureKind::ManagerNotRunning,
            Self::Lifecycle { .. } | Self::MissingContext(_) => FailureKind::Lifecycle,
            Self::ProviderHook { .. } => FailureKind::ProviderHook,
        }
    }
}

/// Coarse error classes used by expected-failure checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Configuration fault.
    Config,
    /// External command exited non-zero.
    CommandExecution,
    /// External command could not be started.
    Spawn,
    /// REST call failed.
    Rest,
    /// Wait deadline passed.
    Timeout,
    /// Execution finished in a failed state.
    ExecutionFailed,
    /// Local IO or serialization fault.
    Local,
    /// Manager status was not `running`.
    ManagerNotRunning,
    /// Lifecycle misuse.
    Lifecycle,
    /// Provider hook failed.
    ProviderHook,
}

impl FailureKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::CommandExecution => "command_execution",
            Self::Spawn => "spawn",
            Self::Rest => "rest",
            Self::Timeout => "timeout",
            Self::ExecutionFailed => "execution_failed",
            Self::Local => "local",
            Self::ManagerNotRunning => "manager_not_running",
            Self::Lifecycle => "lifecycle",
            Self::ProviderHook => "provider_hook",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
