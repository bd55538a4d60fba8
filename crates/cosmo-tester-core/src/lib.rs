// crates/cosmo-tester-core/src/lib.rs
// ============================================================================
// Module: Cosmo Tester Core Library
// Description: Manager lifecycle, CLI helper and per-test coordination.
// Purpose: Drive a live manager through long-running external operations.
// Dependencies: cosmo-tester-config, reqwest, serde, tempfile, thiserror, tracing
// ============================================================================

//! ## Overview
//! The harness owns one bootstrapped manager per test run through an explicit
//! [`TestEnvironment`] value. Test cases borrow it through [`TestCase`], which
//! builds a short-lived [`CfyHelper`] bound to the manager and a
//! [`CleanupContext`] that releases every resource the test registered, on all
//! exit paths.
//! Invariants:
//! - External side effects go through the [`CommandRunner`] and
//!   [`ManagerClient`] seams only.
//! - Cleanup actions run exactly once, newest first.
//! - Best-effort steps (diagnostics, cleanup actions, post-teardown hooks) never
//!   replace the primary error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cleanup;
pub mod cli;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod expect;
pub mod logging;
pub mod polling;
pub mod provider;
pub mod rest;
pub mod ssh;
pub mod state;
pub mod test_case;
pub mod workdir;

#[cfg(test)]
mod test_case_tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cleanup::CleanupContext;
pub use cleanup::CleanupFailure;
pub use cleanup::CleanupMessage;
pub use cleanup::CleanupReport;
pub use cleanup::CleanupResult;
pub use cli::ArgValue;
pub use cli::BootstrapMode;
pub use cli::BootstrapOptions;
pub use cli::CfyHelper;
pub use cli::CfyInvoker;
pub use cli::CliArgs;
pub use cli::CommandError;
pub use cli::CommandExecutionError;
pub use cli::CommandOutput;
pub use cli::CommandRunner;
pub use cli::DeploymentUpdateOptions;
pub use cli::ExecuteOptions;
pub use cli::Invocation;
pub use cli::ManagementCreds;
pub use cli::ProcessRunner;
pub use cli::SharedRunner;
pub use cli::TeardownOptions;
pub use environment::EnvironmentBuilder;
pub use environment::EnvironmentSession;
pub use environment::LifecycleState;
pub use environment::TestEnvironment;
pub use error::FailureKind;
pub use error::HarnessError;
pub use expect::ExpectationMismatch;
pub use expect::ExpectedFailure;
pub use expect::expect_failure;
pub use polling::Poll;
pub use polling::PollPolicy;
pub use polling::WaitError;
pub use polling::poll_until;
pub use polling::repetitive;
pub use polling::wait_for_execution;
pub use polling::wait_for_snapshot;
pub use provider::OpenStackHandler;
pub use provider::ProviderHandler;
pub use provider::SharedProvider;
pub use provider::SimpleHandler;
pub use provider::resolve_handler;
pub use rest::Execution;
pub use rest::ExecutionStatus;
pub use rest::HttpClientFactory;
pub use rest::HttpManagerClient;
pub use rest::ManagerClient;
pub use rest::ManagerClientFactory;
pub use rest::ManagerStatus;
pub use rest::RestError;
pub use rest::SharedClient;
pub use rest::Snapshot;
pub use ssh::RemoteShell;
pub use state::ManagerState;
pub use state::StateCapture;
pub use state::fetch_manager_state;
pub use test_case::TestCase;
pub use workdir::Workdir;
