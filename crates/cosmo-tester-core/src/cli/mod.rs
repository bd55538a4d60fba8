// crates/cosmo-tester-core/src/cli/mod.rs
// ============================================================================
// Module: Manager CLI
// Description: Argument mapping, invocation and typed CLI operations.
// Purpose: Group everything that shells out to the manager CLI.
// Dependencies: std, thiserror, tracing
// ============================================================================

//! ## Overview
//! Layers, leaves first: [`args`] maps keyword arguments to tokens,
//! [`invoker`] runs them through a [`CommandRunner`], and [`helper`] exposes
//! one typed method per manager operation.

pub mod args;
pub mod helper;
pub mod invoker;


pub use args::ArgValue;
pub use args::CliArgs;
pub use helper::BootstrapMode;
pub use helper::BootstrapOptions;
pub use helper::CfyHelper;
pub use helper::DeploymentUpdateOptions;
pub use helper::ExecuteOptions;
pub use helper::ManagementCreds;
pub use helper::TeardownOptions;
pub use invoker::CfyInvoker;
pub use invoker::CommandError;
pub use invoker::CommandExecutionError;
pub use invoker::CommandOutput;
pub use invoker::CommandRunner;
pub use invoker::Invocation;
pub use invoker::ProcessRunner;
pub use invoker::SharedRunner;
