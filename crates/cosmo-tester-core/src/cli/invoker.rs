// crates/cosmo-tester-core/src/cli/invoker.rs
// ============================================================================
// Module: CLI Invoker
// Description: Blocking execution of the external manager CLI.
// Purpose: Bake credentials into every call and capture output for asserts.
// Dependencies: cosmo-tester-config, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`CfyInvoker`] turns an operation name plus [`CliArgs`] into an
//! [`Invocation`] and hands it to a [`CommandRunner`]. The environment baked in
//! at construction (credentials, SSL trust) applies to every call and cannot be
//! overridden per call. The invoker never retries; retry counts are ordinary
//! arguments passed through to the external tool.
//! Invariants:
//! - Every invocation runs with the invoker's workdir as current directory.
//! - A non-zero exit surfaces as [`CommandError::Failed`] with captured output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use cosmo_tester_config::Credentials;
use cosmo_tester_config::HarnessEnv;
use thiserror::Error;
use tracing::debug;

use crate::cli::args::CliArgs;
use crate::cli::args::operation_tokens;

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<OsString>,
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
    /// Working directory for the child process.
    pub cwd: PathBuf,
}

impl Invocation {
    /// Renders the command line for logs and error messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Returns whether the arguments contain the given token.
    #[must_use]
    pub fn has_arg(&self, token: &str) -> bool {
        self.args.iter().any(|arg| arg == token)
    }

    /// Returns the token following `flag`, if any.
    #[must_use]
    pub fn arg_value(&self, flag: &str) -> Option<String> {
        let index = self.args.iter().position(|arg| arg == flag)?;
        self.args.get(index + 1).map(|value| value.to_string_lossy().into_owned())
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Captured details of a command that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecutionError {
    /// Rendered command line.
    pub command: String,
    /// Exit code, absent when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl fmt::Display for CommandExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "`{}` exited with status {code}", self.command)?,
            None => write!(f, "`{}` was terminated by a signal", self.command)?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandExecutionError {}

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The program exited unsuccessfully.
    #[error(transparent)]
    Failed(CommandExecutionError),
}

// ============================================================================
// SECTION: Runner Seam
// ============================================================================

/// Executes resolved invocations. Implementations block until completion.
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation and returns captured output on success.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the program cannot start or exits
    /// unsuccessfully.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.cwd)
            .output()
            .map_err(|source| CommandError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            return Ok(CommandOutput {
                stdout,
                stderr,
            });
        }
        Err(CommandError::Failed(CommandExecutionError {
            command: invocation.command_line(),
            exit_code: output.status.code(),
            stdout,
            stderr,
        }))
    }
}

// ============================================================================
// SECTION: Invoker
// ============================================================================

/// Shared handle to a command runner.
pub type SharedRunner = Arc<dyn CommandRunner>;

/// Binds the external CLI to a workdir and a fixed child environment.
#[derive(Clone)]
pub struct CfyInvoker {
    /// Runner executing resolved invocations.
    runner: SharedRunner,
    /// CLI executable.
    executable: PathBuf,
    /// Environment baked into every call.
    env: BTreeMap<String, String>,
    /// Working directory for every call.
    workdir: PathBuf,
}

impl CfyInvoker {
    /// Creates an invoker with credentials and SSL trust baked in.
    #[must_use]
    pub fn new(
        runner: SharedRunner,
        executable: impl Into<PathBuf>,
        workdir: &Path,
        credentials: Option<&Credentials>,
        trust_all: bool,
    ) -> Self {
        let mut env = BTreeMap::new();
        if let Some(credentials) = credentials {
            env.insert(HarnessEnv::Username.as_str().to_string(), credentials.username.clone());
            env.insert(HarnessEnv::Password.as_str().to_string(), credentials.password.clone());
        }
        if trust_all {
            env.insert(HarnessEnv::SslTrustAll.as_str().to_string(), "true".to_string());
        }
        Self {
            runner,
            executable: executable.into(),
            env,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Returns the working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Returns the baked-in child environment.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Builds the invocation for an operation without running it.
    #[must_use]
    pub fn invocation(&self, operation: &str, args: &CliArgs) -> Invocation {
        let mut tokens: Vec<OsString> = operation_tokens(operation).map(OsString::from).collect();
        tokens.extend(args.to_tokens());
        Invocation {
            program: self.executable.clone(),
            args: tokens,
            env: self.env.clone(),
            cwd: self.workdir.clone(),
        }
    }

    /// Runs an operation and blocks until it completes.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command cannot start or fails.
    pub fn invoke(&self, operation: &str, args: &CliArgs) -> Result<CommandOutput, CommandError> {
        let invocation = self.invocation(operation, args);
        debug!(command = %invocation.command_line(), "running cli operation");
        self.runner.run(&invocation)
    }
}
