// crates/cosmo-tester-core/src/ssh.rs
// ============================================================================
// Module: Remote Shell
// Description: Commands on the manager host over the system ssh client.
// Purpose: Back diagnostics and service checks that need a host shell.
// Dependencies: cosmo-tester-config, url
// ============================================================================

//! ## Overview
//! [`RemoteShell`] runs one command per `ssh` invocation through the shared
//! [`CommandRunner`](crate::cli::CommandRunner). Host keys are not persisted
//! since manager hosts are recreated on every run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use cosmo_tester_config::ConfigError;
use cosmo_tester_config::ProviderConfig;
use url::Url;

use crate::cli::CommandError;
use crate::cli::Invocation;
use crate::cli::SharedRunner;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SSH client executable.
const SSH_PROGRAM: &str = "ssh";

// ============================================================================
// SECTION: Remote Shell
// ============================================================================

/// SSH access to the manager host.
#[derive(Clone)]
pub struct RemoteShell {
    /// Runner executing the ssh client.
    runner: SharedRunner,
    /// Manager host name or address.
    host: String,
    /// Remote user.
    user: String,
    /// Private key file.
    key_path: PathBuf,
    /// SSH port.
    port: u16,
}

impl RemoteShell {
    /// Creates a shell for `user@host:port` authenticated by `key_path`.
    #[must_use]
    pub fn new(
        runner: SharedRunner,
        endpoint: &str,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
        port: u16,
    ) -> Self {
        Self {
            runner,
            host: host_of(endpoint),
            user: user.into(),
            key_path: key_path.into(),
            port,
        }
    }

    /// Creates a shell from the test config, or `None` when the management
    /// user or key path is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a configured value has the wrong type.
    pub fn from_config(
        runner: SharedRunner,
        endpoint: &str,
        config: &ProviderConfig,
    ) -> Result<Option<Self>, ConfigError> {
        let (Some(user), Some(key_path)) =
            (config.management_user_name()?, config.management_key_path()?)
        else {
            return Ok(None);
        };
        Ok(Some(Self::new(runner, endpoint, user, key_path, config.management_port()?)))
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds the ssh invocation for a remote command.
    #[must_use]
    pub fn invocation(&self, command: &str) -> Invocation {
        let args = vec![
            "-i".into(),
            self.key_path.clone().into_os_string(),
            "-p".into(),
            self.port.to_string().into(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            format!("{}@{}", self.user, self.host).into(),
            command.into(),
        ];
        Invocation {
            program: PathBuf::from(SSH_PROGRAM),
            args,
            env: BTreeMap::new(),
            cwd: std::env::temp_dir(),
        }
    }

    /// Runs a remote command and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when ssh cannot start or the command fails.
    pub fn run(&self, command: &str) -> Result<String, CommandError> {
        Ok(self.runner.run(&self.invocation(command))?.stdout)
    }

    /// Returns whether a regular file exists on the host.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] when ssh cannot start.
    pub fn file_exists(&self, path: &str) -> Result<bool, CommandError> {
        match self.run(&format!("test -f {path}")) {
            Ok(_) => Ok(true),
            Err(CommandError::Failed(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Wraps `value` in single quotes for a POSIX shell, escaping embedded quotes.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Extracts the host from a bare address or URL endpoint.
fn host_of(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.contains("://")
        && let Ok(url) = Url::parse(trimmed)
        && let Some(host) = url.host_str()
    {
        return host.to_string();
    }
    trimmed.to_string()
}
