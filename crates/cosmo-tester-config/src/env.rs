// crates/cosmo-tester-config/src/env.rs
// ============================================================================
// Module: Harness Environment Settings
// Description: Environment-backed settings for the manager test harness.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed. Parsing goes through an
//! injectable lookup so callers can resolve settings from any source; the
//! process environment is only one of them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Provider handler used when none is configured.
pub const DEFAULT_HANDLER: &str = "openstack";

/// CLI executable used when none is configured.
pub const DEFAULT_CFY_EXECUTABLE: &str = "cfy";

/// Default wall-clock budget for execution waits.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(1800);

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Path to the YAML test-config file (required).
    ConfigPath,
    /// Directory holding manager blueprints (required unless provider bootstrap).
    ManagerBlueprintsDir,
    /// Endpoint of an already running manager; skips bootstrap.
    ManagementIp,
    /// Provider handler name.
    HandlerModule,
    /// Bootstrap through the provider flow instead of a manager blueprint.
    BootstrapUsingProviders,
    /// Install manager blueprint plugins during bootstrap.
    InstallManagerBlueprintDependencies,
    /// CLI executable override.
    CfyExecutable,
    /// Execution wait timeout in seconds (positive integer).
    TimeoutSeconds,
    /// Manager username baked into CLI invocations.
    Username,
    /// Manager password baked into CLI invocations.
    Password,
    /// Trust any manager TLS certificate.
    SslTrustAll,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "CLOUDIFY_TEST_CONFIG_PATH",
            Self::ManagerBlueprintsDir => "MANAGER_BLUEPRINTS_DIR",
            Self::ManagementIp => "CLOUDIFY_TEST_MANAGEMENT_IP",
            Self::HandlerModule => "CLOUDIFY_TEST_HANDLER_MODULE",
            Self::BootstrapUsingProviders => "BOOTSTRAP_USING_PROVIDERS",
            Self::InstallManagerBlueprintDependencies => "INSTALL_MANAGER_BLUEPRINT_DEPENDENCIES",
            Self::CfyExecutable => "CLOUDIFY_TEST_CFY_EXECUTABLE",
            Self::TimeoutSeconds => "CLOUDIFY_TEST_TIMEOUT_SEC",
            Self::Username => "CLOUDIFY_USERNAME",
            Self::Password => "CLOUDIFY_PASSWORD",
            Self::SslTrustAll => "CLOUDIFY_SSL_TRUST_ALL",
        }
    }
}

// ============================================================================
// SECTION: Settings Types
// ============================================================================

/// Manager credentials baked into CLI and REST calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Manager username.
    pub username: String,
    /// Manager password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Typed harness settings derived from environment variables.
///
/// # Invariants
/// - `manager_blueprints_dir` is `Some` whenever `bootstrap_using_providers` is false.
/// - `execution_timeout` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    /// Path to the YAML test-config file.
    pub config_path: PathBuf,
    /// Directory holding manager blueprints.
    pub manager_blueprints_dir: Option<PathBuf>,
    /// Endpoint of an already running manager.
    pub management_endpoint: Option<String>,
    /// Provider handler name.
    pub handler: String,
    /// Bootstrap through the provider flow.
    pub bootstrap_using_providers: bool,
    /// Install manager blueprint plugins during bootstrap.
    pub install_plugins: bool,
    /// CLI executable.
    pub cfy_executable: PathBuf,
    /// Execution wait timeout.
    pub execution_timeout: Duration,
    /// Optional manager credentials.
    pub credentials: Option<Credentials>,
    /// Trust any manager TLS certificate.
    pub trust_all: bool,
}

impl HarnessSettings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Loads settings through the provided variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let reader = EnvReader {
            lookup,
        };
        let config_path = reader
            .nonempty(HarnessEnv::ConfigPath)?
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv {
                name: HarnessEnv::ConfigPath.as_str(),
            })?;
        let bootstrap_using_providers = reader.boolean(HarnessEnv::BootstrapUsingProviders, false)?;
        let manager_blueprints_dir =
            reader.nonempty(HarnessEnv::ManagerBlueprintsDir)?.map(PathBuf::from);
        if !bootstrap_using_providers && manager_blueprints_dir.is_none() {
            return Err(ConfigError::InvalidEnv {
                name: HarnessEnv::ManagerBlueprintsDir.as_str(),
                reason: "must be configured in order to run non-provider bootstraps".to_string(),
            });
        }
        let management_endpoint = reader.nonempty(HarnessEnv::ManagementIp)?;
        let handler = reader
            .nonempty(HarnessEnv::HandlerModule)?
            .unwrap_or_else(|| DEFAULT_HANDLER.to_string());
        let install_plugins =
            reader.boolean(HarnessEnv::InstallManagerBlueprintDependencies, true)?;
        let cfy_executable = reader
            .nonempty(HarnessEnv::CfyExecutable)?
            .map_or_else(|| PathBuf::from(DEFAULT_CFY_EXECUTABLE), PathBuf::from);
        let execution_timeout = reader
            .nonempty(HarnessEnv::TimeoutSeconds)?
            .map(|raw| parse_timeout_seconds(HarnessEnv::TimeoutSeconds.as_str(), &raw))
            .transpose()?
            .unwrap_or(DEFAULT_EXECUTION_TIMEOUT);
        let credentials = match (
            reader.nonempty(HarnessEnv::Username)?,
            reader.nonempty(HarnessEnv::Password)?,
        ) {
            (Some(username), Some(password)) => Some(Credentials {
                username,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::InvalidEnv {
                    name: HarnessEnv::Password.as_str(),
                    reason: "must be set together with CLOUDIFY_USERNAME".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidEnv {
                    name: HarnessEnv::Username.as_str(),
                    reason: "must be set together with CLOUDIFY_PASSWORD".to_string(),
                });
            }
        };
        let trust_all = reader.boolean(HarnessEnv::SslTrustAll, false)?;
        Ok(Self {
            config_path,
            manager_blueprints_dir,
            management_endpoint,
            handler,
            bootstrap_using_providers,
            install_plugins,
            cfy_executable,
            execution_timeout,
            credentials,
            trust_all,
        })
    }

    /// Returns a serializable summary with secrets removed.
    #[must_use]
    pub fn summary(&self) -> SettingsSummary {
        SettingsSummary {
            config_path: self.config_path.display().to_string(),
            manager_blueprints_dir: self
                .manager_blueprints_dir
                .as_ref()
                .map(|path| path.display().to_string()),
            management_endpoint: self.management_endpoint.clone(),
            handler: self.handler.clone(),
            bootstrap_using_providers: self.bootstrap_using_providers,
            install_plugins: self.install_plugins,
            cfy_executable: self.cfy_executable.display().to_string(),
            execution_timeout_secs: self.execution_timeout.as_secs(),
            username: self.credentials.as_ref().map(|creds| creds.username.clone()),
            trust_all: self.trust_all,
        }
    }
}

/// Redacted settings view for operator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsSummary {
    /// Test-config path.
    pub config_path: String,
    /// Manager blueprints directory.
    pub manager_blueprints_dir: Option<String>,
    /// Management endpoint override.
    pub management_endpoint: Option<String>,
    /// Provider handler name.
    pub handler: String,
    /// Provider bootstrap flag.
    pub bootstrap_using_providers: bool,
    /// Plugin installation flag.
    pub install_plugins: bool,
    /// CLI executable.
    pub cfy_executable: String,
    /// Execution wait timeout in seconds.
    pub execution_timeout_secs: u64,
    /// Username, when credentials are configured.
    pub username: Option<String>,
    /// TLS trust-all flag.
    pub trust_all: bool,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a variable from the process environment.
fn process_env(name: &str) -> Option<OsString> {
    std::env::var_os(name)
}

/// Strict reader over a variable lookup.
struct EnvReader<F> {
    /// Variable lookup.
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<OsString>,
{
    /// Reads a variable and enforces UTF-8 validity.
    fn strict(&self, key: HarnessEnv) -> Result<Option<String>, ConfigError> {
        let name = key.as_str();
        (self.lookup)(name).map_or(Ok(None), |raw| {
            raw.into_string().map(Some).map_err(|_| ConfigError::InvalidUtf8 {
                name,
            })
        })
    }

    /// Reads a variable and rejects empty values.
    fn nonempty(&self, key: HarnessEnv) -> Result<Option<String>, ConfigError> {
        match self.strict(key)? {
            Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidEnv {
                name: key.as_str(),
                reason: "must not be empty".to_string(),
            }),
            Some(value) => Ok(Some(value.trim().to_string())),
            None => Ok(None),
        }
    }

    /// Reads a boolean variable, falling back to `default` when unset.
    fn boolean(&self, key: HarnessEnv, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.nonempty(key)? else {
            return Ok(default);
        };
        if value.eq_ignore_ascii_case("true") || value == "1" {
            return Ok(true);
        }
        if value.eq_ignore_ascii_case("false") || value == "0" {
            return Ok(false);
        }
        Err(ConfigError::InvalidEnv {
            name: key.as_str(),
            reason: "must be 1, 0, true, or false".to_string(),
        })
    }
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        reason: "must be a positive integer number of seconds".to_string(),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnv {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
