// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for live-manager suites.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed. Parsing goes through an
//! injectable lookup so tests never mutate the process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Directory holding suite blueprints when none is configured.
pub const DEFAULT_RESOURCES_DIR: &str = "resources";

/// Environment keys for suite configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional artifact root override.
    RunRoot,
    /// Directory holding suite blueprints (one subdirectory per blueprint).
    ResourcesDir,
    /// Manager blueprint used by upgrade and rollback suites.
    UpgradeBlueprint,
    /// Optional per-suite wait timeout override in seconds (positive integer).
    TimeoutSeconds,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "COSMO_TESTER_SYSTEM_TEST_RUN_ROOT",
            Self::ResourcesDir => "COSMO_TESTER_RESOURCES_DIR",
            Self::UpgradeBlueprint => "COSMO_TESTER_UPGRADE_BLUEPRINT",
            Self::TimeoutSeconds => "COSMO_TESTER_SYSTEM_TEST_TIMEOUT_SEC",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed suite configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Optional artifact root override.
    pub run_root: Option<PathBuf>,
    /// Directory holding suite blueprints.
    pub resources_dir: PathBuf,
    /// Manager blueprint for upgrade and rollback suites.
    pub upgrade_blueprint: Option<PathBuf>,
    /// Optional wait timeout override.
    pub timeout: Option<Duration>,
}

impl SystemTestConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, an invalid timeout).
    pub fn load() -> Result<Self, String> {
        Self::from_lookup(process_env)
    }

    /// Loads configuration through the provided variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not valid UTF-8, is empty, or fails
    /// validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let read = |key: SystemTestEnv| read_nonempty(&lookup, key.as_str());
        let run_root = read(SystemTestEnv::RunRoot)?.map(PathBuf::from);
        let resources_dir = read(SystemTestEnv::ResourcesDir)?
            .map_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR), PathBuf::from);
        let upgrade_blueprint = read(SystemTestEnv::UpgradeBlueprint)?.map(PathBuf::from);
        let timeout = read(SystemTestEnv::TimeoutSeconds)?
            .map(|value| parse_timeout_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        Ok(Self {
            run_root,
            resources_dir,
            upgrade_blueprint,
            timeout,
        })
    }

    /// Returns the directory of a named suite blueprint.
    #[must_use]
    pub fn blueprint_dir(&self, name: &str) -> PathBuf {
        self.resources_dir.join(name)
    }

    /// Returns the upgrade blueprint or an error naming the missing variable.
    ///
    /// # Errors
    ///
    /// Returns an error when no upgrade blueprint is configured.
    pub fn require_upgrade_blueprint(&self) -> Result<&PathBuf, String> {
        self.upgrade_blueprint.as_ref().ok_or_else(|| {
            format!("{} must be set for upgrade suites", SystemTestEnv::UpgradeBlueprint.as_str())
        })
    }

    /// Returns the configured timeout, or `requested` when it is longer.
    #[must_use]
    pub fn resolve_timeout(&self, requested: Duration) -> Duration {
        self.timeout.map_or(requested, |timeout| timeout.max(requested))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a variable from the process environment.
fn process_env(name: &str) -> Option<OsString> {
    std::env::var_os(name)
}

/// Reads a variable through `lookup`, rejecting invalid UTF-8 and empty values.
fn read_nonempty<F>(lookup: &F, name: &str) -> Result<Option<String>, String>
where
    F: Fn(&str) -> Option<OsString>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let value = raw.into_string().map_err(|_| format!("{name} must be valid UTF-8"))?;
    if value.trim().is_empty() {
        return Err(format!("{name} must not be empty"));
    }
    Ok(Some(value))
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
