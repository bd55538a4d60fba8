// system-tests/tests/helpers/live.rs
// ============================================================================
// Module: Live Suite Harness
// Description: One bootstrapped manager per suite binary plus shared checks.
// Purpose: Start the environment, run cases serially and tear down on exit.
// Dependencies: system-tests, cosmo-tester-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`LiveSuite`] owns the session guard for a suite. Dropping it on any path,
//! panics included, tears the manager down. Cases run through
//! [`TestCase::run`] so per-test cleanup happens before the next case starts.

use std::error::Error;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use cosmo_tester_core::CleanupResult;
use cosmo_tester_core::EnvironmentSession;
use cosmo_tester_core::HarnessError;
use cosmo_tester_core::ManagerClient;
use cosmo_tester_core::RestError;
use cosmo_tester_core::TestCase;
use cosmo_tester_core::TestEnvironment;
use cosmo_tester_core::logging::DEFAULT_DIRECTIVE;
use cosmo_tester_core::logging::init_logging;
use serde_json::Map;
use serde_json::Value;
use system_tests::config::SystemTestConfig;
use tracing::info;
use tracing::warn;

use super::artifacts::SuiteReporter;

/// Node-instance state of an installed deployment.
pub const NODE_STARTED: &str = "started";

/// Result type for suite entry points.
pub type SuiteResult = Result<(), Box<dyn Error>>;

/// Suite-scoped environment, configuration and reporter.
pub struct LiveSuite {
    config: SystemTestConfig,
    reporter: SuiteReporter,
    session: EnvironmentSession,
}

impl LiveSuite {
    /// Loads configuration and bootstraps the suite's manager.
    pub fn start(suite: &str) -> Result<Self, Box<dyn Error>> {
        init_logging(DEFAULT_DIRECTIVE);
        let config = SystemTestConfig::load()?;
        let reporter = SuiteReporter::new(&config, suite)?;
        let session = EnvironmentSession::start(TestEnvironment::from_env()?)?;
        info!(suite, endpoint = session.management_endpoint().unwrap_or("-"), "suite started");
        Ok(Self {
            config,
            reporter,
            session,
        })
    }

    /// Returns the suite configuration.
    pub const fn config(&self) -> &SystemTestConfig {
        &self.config
    }

    /// Returns the shared environment.
    pub fn env(&self) -> &TestEnvironment {
        &self.session
    }

    /// Returns a wait timeout honoring the configured override.
    pub fn timeout(&self, requested: Duration) -> Duration {
        self.config.resolve_timeout(requested)
    }

    /// Runs one case and records its outcome.
    pub fn case<T, F>(&mut self, name: &str, body: F) -> Result<T, HarnessError>
    where
        F: FnOnce(&mut TestCase<'_>) -> Result<T, HarnessError>,
    {
        info!(case = name, "case starting");
        match TestCase::run(&self.session, name, body) {
            Ok(value) => {
                self.reporter.case_completed(name);
                Ok(value)
            }
            Err(err) => {
                self.reporter.case_failed(name, &err.to_string());
                Err(err)
            }
        }
    }

    /// Records a failure found after a case completed.
    pub fn record_failure(&mut self, name: &str, error: &dyn Error) {
        self.reporter.case_failed(name, &error.to_string());
    }

    /// Writes the summary and tears the manager down.
    pub fn finish(mut self) -> SuiteResult {
        let status = if self.reporter.has_failures() { "failed" } else { "passed" };
        if let Err(err) = self.reporter.finish(status) {
            warn!(error = %err, "failed to write suite summary");
        }
        self.session.finish()?;
        Ok(())
    }
}

/// Writes the inputs file for manager upgrade and rollback runs.
pub fn upgrade_inputs(
    case: &TestCase<'_>,
    overrides: &[(&str, &str)],
) -> Result<PathBuf, HarnessError> {
    let env = case.env();
    let endpoint = env.management_endpoint().ok_or_else(|| {
        HarnessError::MissingContext("upgrade inputs need a manager endpoint".to_string())
    })?;
    let provider = env.provider_config();
    let mut inputs = Map::new();
    inputs.insert("private_ip".to_string(), Value::from(endpoint));
    inputs.insert("public_ip".to_string(), Value::from(endpoint));
    if let Some(key) = provider.management_key_path()? {
        inputs.insert("ssh_key_filename".to_string(), Value::from(key.display().to_string()));
    }
    if let Some(user) = provider.management_user_name()? {
        inputs.insert("ssh_user".to_string(), Value::from(user));
    }
    for (key, value) in overrides {
        inputs.insert((*key).to_string(), Value::from(*value));
    }
    case.cfy()?.workdir().write_inputs("upgrade", Some(&inputs))
}

/// Runs a validation-only upgrade inside maintenance mode.
pub fn validate_upgrade(
    case: &TestCase<'_>,
    blueprint: &Path,
    overrides: &[(&str, &str)],
) -> Result<(), HarnessError> {
    let inputs = upgrade_inputs(case, overrides)?;
    case.cfy()?.with_maintenance_mode(|cfy| cfy.upgrade(blueprint, Some(&inputs), true, false))
}

/// Asserts every node instance of `deployment_id` reached `started`.
pub fn assert_deployment_started(
    client: &dyn ManagerClient,
    deployment_id: &str,
) -> Result<(), HarnessError> {
    let instances = client.node_instances(deployment_id)?;
    assert!(!instances.is_empty(), "deployment {deployment_id} has no node instances");
    for instance in &instances {
        let state = instance.get("state").and_then(Value::as_str).unwrap_or_default();
        assert_eq!(state, NODE_STARTED, "node instance of {deployment_id} not started: {instance}");
    }
    Ok(())
}

/// Asserts the manager reports `running`.
pub fn assert_manager_running(client: &dyn ManagerClient) -> Result<(), HarnessError> {
    let status = client.status()?;
    assert!(status.is_running(), "manager status is {}", status.status);
    Ok(())
}

/// Maps a delete call to a cleanup result; entities already gone count as
/// cleaned.
pub fn ignore_missing(result: Result<(), RestError>) -> CleanupResult {
    match result {
        Ok(()) | Err(RestError::NotFound { .. }) => Ok(()),
        Err(err) => Err(Box::new(err)),
    }
}
