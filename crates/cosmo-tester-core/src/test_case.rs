// crates/cosmo-tester-core/src/test_case.rs
// ============================================================================
// Module: Test Case
// Description: Per-test setup, helpers and guaranteed teardown.
// Purpose: Bind a fresh CLI handle to the shared manager for one test.
// Dependencies: serde_json, time, tracing
// ============================================================================

//! ## Overview
//! A [`TestCase`] borrows the shared [`TestEnvironment`], owns a fresh
//! workdir and CLI handle pointed at the manager, and a cleanup context keyed
//! by the test name.
//!
//! Invariants:
//! - The cleanup context exists before any resource-creating call, so actions
//!   registered before a failure still run.
//! - Cleanup and workdir removal run exactly once: on explicit teardown, at
//!   the end of [`TestCase::run`], or when the case is dropped (including
//!   during a panic).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::info;
use tracing::warn;

use crate::cleanup::CleanupContext;
use crate::cleanup::CleanupReport;
use crate::cleanup::CleanupResult;
use crate::cli::CfyHelper;
use crate::cli::ManagementCreds;
use crate::diagnostics;
use crate::environment::TestEnvironment;
use crate::error::HarnessError;
use crate::polling;
use crate::polling::PollPolicy;
use crate::rest::Execution;
use crate::rest::SharedClient;
use crate::state::ManagerState;
use crate::state::StateCapture;
use crate::state::fetch_manager_state;
use crate::workdir::Workdir;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for per-test workdirs.
const WORKDIR_PREFIX: &str = "cosmo-test-";

/// Blueprint file expected inside a copied blueprint directory.
const BLUEPRINT_FILE: &str = "blueprint.yaml";

/// Timestamp layout used in test ids.
const TEST_ID_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute]");

// ============================================================================
// SECTION: Test Case
// ============================================================================

/// One test bound to the shared manager.
pub struct TestCase<'env> {
    /// Shared environment.
    env: &'env TestEnvironment,
    /// Test name; also the cleanup context name.
    name: String,
    /// Default id for blueprints and deployments created by the test.
    test_id: String,
    /// CLI handle owning the per-test workdir; `None` once closed.
    cfy: Option<CfyHelper>,
    /// REST client for the manager.
    client: SharedClient,
    /// Per-test cleanup context; `None` once run.
    cleanup: Option<CleanupContext<'env>>,
    /// Blueprint used by install helpers.
    blueprint_yaml: Option<PathBuf>,
    /// Set once teardown has run.
    finished: bool,
}

impl<'env> TestCase<'env> {
    /// Sets up a test against the environment's manager.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] when the environment has no
    /// manager, or the workdir and `cfy use` errors. Resources acquired before
    /// a failure are released.
    pub fn setup(env: &'env TestEnvironment, name: &str) -> Result<Self, HarnessError> {
        let endpoint = env
            .management_endpoint()
            .ok_or_else(|| {
                HarnessError::MissingContext(format!("test {name} needs a bootstrapped manager"))
            })?
            .to_string();
        let client = env.client()?;
        let test_id = test_id_at(OffsetDateTime::now_utc())?;
        let workdir = Workdir::create(WORKDIR_PREFIX)?;
        let cfy = CfyHelper::from_settings(env.runner(), env.settings(), workdir);
        let case = Self {
            env,
            name: name.to_string(),
            test_id,
            cfy: Some(cfy),
            client,
            cleanup: Some(env.provider().cleanup_context(name)),
            blueprint_yaml: None,
            finished: false,
        };
        let creds = ManagementCreds::from_provider(env.provider_config())?;
        case.cfy()?.use_manager(
            &endpoint,
            env.settings().bootstrap_using_providers,
            creds.as_ref(),
        )?;
        info!(test = %case.name, test_id = %case.test_id, "test set up");
        Ok(case)
    }

    /// Sets up a test, runs `body` and tears down.
    ///
    /// # Errors
    ///
    /// Returns the body's error when it fails, otherwise the setup or teardown
    /// error. Cleanup runs in every case.
    pub fn run<T, F>(env: &'env TestEnvironment, name: &str, body: F) -> Result<T, HarnessError>
    where
        F: FnOnce(&mut Self) -> Result<T, HarnessError>,
    {
        let mut case = Self::setup(env, name)?;
        let outcome = body(&mut case);
        let teardown = case.teardown();
        match (outcome, teardown) {
            (Ok(value), Ok(report)) => {
                if !report.is_clean() {
                    warn!(test = name, failures = report.failures.len(), "test cleanup had failures");
                }
                Ok(value)
            }
            (Err(err), _) | (Ok(_), Err(err)) => Err(err),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns the test name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the default blueprint and deployment id.
    #[must_use]
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Returns the shared environment.
    #[must_use]
    pub const fn env(&self) -> &'env TestEnvironment {
        self.env
    }

    /// Returns the REST client.
    #[must_use]
    pub fn client(&self) -> SharedClient {
        Arc::clone(&self.client)
    }

    /// Returns the CLI handle.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] after teardown.
    pub fn cfy(&self) -> Result<&CfyHelper, HarnessError> {
        self.cfy.as_ref().ok_or_else(|| {
            HarnessError::MissingContext(format!("test {} has been torn down", self.name))
        })
    }

    /// Returns the per-test workdir.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] after teardown.
    pub fn workdir(&self) -> Result<&Path, HarnessError> {
        Ok(self.cfy()?.workdir().path())
    }

    /// Returns the blueprint used by install helpers.
    #[must_use]
    pub fn blueprint_yaml(&self) -> Option<&Path> {
        self.blueprint_yaml.as_deref()
    }

    /// Sets the blueprint used by install helpers.
    pub fn set_blueprint(&mut self, path: impl Into<PathBuf>) {
        self.blueprint_yaml = Some(path.into());
    }

    // ------------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------------

    /// Registers an action on the per-test cleanup context.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] after teardown.
    pub fn register_cleanup<F>(&mut self, label: &str, action: F) -> Result<(), HarnessError>
    where
        F: FnOnce() -> CleanupResult + 'env,
    {
        let cleanup = self.cleanup.as_mut().ok_or_else(|| {
            HarnessError::MissingContext(format!("test {} has been torn down", self.name))
        })?;
        cleanup.register(label, action);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Blueprints
    // ------------------------------------------------------------------------

    /// Copies a blueprint directory into the workdir and selects its
    /// `blueprint.yaml` for install helpers.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the copy fails.
    pub fn copy_blueprint(&mut self, source: &Path) -> Result<PathBuf, HarnessError> {
        let target = self.cfy()?.workdir().copy_tree(source)?;
        self.blueprint_yaml = Some(target.join(BLUEPRINT_FILE));
        Ok(target)
    }

    // ------------------------------------------------------------------------
    // State capture
    // ------------------------------------------------------------------------

    /// Captures the current manager state.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Rest`] when a collection query fails.
    pub fn get_manager_state(&self) -> Result<ManagerState, HarnessError> {
        fetch_manager_state(self.client.as_ref())
    }

    /// Runs `operation`, optionally capturing manager state around it.
    ///
    /// # Errors
    ///
    /// Returns the operation's error or a state query error.
    pub fn capture<F>(&self, fetch_state: bool, operation: F) -> Result<StateCapture, HarnessError>
    where
        F: FnOnce() -> Result<(), HarnessError>,
    {
        let before = fetch_state.then(|| self.get_manager_state()).transpose()?;
        operation()?;
        let after = fetch_state.then(|| self.get_manager_state()).transpose()?;
        Ok(StateCapture {
            before,
            after,
        })
    }

    // ------------------------------------------------------------------------
    // Workflows
    // ------------------------------------------------------------------------

    /// Runs install on an existing deployment (default: the test id).
    ///
    /// # Errors
    ///
    /// Returns the CLI or state query error.
    pub fn execute_install(
        &self,
        deployment_id: Option<&str>,
        fetch_state: bool,
    ) -> Result<StateCapture, HarnessError> {
        let deployment_id = deployment_id.unwrap_or(&self.test_id);
        let cfy = self.cfy()?;
        let options = self.env.execute_options();
        self.capture(fetch_state, || cfy.execute_install(deployment_id, &options))
    }

    /// Uploads the selected blueprint, creates a deployment and installs it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] when no blueprint is selected,
    /// or the CLI or state query error.
    pub fn upload_deploy_and_execute_install(
        &self,
        blueprint_id: Option<&str>,
        deployment_id: Option<&str>,
        fetch_state: bool,
        inputs: Option<&Map<String, Value>>,
    ) -> Result<StateCapture, HarnessError> {
        let blueprint = self.blueprint_yaml.as_deref().ok_or_else(|| {
            HarnessError::MissingContext(format!("test {} has no blueprint selected", self.name))
        })?;
        let blueprint_id = blueprint_id.unwrap_or(&self.test_id);
        let deployment_id = deployment_id.unwrap_or(&self.test_id);
        let cfy = self.cfy()?;
        let options = self.env.execute_options();
        self.capture(fetch_state, || {
            cfy.install(blueprint, blueprint_id, deployment_id, inputs, &options)
        })
    }

    /// Runs uninstall on a deployment (default: the test id).
    ///
    /// # Errors
    ///
    /// Returns the CLI or state query error.
    pub fn execute_uninstall(
        &self,
        deployment_id: Option<&str>,
        fetch_state: bool,
    ) -> Result<StateCapture, HarnessError> {
        let deployment_id = deployment_id.unwrap_or(&self.test_id);
        let cfy = self.cfy()?;
        let options = self.env.execute_options();
        self.capture(fetch_state, || cfy.execute_uninstall(deployment_id, &options))
    }

    /// Waits for an execution to terminate.
    ///
    /// # Errors
    ///
    /// Returns the wait error for failed, cancelled or timed-out executions.
    pub fn wait_for_execution(
        &self,
        execution: &Execution,
        timeout: Duration,
    ) -> Result<Execution, HarnessError> {
        polling::wait_for_execution(self.client.as_ref(), &execution.id, PollPolicy::with_timeout(timeout))
    }

    /// Retries `attempt` until it succeeds or `timeout` passes.
    ///
    /// # Errors
    ///
    /// Returns the last error after the deadline.
    pub fn repetitive<T, E, F>(&self, timeout: Duration, attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        polling::repetitive(PollPolicy::with_timeout(timeout), attempt)
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Runs the cleanup context and removes the workdir.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the workdir cannot be removed.
    /// Cleanup action failures are reported, not raised.
    pub fn teardown(mut self) -> Result<CleanupReport, HarnessError> {
        self.finish()
    }

    /// Shared teardown for explicit and drop paths.
    fn finish(&mut self) -> Result<CleanupReport, HarnessError> {
        self.finished = true;
        if let Some(shell) = self.env.remote_shell() {
            diagnostics::best_effort("log process table", diagnostics::log_process_table(shell));
        }
        let report = self.cleanup.take().map(CleanupContext::run).unwrap_or_default();
        if let Some(cfy) = self.cfy.take() {
            cfy.close()?;
        }
        info!(test = %self.name, actions = report.executed.len(), "test torn down");
        Ok(report)
    }
}

impl Drop for TestCase<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.finish() {
            warn!(test = %self.name, error = %err, "test teardown failed");
        }
    }
}

/// Formats a `system-test-YYYYMMDD-HHMM` id, stamped in UTC.
pub(crate) fn test_id_at(now: OffsetDateTime) -> Result<String, HarnessError> {
    let stamp = now.to_offset(UtcOffset::UTC).format(TEST_ID_FORMAT).map_err(|err| {
        HarnessError::Serialization {
            context: "format test id".to_string(),
            detail: err.to_string(),
        }
    })?;
    Ok(format!("system-test-{stamp}"))
}
