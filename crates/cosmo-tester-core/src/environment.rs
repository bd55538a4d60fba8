// crates/cosmo-tester-core/src/environment.rs
// ============================================================================
// Module: Test Environment
// Description: Lifecycle of the one manager shared by a test run.
// Purpose: Bootstrap once, expose the manager, and tear down exactly once.
// Dependencies: cosmo-tester-config, tracing
// ============================================================================

//! ## Overview
//! [`TestEnvironment`] is an explicit context object, constructed once per run
//! and passed to test cases. Its lifecycle is a state value:
//!
//! ```text
//! Constructed --bootstrap--> Bootstrapped --teardown--> TornDown
//! Constructed --(endpoint override)--> Attached
//! ```
//!
//! Invariants:
//! - Construction validates configuration before any external call.
//! - `bootstrap` runs the external bootstrap at most once; it is a no-op once
//!   the manager is bootstrapped or attached.
//! - A failed bootstrap leaves the state `Constructed` and keeps the cleanup
//!   context, so teardown still releases what was provisioned.
//! - `teardown` is a no-op without a cleanup context. Otherwise the cleanup
//!   context, the post-teardown hook and workspace removal run even when the
//!   teardown command fails.
//! - Concurrent use is unsupported; the type is used from one thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::ops::Deref;
use std::ops::DerefMut;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use cosmo_tester_config::HarnessSettings;
use cosmo_tester_config::ProviderConfig;
use cosmo_tester_config::TestConfig;
use tracing::info;
use tracing::warn;

use crate::cleanup::CleanupContext;
use crate::cli::BootstrapMode;
use crate::cli::BootstrapOptions;
use crate::cli::CfyHelper;
use crate::cli::ExecuteOptions;
use crate::cli::ManagementCreds;
use crate::cli::ProcessRunner;
use crate::cli::SharedRunner;
use crate::cli::TeardownOptions;
use crate::diagnostics;
use crate::error::HarnessError;
use crate::provider::ProviderHandler;
use crate::provider::SharedProvider;
use crate::provider::resolve_handler;
use crate::rest::HttpClientFactory;
use crate::rest::ManagerClientFactory;
use crate::rest::SharedClient;
use crate::ssh::RemoteShell;
use crate::workdir::Workdir;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for the environment workdir.
const WORKDIR_PREFIX: &str = "cloudify-testenv-";

/// Name of the environment-level cleanup context.
const CLEANUP_CONTEXT_NAME: &str = "testenv";

/// Config copy name for provider bootstraps.
const PROVIDER_CONFIG_FILE: &str = "config.yaml";

/// Config copy name for blueprint bootstraps.
const BLUEPRINT_INPUTS_FILE: &str = "inputs.json";

// ============================================================================
// SECTION: Lifecycle State
// ============================================================================

/// Environment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Configuration loaded; no manager yet.
    Constructed,
    /// Manager bootstrapped by this environment.
    Bootstrapped,
    /// Bound to a manager that was already running.
    Attached,
    /// Torn down; no further lifecycle calls are accepted.
    TornDown,
}

impl LifecycleState {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Bootstrapped => "bootstrapped",
            Self::Attached => "attached",
            Self::TornDown => "torn down",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds a [`TestEnvironment`] with injectable collaborators.
pub struct EnvironmentBuilder {
    /// Harness settings.
    settings: HarnessSettings,
    /// Command runner; defaults to child processes.
    runner: Option<SharedRunner>,
    /// REST client factory; defaults to HTTP.
    clients: Option<Arc<dyn ManagerClientFactory>>,
    /// Provider handler; defaults to resolving `settings.handler`.
    provider: Option<SharedProvider>,
}

impl EnvironmentBuilder {
    /// Starts a builder from settings.
    #[must_use]
    pub const fn new(settings: HarnessSettings) -> Self {
        Self {
            settings,
            runner: None,
            clients: None,
            provider: None,
        }
    }

    /// Uses a specific command runner.
    #[must_use]
    pub fn runner(mut self, runner: SharedRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Uses a specific REST client factory.
    #[must_use]
    pub fn clients(mut self, clients: Arc<dyn ManagerClientFactory>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Uses a specific provider handler.
    #[must_use]
    pub fn provider(mut self, provider: SharedProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Validates configuration and constructs the environment.
    ///
    /// When a management endpoint override is set the environment attaches to
    /// that manager and verifies it is running.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the test config is missing or
    /// invalid or the handler is unknown, and REST or readiness errors when
    /// attaching fails.
    pub fn build(self) -> Result<TestEnvironment, HarnessError> {
        let config = TestConfig::load(&self.settings.config_path)?;
        let provider = match self.provider {
            Some(provider) => provider,
            None => resolve_handler(&self.settings.handler, config.provider())?,
        };
        let runner = self.runner.unwrap_or_else(|| Arc::new(ProcessRunner));
        let clients = self.clients.unwrap_or_else(|| {
            Arc::new(HttpClientFactory::new(
                self.settings.credentials.clone(),
                self.settings.trust_all,
            ))
        });

        let workdir = Workdir::create(WORKDIR_PREFIX)?;
        let file_name = if self.settings.bootstrap_using_providers {
            PROVIDER_CONFIG_FILE
        } else {
            BLUEPRINT_INPUTS_FILE
        };
        let config_copy = workdir.path().join(file_name);
        if let Err(err) = fs::write(&config_copy, config.raw()) {
            let error = HarnessError::io(format!("copy config to {}", config_copy.display()), err);
            close_quietly(workdir);
            return Err(error);
        }

        let mut environment = TestEnvironment {
            settings: self.settings,
            config,
            config_copy,
            workdir: Some(workdir),
            runner,
            clients,
            provider,
            state: LifecycleState::Constructed,
            cleanup: None,
            endpoint: None,
            client: None,
            shell: None,
        };
        if let Some(endpoint) = environment.settings.management_endpoint.clone() {
            if let Err(err) = environment.record_endpoint(&endpoint) {
                environment.close_workdir_quietly();
                return Err(err);
            }
            environment.state = LifecycleState::Attached;
            info!(endpoint = %endpoint, "attached to running manager");
        }
        Ok(environment)
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// The manager shared by one test run.
pub struct TestEnvironment {
    /// Harness settings.
    settings: HarnessSettings,
    /// Loaded test configuration.
    config: TestConfig,
    /// Private copy of the config used as bootstrap inputs.
    config_copy: PathBuf,
    /// Environment workdir; `None` once removed.
    workdir: Option<Workdir>,
    /// Command runner shared with test cases.
    runner: SharedRunner,
    /// REST client factory.
    clients: Arc<dyn ManagerClientFactory>,
    /// Provider handler.
    provider: SharedProvider,
    /// Lifecycle state.
    state: LifecycleState,
    /// Environment cleanup context; present once bootstrap started.
    cleanup: Option<CleanupContext<'static>>,
    /// Management endpoint once recorded.
    endpoint: Option<String>,
    /// REST client bound to the endpoint.
    client: Option<SharedClient>,
    /// SSH access to the manager host, when configured.
    shell: Option<RemoteShell>,
}

impl TestEnvironment {
    /// Loads settings from the process environment and builds with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for configuration faults.
    pub fn from_env() -> Result<Self, HarnessError> {
        EnvironmentBuilder::new(HarnessSettings::load()?).build()
    }

    /// Starts a builder.
    #[must_use]
    pub const fn builder(settings: HarnessSettings) -> EnvironmentBuilder {
        EnvironmentBuilder::new(settings)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the harness settings.
    #[must_use]
    pub const fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Returns the loaded test configuration.
    #[must_use]
    pub const fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Returns the provider-config accessors.
    #[must_use]
    pub const fn provider_config(&self) -> &ProviderConfig {
        self.config.provider()
    }

    /// Returns the provider handler.
    #[must_use]
    pub fn provider(&self) -> &dyn ProviderHandler {
        self.provider.as_ref()
    }

    /// Returns the shared command runner.
    #[must_use]
    pub fn runner(&self) -> SharedRunner {
        Arc::clone(&self.runner)
    }

    /// Returns the management endpoint once recorded.
    #[must_use]
    pub fn management_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the REST client bound to the manager.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingContext`] before an endpoint is recorded.
    pub fn client(&self) -> Result<SharedClient, HarnessError> {
        self.client.clone().ok_or_else(|| {
            HarnessError::MissingContext("no manager endpoint has been recorded".to_string())
        })
    }

    /// Returns SSH access to the manager host, when configured.
    #[must_use]
    pub const fn remote_shell(&self) -> Option<&RemoteShell> {
        self.shell.as_ref()
    }

    /// Returns the environment workdir while it exists.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(Workdir::path)
    }

    /// Returns the private config copy used as bootstrap inputs.
    #[must_use]
    pub fn config_copy(&self) -> &Path {
        &self.config_copy
    }

    /// Returns workflow options using the configured execution timeout.
    #[must_use]
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions::default().with_timeout(self.settings.execution_timeout)
    }

    /// Returns whether an environment cleanup context is registered.
    #[must_use]
    pub const fn has_cleanup_context(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Registers an action on the environment cleanup context.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Lifecycle`] when no cleanup context exists.
    pub fn register_cleanup<F>(&mut self, label: &str, action: F) -> Result<(), HarnessError>
    where
        F: FnOnce() -> crate::cleanup::CleanupResult + 'static,
    {
        let state = self.state.as_str();
        let cleanup = self.cleanup.as_mut().ok_or(HarnessError::Lifecycle {
            operation: "register cleanup",
            state,
        })?;
        cleanup.register(label, action);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Bootstraps the manager once.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Lifecycle`] after teardown, or the first error
    /// raised by a bootstrap step.
    pub fn bootstrap(&mut self) -> Result<(), HarnessError> {
        match self.state {
            LifecycleState::Bootstrapped | LifecycleState::Attached => return Ok(()),
            LifecycleState::TornDown => {
                return Err(HarnessError::Lifecycle {
                    operation: "bootstrap",
                    state: self.state.as_str(),
                });
            }
            LifecycleState::Constructed => {}
        }
        if self.cleanup.is_none() {
            self.cleanup = Some(self.provider.cleanup_context(CLEANUP_CONTEXT_NAME));
        }
        self.provider.before_bootstrap(self.config.provider())?;

        let cfy = self.environment_helper()?;
        let (mode, options) = self.bootstrap_plan()?;
        cfy.bootstrap(&mode, &options)?;
        cfy.apply_management_creds(ManagementCreds::from_provider(self.config.provider())?.as_ref());

        let endpoint = cfy.management_endpoint()?.ok_or_else(|| {
            HarnessError::MissingContext("bootstrap did not record a management endpoint".to_string())
        })?;
        self.record_endpoint(&endpoint)?;
        let provider_context = cfy.provider_context()?;
        self.provider.after_bootstrap(&provider_context)?;
        self.state = LifecycleState::Bootstrapped;
        info!(endpoint = %endpoint, "manager bootstrapped");
        Ok(())
    }

    /// Tears the manager down once. A no-op without a cleanup context.
    ///
    /// # Errors
    ///
    /// Returns the teardown command's error after the cleanup context, the
    /// post-teardown hook and workspace removal have run.
    pub fn teardown(&mut self) -> Result<(), HarnessError> {
        let Some(cleanup) = self.cleanup.take() else {
            return Ok(());
        };
        let primary = self.destroy_manager();
        if let Err(err) = &primary {
            warn!(error = %err, "manager teardown failed");
        }
        let report = cleanup.run();
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "environment cleanup had failures");
        }
        if let Err(err) = self.provider.after_teardown() {
            warn!(error = %err, provider = %self.provider.name(), "post-teardown hook failed");
        }
        self.close_workdir_quietly();
        self.state = LifecycleState::TornDown;
        self.endpoint = None;
        self.client = None;
        self.shell = None;
        primary
    }

    /// Tears down an attached manager the environment did not bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Lifecycle`] unless attached, or the teardown
    /// command's error.
    pub fn teardown_attached(&mut self) -> Result<(), HarnessError> {
        if self.state != LifecycleState::Attached {
            return Err(HarnessError::Lifecycle {
                operation: "tear down an attached manager",
                state: self.state.as_str(),
            });
        }
        self.cleanup = Some(self.provider.cleanup_context(CLEANUP_CONTEXT_NAME));
        self.teardown()
    }

    /// Tears down if needed and removes the workdir.
    ///
    /// # Errors
    ///
    /// Returns the teardown error, or a workdir removal error.
    pub fn close(mut self) -> Result<(), HarnessError> {
        self.shutdown()
    }

    /// Releases the environment and leaves the manager running.
    ///
    /// Pending environment cleanup actions are dismissed unrun and the
    /// workdir is removed. Returns the management endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Lifecycle`] unless bootstrapped or attached,
    /// or a workdir removal error.
    pub fn detach(mut self) -> Result<String, HarnessError> {
        let endpoint = match (self.state, self.endpoint.take()) {
            (LifecycleState::Bootstrapped | LifecycleState::Attached, Some(endpoint)) => endpoint,
            _ => {
                return Err(HarnessError::Lifecycle {
                    operation: "detach from the manager",
                    state: self.state.as_str(),
                });
            }
        };
        if let Some(cleanup) = self.cleanup.take() {
            let dismissed = cleanup.dismiss();
            if !dismissed.is_empty() {
                info!(actions = %dismissed.join(", "), "dismissed environment cleanup actions");
            }
        }
        if let Some(workdir) = self.workdir.take() {
            workdir.close()?;
        }
        info!(endpoint = %endpoint, "detached from running manager");
        Ok(endpoint)
    }

    /// Tears down if needed and removes the workdir in place.
    fn shutdown(&mut self) -> Result<(), HarnessError> {
        let torn_down = self.teardown();
        let closed = self.workdir.take().map_or(Ok(()), Workdir::close);
        torn_down.and(closed)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Returns a helper running in the environment workdir.
    fn environment_helper(&self) -> Result<CfyHelper, HarnessError> {
        let path = self.workdir().ok_or(HarnessError::Lifecycle {
            operation: "run cli operations",
            state: self.state.as_str(),
        })?;
        let workdir = Workdir::borrowed(path)?;
        Ok(CfyHelper::from_settings(Arc::clone(&self.runner), &self.settings, workdir))
    }

    /// Chooses blueprint or provider bootstrap and its options.
    fn bootstrap_plan(&self) -> Result<(BootstrapMode, BootstrapOptions), HarnessError> {
        let mut options = BootstrapOptions {
            install_plugins: self.settings.install_plugins,
            keep_up_on_failure: false,
            verbose: true,
            ..BootstrapOptions::default()
        };
        if self.settings.bootstrap_using_providers {
            let mode = BootstrapMode::Provider {
                provider: self.provider.name().to_string(),
                config_path: self.config_copy.clone(),
            };
            return Ok((mode, options));
        }
        let blueprints_dir = self.settings.manager_blueprints_dir.as_ref().ok_or_else(|| {
            HarnessError::MissingContext("manager blueprints dir is not configured".to_string())
        })?;
        options.inputs_file = Some(self.config_copy.clone());
        let blueprint = blueprints_dir.join(self.provider.manager_blueprint());
        Ok((BootstrapMode::Blueprint(blueprint), options))
    }

    /// Records the endpoint, checks readiness and starts diagnostics.
    fn record_endpoint(&mut self, endpoint: &str) -> Result<(), HarnessError> {
        let client = self.clients.connect(endpoint)?;
        let status = client.status()?;
        if !status.is_running() {
            return Err(HarnessError::ManagerNotRunning {
                endpoint: endpoint.to_string(),
                status: status.status,
            });
        }
        self.endpoint = Some(endpoint.to_string());
        self.client = Some(client);
        self.shell = RemoteShell::from_config(Arc::clone(&self.runner), endpoint, self.config.provider())?;
        if let Some(shell) = &self.shell {
            diagnostics::best_effort("start resource monitor", diagnostics::start_resource_monitor(shell));
        }
        Ok(())
    }

    /// Runs diagnostics upload, `cfy use` and `cfy teardown`.
    fn destroy_manager(&self) -> Result<(), HarnessError> {
        if let Some(shell) = &self.shell {
            let upload_url = match self.config.provider().diagnostics_upload_url() {
                Ok(url) => url,
                Err(err) => {
                    warn!(error = %err, "ignoring invalid diagnostics upload url");
                    None
                }
            };
            diagnostics::best_effort(
                "upload resource monitor",
                diagnostics::upload_resource_monitor(shell, upload_url),
            );
        }
        let cfy = self.environment_helper()?;
        let provider_mode = self.settings.bootstrap_using_providers;
        if let Some(endpoint) = &self.endpoint {
            let creds = ManagementCreds::from_provider(self.config.provider())?;
            cfy.use_manager(endpoint, provider_mode, creds.as_ref())?;
        }
        let options = TeardownOptions {
            config_path: provider_mode.then(|| self.config_copy.clone()),
            verbose: true,
            ..TeardownOptions::default()
        };
        info!(endpoint = self.endpoint.as_deref().unwrap_or("-"), "tearing down manager");
        cfy.teardown(&options)
    }

    /// Removes the workdir, logging failures.
    fn close_workdir_quietly(&mut self) {
        if let Some(workdir) = self.workdir.take() {
            close_quietly(workdir);
        }
    }
}

/// Removes a workdir, logging failures.
fn close_quietly(workdir: Workdir) {
    let path = workdir.path().display().to_string();
    if let Err(err) = workdir.close() {
        warn!(workdir = %path, error = %err, "failed to remove workdir");
    }
}

// ============================================================================
// SECTION: Session Guard
// ============================================================================

/// Owns an environment for a run and tears it down when dropped.
pub struct EnvironmentSession {
    /// Guarded environment.
    environment: TestEnvironment,
    /// Set once the environment has been closed.
    finished: bool,
}

impl EnvironmentSession {
    /// Wraps an environment.
    #[must_use]
    pub const fn new(environment: TestEnvironment) -> Self {
        Self {
            environment,
            finished: false,
        }
    }

    /// Wraps and bootstraps an environment.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error. What was provisioned is torn down when
    /// the session drops on the error path.
    pub fn start(environment: TestEnvironment) -> Result<Self, HarnessError> {
        let mut session = Self::new(environment);
        session.environment.bootstrap()?;
        Ok(session)
    }

    /// Tears down and closes the environment explicitly.
    ///
    /// # Errors
    ///
    /// Returns the teardown or workdir removal error.
    pub fn finish(mut self) -> Result<(), HarnessError> {
        self.finished = true;
        self.environment.shutdown()
    }
}

impl Deref for EnvironmentSession {
    type Target = TestEnvironment;

    fn deref(&self) -> &TestEnvironment {
        &self.environment
    }
}

impl DerefMut for EnvironmentSession {
    fn deref_mut(&mut self) -> &mut TestEnvironment {
        &mut self.environment
    }
}

impl Drop for EnvironmentSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(err) = self.environment.shutdown() {
            warn!(error = %err, "environment teardown failed");
        }
    }
}
