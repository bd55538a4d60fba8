// crates/cosmo-tester-core/src/cli/helper.rs
// ============================================================================
// Module: Cfy Helper
// Description: Typed manager operations on top of the CLI invoker.
// Purpose: Give environments and test cases one call per CLI operation.
// Dependencies: serde_json, serde_yaml, tracing
// ============================================================================

//! ## Overview
//! [`CfyHelper`] pairs a [`CfyInvoker`] with the [`Workdir`] its invocations
//! run in. Each method maps onto one CLI operation; inputs and workflow
//! parameters are written as fresh JSON files in the workdir and passed by
//! path. The management endpoint and provider context written by the CLI are
//! read back from `<workdir>/.cloudify/context`; SSH credentials for the
//! manager host are recorded there after `use` so `cfy ssh` and log commands
//! can reach it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use cosmo_tester_config::DEFAULT_EXECUTION_TIMEOUT;
use cosmo_tester_config::HarnessSettings;
use cosmo_tester_config::ProviderConfig;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::cli::args::CliArgs;
use crate::cli::invoker::CfyInvoker;
use crate::cli::invoker::SharedRunner;
use crate::error::HarnessError;
use crate::workdir::Workdir;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory the CLI keeps its working-directory settings in.
pub const CONTEXT_DIR: &str = ".cloudify";

/// Settings file inside [`CONTEXT_DIR`].
pub const CONTEXT_FILE: &str = "context";

/// Context keys holding the manager SSH credentials.
const CONTEXT_MANAGEMENT_USER: &str = "management_user";
/// Context key for the SSH key path.
const CONTEXT_MANAGEMENT_KEY: &str = "management_key";
/// Context key for the SSH port.
const CONTEXT_MANAGEMENT_PORT: &str = "management_port";

/// Prefix used for generated manager inputs files.
const MANAGER_INPUTS_PREFIX: &str = "manager";

/// Default bootstrap task retries.
pub const DEFAULT_TASK_RETRIES: u32 = 5;

/// Default bootstrap task retry interval in seconds.
pub const DEFAULT_TASK_RETRY_INTERVAL: u32 = 90;

// ============================================================================
// SECTION: Options
// ============================================================================

/// How the manager is bootstrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapMode {
    /// Bootstrap from a manager blueprint file.
    Blueprint(PathBuf),
    /// Bootstrap through a provider plugin and its config file.
    Provider {
        /// Provider name passed to `cfy init`.
        provider: String,
        /// Provider config file.
        config_path: PathBuf,
    },
}

/// Options for `cfy bootstrap`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools, reason = "Each flag maps to one CLI switch.")]
pub struct BootstrapOptions {
    /// Inputs file; an empty one is generated when absent.
    pub inputs_file: Option<PathBuf>,
    /// Install manager blueprint plugins.
    pub install_plugins: bool,
    /// Keep provisioned resources when bootstrap fails.
    pub keep_up_on_failure: bool,
    /// Only validate the blueprint.
    pub validate_only: bool,
    /// Reset the CLI configuration during init.
    pub reset_config: bool,
    /// Task retries passed through to the workflow.
    pub task_retries: u32,
    /// Task retry interval in seconds.
    pub task_retry_interval: u32,
    /// Verbose CLI output.
    pub verbose: bool,
    /// Debug CLI output.
    pub debug: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            inputs_file: None,
            install_plugins: true,
            keep_up_on_failure: false,
            validate_only: false,
            reset_config: false,
            task_retries: DEFAULT_TASK_RETRIES,
            task_retry_interval: DEFAULT_TASK_RETRY_INTERVAL,
            verbose: false,
            debug: false,
        }
    }
}

/// Options for `cfy teardown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownOptions {
    /// Tear down even when deployments exist.
    pub ignore_deployments: bool,
    /// Provider config file, set for provider-mode teardown.
    pub config_path: Option<PathBuf>,
    /// Verbose CLI output.
    pub verbose: bool,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            ignore_deployments: true,
            config_path: None,
            verbose: false,
        }
    }
}

/// Options shared by workflow executions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOptions {
    /// Execution timeout passed to the CLI.
    pub timeout: Duration,
    /// Stream execution logs.
    pub include_logs: bool,
    /// Verbose CLI output.
    pub verbose: bool,
    /// Workflow parameters.
    pub parameters: Option<Map<String, Value>>,
    /// Allow parameters the workflow does not declare.
    pub allow_custom_parameters: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXECUTION_TIMEOUT,
            include_logs: true,
            verbose: false,
            parameters: None,
            allow_custom_parameters: false,
        }
    }
}

impl ExecuteOptions {
    /// Returns options with the given timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the timeout as whole seconds for the CLI.
    fn timeout_secs(&self) -> i64 {
        i64::try_from(self.timeout.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Options for `cfy deployments update`.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(clippy::struct_excessive_bools, reason = "Each flag maps to one CLI switch.")]
pub struct DeploymentUpdateOptions {
    /// Blueprint file describing the updated deployment.
    pub blueprint_path: Option<PathBuf>,
    /// Blueprint archive URL or path, instead of a blueprint file.
    pub archive_location: Option<String>,
    /// Blueprint file name inside the archive.
    pub blueprint_filename: Option<String>,
    /// Deployment inputs; written to a fresh inputs file.
    pub inputs: Option<Map<String, Value>>,
    /// Custom workflow to run the update with.
    pub workflow_id: Option<String>,
    /// Skip the install of added nodes.
    pub skip_install: bool,
    /// Skip the uninstall of removed nodes.
    pub skip_uninstall: bool,
    /// Update even when another update is in progress.
    pub force: bool,
    /// Stream execution logs.
    pub include_logs: bool,
}

/// SSH credentials for the manager host, recorded in the CLI context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementCreds {
    /// SSH user.
    pub user: String,
    /// Private key path.
    pub key_path: PathBuf,
    /// SSH port.
    pub port: u16,
}

impl ManagementCreds {
    /// Reads credentials from the provider config; `None` unless both the
    /// user and the key are configured.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a value has the wrong type.
    pub fn from_provider(provider: &ProviderConfig) -> Result<Option<Self>, HarnessError> {
        let (Some(user), Some(key_path)) =
            (provider.management_user_name()?, provider.management_key_path()?)
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            user: user.to_string(),
            key_path,
            port: provider.management_port()?,
        }))
    }
}

/// Working-directory settings the CLI writes after `use` or `bootstrap`.
#[derive(Debug, Default, Deserialize)]
struct CliContext {
    /// Management endpoint.
    #[serde(default)]
    management_server: Option<String>,
    /// Provider context recorded at bootstrap.
    #[serde(default)]
    provider_context: Option<serde_yaml::Value>,
    /// SSH user for the manager host.
    #[serde(default)]
    management_user: Option<String>,
    /// SSH key path for the manager host.
    #[serde(default)]
    management_key: Option<PathBuf>,
    /// SSH port for the manager host, as a number or a string.
    #[serde(default)]
    management_port: Option<serde_yaml::Value>,
}

/// Reads a context file; `None` when it is missing or blank.
fn read_context(path: &Path) -> Result<Option<String>, HarnessError> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| HarnessError::io(format!("read {}", path.display()), err))?;
    Ok((!raw.trim().is_empty()).then_some(raw))
}

/// Parses a recorded SSH port.
fn context_port(value: &serde_yaml::Value) -> Option<u16> {
    match value {
        serde_yaml::Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
        serde_yaml::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// SECTION: Helper
// ============================================================================

/// Typed CLI operations bound to one workdir.
pub struct CfyHelper {
    /// Invoker running every operation.
    invoker: CfyInvoker,
    /// Workdir the operations run in.
    workdir: Workdir,
}

impl CfyHelper {
    /// Creates a helper from an invoker and the workdir it runs in.
    #[must_use]
    pub const fn new(invoker: CfyInvoker, workdir: Workdir) -> Self {
        Self {
            invoker,
            workdir,
        }
    }

    /// Creates a helper configured from harness settings.
    #[must_use]
    pub fn from_settings(runner: SharedRunner, settings: &HarnessSettings, workdir: Workdir) -> Self {
        let invoker = CfyInvoker::new(
            runner,
            settings.cfy_executable.clone(),
            workdir.path(),
            settings.credentials.as_ref(),
            settings.trust_all,
        );
        Self::new(invoker, workdir)
    }

    /// Returns the workdir.
    #[must_use]
    pub const fn workdir(&self) -> &Workdir {
        &self.workdir
    }

    /// Returns the underlying invoker.
    #[must_use]
    pub const fn invoker(&self) -> &CfyInvoker {
        &self.invoker
    }

    /// Deletes the workdir when the helper owns it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when removal fails.
    pub fn close(self) -> Result<(), HarnessError> {
        self.workdir.close()
    }

    /// Runs one operation and returns its standard output.
    fn run(&self, operation: &str, args: &CliArgs) -> Result<String, HarnessError> {
        Ok(self.invoker.invoke(operation, args)?.stdout)
    }

    /// Runs one operation and discards its output.
    fn exec(&self, operation: &str, args: &CliArgs) -> Result<(), HarnessError> {
        self.run(operation, args).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Manager lifecycle
    // ------------------------------------------------------------------------

    /// Initializes the CLI working directory.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn init(&self, reset_config: bool) -> Result<(), HarnessError> {
        self.exec("init", &CliArgs::new().arg("reset_config", reset_config))
    }

    /// Bootstraps a manager and blocks until the CLI exits.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when init, input generation or bootstrap fails.
    pub fn bootstrap(
        &self,
        mode: &BootstrapMode,
        options: &BootstrapOptions,
    ) -> Result<(), HarnessError> {
        match mode {
            BootstrapMode::Blueprint(blueprint_path) => {
                self.init(options.reset_config)?;
                let inputs = match &options.inputs_file {
                    Some(path) => path.clone(),
                    None => self.workdir.write_inputs(MANAGER_INPUTS_PREFIX, None)?,
                };
                let args = CliArgs::new()
                    .arg("blueprint_path", blueprint_path)
                    .arg("inputs", inputs)
                    .arg("install_plugins", options.install_plugins)
                    .arg("keep_up_on_failure", options.keep_up_on_failure)
                    .arg("validate_only", options.validate_only)
                    .arg("task_retries", options.task_retries)
                    .arg("task_retry_interval", options.task_retry_interval)
                    .arg("verbose", options.verbose)
                    .arg("debug", options.debug);
                info!(blueprint = %blueprint_path.display(), "bootstrapping manager");
                self.exec("bootstrap", &args)
            }
            BootstrapMode::Provider {
                provider,
                config_path,
            } => {
                let init = CliArgs::new()
                    .positional(provider)
                    .arg("reset_config", options.reset_config);
                self.exec("init", &init)?;
                let args = CliArgs::new()
                    .arg("provider", true)
                    .arg("config_file_path", config_path)
                    .arg("keep_up_on_failure", options.keep_up_on_failure)
                    .arg("verbose", options.verbose);
                info!(provider = %provider, "bootstrapping manager with provider");
                self.exec("bootstrap", &args)
            }
        }
    }

    /// Tears the manager down.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn teardown(&self, options: &TeardownOptions) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .optional("config_file_path", options.config_path.as_ref())
            .arg("ignore_deployments", options.ignore_deployments)
            .arg("force", true)
            .arg("verbose", options.verbose);
        self.exec("teardown", &args)
    }

    /// Points the CLI at a running manager.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn use_manager(
        &self,
        endpoint: &str,
        provider: bool,
        creds: Option<&ManagementCreds>,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("management_ip", endpoint).arg("provider", provider);
        self.exec("use", &args)?;
        self.apply_management_creds(creds);
        Ok(())
    }

    /// Records SSH credentials in the CLI context, logging failures.
    pub fn apply_management_creds(&self, creds: Option<&ManagementCreds>) {
        let Some(creds) = creds else {
            return;
        };
        if let Err(err) = self.set_management_creds(creds) {
            warn!(error = %err, "failed to record management credentials; cli ssh actions will fail");
        }
    }

    /// Upgrades the manager from a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn upgrade(
        &self,
        blueprint_path: &Path,
        inputs_file: Option<&Path>,
        validate_only: bool,
        install_plugins: bool,
    ) -> Result<(), HarnessError> {
        let inputs = self.manager_inputs(inputs_file)?;
        let args = CliArgs::new()
            .arg("blueprint_path", blueprint_path)
            .arg("inputs", inputs)
            .arg("validate_only", validate_only)
            .arg("install_plugins", install_plugins);
        self.exec("upgrade", &args)
    }

    /// Rolls the manager back to its previous version.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn rollback(
        &self,
        blueprint_path: &Path,
        inputs_file: Option<&Path>,
    ) -> Result<(), HarnessError> {
        let inputs = self.manager_inputs(inputs_file)?;
        let args = CliArgs::new().arg("blueprint_path", blueprint_path).arg("inputs", inputs);
        self.exec("rollback", &args)
    }

    /// Recovers a manager from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn recover(&self, snapshot_path: &Path, task_retries: u32) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("force", true)
            .arg("task_retries", task_retries)
            .arg("snapshot_path", snapshot_path);
        self.exec("recover", &args)
    }

    /// Returns the given inputs file or a freshly generated empty one.
    fn manager_inputs(&self, inputs_file: Option<&Path>) -> Result<PathBuf, HarnessError> {
        match inputs_file {
            Some(path) => Ok(path.to_path_buf()),
            None => self.workdir.write_inputs(MANAGER_INPUTS_PREFIX, None),
        }
    }

    // ------------------------------------------------------------------------
    // Deployments and workflows
    // ------------------------------------------------------------------------

    /// Uploads a blueprint, creates a deployment and runs install.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn install(
        &self,
        blueprint_path: &Path,
        blueprint_id: &str,
        deployment_id: &str,
        inputs: Option<&Map<String, Value>>,
        options: &ExecuteOptions,
    ) -> Result<(), HarnessError> {
        let inputs_file = self.workdir.write_inputs(deployment_id, inputs)?;
        let args = CliArgs::new()
            .arg("blueprint_path", blueprint_path)
            .arg("blueprint_id", blueprint_id)
            .arg("deployment_id", deployment_id)
            .arg("inputs", inputs_file)
            .arg("timeout", options.timeout_secs())
            .arg("include_logs", options.include_logs)
            .arg("verbose", options.verbose);
        self.exec("install", &args)
    }

    /// Runs the uninstall command for a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn uninstall(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        options: &ExecuteOptions,
    ) -> Result<(), HarnessError> {
        let parameters = self.workdir.write_parameters(workflow_id, options.parameters.as_ref())?;
        let args = CliArgs::new()
            .arg("deployment_id", deployment_id)
            .arg("workflow", workflow_id)
            .arg("parameters", parameters)
            .arg("allow_custom_parameters", options.allow_custom_parameters)
            .arg("timeout", options.timeout_secs())
            .arg("include_logs", options.include_logs);
        self.exec("uninstall", &args)
    }

    /// Starts a workflow execution and waits for the CLI to return.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn execute_workflow(
        &self,
        workflow: &str,
        deployment_id: &str,
        options: &ExecuteOptions,
    ) -> Result<(), HarnessError> {
        let parameters = self.workdir.write_parameters(workflow, options.parameters.as_ref())?;
        let args = CliArgs::new()
            .arg("workflow", workflow)
            .arg("deployment_id", deployment_id)
            .arg("timeout", options.timeout_secs())
            .arg("verbose", options.verbose)
            .arg("include_logs", options.include_logs)
            .arg("parameters", parameters)
            .arg("allow_custom_parameters", options.allow_custom_parameters);
        self.exec("executions start", &args)
    }

    /// Runs the install workflow on an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn execute_install(
        &self,
        deployment_id: &str,
        options: &ExecuteOptions,
    ) -> Result<(), HarnessError> {
        self.execute_workflow("install", deployment_id, options)
    }

    /// Runs the uninstall workflow on an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn execute_uninstall(
        &self,
        deployment_id: &str,
        options: &ExecuteOptions,
    ) -> Result<(), HarnessError> {
        self.execute_workflow("uninstall", deployment_id, options)
    }

    /// Shows one execution.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn get_execution(&self, execution_id: &str, verbose: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("execution_id", execution_id).arg("verbose", verbose);
        self.exec("executions get", &args)
    }

    /// Cancels one execution.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn cancel_execution(&self, execution_id: &str, verbose: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("execution_id", execution_id).arg("verbose", verbose);
        self.exec("executions cancel", &args)
    }

    /// Lists executions.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn list_executions(&self, verbose: bool) -> Result<(), HarnessError> {
        self.exec("executions list", &CliArgs::new().arg("verbose", verbose))
    }

    /// Lists the events of an execution and returns the trimmed output.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn list_events(
        &self,
        execution_id: &str,
        include_logs: bool,
        verbosity: Option<&str>,
    ) -> Result<String, HarnessError> {
        let mut args = CliArgs::new()
            .arg("execution_id", execution_id)
            .arg("include_logs", include_logs);
        if let Some(verbosity) = verbosity {
            args = args.positional(verbosity);
        }
        Ok(self.run("events list", &args)?.trim().to_string())
    }

    /// Installs agents for one or all deployments.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn install_agents(
        &self,
        deployment_id: Option<&str>,
        include_logs: bool,
        install_script: Option<&str>,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("include_logs", include_logs)
            .optional("deployment_id", deployment_id)
            .optional("install_script", install_script);
        self.exec("agents install", &args)
    }

    // ------------------------------------------------------------------------
    // Blueprints
    // ------------------------------------------------------------------------

    /// Uploads a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn upload_blueprint(
        &self,
        blueprint_id: &str,
        blueprint_path: &Path,
        verbose: bool,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("blueprint_path", blueprint_path)
            .arg("blueprint_id", blueprint_id)
            .arg("verbose", verbose);
        self.exec("blueprints upload", &args)
    }

    /// Publishes a blueprint archive by URL or path.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn publish_archive(
        &self,
        blueprint_id: &str,
        archive_location: &str,
        verbose: bool,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("blueprint_id", blueprint_id)
            .arg("archive_location", archive_location)
            .arg("blueprint_filename", "blueprint.yaml")
            .arg("verbose", verbose);
        self.exec("blueprints publish-archive", &args)
    }

    /// Deletes a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn delete_blueprint(&self, blueprint_id: &str, verbose: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("blueprint_id", blueprint_id).arg("verbose", verbose);
        self.exec("blueprints delete", &args)
    }

    /// Lists blueprints.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn list_blueprints(&self, verbose: bool) -> Result<(), HarnessError> {
        self.exec("blueprints list", &CliArgs::new().arg("verbose", verbose))
    }

    /// Shows one blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn get_blueprint(&self, blueprint_id: &str, verbose: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("blueprint_id", blueprint_id).arg("verbose", verbose);
        self.exec("blueprints get", &args)
    }

    /// Downloads a blueprint archive into the workdir.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn download_blueprint(&self, blueprint_id: &str) -> Result<(), HarnessError> {
        self.exec("blueprints download", &CliArgs::new().arg("blueprint_id", blueprint_id))
    }

    // ------------------------------------------------------------------------
    // Deployments
    // ------------------------------------------------------------------------

    /// Creates a deployment from an uploaded blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn create_deployment(
        &self,
        blueprint_id: &str,
        deployment_id: &str,
        inputs: Option<&Map<String, Value>>,
        verbose: bool,
    ) -> Result<(), HarnessError> {
        let inputs_file = self.workdir.write_inputs(deployment_id, inputs)?;
        let args = CliArgs::new()
            .arg("blueprint_id", blueprint_id)
            .arg("deployment_id", deployment_id)
            .arg("verbose", verbose)
            .arg("inputs", inputs_file);
        self.exec("deployments create", &args)
    }

    /// Deletes a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn delete_deployment(
        &self,
        deployment_id: &str,
        ignore_live_nodes: bool,
        verbose: bool,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("deployment_id", deployment_id)
            .arg("ignore_live_nodes", ignore_live_nodes)
            .arg("verbose", verbose);
        self.exec("deployments delete", &args)
    }

    /// Lists deployments.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn list_deployments(&self, verbose: bool) -> Result<(), HarnessError> {
        self.exec("deployments list", &CliArgs::new().arg("verbose", verbose))
    }

    /// Shows one deployment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn get_deployment(&self, deployment_id: &str, verbose: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("deployment_id", deployment_id).arg("verbose", verbose);
        self.exec("deployments get", &args)
    }

    /// Updates a deployment to a new blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when input generation or the CLI fails.
    pub fn update_deployment(
        &self,
        deployment_id: &str,
        options: &DeploymentUpdateOptions,
    ) -> Result<(), HarnessError> {
        let inputs_file = match &options.inputs {
            Some(inputs) => Some(self.workdir.write_inputs(deployment_id, Some(inputs))?),
            None => None,
        };
        let args = CliArgs::new()
            .arg("deployment_id", deployment_id)
            .optional("blueprint_path", options.blueprint_path.as_ref())
            .optional("archive_location", options.archive_location.as_ref())
            .optional("blueprint_filename", options.blueprint_filename.as_ref())
            .optional("inputs", inputs_file)
            .optional("workflow_id", options.workflow_id.as_ref())
            .arg("skip_install", options.skip_install)
            .arg("skip_uninstall", options.skip_uninstall)
            .arg("force", options.force)
            .arg("include_logs", options.include_logs);
        self.exec("deployments update", &args)
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Creates a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn create_snapshot(
        &self,
        snapshot_id: &str,
        include_metrics: bool,
        exclude_credentials: bool,
    ) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("snapshot_id", snapshot_id)
            .arg("include_metrics", include_metrics)
            .arg("exclude_credentials", exclude_credentials);
        self.exec("snapshots create", &args)
    }

    /// Uploads a snapshot archive.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn upload_snapshot(&self, snapshot_id: &str, path: &Path) -> Result<(), HarnessError> {
        self.exec("snapshots upload", &CliArgs::new().arg("s", snapshot_id).arg("p", path))
    }

    /// Downloads a snapshot archive.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn download_snapshot(&self, snapshot_id: &str, output: &Path) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("snapshot_id", snapshot_id).arg("output", output);
        self.exec("snapshots download", &args)
    }

    /// Restores a snapshot onto the current manager.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn restore_snapshot(&self, snapshot_id: &str) -> Result<(), HarnessError> {
        self.exec("snapshots restore", &CliArgs::new().arg("s", snapshot_id))
    }

    // ------------------------------------------------------------------------
    // Plugins, logs and ssh
    // ------------------------------------------------------------------------

    /// Uploads a plugin archive.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn upload_plugin(&self, archive: &Path) -> Result<(), HarnessError> {
        self.exec("plugins upload", &CliArgs::new().arg("p", archive).arg("verbose", true))
    }

    /// Downloads a plugin archive.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn download_plugin(&self, plugin_id: &str, output: &Path) -> Result<(), HarnessError> {
        let args = CliArgs::new().arg("plugin_id", plugin_id).arg("output", output);
        self.exec("plugins download", &args)
    }

    /// Installs blueprint plugins into the local CLI environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn install_plugins_locally(&self, blueprint_path: &Path) -> Result<(), HarnessError> {
        self.exec("local install-plugins", &CliArgs::new().arg("blueprint_path", blueprint_path))
    }

    /// Downloads manager logs.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn download_logs(&self, output: &Path) -> Result<(), HarnessError> {
        self.exec("logs download", &CliArgs::new().arg("output", output).arg("verbose", true))
    }

    /// Purges manager logs.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn purge_logs(&self, force: bool, backup_first: bool) -> Result<(), HarnessError> {
        let args = CliArgs::new()
            .arg("force", force)
            .arg("backup_first", backup_first)
            .arg("verbose", true);
        self.exec("logs purge", &args)
    }

    /// Backs up manager logs on the manager host.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn backup_logs(&self) -> Result<(), HarnessError> {
        self.exec("logs backup", &CliArgs::new().arg("verbose", true))
    }

    /// Lists ssh sessions known to the CLI.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn ssh_list(&self) -> Result<String, HarnessError> {
        self.run("ssh", &CliArgs::new().arg("list", true))
    }

    /// Runs a command on the manager through the CLI.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn ssh_run_command(&self, command: &str) -> Result<String, HarnessError> {
        self.run("ssh", &CliArgs::new().arg("command", command))
    }

    // ------------------------------------------------------------------------
    // Maintenance mode
    // ------------------------------------------------------------------------

    /// Activates (waiting for completion) or deactivates maintenance mode.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the CLI fails.
    pub fn set_maintenance_mode(&self, activate: bool) -> Result<(), HarnessError> {
        if activate {
            self.exec("maintenance-mode activate", &CliArgs::new().arg("wait", true))
        } else {
            self.exec("maintenance-mode deactivate", &CliArgs::new())
        }
    }

    /// Runs `body` with maintenance mode active and always deactivates it.
    ///
    /// The body's error wins over a deactivation error.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when activation, the body or deactivation
    /// fails.
    pub fn with_maintenance_mode<T, F>(&self, body: F) -> Result<T, HarnessError>
    where
        F: FnOnce(&Self) -> Result<T, HarnessError>,
    {
        self.set_maintenance_mode(true)?;
        let outcome = body(self);
        let deactivated = self.set_maintenance_mode(false);
        match (outcome, deactivated) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(deactivate_err)) => {
                warn!(error = %deactivate_err, "failed to deactivate maintenance mode");
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Working-directory context
    // ------------------------------------------------------------------------

    /// Returns the management endpoint recorded by the CLI, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the context file cannot be read or parsed.
    pub fn management_endpoint(&self) -> Result<Option<String>, HarnessError> {
        Ok(self.load_context()?.management_server)
    }

    /// Returns the provider context recorded at bootstrap (`null` when absent).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the context cannot be read or converted.
    pub fn provider_context(&self) -> Result<Value, HarnessError> {
        match self.load_context()?.provider_context {
            Some(context) => {
                serde_json::to_value(context).map_err(|err| HarnessError::Serialization {
                    context: "convert provider context".to_string(),
                    detail: err.to_string(),
                })
            }
            None => Ok(Value::Null),
        }
    }

    /// Returns the SSH credentials recorded in the CLI context, if complete.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the context file cannot be read or parsed.
    pub fn management_creds(&self) -> Result<Option<ManagementCreds>, HarnessError> {
        let context = self.load_context()?;
        let port = context.management_port.as_ref().and_then(context_port);
        let (Some(user), Some(key_path), Some(port)) =
            (context.management_user, context.management_key, port)
        else {
            return Ok(None);
        };
        Ok(Some(ManagementCreds {
            user,
            key_path,
            port,
        }))
    }

    /// Writes SSH credentials into `<workdir>/.cloudify/context`, keeping the
    /// other settings.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the context cannot be read, parsed or
    /// written.
    pub fn set_management_creds(&self, creds: &ManagementCreds) -> Result<(), HarnessError> {
        let dir = self.workdir.path().join(CONTEXT_DIR);
        let path = dir.join(CONTEXT_FILE);
        let mut settings = match read_context(&path)? {
            Some(raw) => serde_yaml::from_str::<serde_yaml::Mapping>(&raw).map_err(|err| {
                HarnessError::Serialization {
                    context: format!("parse {}", path.display()),
                    detail: err.to_string(),
                }
            })?,
            None => serde_yaml::Mapping::new(),
        };
        settings.insert(CONTEXT_MANAGEMENT_USER.into(), creds.user.as_str().into());
        settings.insert(
            CONTEXT_MANAGEMENT_KEY.into(),
            creds.key_path.display().to_string().into(),
        );
        settings.insert(
            CONTEXT_MANAGEMENT_PORT.into(),
            serde_yaml::Value::Number(serde_yaml::Number::from(creds.port)),
        );
        let rendered = serde_yaml::to_string(&settings).map_err(|err| HarnessError::Serialization {
            context: format!("render {}", path.display()),
            detail: err.to_string(),
        })?;
        fs::create_dir_all(&dir)
            .map_err(|err| HarnessError::io(format!("create {}", dir.display()), err))?;
        fs::write(&path, rendered)
            .map_err(|err| HarnessError::io(format!("write {}", path.display()), err))
    }

    /// Loads `<workdir>/.cloudify/context`; a missing file is an empty context.
    fn load_context(&self) -> Result<CliContext, HarnessError> {
        let path = self.workdir.path().join(CONTEXT_DIR).join(CONTEXT_FILE);
        let Some(raw) = read_context(&path)? else {
            return Ok(CliContext::default());
        };
        serde_yaml::from_str(&raw).map_err(|err| HarnessError::Serialization {
            context: format!("parse {}", path.display()),
            detail: err.to_string(),
        })
    }
}
