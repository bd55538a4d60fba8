// crates/cosmo-tester-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Fakes at the runner, REST and provider seams.
// Purpose: Exercise lifecycle code without a real manager or CLI.
// Dependencies: cosmo-tester-config, cosmo-tester-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Shared fakes: a recording [`CommandRunner`] that writes the CLI context
//! file on bootstrap, an in-memory [`ManagerClient`] with scripted execution
//! statuses, and a provider handler that records its hooks.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures fail loudly on setup errors."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use cosmo_tester_config::HarnessSettings;
use cosmo_tester_config::ProviderConfig;
use cosmo_tester_core::CleanupContext;
use cosmo_tester_core::CleanupMessage;
use cosmo_tester_core::CommandError;
use cosmo_tester_core::CommandExecutionError;
use cosmo_tester_core::CommandOutput;
use cosmo_tester_core::CommandRunner;
use cosmo_tester_core::Execution;
use cosmo_tester_core::HarnessError;
use cosmo_tester_core::Invocation;
use cosmo_tester_core::ManagerClient;
use cosmo_tester_core::ManagerClientFactory;
use cosmo_tester_core::ManagerStatus;
use cosmo_tester_core::ProviderHandler;
use cosmo_tester_core::RestError;
use cosmo_tester_core::SharedClient;
use cosmo_tester_core::Snapshot;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Endpoint written by the fake bootstrap.
pub const FAKE_ENDPOINT: &str = "10.0.0.5";

/// Minimal test config.
pub const SAMPLE_CONFIG: &str = "resources_prefix: systest\nkeystone_username: admin\n";

/// Writes the sample config and a blueprints dir under `root`.
pub fn write_fixture(root: &Path) -> PathBuf {
    let config = root.join("config.yaml");
    fs::write(&config, SAMPLE_CONFIG).unwrap();
    fs::create_dir_all(root.join("blueprints")).unwrap();
    config
}

/// Returns blueprint-mode settings for a config under `root`.
pub fn settings(root: &Path, config_path: PathBuf) -> HarnessSettings {
    HarnessSettings {
        config_path,
        manager_blueprints_dir: Some(root.join("blueprints")),
        management_endpoint: None,
        handler: "recording".to_string(),
        bootstrap_using_providers: false,
        install_plugins: true,
        cfy_executable: PathBuf::from("cfy"),
        execution_timeout: Duration::from_secs(5),
        credentials: None,
        trust_all: false,
    }
}

// ============================================================================
// SECTION: Command Runner
// ============================================================================

/// Records invocations; `bootstrap` writes the CLI context file.
#[derive(Default)]
pub struct RecordingRunner {
    /// Recorded invocations.
    calls: Mutex<Vec<Invocation>>,
    /// Leading subcommand that fails.
    fail_on: Mutex<Option<String>>,
}

impl RecordingRunner {
    /// Creates a shared runner.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes invocations whose first token is `subcommand` fail.
    pub fn fail_on(&self, subcommand: &str) {
        *self.fail_on.lock().unwrap() = Some(subcommand.to_string());
    }

    /// Returns recorded invocations.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the leading subcommand of each recorded invocation.
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| {
                call.args
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .take_while(|arg| !arg.starts_with('-'))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    /// Counts invocations whose leading subcommand equals `subcommand`.
    pub fn count(&self, subcommand: &str) -> usize {
        self.subcommands().iter().filter(|call| *call == subcommand).count()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let first = invocation.args.first().map(|arg| arg.to_string_lossy().into_owned());
        if first.is_some() && first == *self.fail_on.lock().unwrap() {
            return Err(CommandError::Failed(CommandExecutionError {
                command: invocation.command_line(),
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            }));
        }
        if first.as_deref() == Some("bootstrap") {
            let context_dir = invocation.cwd.join(".cloudify");
            fs::create_dir_all(&context_dir).unwrap();
            fs::write(
                context_dir.join("context"),
                format!(
                    "management_server: {FAKE_ENDPOINT}\nprovider_context:\n  resources:\n    router:\n      id: r-1\n"
                ),
            )
            .unwrap();
        }
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

// ============================================================================
// SECTION: Manager Client
// ============================================================================

/// In-memory manager.
pub struct FakeManagerClient {
    /// Reported status label.
    pub status: Mutex<String>,
    /// Blueprint entities.
    pub blueprints: Mutex<Vec<Value>>,
    /// Deployment entities.
    pub deployments: Mutex<Vec<Value>>,
    /// Node instances by deployment.
    pub node_instances: Mutex<BTreeMap<String, Vec<Value>>>,
    /// Scripted execution statuses; the last one repeats.
    pub execution_statuses: Mutex<VecDeque<String>>,
    /// Number of execution probes.
    pub execution_probes: Mutex<usize>,
    /// Number of event dumps.
    pub event_queries: Mutex<usize>,
}

impl Default for FakeManagerClient {
    fn default() -> Self {
        Self {
            status: Mutex::new("running".to_string()),
            blueprints: Mutex::new(Vec::new()),
            deployments: Mutex::new(Vec::new()),
            node_instances: Mutex::new(BTreeMap::new()),
            execution_statuses: Mutex::new(VecDeque::from(["terminated".to_string()])),
            execution_probes: Mutex::new(0),
            event_queries: Mutex::new(0),
        }
    }
}

impl FakeManagerClient {
    /// Creates a shared client.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scripts the statuses returned by successive execution probes.
    pub fn script_execution(&self, statuses: &[&str]) {
        *self.execution_statuses.lock().unwrap() =
            statuses.iter().map(ToString::to_string).collect();
    }

    /// Sets the reported manager status.
    pub fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    /// Adds a blueprint.
    pub fn add_blueprint(&self, id: &str) {
        self.blueprints.lock().unwrap().push(json!({"id": id}));
    }

    /// Adds a deployment with node instances.
    pub fn add_deployment(&self, id: &str, blueprint_id: &str, nodes: &[&str]) {
        self.deployments.lock().unwrap().push(json!({"id": id, "blueprint_id": blueprint_id}));
        let instances = nodes
            .iter()
            .map(|node| json!({"id": node, "deployment_id": id, "state": "started"}))
            .collect();
        self.node_instances.lock().unwrap().insert(id.to_string(), instances);
    }

    /// Returns the execution probe count.
    pub fn probes(&self) -> usize {
        *self.execution_probes.lock().unwrap()
    }

    /// Returns the event query count.
    pub fn event_dumps(&self) -> usize {
        *self.event_queries.lock().unwrap()
    }

    fn next_status(&self) -> String {
        let mut statuses = self.execution_statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or_else(|| "pending".to_string())
        }
    }

    fn unsupported(what: &str) -> RestError {
        RestError::NotFound {
            kind: "operation",
            id: what.to_string(),
        }
    }
}

impl ManagerClient for FakeManagerClient {
    fn status(&self) -> Result<ManagerStatus, RestError> {
        Ok(ManagerStatus {
            status: self.status.lock().unwrap().clone(),
            services: Vec::new(),
        })
    }

    fn blueprints(&self) -> Result<Vec<Value>, RestError> {
        Ok(self.blueprints.lock().unwrap().clone())
    }

    fn deployments(&self) -> Result<Vec<Value>, RestError> {
        Ok(self.deployments.lock().unwrap().clone())
    }

    fn node_instances(&self, deployment_id: &str) -> Result<Vec<Value>, RestError> {
        Ok(self.node_instances.lock().unwrap().get(deployment_id).cloned().unwrap_or_default())
    }

    fn execution(&self, execution_id: &str) -> Result<Execution, RestError> {
        *self.execution_probes.lock().unwrap() += 1;
        let status = self.next_status();
        let error = if status == "failed" { "task failed".to_string() } else { String::new() };
        Ok(Execution {
            id: execution_id.to_string(),
            workflow_id: "install".to_string(),
            deployment_id: Some("dep".to_string()),
            status,
            error,
        })
    }

    fn executions(&self, _deployment_id: Option<&str>) -> Result<Vec<Execution>, RestError> {
        Ok(Vec::new())
    }

    fn start_execution(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        _parameters: &Map<String, Value>,
    ) -> Result<Execution, RestError> {
        Ok(Execution {
            id: format!("{deployment_id}-{workflow_id}"),
            workflow_id: workflow_id.to_string(),
            deployment_id: Some(deployment_id.to_string()),
            status: "pending".to_string(),
            error: String::new(),
        })
    }

    fn events(
        &self,
        _execution_id: &str,
        _batch_size: usize,
        _include_logs: bool,
    ) -> Result<Vec<Value>, RestError> {
        *self.event_queries.lock().unwrap() += 1;
        Ok(vec![json!({"message": {"text": "starting task"}})])
    }

    fn snapshot(&self, snapshot_id: &str) -> Result<Snapshot, RestError> {
        Ok(Snapshot {
            id: snapshot_id.to_string(),
            status: "created".to_string(),
            error: None,
        })
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>, RestError> {
        Ok(Vec::new())
    }

    fn create_snapshot(
        &self,
        snapshot_id: &str,
        _include_metrics: bool,
    ) -> Result<Execution, RestError> {
        Err(Self::unsupported(snapshot_id))
    }

    fn restore_snapshot(&self, snapshot_id: &str, _force: bool) -> Result<Execution, RestError> {
        Err(Self::unsupported(snapshot_id))
    }

    fn delete_snapshot(&self, _snapshot_id: &str) -> Result<(), RestError> {
        Ok(())
    }

    fn delete_deployment(
        &self,
        deployment_id: &str,
        _ignore_live_nodes: bool,
    ) -> Result<(), RestError> {
        self.deployments.lock().unwrap().retain(|entity| entity["id"] != deployment_id);
        Ok(())
    }

    fn delete_blueprint(&self, blueprint_id: &str) -> Result<(), RestError> {
        self.blueprints.lock().unwrap().retain(|entity| entity["id"] != blueprint_id);
        Ok(())
    }

    fn plugins(&self) -> Result<Vec<Value>, RestError> {
        Ok(Vec::new())
    }

    fn delete_plugin(&self, _plugin_id: &str) -> Result<(), RestError> {
        Ok(())
    }
}

/// Hands out one shared fake client and records endpoints.
pub struct FakeClientFactory {
    /// Client returned for every endpoint.
    pub client: Arc<FakeManagerClient>,
    /// Endpoints connected to.
    pub connects: Mutex<Vec<String>>,
}

impl FakeClientFactory {
    /// Creates a factory over `client`.
    pub fn new(client: Arc<FakeManagerClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            connects: Mutex::new(Vec::new()),
        })
    }

    /// Returns connected endpoints.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

impl ManagerClientFactory for FakeClientFactory {
    fn connect(&self, endpoint: &str) -> Result<SharedClient, RestError> {
        self.connects.lock().unwrap().push(endpoint.to_string());
        let client: SharedClient = self.client.clone();
        Ok(client)
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Provider handler recording hook calls into a shared journal.
pub struct RecordingProvider {
    /// Hook journal shared with the test.
    pub journal: Arc<Mutex<Vec<String>>>,
    /// Fail `before_bootstrap`.
    pub fail_before_bootstrap: bool,
}

impl RecordingProvider {
    /// Creates a provider and returns it with its journal.
    pub fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(Self {
            journal: Arc::clone(&journal),
            fail_before_bootstrap: false,
        });
        (provider, journal)
    }

    /// Creates a provider whose pre-bootstrap hook fails.
    pub fn failing() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(Self {
            journal: Arc::clone(&journal),
            fail_before_bootstrap: true,
        });
        (provider, journal)
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }
}

impl ProviderHandler for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn manager_blueprint(&self) -> &str {
        "recording-manager-blueprint.yaml"
    }

    fn cleanup_context(&self, name: &str) -> CleanupContext<'static> {
        self.record(format!("cleanup_context:{name}"));
        let mut context = CleanupContext::new(name);
        let journal = Arc::clone(&self.journal);
        let label = name.to_string();
        context.register("provider resources", move || {
            journal.lock().unwrap().push(format!("cleanup:{label}"));
            Ok(())
        });
        context
    }

    fn before_bootstrap(&self, _config: &ProviderConfig) -> Result<(), HarnessError> {
        self.record("before_bootstrap");
        if self.fail_before_bootstrap {
            return Err(HarnessError::ProviderHook {
                provider: "recording".to_string(),
                hook: "before_bootstrap",
                detail: "quota exceeded".to_string(),
            });
        }
        Ok(())
    }

    fn after_bootstrap(&self, provider_context: &Value) -> Result<(), HarnessError> {
        let router = provider_context["resources"]["router"]["id"].as_str().unwrap_or("-");
        self.record(format!("after_bootstrap:{router}"));
        Ok(())
    }

    fn after_teardown(&self) -> Result<(), HarnessError> {
        self.record("after_teardown");
        Err(HarnessError::MissingContext("after teardown always fails here".to_string()))
    }
}

/// Returns a cleanup failure with `message`.
pub fn cleanup_failure(message: &str) -> Box<CleanupMessage> {
    Box::new(CleanupMessage(message.to_string()))
}

/// Returns a snapshot of a journal.
pub fn entries(journal: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    journal.lock().unwrap().clone()
}
