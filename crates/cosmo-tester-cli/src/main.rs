// crates/cosmo-tester-cli/src/main.rs
// ============================================================================
// Module: Cosmo Tester CLI Entry Point
// Description: Operator commands for harness configuration and manager lifecycle.
// Purpose: Check settings, query a manager, and bring managers up or down by hand.
// Dependencies: clap, cosmo-tester-config, cosmo-tester-core, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! `cosmo-tester` exposes the harness lifecycle outside a test run. `env up`
//! bootstraps a manager and leaves it running; `env down` attaches to a
//! manager by endpoint and tears it down. Settings come from the same
//! environment variables the suites read. Errors print to stderr and the
//! process exits non-zero.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use cosmo_tester_config::ConfigError;
use cosmo_tester_config::Credentials;
use cosmo_tester_config::HarnessSettings;
use cosmo_tester_config::SettingsSummary;
use cosmo_tester_config::TestConfig;
use cosmo_tester_core::HarnessError;
use cosmo_tester_core::HttpClientFactory;
use cosmo_tester_core::ManagerClientFactory;
use cosmo_tester_core::ManagerStatus;
use cosmo_tester_core::RestError;
use cosmo_tester_core::TestEnvironment;
use cosmo_tester_core::logging::DEFAULT_DIRECTIVE;
use cosmo_tester_core::logging::init_logging;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "cosmo-tester", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, value_name = "DIRECTIVE", global = true, default_value = DEFAULT_DIRECTIVE)]
    log: String,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Harness configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Manager REST utilities.
    Manager {
        /// Selected manager subcommand.
        #[command(subcommand)]
        command: ManagerCommand,
    },
    /// Manager lifecycle utilities.
    Env {
        /// Selected environment subcommand.
        #[command(subcommand)]
        command: EnvCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load settings and the test config, then print the resolved summary.
    Check,
}

/// Manager subcommands.
#[derive(Subcommand, Debug)]
enum ManagerCommand {
    /// Query the manager status endpoint.
    Status(ManagerStatusCommand),
}

/// Arguments for `manager status`.
#[derive(Args, Debug)]
struct ManagerStatusCommand {
    /// Management endpoint (IP, host or URL).
    #[arg(long, value_name = "ENDPOINT")]
    endpoint: String,
    /// Manager username.
    #[arg(long, env = "CLOUDIFY_USERNAME", requires = "password")]
    username: Option<String>,
    /// Manager password.
    #[arg(long, env = "CLOUDIFY_PASSWORD", hide_env_values = true, requires = "username")]
    password: Option<String>,
    /// Accept any manager TLS certificate.
    #[arg(long, action = ArgAction::SetTrue)]
    trust_all: bool,
}

/// Environment subcommands.
#[derive(Subcommand, Debug)]
enum EnvCommand {
    /// Bootstrap a manager, print its endpoint and leave it running.
    Up,
    /// Tear down a manager brought up earlier.
    Down(EnvDownCommand),
}

/// Arguments for `env down`.
#[derive(Args, Debug)]
struct EnvDownCommand {
    /// Management endpoint of the manager to tear down.
    #[arg(long, value_name = "ENDPOINT")]
    endpoint: String,
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Output of `config check`.
#[derive(Debug, Serialize)]
struct ConfigReport {
    /// Redacted harness settings.
    settings: SettingsSummary,
    /// Loaded test config overview.
    test_config: TestConfigReport,
}

/// Test config overview for `config check`.
#[derive(Debug, Serialize)]
struct TestConfigReport {
    /// Source file path.
    path: String,
    /// Top-level keys present in the document.
    keys: Vec<String>,
    /// Resource name prefix.
    resources_prefix: String,
    /// Whether a handler configuration block is present.
    handler_configuration: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message printed to stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        Self::new(format!("{} error: {err}", err.kind().as_str()))
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::from(HarnessError::Config(err))
    }
}

impl From<RestError> for CliError {
    fn from(err: RestError) -> Self {
        Self::from(HarnessError::Rest(err))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log);
    match run(cli.command) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(command: Commands) -> CliResult<ExitCode> {
    match command {
        Commands::Config {
            command: ConfigCommand::Check,
        } => command_config_check(),
        Commands::Manager {
            command: ManagerCommand::Status(command),
        } => command_manager_status(&command),
        Commands::Env {
            command,
        } => match command {
            EnvCommand::Up => command_env_up(),
            EnvCommand::Down(command) => command_env_down(command),
        },
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Runs `config check`.
fn command_config_check() -> CliResult<ExitCode> {
    let settings = HarnessSettings::load()?;
    let rendered = render_config_report(&settings)?;
    write_stdout(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Loads the test config named by `settings` and renders the check report.
fn render_config_report(settings: &HarnessSettings) -> CliResult<String> {
    let config = TestConfig::load(&settings.config_path)?;
    let provider = config.provider();
    let keys = match provider.to_json()? {
        serde_json::Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    let report = ConfigReport {
        settings: settings.summary(),
        test_config: TestConfigReport {
            path: config.path().display().to_string(),
            keys,
            resources_prefix: provider.resources_prefix()?.to_string(),
            handler_configuration: provider.handler_configuration().is_some(),
        },
    };
    to_pretty_json(&report)
}

// ============================================================================
// SECTION: Manager Commands
// ============================================================================

/// Runs `manager status`. Exits non-zero when the manager is not running.
fn command_manager_status(command: &ManagerStatusCommand) -> CliResult<ExitCode> {
    let credentials = match (&command.username, &command.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };
    let factory = HttpClientFactory::new(credentials, command.trust_all);
    let status = factory.connect(&command.endpoint)?.status()?;
    let (rendered, running) = render_status(&status)?;
    write_stdout(&rendered)?;
    Ok(if running { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Renders a status report and whether it counts as running.
fn render_status(status: &ManagerStatus) -> CliResult<(String, bool)> {
    Ok((to_pretty_json(status)?, status.is_running()))
}

// ============================================================================
// SECTION: Environment Commands
// ============================================================================

/// Runs `env up`.
fn command_env_up() -> CliResult<ExitCode> {
    let settings = HarnessSettings::load()?;
    let mut environment = TestEnvironment::builder(settings).build()?;
    if let Err(err) = environment.bootstrap() {
        if let Err(close_err) = environment.close() {
            warn!(error = %close_err, "failed to release environment after bootstrap failure");
        }
        return Err(err.into());
    }
    let endpoint = environment.detach()?;
    write_stdout(&endpoint)?;
    Ok(ExitCode::SUCCESS)
}

/// Runs `env down`.
fn command_env_down(command: EnvDownCommand) -> CliResult<ExitCode> {
    let mut settings = HarnessSettings::load()?;
    settings.management_endpoint = Some(command.endpoint);
    let mut environment = TestEnvironment::builder(settings).build()?;
    let torn_down = environment.teardown_attached();
    let closed = environment.close();
    torn_down?;
    closed?;
    info!("manager torn down");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes a value as pretty JSON.
fn to_pretty_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
