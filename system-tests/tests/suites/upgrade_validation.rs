// system-tests/tests/suites/upgrade_validation.rs
// ============================================================================
// Module: Pre-Upgrade Validation Tests
// Description: Table-driven validation-only upgrades against a broken manager.
// Purpose: Validate each pre-upgrade check reports the fault it detects.
// Dependencies: system-tests helpers, cosmo-tester-core
// ============================================================================

//! ## Overview
//! Each row breaks one thing on the manager host over SSH, runs a
//! validation-only upgrade in maintenance mode and expects the CLI to fail
//! with a specific message. The row's restore command is registered as a
//! cleanup action before the manager is touched.

use std::time::Duration;

use cosmo_tester_core::CleanupFailure;
use cosmo_tester_core::CleanupResult;
use cosmo_tester_core::ExpectedFailure;
use cosmo_tester_core::FailureKind;
use cosmo_tester_core::HarnessError;
use cosmo_tester_core::PollPolicy;
use cosmo_tester_core::RemoteShell;
use cosmo_tester_core::expect_failure;
use cosmo_tester_core::repetitive;
use helpers::live::LiveSuite;
use helpers::live::SuiteResult;
use helpers::live::validate_upgrade;

use crate::helpers;

/// Budget for a broken service to come back after its restore command.
const RESTORE_TIMEOUT: Duration = Duration::from_secs(120);

/// Elasticsearch node properties on the manager host.
const ES_PROPERTIES: &str = "/opt/cloudify/elasticsearch/node_properties/properties.json";

/// One fault injected before a validation-only upgrade.
struct ValidationRow {
    /// Case name.
    name: &'static str,
    /// Remote command that injects the fault.
    break_command: String,
    /// Remote command that undoes the fault.
    restore_command: String,
    /// Remote command that must succeed before the fault counts as undone.
    ready_check: Option<String>,
    /// Text the validation output must contain (case-insensitive).
    expected: &'static str,
}

fn stopped_service(name: &'static str, unit: &str, display: &'static str) -> ValidationRow {
    ValidationRow {
        name,
        break_command: format!("sudo systemctl stop {unit}"),
        restore_command: format!("sudo systemctl start {unit}"),
        ready_check: Some(format!("sudo systemctl status {unit}")),
        expected: display,
    }
}

fn moved_node_directories(name: &'static str, node: &str, expected: &'static str) -> ValidationRow {
    let base = format!("/opt/cloudify/{node}");
    ValidationRow {
        name,
        break_command: format!(
            "sudo mv {base}/node_properties {base}/node_properties_backup && sudo mv {base}/resources {base}/resources_backup"
        ),
        restore_command: format!(
            "sudo mv {base}/node_properties_backup {base}/node_properties && sudo mv {base}/resources_backup {base}/resources"
        ),
        ready_check: None,
        expected,
    }
}

fn validation_rows() -> Vec<ValidationRow> {
    vec![
        ValidationRow {
            name: "elasticsearch_unreachable",
            break_command: format!(
                "sudo cp {ES_PROPERTIES} {ES_PROPERTIES}.bak && sudo sed -i 's/\"es_endpoint_port\": *[0-9]*/\"es_endpoint_port\": 10200/' {ES_PROPERTIES}"
            ),
            restore_command: format!("sudo mv {ES_PROPERTIES}.bak {ES_PROPERTIES}"),
            ready_check: None,
            expected: "ES returned an error when getting the provider context",
        },
        stopped_service("mgmtworker_stopped", "cloudify-mgmtworker", "mgmtworker is not running"),
        stopped_service("logstash_stopped", "logstash", "logstash is not running"),
        stopped_service("elasticsearch_stopped", "elasticsearch", "elasticsearch is not running"),
        moved_node_directories("nginx_properties_missing", "nginx", "service nginx has no properties file"),
    ]
}

/// Undoes a row's fault and waits for its ready check.
fn restore(shell: &RemoteShell, row_restore: &str, ready_check: Option<&str>) -> CleanupResult {
    shell.run(row_restore).map_err(|err| Box::new(err) as CleanupFailure)?;
    if let Some(check) = ready_check {
        repetitive(PollPolicy::with_timeout(RESTORE_TIMEOUT), || shell.run(check))
            .map_err(|err| Box::new(err) as CleanupFailure)?;
    }
    Ok(())
}

#[test]
fn preupgrade_validations() -> SuiteResult {
    let mut suite = LiveSuite::start("upgrade_validation")?;
    let blueprint = suite.config().require_upgrade_blueprint()?.clone();

    suite.case("default_validations_pass", |case| validate_upgrade(case, &blueprint, &[]))?;

    for row in validation_rows() {
        let expected = ExpectedFailure::new(FailureKind::CommandExecution, row.expected).case_insensitive();
        let outcome = suite.case(row.name, |case| {
            let shell = case.env().remote_shell().ok_or_else(|| {
                HarnessError::MissingContext("validation rows need ssh access to the manager".to_string())
            })?;
            let restore_command = row.restore_command.clone();
            let ready_check = row.ready_check.clone();
            case.register_cleanup("restore manager host", move || {
                restore(shell, &restore_command, ready_check.as_deref())
            })?;
            shell.run(&row.break_command)?;
            Ok(expect_failure(validate_upgrade(case, &blueprint, &[]), &expected))
        })?;
        if let Err(mismatch) = outcome {
            suite.record_failure(row.name, &mismatch);
            return Err(mismatch.into());
        }
    }

    suite.finish()
}
