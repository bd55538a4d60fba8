// system-tests/tests/suites/snapshots.rs
// ============================================================================
// Module: Snapshot Tests
// Description: Snapshot create and restore on a live manager.
// Purpose: Validate restore targets a clean manager and brings state back.
// Dependencies: system-tests helpers, cosmo-tester-core
// ============================================================================

//! ## Overview
//! Snapshots are restored only onto a clean manager. Each case empties the
//! manager before restoring and compares the restored state with what was
//! present when the snapshot was taken.

use std::time::Duration;

use cosmo_tester_core::HarnessError;
use cosmo_tester_core::PollPolicy;
use cosmo_tester_core::SharedClient;
use cosmo_tester_core::TestCase;
use cosmo_tester_core::state::BLUEPRINTS;
use cosmo_tester_core::state::DEPLOYMENTS;
use cosmo_tester_core::wait_for_snapshot;
use helpers::live::LiveSuite;
use helpers::live::SuiteResult;
use helpers::live::assert_deployment_started;
use helpers::live::ignore_missing;

use crate::helpers;

/// Blueprint directory under the resources root.
const HELLO_WORLD: &str = "hello-world";
/// Snapshot label for a completed snapshot.
const SNAPSHOT_CREATED: &str = "created";
/// Budget for snapshot create and restore.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Creates a snapshot, registers its deletion and waits until it is created.
fn take_snapshot(case: &mut TestCase<'_>, timeout: Duration) -> Result<String, HarnessError> {
    let client = case.client();
    let snapshot_id = format!("snap-{}", case.test_id());
    let execution = client.create_snapshot(&snapshot_id, false)?;
    let cleanup_client = case.client();
    let cleanup_id = snapshot_id.clone();
    case.register_cleanup("delete snapshot", move || {
        ignore_missing(cleanup_client.delete_snapshot(&cleanup_id))
    })?;
    case.wait_for_execution(&execution, timeout)?;
    let snapshot = wait_for_snapshot(client.as_ref(), &snapshot_id, PollPolicy::with_timeout(timeout))?;
    assert_eq!(
        snapshot.status,
        SNAPSHOT_CREATED,
        "snapshot error: {}",
        snapshot.error.as_deref().unwrap_or_default()
    );
    Ok(snapshot_id)
}

/// Uninstalls and deletes the test's deployment and blueprint.
fn remove_deployment(case: &TestCase<'_>, client: &SharedClient) -> Result<(), HarnessError> {
    case.execute_uninstall(None, false)?;
    client.delete_deployment(case.test_id(), false)?;
    client.delete_blueprint(case.test_id())?;
    Ok(())
}

/// Registers best-effort removal of the test's deployment and blueprint.
fn register_deployment_cleanup(case: &mut TestCase<'_>) -> Result<(), HarnessError> {
    let client = case.client();
    let deployment_id = case.test_id().to_string();
    case.register_cleanup("remove deployment and blueprint", move || {
        ignore_missing(client.delete_deployment(&deployment_id, true))?;
        ignore_missing(client.delete_blueprint(&deployment_id))
    })
}

#[test]
fn snapshot_create_and_restore() -> SuiteResult {
    let mut suite = LiveSuite::start("snapshots")?;
    let source = suite.config().blueprint_dir(HELLO_WORLD);
    let timeout = suite.timeout(SNAPSHOT_TIMEOUT);

    suite.case("restore_empty_snapshot_leaves_manager_clean", |case| {
        assert!(case.get_manager_state()?.is_clean(), "suite needs a clean manager");
        let snapshot_id = take_snapshot(case, timeout)?;

        case.copy_blueprint(&source)?;
        register_deployment_cleanup(case)?;
        case.upload_deploy_and_execute_install(None, None, false, None)?;
        let client = case.client();
        remove_deployment(case, &client)?;
        assert!(case.get_manager_state()?.is_clean(), "manager not clean before restore");

        let restore = client.restore_snapshot(&snapshot_id, false)?;
        case.wait_for_execution(&restore, timeout)?;
        assert!(case.get_manager_state()?.is_clean(), "restored manager is not clean");
        Ok(())
    })?;

    suite.case("restore_brings_back_deployment", |case| {
        case.copy_blueprint(&source)?;
        register_deployment_cleanup(case)?;
        case.upload_deploy_and_execute_install(None, None, false, None)?;
        let test_id = case.test_id().to_string();
        let snapshotted = case.get_manager_state()?;
        let snapshot_id = take_snapshot(case, timeout)?;

        let client = case.client();
        remove_deployment(case, &client)?;
        assert!(case.get_manager_state()?.is_clean(), "manager not clean before restore");

        let restore = client.restore_snapshot(&snapshot_id, false)?;
        case.wait_for_execution(&restore, timeout)?;
        let restored = case.get_manager_state()?;
        assert_eq!(restored.ids(BLUEPRINTS), snapshotted.ids(BLUEPRINTS));
        assert_eq!(restored.ids(DEPLOYMENTS), snapshotted.ids(DEPLOYMENTS));
        assert_deployment_started(client.as_ref(), &test_id)?;

        case.execute_uninstall(None, false)?;
        Ok(())
    })?;

    suite.finish()
}
