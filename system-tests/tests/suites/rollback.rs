// system-tests/tests/suites/rollback.rs
// ============================================================================
// Module: Rollback Idempotency Tests
// Description: Upgrade a live manager, then roll back twice.
// Purpose: Validate a second rollback changes nothing.
// Dependencies: system-tests helpers, cosmo-tester-core
// ============================================================================

//! ## Overview
//! Installs a deployment, upgrades the manager, rolls back, and rolls back
//! again. After each step the manager must be running with the pre-upgrade
//! deployment intact and every node instance started.

use cosmo_tester_core::HarnessError;
use cosmo_tester_core::ManagerState;
use cosmo_tester_core::TestCase;
use cosmo_tester_core::state::BLUEPRINTS;
use cosmo_tester_core::state::DEPLOYMENTS;
use helpers::live::LiveSuite;
use helpers::live::SuiteResult;
use helpers::live::assert_deployment_started;
use helpers::live::assert_manager_running;
use helpers::live::ignore_missing;
use helpers::live::upgrade_inputs;

use crate::helpers;

/// Blueprint directory under the resources root.
const HELLO_WORLD: &str = "hello-world";

/// Checks the manager still serves the pre-upgrade deployment.
fn assert_preupgrade_state(
    case: &TestCase<'_>,
    deployment_id: &str,
    expected: &ManagerState,
) -> Result<(), HarnessError> {
    let client = case.client();
    assert_manager_running(client.as_ref())?;
    let state = case.get_manager_state()?;
    assert_eq!(state.ids(BLUEPRINTS), expected.ids(BLUEPRINTS));
    assert_eq!(state.ids(DEPLOYMENTS), expected.ids(DEPLOYMENTS));
    assert_deployment_started(client.as_ref(), deployment_id)
}

#[test]
fn rollback_twice() -> SuiteResult {
    let mut suite = LiveSuite::start("rollback")?;
    let blueprint = suite.config().require_upgrade_blueprint()?.clone();
    let source = suite.config().blueprint_dir(HELLO_WORLD);

    suite.case("rollback_twice_keeps_deployment", |case| {
        case.copy_blueprint(&source)?;
        let deployment_id = format!("pre-{}", case.test_id());
        let client = case.client();
        let cleanup_id = deployment_id.clone();
        case.register_cleanup("remove pre-upgrade deployment", move || {
            ignore_missing(client.delete_deployment(&cleanup_id, true))?;
            ignore_missing(client.delete_blueprint(&cleanup_id))
        })?;
        case.upload_deploy_and_execute_install(
            Some(&deployment_id),
            Some(&deployment_id),
            false,
            None,
        )?;
        let expected = case.get_manager_state()?;

        let inputs = upgrade_inputs(case, &[])?;
        let cfy = case.cfy()?;
        cfy.with_maintenance_mode(|cfy| cfy.upgrade(&blueprint, Some(&inputs), false, false))?;
        assert_preupgrade_state(case, &deployment_id, &expected)?;

        for _ in 0 .. 2 {
            cfy.rollback(&blueprint, Some(&inputs))?;
            assert_preupgrade_state(case, &deployment_id, &expected)?;
        }

        case.execute_uninstall(Some(&deployment_id), false)?;
        Ok(())
    })?;

    suite.finish()
}
