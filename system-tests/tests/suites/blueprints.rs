// system-tests/tests/suites/blueprints.rs
// ============================================================================
// Module: Blueprint Tests
// Description: Upload, install and uninstall a blueprint on a live manager.
// Purpose: Validate state deltas around install and uninstall.
// Dependencies: system-tests helpers, cosmo-tester-core
// ============================================================================

//! ## Overview
//! Installs the hello-world blueprint and checks that exactly the test's
//! blueprint, deployment and nodes appear, then uninstalls and removes them.

use cosmo_tester_core::HarnessError;
use cosmo_tester_core::state::BLUEPRINTS;
use cosmo_tester_core::state::DEPLOYMENTS;
use cosmo_tester_core::state::NODES;
use helpers::live::LiveSuite;
use helpers::live::SuiteResult;
use helpers::live::assert_deployment_started;
use helpers::live::ignore_missing;

use crate::helpers;

/// Blueprint directory under the resources root.
const HELLO_WORLD: &str = "hello-world";

#[test]
fn blueprint_install_and_uninstall() -> SuiteResult {
    let mut suite = LiveSuite::start("blueprints")?;
    let source = suite.config().blueprint_dir(HELLO_WORLD);

    suite.case("hello_world_install_uninstall", |case| {
        case.copy_blueprint(&source)?;
        let test_id = case.test_id().to_string();

        let client = case.client();
        let deployment_id = test_id.clone();
        case.register_cleanup("delete blueprint", move || {
            ignore_missing(client.delete_blueprint(&deployment_id))
        })?;
        let client = case.client();
        let deployment_id = test_id.clone();
        case.register_cleanup("delete deployment", move || {
            ignore_missing(client.delete_deployment(&deployment_id, true))
        })?;

        let install = case.upload_deploy_and_execute_install(None, None, true, None)?;
        let delta = install
            .delta()
            .ok_or_else(|| HarnessError::MissingContext("install state not captured".to_string()))?;
        assert_eq!(delta.ids(BLUEPRINTS), vec![test_id.as_str()]);
        assert_eq!(delta.ids(DEPLOYMENTS), vec![test_id.as_str()]);
        assert!(!delta.ids(NODES).is_empty(), "install created no nodes");
        assert_deployment_started(case.client().as_ref(), &test_id)?;

        let uninstall = case.execute_uninstall(None, true)?;
        let delta = uninstall
            .delta()
            .ok_or_else(|| HarnessError::MissingContext("uninstall state not captured".to_string()))?;
        assert!(delta.is_clean(), "uninstall created entities");

        let client = case.client();
        client.delete_deployment(&test_id, false)?;
        client.delete_blueprint(&test_id)?;
        let after = case.get_manager_state()?;
        let before = install
            .before
            .as_ref()
            .ok_or_else(|| HarnessError::MissingContext("pre-install state missing".to_string()))?;
        assert_eq!(after.ids(DEPLOYMENTS), before.ids(DEPLOYMENTS));
        assert_eq!(after.ids(BLUEPRINTS), before.ids(BLUEPRINTS));
        Ok(())
    })?;

    suite.case("hello_world_reinstall_same_manager", |case| {
        case.copy_blueprint(&source)?;
        let test_id = case.test_id().to_string();
        let client = case.client();
        let deployment_id = test_id.clone();
        case.register_cleanup("remove deployment and blueprint", move || {
            ignore_missing(client.delete_deployment(&deployment_id, true))?;
            ignore_missing(client.delete_blueprint(&deployment_id))
        })?;

        case.upload_deploy_and_execute_install(None, None, false, None)?;
        assert_deployment_started(case.client().as_ref(), &test_id)?;
        let installs = case
            .client()
            .executions(Some(&test_id))?
            .into_iter()
            .filter(|execution| execution.workflow_id == "install")
            .count();
        assert_eq!(installs, 1);
        case.execute_uninstall(None, false)?;
        Ok(())
    })?;

    suite.finish()
}
