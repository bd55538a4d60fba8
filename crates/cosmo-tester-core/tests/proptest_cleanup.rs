// crates/cosmo-tester-core/tests/proptest_cleanup.rs
// ============================================================================
// Module: Cleanup Ordering Property Tests
// Description: Property tests for cleanup stack ordering and isolation.
// Purpose: Check reverse-order execution across arbitrary failure patterns.
// ============================================================================

//! Property-based tests for cleanup context invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::cell::RefCell;

use cosmo_tester_core::CleanupContext;
use cosmo_tester_core::CleanupMessage;
use proptest::prelude::*;

proptest! {
    #[test]
    fn actions_run_newest_first_even_when_some_fail(failures in prop::collection::vec(any::<bool>(), 0 .. 24)) {
        let ran = RefCell::new(Vec::new());
        let mut context = CleanupContext::new("property");
        for (index, fails) in failures.iter().copied().enumerate() {
            let ran = &ran;
            context.register(format!("action-{index}"), move || {
                ran.borrow_mut().push(index);
                if fails {
                    Err(Box::new(CleanupMessage(format!("action {index} failed"))))
                } else {
                    Ok(())
                }
            });
        }

        let report = context.run();

        let expected: Vec<usize> = (0 .. failures.len()).rev().collect();
        prop_assert_eq!(ran.borrow().clone(), expected);
        prop_assert_eq!(report.executed.len(), failures.len());
        prop_assert_eq!(report.failures.len(), failures.iter().filter(|fails| **fails).count());
        prop_assert_eq!(report.is_clean(), !failures.contains(&true));
    }

    #[test]
    fn nested_contexts_run_as_one_action_in_place(outer in 0usize .. 6, inner in 0usize .. 6) {
        let ran = RefCell::new(Vec::new());
        let mut parent = CleanupContext::new("parent");
        for index in 0 .. outer {
            let ran = &ran;
            parent.register(format!("outer-{index}"), move || {
                ran.borrow_mut().push(format!("outer-{index}"));
                Ok(())
            });
        }
        let mut child = CleanupContext::new("child");
        for index in 0 .. inner {
            let ran = &ran;
            child.register(format!("inner-{index}"), move || {
                ran.borrow_mut().push(format!("inner-{index}"));
                Ok(())
            });
        }
        parent.nest(child);

        let report = parent.run();

        let mut expected: Vec<String> = (0 .. inner).rev().map(|index| format!("inner-{index}")).collect();
        expected.extend((0 .. outer).rev().map(|index| format!("outer-{index}")));
        prop_assert_eq!(ran.borrow().clone(), expected);
        prop_assert_eq!(report.executed.first().cloned(), Some("context:child".to_string()));
    }
}

#[test]
fn dropping_a_context_runs_pending_actions() {
    let ran = RefCell::new(Vec::new());
    {
        let mut context = CleanupContext::new("dropped");
        context.register("first", || {
            ran.borrow_mut().push("first");
            Ok(())
        });
        context.register("second", || {
            ran.borrow_mut().push("second");
            Ok(())
        });
    }
    assert_eq!(*ran.borrow(), vec!["second", "first"]);
}

#[test]
fn failing_nested_context_reports_failed_labels() {
    let mut parent = CleanupContext::new("parent");
    let mut child = CleanupContext::new("child");
    child.register("delete keypair", || Err(Box::new(CleanupMessage("gone".to_string()))));
    parent.nest(child);

    let report = parent.run();

    assert_eq!(report.failures.len(), 1);
    let (label, message) = &report.failures[0];
    assert_eq!(label, "context:child");
    assert!(message.contains("delete keypair"));
}

#[test]
fn dismissed_actions_never_run() {
    let ran = RefCell::new(Vec::new());
    let mut context = CleanupContext::new("dismissed");
    context.register("first", || {
        ran.borrow_mut().push("first");
        Ok(())
    });
    context.register("second", || {
        ran.borrow_mut().push("second");
        Ok(())
    });

    let labels = context.dismiss();

    assert_eq!(labels, vec!["second", "first"]);
    assert!(ran.borrow().is_empty());
}
