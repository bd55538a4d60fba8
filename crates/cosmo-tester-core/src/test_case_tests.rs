// crates/cosmo-tester-core/src/test_case_tests.rs
// ============================================================================
// Module: Test Case Unit Tests
// Description: Unit coverage for test id formatting.
// Purpose: Pin the id layout blueprints and deployments are named with.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Checks the `system-test-YYYYMMDD-HHMM` id produced for each test case.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use time::macros::datetime;

use crate::test_case::test_id_at;

#[test]
fn test_id_uses_minute_resolution_stamp() {
    let id = test_id_at(datetime!(2024-03-07 09:05:59 UTC)).unwrap();
    assert_eq!(id, "system-test-20240307-0905");
}

#[test]
fn test_id_is_stamped_in_utc() {
    let id = test_id_at(datetime!(2024-12-31 23:30:00 -02:00)).unwrap();
    assert_eq!(id, "system-test-20250101-0130");
}
