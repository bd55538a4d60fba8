// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for live-manager system-tests.
// Purpose: Provide session startup, manager checks and artifact utilities.
// Dependencies: system-tests, cosmo-tester-core
// ============================================================================

//! ## Overview
//! Shared helpers for live-manager system-tests.
//! Invariants:
//! - Each suite binary owns one environment for its whole run.
//! - Cases run serially against that environment.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod live;
