// system-tests/src/lib.rs
// ============================================================================
// Module: Cosmo Tester System Tests Library
// Description: Shared configuration for live-manager system-test suites.
// Purpose: Provide typed suite settings to the binaries in `system-tests/tests`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts the suite configuration shared by the live-manager
//! system-test binaries in `system-tests/tests`. Harness settings (config
//! path, blueprints dir, credentials) come from `cosmo-tester-config`; this
//! crate only adds what the suites themselves need.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
