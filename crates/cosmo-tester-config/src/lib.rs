// crates/cosmo-tester-config/src/lib.rs
// ============================================================================
// Module: Cosmo Tester Config Library
// Description: Process settings and test-config loading for the harness.
// Purpose: Provide typed, read-only configuration to the harness layers.
// Dependencies: serde, serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Harness configuration comes from two places: process environment variables
//! ([`HarnessSettings`]) and a YAML test-config file ([`TestConfig`]). Both are
//! loaded once per process and are read-only afterwards.
//! Invariants:
//! - Required variables that are absent fail at load time.
//! - A referenced config file that does not exist fails at load time.
//! - Provider-specific values are only reachable through [`ProviderConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod env;
pub mod error;
pub mod test_config;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use env::Credentials;
pub use env::DEFAULT_CFY_EXECUTABLE;
pub use env::DEFAULT_EXECUTION_TIMEOUT;
pub use env::DEFAULT_HANDLER;
pub use env::HarnessEnv;
pub use env::HarnessSettings;
pub use env::SettingsSummary;
pub use error::ConfigError;
pub use test_config::ProviderConfig;
pub use test_config::TestConfig;
