// crates/cosmo-tester-core/src/provider/simple.rs
// ============================================================================
// Module: Simple Handler
// Description: Provider hooks for managers installed on pre-existing hosts.
// Purpose: Bootstrap onto a given host without provisioning infrastructure.
// Dependencies: cosmo-tester-config
// ============================================================================

//! ## Overview
//! The simple manager blueprint installs onto a host that already exists, so
//! the only pre-bootstrap check is that its addresses are configured.

use cosmo_tester_config::ProviderConfig;

use crate::error::HarnessError;
use crate::provider::ProviderHandler;
use crate::provider::hook_error;

/// Registry name.
pub const HANDLER_NAME: &str = "simple";

/// Manager blueprint file name.
pub const MANAGER_BLUEPRINT: &str = "simple-manager-blueprint.yaml";

/// Handler for pre-existing manager hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleHandler;

impl SimpleHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProviderHandler for SimpleHandler {
    fn name(&self) -> &str {
        HANDLER_NAME
    }

    fn manager_blueprint(&self) -> &str {
        MANAGER_BLUEPRINT
    }

    fn before_bootstrap(&self, config: &ProviderConfig) -> Result<(), HarnessError> {
        for key in ["public_ip", "private_ip"] {
            if config.optional_str(key)?.is_none() {
                return Err(hook_error(HANDLER_NAME, "before_bootstrap", format!("{key} is not set")));
            }
        }
        Ok(())
    }
}
