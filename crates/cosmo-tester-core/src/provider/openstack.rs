// crates/cosmo-tester-core/src/provider/openstack.rs
// ============================================================================
// Module: OpenStack Handler
// Description: Provider hooks for managers bootstrapped on OpenStack.
// Purpose: Validate Keystone settings and record provisioned resources.
// Dependencies: cosmo-tester-config, serde_json, tracing
// ============================================================================

//! ## Overview
//! The OpenStack handler checks that the Keystone credentials needed by the
//! manager blueprint are present before a long bootstrap starts, and logs the
//! Keystone settings it was bootstrapped with along with the resources the
//! bootstrap recorded in the provider context.

use cosmo_tester_config::ConfigError;
use cosmo_tester_config::ProviderConfig;
use serde_json::Value;
use tracing::info;

use crate::error::HarnessError;
use crate::provider::ProviderHandler;
use crate::provider::hook_error;

/// Registry name.
pub const HANDLER_NAME: &str = "openstack";

/// Manager blueprint file name.
pub const MANAGER_BLUEPRINT: &str = "openstack-manager-blueprint.yaml";

/// Keystone keys that must be present before bootstrap.
const REQUIRED_KEYS: [&str; 4] =
    ["keystone_username", "keystone_password", "keystone_tenant_name", "keystone_url"];

/// OpenStack provider handler.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenStackHandler {
    /// Test configuration.
    config: ProviderConfig,
}

impl OpenStackHandler {
    /// Creates the handler over the test configuration.
    #[must_use]
    pub const fn new(config: ProviderConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the Keystone user.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key is absent or not a string.
    pub(crate) fn keystone_username(&self) -> Result<&str, ConfigError> {
        self.config.require_str("keystone_username")
    }

    /// Returns the Keystone tenant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key is absent or not a string.
    pub(crate) fn keystone_tenant_name(&self) -> Result<&str, ConfigError> {
        self.config.require_str("keystone_tenant_name")
    }

    /// Returns the Keystone URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key is absent or not a string.
    pub(crate) fn keystone_url(&self) -> Result<&str, ConfigError> {
        self.config.require_str("keystone_url")
    }

    /// Returns the region, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the value is not a string.
    pub(crate) fn region(&self) -> Result<Option<&str>, ConfigError> {
        self.config.optional_str("region")
    }

    /// Returns the external network name, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the value is not a string.
    pub(crate) fn external_network_name(&self) -> Result<Option<&str>, ConfigError> {
        self.config.optional_str("external_network_name")
    }
}

impl ProviderHandler for OpenStackHandler {
    fn name(&self) -> &str {
        HANDLER_NAME
    }

    fn manager_blueprint(&self) -> &str {
        MANAGER_BLUEPRINT
    }

    fn before_bootstrap(&self, config: &ProviderConfig) -> Result<(), HarnessError> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !matches!(config.optional_str(key), Ok(Some(value)) if !value.is_empty()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(hook_error(
            HANDLER_NAME,
            "before_bootstrap",
            format!("missing keystone settings: {}", missing.join(", ")),
        ))
    }

    fn after_bootstrap(&self, provider_context: &Value) -> Result<(), HarnessError> {
        info!(
            provider = HANDLER_NAME,
            user = self.keystone_username().unwrap_or("-"),
            tenant = self.keystone_tenant_name().unwrap_or("-"),
            keystone_url = self.keystone_url().unwrap_or("-"),
            region = self.region()?.unwrap_or("-"),
            external_network = self.external_network_name()?.unwrap_or("-"),
            "openstack manager bootstrapped"
        );
        let Some(resources) = provider_context.get("resources").and_then(Value::as_object) else {
            info!(provider = HANDLER_NAME, "provider context has no resources");
            return Ok(());
        };
        for (kind, resource) in resources {
            let id = resource.get("id").and_then(Value::as_str).unwrap_or("-");
            info!(provider = HANDLER_NAME, kind = %kind, id, "bootstrap resource");
        }
        Ok(())
    }
}
