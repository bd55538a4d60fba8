// crates/cosmo-tester-core/src/provider/mod.rs
// ============================================================================
// Module: Provider Handlers
// Description: Infrastructure-provider hooks around the manager lifecycle.
// Purpose: Isolate provider-specific behavior behind one declared interface.
// Dependencies: cosmo-tester-config, serde_json
// ============================================================================

//! ## Overview
//! A [`ProviderHandler`] names the manager blueprint for its infrastructure,
//! creates cleanup contexts and runs hooks before bootstrap, after bootstrap
//! and after teardown. Handlers are selected by name with [`resolve_handler`].
//! Provider-specific values are read through
//! [`ProviderConfig`](cosmo_tester_config::ProviderConfig) keyed lookups, never
//! through implicit delegation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use cosmo_tester_config::ConfigError;
use cosmo_tester_config::ProviderConfig;
use serde_json::Value;

use crate::cleanup::CleanupContext;
use crate::error::HarnessError;

pub mod openstack;
pub mod simple;

pub use openstack::OpenStackHandler;
pub use simple::SimpleHandler;


// ============================================================================
// SECTION: Handler Interface
// ============================================================================

/// Provider-specific lifecycle hooks.
pub trait ProviderHandler: Send + Sync {
    /// Returns the handler name.
    fn name(&self) -> &str;

    /// Returns the manager blueprint file name inside the blueprints dir.
    fn manager_blueprint(&self) -> &str;

    /// Creates the cleanup context for an environment or test.
    fn cleanup_context(&self, name: &str) -> CleanupContext<'static> {
        CleanupContext::new(name)
    }

    /// Runs before bootstrap starts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the environment cannot be bootstrapped.
    fn before_bootstrap(&self, _config: &ProviderConfig) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Runs after bootstrap with the recorded provider context.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the provider context is unusable.
    fn after_bootstrap(&self, _provider_context: &Value) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Runs after teardown. Failures are logged by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when provider cleanup fails.
    fn after_teardown(&self) -> Result<(), HarnessError> {
        Ok(())
    }
}

/// Shared handle to a provider handler.
pub type SharedProvider = Arc<dyn ProviderHandler>;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Resolves a handler by name. Dotted module paths resolve by last segment.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownHandler`] for unknown names.
pub fn resolve_handler(name: &str, config: &ProviderConfig) -> Result<SharedProvider, ConfigError> {
    let short = name.rsplit('.').next().unwrap_or(name);
    match short {
        openstack::HANDLER_NAME => Ok(Arc::new(OpenStackHandler::new(config.clone()))),
        simple::HANDLER_NAME => Ok(Arc::new(SimpleHandler::new())),
        _ => Err(ConfigError::UnknownHandler {
            name: name.to_string(),
        }),
    }
}

/// Builds a provider-hook error.
pub(crate) fn hook_error(provider: &str, hook: &'static str, detail: impl Into<String>) -> HarnessError {
    HarnessError::ProviderHook {
        provider: provider.to_string(),
        hook,
        detail: detail.into(),
    }
}
