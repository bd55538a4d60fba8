// crates/cosmo-tester-config/src/error.rs
// ============================================================================
// Module: Configuration Errors
// Description: Error taxonomy for settings and test-config loading.
// Purpose: Surface configuration faults as fatal, typed errors.
// Dependencies: thiserror, serde_yaml
// ============================================================================

//! ## Overview
//! Configuration errors are fatal: they are raised while the test environment
//! is constructed and abort the run before any external call is made.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading harness configuration.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("a value must be configured in the \"{name}\" env variable")]
    MissingEnv {
        /// Environment variable name.
        name: &'static str,
    },
    /// An environment variable is set but not valid UTF-8.
    #[error("{name} must be valid UTF-8")]
    InvalidUtf8 {
        /// Environment variable name.
        name: &'static str,
    },
    /// An environment variable failed validation.
    #[error("{name} {reason}")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// Validation failure detail.
        reason: String,
    },
    /// A referenced configuration file does not exist.
    #[error("config file {} does not seem to exist", path.display())]
    MissingFile {
        /// Missing file path.
        path: PathBuf,
    },
    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// A configuration file could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// The config document root is not a mapping.
    #[error("config root in {} must be a mapping", path.display())]
    NotAMapping {
        /// File path.
        path: PathBuf,
    },
    /// A required config key is absent.
    #[error("property '{key}' was not found in the test config")]
    MissingKey {
        /// Dotted key path.
        key: String,
    },
    /// A config key holds a value of the wrong type.
    #[error("property '{key}' must be {expected}")]
    WrongType {
        /// Dotted key path.
        key: String,
        /// Expected type description.
        expected: &'static str,
    },
    /// The configured provider handler is not known.
    #[error("unknown provider handler '{name}'")]
    UnknownHandler {
        /// Handler name as configured.
        name: String,
    },
}
