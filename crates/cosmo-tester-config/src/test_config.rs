// crates/cosmo-tester-config/src/test_config.rs
// ============================================================================
// Module: Test Config
// Description: YAML test-config loading and provider-config accessors.
// Purpose: Expose provider settings through a declared, explicit interface.
// Dependencies: serde_yaml, serde_json
// ============================================================================

//! ## Overview
//! The test-config file is a YAML mapping. It doubles as the bootstrap inputs
//! file, so it is copied verbatim into the environment workspace before use.
//! Harness code reads it through [`ProviderConfig`], which offers a fixed set
//! of accessors for values every provider shares and keyed lookups for
//! provider-specific values. Dotted keys (`handler_configuration.region`)
//! descend into nested mappings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_yaml::Mapping;
use serde_yaml::Value;

use crate::error::ConfigError;

// ============================================================================
// SECTION: Well-Known Keys
// ============================================================================

/// SSH user on the manager host.
const KEY_MANAGEMENT_USER: &str = "ssh_user";
/// SSH private key for the manager host.
const KEY_MANAGEMENT_KEY: &str = "ssh_key_filename";
/// SSH port for the manager host.
const KEY_MANAGEMENT_PORT: &str = "ssh_port";
/// Agent user on provisioned VMs.
const KEY_AGENT_USER: &str = "agents_user";
/// Prefix applied to provisioned resources.
const KEY_RESOURCES_PREFIX: &str = "resources_prefix";
/// Free-form handler configuration block.
const KEY_HANDLER_CONFIGURATION: &str = "handler_configuration";
/// Upload target for diagnostics collected at teardown.
const KEY_DIAGNOSTICS_UPLOAD_URL: &str = "diagnostics_upload_url";

// ============================================================================
// SECTION: Test Config
// ============================================================================

/// Loaded YAML test configuration.
///
/// # Invariants
/// - `path` pointed at an existing file when the config was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    /// Source file path.
    path: PathBuf,
    /// Raw file contents, kept for verbatim copies.
    raw: String,
    /// Provider accessors over the parsed document.
    provider: ProviderConfig,
}

impl TestConfig {
    /// Loads and parses a test-config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] when the path is not a file, or a
    /// read/parse error when the document cannot be loaded.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let root = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: path.to_path_buf(),
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            raw,
            provider: ProviderConfig::new(root),
        })
    }

    /// Returns the source file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw document text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the provider-config accessors.
    #[must_use]
    pub const fn provider(&self) -> &ProviderConfig {
        &self.provider
    }
}

// ============================================================================
// SECTION: Provider Config
// ============================================================================

/// Explicit accessor interface over provider configuration values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderConfig {
    /// Parsed document root.
    root: Mapping,
}

impl ProviderConfig {
    /// Wraps a parsed mapping.
    #[must_use]
    pub const fn new(root: Mapping) -> Self {
        Self {
            root,
        }
    }

    /// Builds provider config from a YAML string. Used for in-memory fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not YAML, or
    /// [`ConfigError::NotAMapping`] when the root is not a mapping.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from("<inline>");
        match serde_yaml::from_str::<Value>(text) {
            Ok(Value::Mapping(root)) => Ok(Self::new(root)),
            Ok(Value::Null) => Ok(Self::default()),
            Ok(_) => Err(ConfigError::NotAMapping {
                path,
            }),
            Err(source) => Err(ConfigError::Parse {
                path,
                source,
            }),
        }
    }

    /// Returns the value at a dotted key path.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Returns a string value at a dotted key path, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is present but not a
    /// string.
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.value(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.as_str())),
            Some(_) => Err(ConfigError::WrongType {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Returns a required string value at a dotted key path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] when absent or
    /// [`ConfigError::WrongType`] when not a string.
    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.optional_str(key)?.ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Returns the SSH user for the manager host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a string.
    pub fn management_user_name(&self) -> Result<Option<&str>, ConfigError> {
        self.optional_str(KEY_MANAGEMENT_USER)
    }

    /// Returns the SSH private key path for the manager host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a string.
    pub fn management_key_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        Ok(self.optional_str(KEY_MANAGEMENT_KEY)?.map(expand_home))
    }

    /// Returns the SSH port for the manager host (default 22).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a port number.
    pub fn management_port(&self) -> Result<u16, ConfigError> {
        match self.value(KEY_MANAGEMENT_PORT) {
            None | Some(Value::Null) => Ok(22),
            Some(Value::Number(number)) => number
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| ConfigError::WrongType {
                    key: KEY_MANAGEMENT_PORT.to_string(),
                    expected: "a port number",
                }),
            Some(Value::String(text)) => {
                text.trim().parse().map_err(|_| ConfigError::WrongType {
                    key: KEY_MANAGEMENT_PORT.to_string(),
                    expected: "a port number",
                })
            }
            Some(_) => Err(ConfigError::WrongType {
                key: KEY_MANAGEMENT_PORT.to_string(),
                expected: "a port number",
            }),
        }
    }

    /// Returns the agent user on provisioned VMs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a string.
    pub fn agent_user(&self) -> Result<Option<&str>, ConfigError> {
        self.optional_str(KEY_AGENT_USER)
    }

    /// Returns the resource name prefix, empty when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a string.
    pub fn resources_prefix(&self) -> Result<&str, ConfigError> {
        Ok(self.optional_str(KEY_RESOURCES_PREFIX)?.unwrap_or_default())
    }

    /// Returns the handler configuration block, if any.
    #[must_use]
    pub fn handler_configuration(&self) -> Option<&Mapping> {
        self.value(KEY_HANDLER_CONFIGURATION).and_then(Value::as_mapping)
    }

    /// Returns the diagnostics upload URL, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the value is not a string.
    pub fn diagnostics_upload_url(&self) -> Result<Option<&str>, ConfigError> {
        self.optional_str(KEY_DIAGNOSTICS_UPLOAD_URL)
    }

    /// Converts the document to JSON for inputs files and operator output.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] when the document holds values JSON
    /// cannot represent (for example non-string mapping keys).
    pub fn to_json(&self) -> Result<serde_json::Value, ConfigError> {
        serde_json::to_value(&self.root).map_err(|_| ConfigError::WrongType {
            key: "<root>".to_string(),
            expected: "JSON-compatible values",
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Expands a leading `~/` using `HOME`.
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}
