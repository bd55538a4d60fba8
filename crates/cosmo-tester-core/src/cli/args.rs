// crates/cosmo-tester-core/src/cli/args.rs
// ============================================================================
// Module: CLI Argument Mapping
// Description: Ordered named arguments translated into command-line tokens.
// Purpose: Map keyword-style arguments 1:1 onto the external CLI's flags.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Operations describe their arguments as an ordered list of `(name, value)`
//! pairs. Translation rules:
//! - single-character names become `-x value`,
//! - longer names become `--name-with-dashes value` (underscores are dashed),
//! - `true` flags become a bare switch and `false` flags are dropped,
//! - absent optionals are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

// ============================================================================
// SECTION: Values
// ============================================================================

/// A single named-argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Boolean switch; only `true` is emitted.
    Flag(bool),
    /// Free-form text value.
    Text(String),
    /// Integer value.
    Int(i64),
    /// Filesystem path value.
    Path(PathBuf),
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&Path> for ArgValue {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for ArgValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&PathBuf> for ArgValue {
    fn from(value: &PathBuf) -> Self {
        Self::Path(value.clone())
    }
}

// ============================================================================
// SECTION: Argument List
// ============================================================================

/// Ordered named arguments for one CLI operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Positional tokens emitted before named flags.
    positional: Vec<OsString>,
    /// Named arguments in registration order.
    named: Vec<(String, ArgValue)>,
}

impl CliArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional token.
    #[must_use]
    pub fn positional(mut self, token: impl Into<OsString>) -> Self {
        self.positional.push(token.into());
        self
    }

    /// Appends a named argument.
    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.named.push((name.to_string(), value.into()));
        self
    }

    /// Appends a named argument when a value is present.
    #[must_use]
    pub fn optional<V: Into<ArgValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.arg(name, value),
            None => self,
        }
    }

    /// Returns whether no arguments were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Returns the recorded value for a named argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.named.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Translates the arguments into command-line tokens.
    #[must_use]
    pub fn to_tokens(&self) -> Vec<OsString> {
        let mut tokens = self.positional.clone();
        for (name, value) in &self.named {
            let flag = flag_name(name);
            match value {
                ArgValue::Flag(true) => tokens.push(flag.into()),
                ArgValue::Flag(false) => {}
                ArgValue::Text(text) => {
                    tokens.push(flag.into());
                    tokens.push(text.into());
                }
                ArgValue::Int(number) => {
                    tokens.push(flag.into());
                    tokens.push(number.to_string().into());
                }
                ArgValue::Path(path) => {
                    tokens.push(flag.into());
                    tokens.push(path.clone().into_os_string());
                }
            }
        }
        tokens
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits an operation name (`snapshots create`) into subcommand tokens.
pub fn operation_tokens(operation: &str) -> impl Iterator<Item = &str> {
    operation.split_whitespace()
}

/// Maps a keyword name onto its command-line flag spelling.
#[must_use]
pub fn flag_name(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("-{name}")
    } else {
        format!("--{}", name.replace('_', "-"))
    }
}
