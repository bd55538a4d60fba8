// crates/cosmo-tester-core/src/workdir.rs
// ============================================================================
// Module: Scoped Workdir
// Description: Owned temporary directories for generated operation files.
// Purpose: Hold inputs/parameters files and CLI state for one owner.
// Dependencies: tempfile, serde_json
// ============================================================================

//! ## Overview
//! A [`Workdir`] is a directory that one owner (a CLI helper, a test case or
//! the environment) writes generated files into. Owned workdirs are deleted
//! only by an explicit [`Workdir::close`]; dropping one leaves it on disk so a
//! failed run can be inspected afterwards.
//! Invariants:
//! - Generated files are written once and never rewritten.
//! - Borrowed workdirs (wrapping an existing path) are never deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suffix for generated inputs files.
pub const INPUTS_SUFFIX: &str = "-inputs.json";

/// Suffix for generated workflow parameters files.
pub const PARAMETERS_SUFFIX: &str = "-parameters.json";

// ============================================================================
// SECTION: Workdir
// ============================================================================

/// A scoped working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workdir {
    /// Directory path.
    path: PathBuf,
    /// Whether [`Workdir::close`] deletes the directory.
    owned: bool,
}

impl Workdir {
    /// Creates a fresh owned directory under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the directory cannot be created.
    pub fn create(prefix: &str) -> Result<Self, HarnessError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|err| HarnessError::io(format!("create workdir {prefix}*"), err))?;
        Ok(Self {
            path: dir.keep(),
            owned: true,
        })
    }

    /// Wraps an existing directory without taking ownership.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the directory cannot be created.
    pub fn borrowed(path: impl Into<PathBuf>) -> Result<Self, HarnessError> {
        let path = path.into();
        fs::create_dir_all(&path)
            .map_err(|err| HarnessError::io(format!("create {}", path.display()), err))?;
        Ok(Self {
            path,
            owned: false,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the directory is deleted on close.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owned
    }

    /// Writes an inputs mapping to `<prefix>-<random>-inputs.json`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the file cannot be written.
    pub fn write_inputs(
        &self,
        prefix: &str,
        inputs: Option<&Map<String, Value>>,
    ) -> Result<PathBuf, HarnessError> {
        self.write_json(prefix, INPUTS_SUFFIX, inputs)
    }

    /// Writes a workflow parameters mapping to `<prefix>-<random>-parameters.json`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the file cannot be written.
    pub fn write_parameters(
        &self,
        prefix: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> Result<PathBuf, HarnessError> {
        self.write_json(prefix, PARAMETERS_SUFFIX, parameters)
    }

    /// Serializes a value into a freshly named JSON file in the workdir.
    fn write_json<T: Serialize>(
        &self,
        prefix: &str,
        suffix: &str,
        value: Option<&T>,
    ) -> Result<PathBuf, HarnessError> {
        let bytes = match value {
            Some(value) => serde_json::to_vec(value),
            None => serde_json::to_vec(&Map::new()),
        }
        .map_err(|err| HarnessError::Serialization {
            context: format!("serialize {prefix}{suffix}"),
            detail: err.to_string(),
        })?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .suffix(suffix)
            .tempfile_in(&self.path)
            .map_err(|err| HarnessError::io(format!("create {prefix}{suffix}"), err))?;
        file.write_all(&bytes)
            .map_err(|err| HarnessError::io(format!("write {prefix}{suffix}"), err))?;
        let (_, path) = file
            .keep()
            .map_err(|err| HarnessError::io(format!("persist {prefix}{suffix}"), err.error))?;
        Ok(path)
    }

    /// Copies a directory tree into the workdir and returns the new root.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the source cannot be read or the copy
    /// fails.
    pub fn copy_tree(&self, source: &Path) -> Result<PathBuf, HarnessError> {
        let name = source.file_name().ok_or_else(|| {
            HarnessError::MissingContext(format!("{} has no directory name", source.display()))
        })?;
        let target = self.path.join(name);
        copy_dir_recursive(source, &target)?;
        Ok(target)
    }

    /// Deletes the directory when owned. Borrowed directories are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when removal fails.
    pub fn close(self) -> Result<(), HarnessError> {
        if !self.owned || !self.path.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.path)
            .map_err(|err| HarnessError::io(format!("remove {}", self.path.display()), err))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Recursively copies `source` into `target`.
fn copy_dir_recursive(source: &Path, target: &Path) -> Result<(), HarnessError> {
    fs::create_dir_all(target)
        .map_err(|err| HarnessError::io(format!("create {}", target.display()), err))?;
    let entries = fs::read_dir(source)
        .map_err(|err| HarnessError::io(format!("read {}", source.display()), err))?;
    for entry in entries {
        let entry =
            entry.map_err(|err| HarnessError::io(format!("read {}", source.display()), err))?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|err| HarnessError::io(format!("stat {}", from.display()), err))?;
        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .map_err(|err| HarnessError::io(format!("copy {}", from.display()), err))?;
        }
    }
    Ok(())
}
