// crates/cosmo-tester-core/src/expect.rs
// ============================================================================
// Module: Expected Failures
// Description: Table-driven checks for operations that must fail.
// Purpose: Assert on fault kind and message without exceptions as control flow.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Validation tests describe the failure they expect as an [`ExpectedFailure`]
//! row: a [`FailureKind`] and a substring searched in the error message and,
//! for command failures, the captured stdout and stderr. An operation that
//! succeeds is itself a mismatch.

use thiserror::Error;

use crate::error::FailureKind;
use crate::error::HarnessError;

/// Expected failure row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFailure {
    /// Required error class.
    pub kind: FailureKind,
    /// Substring that must appear in the error text.
    pub contains: String,
    /// Compares text case-insensitively.
    pub case_insensitive: bool,
}

impl ExpectedFailure {
    /// Creates a case-sensitive row.
    #[must_use]
    pub fn new(kind: FailureKind, contains: impl Into<String>) -> Self {
        Self {
            kind,
            contains: contains.into(),
            case_insensitive: false,
        }
    }

    /// Switches the row to case-insensitive matching.
    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Returns whether `text` contains the expected substring.
    fn matches_text(&self, text: &str) -> bool {
        if self.case_insensitive {
            text.to_lowercase().contains(&self.contains.to_lowercase())
        } else {
            text.contains(&self.contains)
        }
    }
}

/// Ways an expected failure can be violated.
#[derive(Debug, Error)]
pub enum ExpectationMismatch {
    /// The operation succeeded.
    #[error("expected a {expected} failure, but the operation succeeded")]
    NoError {
        /// Expected kind.
        expected: FailureKind,
    },
    /// The operation failed with a different kind.
    #[error("expected a {expected} failure, got {actual}: {error}")]
    WrongKind {
        /// Expected kind.
        expected: FailureKind,
        /// Actual kind.
        actual: FailureKind,
        /// Actual error.
        error: Box<HarnessError>,
    },
    /// The failure text did not contain the expected substring.
    #[error("expected failure text to contain \"{expected}\", got: {error}")]
    MissingText {
        /// Expected substring.
        expected: String,
        /// Actual error.
        error: Box<HarnessError>,
    },
}

/// Checks that `result` failed as described by `expected` and returns the
/// error for further assertions.
///
/// # Errors
///
/// Returns [`ExpectationMismatch`] when the operation succeeded, failed with
/// another kind, or the text did not match.
pub fn expect_failure<T>(
    result: Result<T, HarnessError>,
    expected: &ExpectedFailure,
) -> Result<HarnessError, ExpectationMismatch> {
    let error = match result {
        Ok(_) => {
            return Err(ExpectationMismatch::NoError {
                expected: expected.kind,
            });
        }
        Err(error) => error,
    };
    let actual = error.kind();
    if actual != expected.kind {
        return Err(ExpectationMismatch::WrongKind {
            expected: expected.kind,
            actual,
            error: Box::new(error),
        });
    }
    if failure_texts(&error).iter().any(|text| expected.matches_text(text)) {
        Ok(error)
    } else {
        Err(ExpectationMismatch::MissingText {
            expected: expected.contains.clone(),
            error: Box::new(error),
        })
    }
}

/// Collects the message and any captured command output.
fn failure_texts(error: &HarnessError) -> Vec<String> {
    let mut texts = vec![error.to_string()];
    if let Some(failure) = error.command_failure() {
        texts.push(failure.stdout.clone());
        texts.push(failure.stderr.clone());
    }
    texts
}
