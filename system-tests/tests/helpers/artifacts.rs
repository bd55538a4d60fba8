// system-tests/tests/helpers/artifacts.rs
// ============================================================================
// Module: Test Artifacts
// Description: Artifact helpers for system-tests.
// Purpose: Create per-suite run roots and write run summaries.
// Dependencies: system-tests, serde, serde_json
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use system_tests::config::SystemTestConfig;

#[derive(Debug, Serialize)]
struct SuiteSummary {
    suite: String,
    status: String,
    started_at_ms: u128,
    ended_at_ms: u128,
    duration_ms: u128,
    cases: Vec<String>,
    notes: Vec<String>,
}

fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

fn default_run_root(suite: &str) -> PathBuf {
    let stamp = now_millis();
    PathBuf::from("target/system-tests").join(format!("run_{stamp}")).join(suite)
}

/// Artifact directory for one suite.
#[derive(Debug, Clone)]
pub struct SuiteArtifacts {
    root: PathBuf,
}

impl SuiteArtifacts {
    /// Creates the artifact root for a suite.
    pub fn new(config: &SystemTestConfig, suite: &str) -> io::Result<Self> {
        let root = config
            .run_root
            .as_ref()
            .map_or_else(|| default_run_root(suite), |root| root.join(suite));
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
        })
    }

    /// Returns the artifact root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a pretty JSON artifact.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Writes a suite summary even when the suite panics.
pub struct SuiteReporter {
    artifacts: SuiteArtifacts,
    suite: String,
    started_at_ms: u128,
    cases: Vec<String>,
    notes: Vec<String>,
    finalized: bool,
}

impl SuiteReporter {
    /// Creates a reporter for the named suite.
    pub fn new(config: &SystemTestConfig, suite: &str) -> io::Result<Self> {
        Ok(Self {
            artifacts: SuiteArtifacts::new(config, suite)?,
            suite: suite.to_string(),
            started_at_ms: now_millis(),
            cases: Vec::new(),
            notes: Vec::new(),
            finalized: false,
        })
    }

    /// Returns the artifact directory.
    pub fn artifacts(&self) -> &SuiteArtifacts {
        &self.artifacts
    }

    /// Records a case that ran to completion.
    pub fn case_completed(&mut self, name: &str) {
        self.cases.push(name.to_string());
    }

    /// Records a failed case.
    pub fn case_failed(&mut self, name: &str, error: &str) {
        self.notes.push(format!("{name} failed: {error}"));
    }

    /// Returns whether any case failed.
    pub fn has_failures(&self) -> bool {
        !self.notes.is_empty()
    }

    /// Writes the final summary.
    pub fn finish(&mut self, status: &str) -> io::Result<()> {
        let ended_at_ms = now_millis();
        let summary = SuiteSummary {
            suite: self.suite.clone(),
            status: status.to_string(),
            started_at_ms: self.started_at_ms,
            ended_at_ms,
            duration_ms: ended_at_ms.saturating_sub(self.started_at_ms),
            cases: self.cases.clone(),
            notes: self.notes.clone(),
        };
        self.artifacts.write_json("summary.json", &summary)?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for SuiteReporter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let status = if std::thread::panicking() {
            "panic"
        } else if self.has_failures() {
            "failed"
        } else {
            "unknown"
        };
        let _ = self.finish(status);
    }
}
