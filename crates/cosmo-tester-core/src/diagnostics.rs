// crates/cosmo-tester-core/src/diagnostics.rs
// ============================================================================
// Module: Diagnostics
// Description: Best-effort resource monitoring and process dumps on the manager.
// Purpose: Leave evidence behind for post-mortems without masking outcomes.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! Diagnostics run over [`RemoteShell`]. Each step returns a `Result` so it
//! can be tested, and callers route it through [`best_effort`], which logs a
//! failure and moves on. No diagnostic failure ever reaches a test outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::info;

use crate::cli::CommandError;
use crate::ssh::RemoteShell;
use crate::ssh::shell_quote;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Resource-monitor output file on the manager host.
pub const ATOP_FILE: &str = "/tmp/atop.raw";

/// Commands that install and start the resource monitor, in order.
const MONITOR_COMMANDS: [&str; 4] = [
    "sudo apt-get update",
    "sudo apt-get install -f -y",
    "sudo apt-get install -y atop dtach",
    "dtach -n `mktemp -u /tmp/XXXX` sudo atop -w /tmp/atop.raw -i 1 100000000",
];

/// Process listing sorted by resident memory.
const PROCESS_TABLE_COMMAND: &str = "ps aux --sort -rss";

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Installs and starts `atop` recording to [`ATOP_FILE`].
///
/// # Errors
///
/// Returns the first failing command's error.
pub fn start_resource_monitor(shell: &RemoteShell) -> Result<(), CommandError> {
    info!(host = %shell.host(), "starting atop on manager");
    for command in MONITOR_COMMANDS {
        shell.run(command)?;
    }
    Ok(())
}

/// Uploads [`ATOP_FILE`] to `upload_url` when both exist. Returns whether an
/// upload ran.
///
/// # Errors
///
/// Returns the upload command's error.
pub fn upload_resource_monitor(
    shell: &RemoteShell,
    upload_url: Option<&str>,
) -> Result<bool, CommandError> {
    let Some(upload_url) = upload_url else {
        info!("no diagnostics upload url configured");
        return Ok(false);
    };
    if !shell.file_exists(ATOP_FILE)? {
        info!(file = ATOP_FILE, "atop file not found");
        return Ok(false);
    }
    info!(file = ATOP_FILE, url = upload_url, "uploading atop file");
    shell.run(&format!("curl --upload-file {ATOP_FILE} {}", shell_quote(upload_url)))?;
    Ok(true)
}

/// Logs the manager's process table.
///
/// # Errors
///
/// Returns the ssh command's error.
pub fn log_process_table(shell: &RemoteShell) -> Result<(), CommandError> {
    info!(host = %shell.host(), "running ps aux on manager");
    let output = shell.run(PROCESS_TABLE_COMMAND)?;
    info!(output = %output, "manager ps aux output");
    Ok(())
}

/// Logs and discards a diagnostic failure.
pub fn best_effort<T>(step: &str, result: Result<T, CommandError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            info!(step, error = %err, "diagnostic step failed");
            None
        }
    }
}
