//! Command implementations
//!
//! Each command returns the exit code to report on success; errors bubble up
//! as `anyhow::Error` and are mapped by [`super::run`].

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Instant;
use tracing::{debug, info};

use filelock_config::{CliOverrides, Config};
use filelock_lock::{FileLock, LockError};
use filelock_utils::{ExitCode, lock_span};

/// Build a lock for `path` from the merged configuration.
fn open_lock(path: PathBuf, overrides: &CliOverrides) -> Result<FileLock> {
    let config = Config::discover(overrides).context("Failed to load configuration")?;
    for (key, source) in &config.source_attribution {
        debug!(key = %key, source = %source, "config value");
    }
    let lock = FileLock::with_options(path, config.to_lock_options())?;
    Ok(lock)
}

/// Execute `filelock run`.
pub fn execute_run_command(
    path: PathBuf,
    overrides: &CliOverrides,
    command: &[OsString],
) -> Result<ExitCode> {
    let lock = open_lock(path, overrides)?;
    let span = lock_span(lock.lock_file_path(), lock.backend_kind().as_str());
    let _entered = span.enter();

    let started = Instant::now();
    let guard = lock.lock().with_context(|| {
        format!(
            "Failed to acquire lock {}",
            lock.lock_file_path().display()
        )
    })?;
    info!(
        waited_ms = started.elapsed().as_millis() as u64,
        "lock acquired"
    );

    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("no command given");
    };
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", program.to_string_lossy()))?;

    guard.release()?;
    info!(status = %status, "lock released");
    Ok(child_exit_code(status))
}

/// Execute `filelock probe`: one non-blocking attempt, then release.
pub fn execute_probe_command(path: PathBuf, overrides: &CliOverrides) -> Result<ExitCode> {
    let lock = open_lock(path, overrides)?;
    match lock.try_lock() {
        Ok(guard) => {
            guard.release()?;
            println!("free");
            Ok(ExitCode::SUCCESS)
        }
        Err(LockError::Timeout { .. }) => {
            println!("held");
            Ok(ExitCode::LOCK_HELD)
        }
        Err(err) => Err(err.into()),
    }
}

/// Map a child's status to our exit code; signals follow the shell's `128 + n`.
fn child_exit_code(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return ExitCode::from_i32(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitCode::from_i32(128 + signal);
        }
    }
    ExitCode::INTERNAL
}
