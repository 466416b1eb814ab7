//! CLI argument definitions and parsing structures
//!
//! Lock flags are shared between subcommands through [`LockArgs`] and are
//! turned into [`CliOverrides`] for the configuration layer.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use filelock_config::{BackendChoice, CliOverrides};

/// filelock - run commands under an advisory file lock
#[derive(Parser, Debug)]
#[command(name = "filelock")]
#[command(about = "Run commands under a reentrant advisory file lock")]
#[command(long_about = r#"
filelock serializes commands across processes with an advisory lock file.

EXAMPLES:
  # Run a build while holding /tmp/build.lock, waiting forever
  filelock run /tmp/build.lock -- make all

  # Give up after 5 seconds (exit code 9)
  filelock run /tmp/build.lock --timeout 5 -- make all

  # Check whether someone holds the lock
  filelock probe /tmp/build.lock

CONFIGURATION:
  Settings are merged as CLI > environment > .filelock.toml > defaults.
  Environment: FILELOCK_CONFIG, FILELOCK_TIMEOUT, FILELOCK_POLL_INTERVAL_MS,
  FILELOCK_BACKEND.

EXIT CODES:
  0  success        1  internal error
  2  bad arguments  9  lock held / timed out
  run otherwise exits with the command's own status, so a command that
  itself exits 9 looks the same as a lock timeout; the '✗ Failed to acquire
  lock' line on stderr appears only in the timeout case.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire the lock, run a command, release the lock
    Run {
        /// Lock file path
        path: PathBuf,

        #[command(flatten)]
        lock: LockArgs,

        /// Command and arguments to run while holding the lock
        #[arg(last = true, required = true, num_args = 1..)]
        command: Vec<OsString>,
    },

    /// Try the lock once and report `free` or `held`
    Probe {
        /// Lock file path
        path: PathBuf,

        #[command(flatten)]
        lock: LockArgs,
    },
}

/// Lock settings accepted on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct LockArgs {
    /// Seconds to wait for the lock; negative waits forever
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// Milliseconds between acquisition attempts
    #[arg(long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Locking backend: auto, kernel, mandatory or soft
    #[arg(long)]
    pub backend: Option<BackendChoice>,

    /// Octal permission bits for a newly created lock file (e.g. 660)
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<u32>,

    /// Create missing parent directories of the lock file
    #[arg(long)]
    pub create_parent_dirs: bool,
}

impl LockArgs {
    /// Overrides for config discovery; unset flags leave lower layers alone.
    pub fn to_overrides(&self, config_path: Option<PathBuf>) -> CliOverrides {
        CliOverrides {
            config_path,
            timeout_secs: self.timeout,
            poll_interval_ms: self.poll_interval,
            mode: self.mode,
            backend: self.backend,
            create_parent_dirs: self.create_parent_dirs.then_some(true),
        }
    }
}

/// Parse permission bits written as `660`, `0660` or `0o660`.
fn parse_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode '{raw}': {e}"))?;
    if mode > 0o777 {
        return Err(format!("mode '{raw}' has bits outside 0o777"));
    }
    Ok(mode)
}

/// Build the clap command (used by tests and help generation).
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
