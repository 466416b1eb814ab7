//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initializes tracing, dispatches to the command
//! handlers and prints every error itself. `main` only maps the returned code
//! to the process exit status.

use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;
use filelock_utils::{ExitCode, exit_code_for, init_tracing};

/// Main CLI execution function.
///
/// Returns `Ok(())` for exit code 0 and `Err(code)` for anything else,
/// including a child's non-zero status under `filelock run`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    // An embedding host may already have installed a subscriber.
    let _ = init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            path,
            lock,
            command,
        } => commands::execute_run_command(path, &lock.to_overrides(cli.config), &command),
        Commands::Probe { path, lock } => {
            commands::execute_probe_command(path, &lock.to_overrides(cli.config))
        }
    };

    match result {
        Ok(code) if code.is_success() => Ok(()),
        Ok(code) => Err(code),
        Err(err) => {
            eprintln!("✗ {err:#}");
            Err(exit_code_for(&err))
        }
    }
}
