//! Shared utilities for the filelock CLI: tracing setup and exit codes.

pub mod exit_codes;
pub mod logging;

pub use exit_codes::{ExitCode, exit_code_for};
pub use logging::{init_tracing, lock_span};
