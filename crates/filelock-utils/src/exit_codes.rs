//! Process exit codes for the filelock CLI
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | I/O or other internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 9 | `LOCK_HELD` | The lock is held elsewhere or the wait timed out |
//!
//! `filelock run` otherwise exits with the child's own status.

use filelock_config::ConfigError;
use filelock_lock::LockError;

/// Exit codes matching the table above.
///
/// ```rust
/// use filelock_utils::ExitCode;
///
/// assert_eq!(ExitCode::LOCK_HELD.as_i32(), 9);
/// assert_eq!(ExitCode::SUCCESS, ExitCode::from_i32(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - I/O failure or anything unclassified
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration values
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Lock held - another owner kept the lock past the timeout
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl From<&LockError> for ExitCode {
    fn from(err: &LockError) -> Self {
        match err {
            LockError::Timeout { .. } => ExitCode::LOCK_HELD,
            LockError::UnsupportedBackend { .. } => ExitCode::CLI_ARGS,
            LockError::Io { .. } => ExitCode::INTERNAL,
        }
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        ExitCode::CLI_ARGS
    }
}

/// Map an error chain to an exit code using the first typed error found.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(lock_err) = cause.downcast_ref::<LockError>() {
            return lock_err.into();
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return config_err.into();
        }
    }
    ExitCode::INTERNAL
}
