//! filelock - reentrant cross-platform advisory file locks
//!
//! filelock can be used in two ways:
//! - **CLI**: `filelock run <PATH> -- <CMD>...` runs a command while holding
//!   the lock, `filelock probe <PATH>` reports whether it is free
//! - **Library**: embed [`FileLock`] to serialize work across processes
//!
//! # Quick Start (Library)
//!
//! ```no_run
//! use filelock::{FileLock, LockOptions};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), filelock::LockError> {
//! let options = LockOptions::default().with_timeout(Some(Duration::from_secs(10)));
//! let lock = FileLock::with_options("/tmp/build.lock", options)?;
//!
//! let guard = lock.lock()?;
//! // Reentrant: the same thread may lock again without blocking.
//! let inner = lock.lock()?;
//! assert_eq!(lock.depth(), 2);
//! drop(inner);
//! drop(guard);
//! assert!(!lock.is_locked());
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`FileLock`], [`LockOptions`], [`LockGuard`] - the lock and its guard
//! - [`BackendKind`], [`LockBackend`] - OS locking primitives
//! - [`LockError`] - lock failures
//! - [`Config`] - layered configuration (CLI > env > `.filelock.toml` > defaults)
//! - [`ExitCode`] - CLI exit codes

pub use filelock_config::{BackendChoice, CliOverrides, Config, ConfigError, ConfigSource};
pub use filelock_lock::{
    BackendKind, DEFAULT_MODE, DEFAULT_POLL_INTERVAL, FileLock, LockBackend, LockError,
    LockGuard, LockOptions, backend_for, platform_backend,
};
pub use filelock_utils::ExitCode;

pub mod cli;
