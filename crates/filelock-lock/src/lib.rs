//! Reentrant advisory file locks for inter-process mutual exclusion
//!
//! A [`FileLock`] binds to one lock file and offers a single lifecycle on every
//! platform: acquire with an optional timeout (polling a non-blocking OS
//! attempt), reentrant counting per thread, and release through an explicit
//! call or a [`LockGuard`].
//!
//! Three backends implement the OS side:
//!
//! | Backend | Primitive | Lock file after release |
//! |---------|-----------|-------------------------|
//! | [`BackendKind::Kernel`] | `flock(2)` (Unix) | kept |
//! | [`BackendKind::Mandatory`] | `LockFileEx` (Windows) | kept |
//! | [`BackendKind::Soft`] | exclusive create | removed |
//!
//! The locking is advisory: it coordinates processes that use it and is not a
//! security boundary. Waiters are not served in FIFO order.
//!
//! ```no_run
//! use filelock_lock::FileLock;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), filelock_lock::LockError> {
//! let lock = FileLock::new("/tmp/x.lock");
//! {
//!     let _guard = lock.lock_with(Some(Duration::from_secs(5)))?;
//!     // critical section
//! }
//! assert!(!lock.is_locked());
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod engine;
mod error;
mod guard;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use backend::{BackendKind, DEFAULT_MODE, LockBackend, backend_for, platform_backend};
pub use engine::{DEFAULT_POLL_INTERVAL, FileLock, LockOptions};
pub use error::LockError;
pub use guard::LockGuard;
