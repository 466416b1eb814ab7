//! The acquisition engine: polling, timeouts, reentrancy and release.
//!
//! Waiting is done by polling a non-blocking backend attempt rather than by a
//! blocking OS call, so a deadline is always honoured. Waiters are not served
//! in FIFO order: whichever poll lands first after the holder lets go wins.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::backend::{self, BackendKind, DEFAULT_MODE, LockBackend};
use crate::error::LockError;
use crate::guard::LockGuard;
use crate::state::{Entry, LockState};

/// Sleep between two acquisition attempts unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-instance acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// How long [`FileLock::acquire`] waits. `None` waits forever.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    /// Permission bits used when the lock file is created.
    pub mode: u32,
    pub backend: BackendKind,
    /// Create missing parent directories before the first attempt.
    pub create_parent_dirs: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: DEFAULT_MODE,
            backend: BackendKind::platform_default(),
            create_parent_dirs: false,
        }
    }
}

impl LockOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_create_parent_dirs(mut self, create: bool) -> Self {
        self.create_parent_dirs = create;
        self
    }
}

/// A reentrant, thread-aware advisory lock on one file.
///
/// The first acquisition on a thread takes the OS lock; nested acquisitions on
/// the same thread only bump a counter. Any other thread, in this process or
/// another, has to wait until the counter drops back to zero.
///
/// `FileLock` is `Send + Sync`; share it with `Arc` to use it from several
/// threads. Dropping it gives up the OS lock if it is still held.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    options: LockOptions,
    backend: Box<dyn LockBackend>,
    state: Mutex<LockState>,
}

impl FileLock {
    /// Lock bound to `path` with default options and the platform backend.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(path, LockOptions::default(), backend::platform_backend())
    }

    /// Lock bound to `path` using the backend named in `options`.
    pub fn with_options(path: impl Into<PathBuf>, options: LockOptions) -> Result<Self, LockError> {
        let backend = backend::backend_for(options.backend)?;
        Ok(Self::with_backend(path, options, backend))
    }

    /// Lock bound to `path` driving a caller-supplied backend.
    pub fn with_backend(
        path: impl Into<PathBuf>,
        options: LockOptions,
        backend: Box<dyn LockBackend>,
    ) -> Self {
        let options = LockOptions {
            backend: backend.kind(),
            ..options
        };
        Self {
            path: path.into(),
            options,
            backend,
            state: Mutex::new(LockState::default()),
        }
    }

    #[must_use]
    pub fn lock_file_path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.options.backend
    }

    /// Whether any thread of this instance currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().is_held()
    }

    /// Current reentrancy depth; zero when unlocked.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.state().depth()
    }

    /// Whether the calling thread is the one holding the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state().is_owned_by(thread::current().id())
    }

    /// Acquire with the configured timeout and poll interval.
    pub fn acquire(&self) -> Result<(), LockError> {
        self.acquire_with(self.options.timeout, self.options.poll_interval)
    }

    /// Make exactly one attempt; fail with [`LockError::Timeout`] if the lock
    /// is held elsewhere.
    pub fn try_acquire(&self) -> Result<(), LockError> {
        self.acquire_with(Some(Duration::ZERO), self.options.poll_interval)
    }

    /// Acquire, polling every `poll_interval` until the lock is free or
    /// `timeout` has elapsed. `None` waits forever.
    ///
    /// Contention is retried; any other OS failure is returned right away.
    pub fn acquire_with(
        &self,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Result<(), LockError> {
        let me = thread::current().id();
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            {
                let mut state = self.state();
                match state.enter(me) {
                    Entry::Reentered => {
                        trace!(path = %self.path.display(), depth = state.depth(), "lock re-entered");
                        return Ok(());
                    }
                    Entry::HeldByOtherThread => {}
                    Entry::Vacant => {
                        attempts = attempts.saturating_add(1);
                        if let Some(handle) = self.attempt()? {
                            state.hold(handle, me);
                            debug!(
                                path = %self.path.display(),
                                backend = %self.options.backend,
                                attempts,
                                waited_ms = started.elapsed().as_millis() as u64,
                                "lock acquired"
                            );
                            return Ok(());
                        }
                    }
                }
            }

            let waited = started.elapsed();
            let pause = match timeout {
                Some(limit) if waited >= limit => {
                    debug!(
                        path = %self.path.display(),
                        attempts,
                        waited_ms = waited.as_millis() as u64,
                        "timed out waiting for lock"
                    );
                    return Err(LockError::Timeout {
                        path: self.path.clone(),
                        waited,
                    });
                }
                Some(limit) => poll_interval.min(limit - waited),
                None => poll_interval,
            };
            trace!(path = %self.path.display(), "lock busy, polling");
            thread::sleep(pause);
        }
    }

    /// Drop one level of the calling thread's hold. At depth zero the OS lock
    /// is released. Releasing an unheld lock, or one held by another thread,
    /// does nothing.
    pub fn release(&self) -> Result<(), LockError> {
        let mut state = self.state();
        if !state.is_held() {
            return Ok(());
        }
        if !state.is_owned_by(thread::current().id()) {
            warn!(
                path = %self.path.display(),
                "ignoring release from a thread that does not hold the lock"
            );
            return Ok(());
        }
        match state.leave() {
            Some(handle) => self.give_back(handle),
            None => {
                trace!(path = %self.path.display(), depth = state.depth(), "lock depth decreased");
                Ok(())
            }
        }
    }

    /// Release the lock regardless of depth or owning thread.
    pub fn release_all(&self) -> Result<(), LockError> {
        let mut state = self.state();
        match state.clear() {
            Some(handle) => self.give_back(handle),
            None => Ok(()),
        }
    }

    /// Acquire with the configured options and return a guard releasing on drop.
    pub fn lock(&self) -> Result<LockGuard<'_>, LockError> {
        self.acquire()?;
        Ok(LockGuard::new(self))
    }

    /// Like [`lock`](Self::lock) with an explicit timeout.
    pub fn lock_with(&self, timeout: Option<Duration>) -> Result<LockGuard<'_>, LockError> {
        self.acquire_with(timeout, self.options.poll_interval)?;
        Ok(LockGuard::new(self))
    }

    /// Like [`try_acquire`](Self::try_acquire), returning a guard.
    pub fn try_lock(&self) -> Result<LockGuard<'_>, LockError> {
        self.try_acquire()?;
        Ok(LockGuard::new(self))
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        // Every transition leaves the record consistent, so a panic elsewhere
        // while the mutex was held does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attempt(&self) -> Result<Option<std::fs::File>, LockError> {
        if self.options.create_parent_dirs
            && let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| LockError::io(&self.path, e))?;
        }
        self.backend
            .try_acquire(&self.path, self.options.mode)
            .map_err(|e| LockError::io(&self.path, e))
    }

    fn give_back(&self, handle: std::fs::File) -> Result<(), LockError> {
        let released = self
            .backend
            .release(&self.path, handle)
            .map_err(|e| LockError::io(&self.path, e));
        debug!(path = %self.path.display(), backend = %self.options.backend, "lock released");
        released
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = state.clear()
            && let Err(err) = self.backend.release(&self.path, handle)
        {
            warn!(path = %self.path.display(), error = %err, "failed to release lock on drop");
        }
    }
}
