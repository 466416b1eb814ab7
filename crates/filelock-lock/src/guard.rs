//! Scoped acquisition.

use std::marker::PhantomData;
use std::path::Path;

use tracing::warn;

use crate::engine::FileLock;
use crate::error::LockError;

/// Holds one level of a [`FileLock`] and gives it back when dropped.
///
/// Exactly one `release` is issued per guard, whether the scope ends normally,
/// through `?`, by unwinding, or via [`LockGuard::release`]. Guards nest: each
/// one on the same thread adds a reentrancy level.
///
/// Like [`std::sync::MutexGuard`], a guard is not `Send`: the release must run
/// on the thread that owns the lock, otherwise it would be ignored.
///
/// ```compile_fail
/// use filelock_lock::FileLock;
///
/// let lock = FileLock::new("/tmp/x.lock");
/// let guard = lock.lock().unwrap();
/// std::thread::scope(|s| {
///     s.spawn(move || drop(guard));
/// });
/// ```
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a FileLock,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: shared access only reaches `&FileLock`, which is `Sync`.
unsafe impl Sync for LockGuard<'_> {}

impl<'a> LockGuard<'a> {
    pub(crate) fn new(lock: &'a FileLock) -> Self {
        Self {
            lock,
            released: false,
            _not_send: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.lock.lock_file_path()
    }

    /// Reentrancy depth of the underlying lock.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.lock.depth()
    }

    #[must_use]
    pub fn file_lock(&self) -> &'a FileLock {
        self.lock
    }

    /// Release now and surface any error instead of logging it.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.lock.release() {
            warn!(path = %self.lock.lock_file_path().display(), error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{FileLock, LockError, LockOptions};
    use std::time::Duration;
    use tempfile::TempDir;

    fn lock_at(dir: &TempDir) -> FileLock {
        let options = LockOptions::default().with_poll_interval(Duration::from_millis(5));
        FileLock::with_options(dir.path().join("guard.lock"), options).unwrap()
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);
        {
            let guard = lock.lock().unwrap();
            assert_eq!(guard.depth(), 1);
            assert_eq!(guard.path(), lock.lock_file_path());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_explicit_release_happens_once() {
        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);
        lock.acquire().unwrap();

        let guard = lock.lock().unwrap();
        assert_eq!(lock.depth(), 2);
        guard.release().unwrap();

        // The outer manual acquisition is still in place.
        assert_eq!(lock.depth(), 1);
        lock.release().unwrap();
    }

    #[test]
    fn test_nested_guards_unwind_in_order() {
        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);

        let outer = lock.lock().unwrap();
        {
            let _inner = lock.lock().unwrap();
            let _innermost = lock.try_lock().unwrap();
            assert_eq!(lock.depth(), 3);
        }
        assert_eq!(outer.depth(), 1);
        drop(outer);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);

        fn critical_section(lock: &FileLock) -> Result<(), LockError> {
            let _guard = lock.lock()?;
            Err(LockError::Timeout {
                path: lock.lock_file_path().to_path_buf(),
                waited: Duration::ZERO,
            })
        }

        assert!(critical_section(&lock).is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.lock().unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!lock.is_locked());
        // The lock stays usable after the unwind.
        lock.try_acquire().unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_lock_with_timeout_returns_guard() {
        let dir = TempDir::new().unwrap();
        let holder = lock_at(&dir);
        let contender = lock_at(&dir);

        let guard = holder.lock_with(Some(Duration::ZERO)).unwrap();
        let err = contender
            .lock_with(Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(err.is_timeout());

        drop(guard);
        let _second = contender.lock_with(None).unwrap();
        assert!(contender.is_locked());
    }

    #[test]
    fn test_guard_is_sync_but_stays_on_owner_thread() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<super::LockGuard<'static>>();

        let dir = TempDir::new().unwrap();
        let lock = lock_at(&dir);
        let other = lock_at(&dir);

        let guard = lock.lock().unwrap();
        let seen = std::thread::scope(|s| s.spawn(|| guard.depth()).join().unwrap());
        assert_eq!(seen, 1);

        drop(guard);
        assert!(!lock.is_locked());
        other.try_acquire().unwrap();
        other.release().unwrap();
    }
}
