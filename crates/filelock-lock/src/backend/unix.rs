//! `flock(2)` kernel locks.
//!
//! The lock file is never unlinked here. Removing it on release would let a
//! waiter that already opened the old inode lock it while a newcomer creates
//! and locks a fresh inode at the same path, and both would believe they hold
//! the lock.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::{BackendKind, LockBackend};

/// Umask in effect while the lock file is created, so group members can open
/// it no matter how restrictive the caller's own umask is.
const CREATION_UMASK: libc::mode_t = 0o002;

/// Serializes set → open → restore across threads. Without it two
/// overlapping guards can restore each other's temporary mask.
static UMASK_LOCK: Mutex<()> = Mutex::new(());

/// Kernel-level advisory lock backend for Unix-like systems.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelBackend;

/// Temporarily replaces the process umask, restoring the previous value on drop.
///
/// The umask is process-global, so the guard must wrap nothing but the single
/// `open` call that creates the file. [`UMASK_LOCK`] is held for the guard's
/// whole life and released only after the previous mask is back.
struct UmaskGuard {
    previous: libc::mode_t,
    _serial: MutexGuard<'static, ()>,
}

impl UmaskGuard {
    fn set(mask: libc::mode_t) -> Self {
        let serial = UMASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: umask(2) has no preconditions and always succeeds.
        let previous = unsafe { libc::umask(mask) };
        Self {
            previous,
            _serial: serial,
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // SAFETY: see `UmaskGuard::set`.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

fn open_lock_file(path: &Path, mode: u32) -> io::Result<File> {
    let _umask = UmaskGuard::set(CREATION_UMASK);
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: the descriptor belongs to `file`, which outlives this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Whether the locked descriptor still refers to the file living at `path`.
///
/// Another party may unlink or replace the lock file between our `open` and
/// `flock`; a lock taken on the orphaned inode excludes nobody.
fn refers_to_path(file: &File, path: &Path) -> io::Result<bool> {
    let held = file.metadata()?;
    if held.nlink() == 0 {
        return Ok(false);
    }
    match std::fs::metadata(path) {
        Ok(on_disk) => Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl LockBackend for KernelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Kernel
    }

    fn try_acquire(&self, path: &Path, mode: u32) -> io::Result<Option<File>> {
        let file = open_lock_file(path, mode)?;

        // Every flock failure counts as "not this time"; dropping `file` closes
        // the descriptor so nothing leaks between polls.
        if let Err(err) = flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            trace!(path = %path.display(), error = %err, "flock attempt did not succeed");
            return Ok(None);
        }

        if !refers_to_path(&file, path)? {
            debug!(path = %path.display(), "lock file replaced while locking, retrying");
            return Ok(None);
        }

        Ok(Some(file))
    }

    fn release(&self, path: &Path, handle: File) -> io::Result<()> {
        let unlocked = flock(&handle, libc::LOCK_UN);
        drop(handle);
        trace!(path = %path.display(), "flock released");
        unlocked
    }
}
