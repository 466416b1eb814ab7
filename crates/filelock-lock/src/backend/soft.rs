//! Lockfile-existence fallback.
//!
//! The file itself is the lock: creating it with exclusive-create semantics
//! takes the lock and removing it gives the lock back. This is the one backend
//! that deletes its file, since a leftover file would mean "held forever".
//! A process that dies while holding a soft lock leaves the file behind.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use tracing::{trace, warn};

use super::{BackendKind, LockBackend, ensure_writable};

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftBackend;

fn is_contention(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::AlreadyExists => true,
        // Windows reports a file that is pending deletion as access denied.
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

#[cfg(unix)]
fn create_exclusive(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_exclusive(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

impl LockBackend for SoftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Soft
    }

    fn try_acquire(&self, path: &Path, mode: u32) -> io::Result<Option<File>> {
        // A read-only leftover can never be replaced by us; waiting on it
        // would spin until the deadline.
        ensure_writable(path)?;

        match create_exclusive(path, mode) {
            Ok(file) => Ok(Some(file)),
            Err(err) if is_contention(&err) => {
                trace!(path = %path.display(), "soft lock file already present");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn release(&self, path: &Path, handle: File) -> io::Result<()> {
        drop(handle);
        if let Err(err) = std::fs::remove_file(path) {
            // Someone cleared it by hand; the lock is gone either way.
            warn!(path = %path.display(), error = %err, "failed to remove soft lock file");
        }
        Ok(())
    }
}
