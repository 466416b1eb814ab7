//! `LockFileEx` byte-range locks.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::windows::io::AsRawHandle;
use std::path::Path;

use tracing::trace;
use winapi::shared::winerror::{ERROR_ACCESS_DENIED, ERROR_SHARING_VIOLATION};
use winapi::um::fileapi::{LockFileEx, UnlockFileEx};
use winapi::um::minwinbase::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, OVERLAPPED};
use winapi::um::winnt::HANDLE;

use super::{BackendKind, LockBackend, ensure_writable};

/// Mandatory byte-range lock backend for Windows.
///
/// Locks the first byte of the lock file. Like the kernel backend, the file is
/// left on disk after release.
#[derive(Debug, Default, Clone, Copy)]
pub struct MandatoryBackend;

fn is_contention(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error().map(|code| code as u32),
        Some(ERROR_ACCESS_DENIED | ERROR_SHARING_VIOLATION)
    )
}

fn lock_first_byte(file: &File) -> io::Result<()> {
    // SAFETY: the handle belongs to `file`, which outlives this call, and the
    // zeroed OVERLAPPED selects offset 0.
    let ok = unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn unlock_first_byte(file: &File) -> io::Result<()> {
    // SAFETY: must name the same region `lock_first_byte` locked.
    let ok = unsafe {
        let mut overlapped: OVERLAPPED = std::mem::zeroed();
        UnlockFileEx(file.as_raw_handle() as HANDLE, 0, 1, 0, &mut overlapped)
    };
    if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl LockBackend for MandatoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mandatory
    }

    fn try_acquire(&self, path: &Path, _mode: u32) -> io::Result<Option<File>> {
        ensure_writable(path)?;

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
        {
            Ok(file) => file,
            Err(err) if is_contention(&err) => return Ok(None),
            Err(err) => return Err(err),
        };

        if let Err(err) = lock_first_byte(&file) {
            trace!(path = %path.display(), error = %err, "LockFileEx attempt did not succeed");
            return Ok(None);
        }

        Ok(Some(file))
    }

    fn release(&self, path: &Path, handle: File) -> io::Result<()> {
        let unlocked = unlock_first_byte(&handle);
        drop(handle);
        trace!(path = %path.display(), "LockFileEx released");
        unlocked
    }
}
