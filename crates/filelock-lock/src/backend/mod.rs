//! Platform lock primitives.
//!
//! Every backend implements the same contract: [`LockBackend::try_acquire`]
//! either hands back an open handle that now carries the lock, reports
//! `Ok(None)` when the lock is held elsewhere, or fails with a real OS error.
//! Contention must never surface as `Err`; the acquisition engine owns retrying.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use crate::error::LockError;

mod soft;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use soft::SoftBackend;
#[cfg(unix)]
pub use unix::KernelBackend;
#[cfg(windows)]
pub use windows::MandatoryBackend;

/// Default creation permission bits for lock files (`rw-rw----`).
pub const DEFAULT_MODE: u32 = 0o660;

/// Which locking primitive a [`FileLock`](crate::FileLock) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// `flock(2)` advisory kernel locks (Unix).
    Kernel,
    /// `LockFileEx` byte-range locks (Windows).
    Mandatory,
    /// Existence of the lock file is the lock. Works anywhere a file can be
    /// created exclusively, but only excludes cooperating processes.
    Soft,
}

impl BackendKind {
    /// The backend that fits the current platform.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(unix) {
            Self::Kernel
        } else if cfg!(windows) {
            Self::Mandatory
        } else {
            Self::Soft
        }
    }

    /// Whether the backend can be instantiated on this platform.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        match self {
            Self::Kernel => cfg!(unix),
            Self::Mandatory => cfg!(windows),
            Self::Soft => true,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Mandatory => "mandatory",
            Self::Soft => "soft",
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kernel" | "flock" | "unix" => Ok(Self::Kernel),
            "mandatory" | "windows" => Ok(Self::Mandatory),
            "soft" => Ok(Self::Soft),
            "auto" => Ok(Self::platform_default()),
            other => Err(format!(
                "unknown lock backend '{other}' (expected auto, kernel, mandatory or soft)"
            )),
        }
    }
}

/// A platform lock primitive operating on a single lock file.
pub trait LockBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Make one non-blocking attempt at the lock.
    ///
    /// Returns `Ok(Some(handle))` on success, `Ok(None)` when the lock is held
    /// elsewhere, and `Err` only for failures that retrying cannot fix. On
    /// `Ok(None)` no descriptor may be left open.
    fn try_acquire(&self, path: &Path, mode: u32) -> io::Result<Option<File>>;

    /// Give the lock up and close `handle`.
    ///
    /// Called exactly once per successful `try_acquire`.
    fn release(&self, path: &Path, handle: File) -> io::Result<()>;
}

/// Instantiate the backend for `kind`.
pub fn backend_for(kind: BackendKind) -> Result<Box<dyn LockBackend>, LockError> {
    match kind {
        #[cfg(unix)]
        BackendKind::Kernel => Ok(Box::new(KernelBackend)),
        #[cfg(windows)]
        BackendKind::Mandatory => Ok(Box::new(MandatoryBackend)),
        BackendKind::Soft => Ok(Box::new(SoftBackend)),
        #[allow(unreachable_patterns)]
        backend => Err(LockError::UnsupportedBackend { backend }),
    }
}

/// The backend for [`BackendKind::platform_default`].
#[must_use]
pub fn platform_backend() -> Box<dyn LockBackend> {
    #[cfg(unix)]
    {
        Box::new(KernelBackend)
    }
    #[cfg(windows)]
    {
        Box::new(MandatoryBackend)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Box::new(SoftBackend)
    }
}

/// Fail fast when the lock file exists but can never be opened for writing.
///
/// Only meaningful for backends where a permission error would otherwise be
/// mistaken for contention.
pub(crate) fn ensure_writable(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("lock path '{}' is a directory", path.display()),
        )),
        Ok(meta) if meta.permissions().readonly() => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("lock file '{}' is not writable", path.display()),
        )),
        _ => Ok(()),
    }
}
