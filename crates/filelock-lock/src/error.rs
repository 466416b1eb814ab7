//! Error type for lock acquisition and release.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::BackendKind;

/// Errors surfaced by [`FileLock`](crate::FileLock) operations.
///
/// Contention is never an error on its own: a backend that cannot take the lock
/// on a given attempt reports "not acquired" and the poll loop keeps going. Only
/// an elapsed deadline turns contention into [`LockError::Timeout`].
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The acquisition deadline elapsed before the lock became free.
    #[error("The file lock '{}' could not be acquired within {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    /// An OS-level failure unrelated to contention (permissions, descriptor
    /// exhaustion, missing parent directory, ...). Retrying cannot help.
    #[error("IO error on lock file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The requested backend does not exist on this platform.
    #[error("Lock backend '{backend}' is not supported on this platform")]
    UnsupportedBackend { backend: BackendKind },
}

impl LockError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error is the expected "someone else holds it" outcome.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The lock file path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Timeout { path, .. } | Self::Io { path, .. } => Some(path),
            Self::UnsupportedBackend { .. } => None,
        }
    }
}
