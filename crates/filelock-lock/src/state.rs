//! Per-instance bookkeeping: the held handle, reentrancy depth and owner.

use std::fs::File;
use std::thread::ThreadId;

/// Mutable record behind a [`FileLock`](crate::FileLock)'s mutex.
///
/// Invariant: `handle.is_some() == (depth > 0) == owner.is_some()`.
#[derive(Debug, Default)]
pub(crate) struct LockState {
    handle: Option<File>,
    depth: u32,
    owner: Option<ThreadId>,
}

/// What a caller should do after looking at the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    /// The calling thread already holds the lock; depth was bumped.
    Reentered,
    /// Another thread of this instance holds the lock.
    HeldByOtherThread,
    /// Nobody in this instance holds it; the OS lock must be attempted.
    Vacant,
}

impl LockState {
    pub(crate) const fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) const fn is_held(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn is_owned_by(&self, thread: ThreadId) -> bool {
        self.is_held() && self.owner == Some(thread)
    }

    /// Reentrant fast path: bump the depth if `thread` already owns the lock.
    pub(crate) fn enter(&mut self, thread: ThreadId) -> Entry {
        if !self.is_held() {
            Entry::Vacant
        } else if self.owner == Some(thread) {
            self.depth += 1;
            Entry::Reentered
        } else {
            Entry::HeldByOtherThread
        }
    }

    /// Record the 0→1 transition after the backend handed out a handle.
    pub(crate) fn hold(&mut self, handle: File, thread: ThreadId) {
        debug_assert!(!self.is_held(), "hold() on an already held lock");
        self.handle = Some(handle);
        self.owner = Some(thread);
        self.depth = 1;
    }

    /// Drop one level. Returns the handle when the depth reached zero and the
    /// OS lock must be released; `None` otherwise, including when unheld.
    pub(crate) fn leave(&mut self) -> Option<File> {
        match self.depth {
            0 => None,
            1 => self.clear(),
            _ => {
                self.depth -= 1;
                None
            }
        }
    }

    /// Drop every level at once.
    pub(crate) fn clear(&mut self) -> Option<File> {
        self.depth = 0;
        self.owner = None;
        self.handle.take()
    }
}
