//! Instrumented backend for asserting how often the OS lock is touched.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{self, BackendKind, LockBackend};

/// Call counters shared between a [`CountingBackend`] and the test holding it.
#[derive(Debug, Default)]
pub struct BackendCounters {
    attempts: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl BackendCounters {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Wraps a real backend and counts attempts, successes and releases.
#[derive(Debug)]
pub struct CountingBackend {
    inner: Box<dyn LockBackend>,
    counters: Arc<BackendCounters>,
}

impl CountingBackend {
    pub fn new(inner: Box<dyn LockBackend>) -> (Self, Arc<BackendCounters>) {
        let counters = Arc::new(BackendCounters::default());
        let backend = Self {
            inner,
            counters: Arc::clone(&counters),
        };
        (backend, counters)
    }

    /// Counting wrapper around the platform's default backend.
    pub fn platform() -> (Self, Arc<BackendCounters>) {
        Self::new(backend::platform_backend())
    }
}

impl LockBackend for CountingBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn try_acquire(&self, path: &Path, mode: u32) -> io::Result<Option<File>> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        let handle = self.inner.try_acquire(path, mode)?;
        if handle.is_some() {
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        }
        Ok(handle)
    }

    fn release(&self, path: &Path, handle: File) -> io::Result<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(path, handle)
    }
}
