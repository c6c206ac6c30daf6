//! Advisory file locks
//!
//! Locks are taken around a single operation and released when the guard is
//! dropped; they are never held across a call boundary.

use std::fs::File;
use std::io;

use fs2::FileExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Lock target: an open file whose descriptor carries the lock.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Block until the lock is granted.
    pub fn acquire(&self, mode: LockMode) -> io::Result<LockGuard<'_>> {
        match mode {
            LockMode::Shared => FileExt::lock_shared(&self.file)?,
            LockMode::Exclusive => FileExt::lock_exclusive(&self.file)?,
        }
        Ok(LockGuard { lock: self })
    }
}

/// Releases the lock on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a FileLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock.file);
    }
}
