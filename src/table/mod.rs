//! The table capability interface
//!
//! A [`Table`] is one concrete lookup/update/delete/iterate implementation.
//! Tables are shared through [`DictHandle`], which serializes access, applies
//! key folding and read-only checks uniformly, and records the last error of
//! every operation so callers can tell "not found" from "broken".

mod lock;
mod nul;
mod watch;

pub use lock::{FileLock, LockGuard, LockMode};
pub use nul::{NulMode, DEFAULT_NUL_MODE};
pub use watch::FileWatch;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{DictError, DictStatus, ErrorKind, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::owner::Owner;

/// Iteration request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seq {
    First,
    Next,
}

/// Attributes shared by every table implementation
#[derive(Debug)]
pub struct TableMeta {
    /// Backend type tag, e.g. `ht` or `tcp`
    pub kind: String,
    /// Instance name, e.g. a file name or `host:port`
    pub name: String,
    pub flags: DictFlags,
    pub mode: OpenMode,
    pub owner: Owner,
    pub last_error: ErrorKind,
    /// Change token for file-backed tables
    pub watch: Option<FileWatch>,
    /// Advisory lock target for tables that opt into locking
    pub lock: Option<FileLock>,
}

impl TableMeta {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        mode: OpenMode,
        flags: DictFlags,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            flags,
            mode,
            owner: Owner::Trusted,
            last_error: ErrorKind::None,
            watch: None,
            lock: None,
        }
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    /// `kind:name`, as used in diagnostics
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }

    pub fn not_supported(&self, op: &'static str) -> DictError {
        DictError::NotSupported {
            table: self.label(),
            op,
        }
    }

    /// Take the advisory lock if the `lock` flag asks for it.
    pub fn lock(&self, mode: LockMode) -> Result<Option<LockGuard<'_>>> {
        match (&self.lock, self.flags.contains(DictFlags::LOCK)) {
            (Some(lock), true) => lock
                .acquire(mode)
                .map(Some)
                .map_err(|e| DictError::io(self.label(), e)),
            _ => Ok(None),
        }
    }
}

/// Capability interface every backend implements.
///
/// Only `lookup` is mandatory; the other operations default to
/// [`DictError::NotSupported`].
pub trait Table: Send {
    fn meta(&self) -> &TableMeta;

    fn meta_mut(&mut self) -> &mut TableMeta;

    /// Find the value for `key`. `Ok(None)` means not found.
    fn lookup(&mut self, key: &str) -> Result<Option<String>>;

    fn update(&mut self, _key: &str, _value: &str) -> Result<DictStatus> {
        Err(self.meta().not_supported("update"))
    }

    fn delete(&mut self, _key: &str) -> Result<DictStatus> {
        Err(self.meta().not_supported("delete"))
    }

    fn sequence(&mut self, _how: Seq) -> Result<Option<(String, String)>> {
        Err(self.meta().not_supported("sequence"))
    }

    /// Release resources. Called exactly once, when the last registry
    /// reference goes away.
    fn close(&mut self) {}
}

/// Shared, cloneable reference to an open table.
#[derive(Clone)]
pub struct DictHandle {
    inner: Arc<Mutex<Box<dyn Table>>>,
}

impl std::fmt::Debug for DictHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table();
        f.debug_struct("DictHandle")
            .field("kind", &table.meta().kind)
            .field("name", &table.meta().name)
            .finish()
    }
}

impl DictHandle {
    pub fn new(table: impl Table + 'static) -> Self {
        Self::from_box(Box::new(table))
    }

    pub fn from_box(table: Box<dyn Table>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    fn table(&self) -> MutexGuard<'_, Box<dyn Table>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if both handles refer to the same table instance.
    pub fn ptr_eq(&self, other: &DictHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn lookup(&self, key: &str) -> Result<Option<String>> {
        let mut table = self.table();
        let key = table.meta().flags.fold(key).into_owned();
        let result = table.lookup(&key);
        record(&mut **table, "lookup", &key, &result);
        result
    }

    pub fn update(&self, key: &str, value: &str) -> Result<DictStatus> {
        let mut table = self.table();
        let result = match check_writable(table.meta()) {
            Ok(()) => {
                let key = table.meta().flags.fold(key).into_owned();
                table.update(&key, value)
            }
            Err(e) => Err(e),
        };
        record(&mut **table, "update", key, &result);
        result
    }

    pub fn delete(&self, key: &str) -> Result<DictStatus> {
        let mut table = self.table();
        let result = match check_writable(table.meta()) {
            Ok(()) => {
                let key = table.meta().flags.fold(key).into_owned();
                table.delete(&key)
            }
            Err(e) => Err(e),
        };
        record(&mut **table, "delete", key, &result);
        result
    }

    pub fn sequence(&self, how: Seq) -> Result<Option<(String, String)>> {
        let mut table = self.table();
        let result = table.sequence(how);
        record(&mut **table, "sequence", "", &result);
        result
    }

    pub fn first(&self) -> Result<Option<(String, String)>> {
        self.sequence(Seq::First)
    }

    pub fn next(&self) -> Result<Option<(String, String)>> {
        self.sequence(Seq::Next)
    }

    pub(crate) fn close(&self) {
        let mut table = self.table();
        debug!("closing {}", table.meta().label());
        table.close();
    }

    pub fn kind(&self) -> String {
        self.table().meta().kind.clone()
    }

    pub fn name(&self) -> String {
        self.table().meta().name.clone()
    }

    pub fn label(&self) -> String {
        self.table().meta().label()
    }

    pub fn flags(&self) -> DictFlags {
        self.table().meta().flags
    }

    pub fn mode(&self) -> OpenMode {
        self.table().meta().mode
    }

    pub fn owner(&self) -> Owner {
        self.table().meta().owner
    }

    pub fn last_error(&self) -> ErrorKind {
        self.table().meta().last_error
    }

    /// Whether the backing file changed since the table was opened.
    pub fn changed(&self) -> bool {
        self.table()
            .meta()
            .watch
            .as_ref()
            .is_some_and(FileWatch::changed)
    }
}

fn check_writable(meta: &TableMeta) -> Result<()> {
    if meta.mode.is_read_only() {
        return Err(DictError::ReadOnly {
            table: meta.label(),
        });
    }
    Ok(())
}

fn record<T>(table: &mut dyn Table, op: &str, key: &str, result: &Result<T>) {
    let meta = table.meta_mut();
    meta.last_error = match result {
        Ok(_) => ErrorKind::None,
        Err(e) => e.kind(),
    };
    if meta.flags.contains(DictFlags::DEBUG) {
        match result {
            Ok(_) => debug!("{}: {} \"{}\" ok", meta.label(), op, key),
            Err(e) => debug!("{}: {} \"{}\" failed: {}", meta.label(), op, key, e),
        }
    }
}
