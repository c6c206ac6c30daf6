//! Adapter from raw byte stores to the [`Table`] interface
//!
//! On-disk formats are out of scope for this crate, but they all share the
//! same table-level behavior: trailing-zero negotiation, the duplicate-key
//! policy, advisory locking per operation and optional sync after writes.
//! A store only has to move bytes; [`ByteTable`] does the rest.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::ops::Bound;

use tracing::warn;

use crate::error::{DictError, DictStatus, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::owner::Owner;
use crate::table::{FileLock, FileWatch, LockMode, NulMode, Seq, Table, TableMeta};

/// Minimal storage contract for byte-oriented backends
pub trait ByteStore: Send {
    fn get(&mut self, key: &[u8]) -> io::Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()>;

    /// Returns whether the key was present.
    fn remove(&mut self, key: &[u8]) -> io::Result<bool>;

    /// The entry following `after` in store order, or the first entry when
    /// `after` is `None`.
    fn next_entry(&mut self, after: Option<&[u8]>) -> io::Result<Option<(Vec<u8>, Vec<u8>)>>;

    /// Flush pending writes to stable storage.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// File used for advisory locking, change detection and ownership.
    fn backing_file(&self) -> Option<&File> {
        None
    }
}

#[derive(Debug)]
pub struct ByteTable<S> {
    meta: TableMeta,
    store: S,
    nul: NulMode,
    cursor: Option<Vec<u8>>,
}

impl<S: ByteStore> ByteTable<S> {
    pub fn new(
        kind: &str,
        name: &str,
        mode: OpenMode,
        flags: DictFlags,
        mut store: S,
    ) -> Result<Self> {
        let mut meta = TableMeta::new(kind, name, mode, flags);
        let label = meta.label();
        let io_err = |e| DictError::io(&label, e);

        if let Some(file) = store.backing_file() {
            meta.owner = Owner::from_metadata(&file.metadata().map_err(io_err)?);
            meta.lock = Some(FileLock::new(file.try_clone().map_err(io_err)?));
            meta.watch = Some(FileWatch::new(file.try_clone().map_err(io_err)?).map_err(io_err)?);
        }

        let nul = {
            let _guard = match (&meta.lock, flags.contains(DictFlags::OPEN_LOCK)) {
                (Some(lock), true) => Some(lock.acquire(LockMode::Exclusive).map_err(io_err)?),
                _ => None,
            };
            let first = store.next_entry(None).map_err(io_err)?;
            NulMode::resolve(flags, first.as_ref().map(|(key, _)| key.as_slice()))
        };

        Ok(Self {
            meta,
            store,
            nul,
            cursor: None,
        })
    }

    /// Trailing-zero mode currently in effect
    pub fn nul_mode(&self) -> NulMode {
        self.nul
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn io_err(&self, e: io::Error) -> DictError {
        DictError::io(self.meta.label(), e)
    }

    fn after_write(&mut self) -> Result<()> {
        if self.meta.flags.contains(DictFlags::SYNC_UPDATE) {
            self.store.sync().map_err(|e| self.io_err(e))?;
        }
        Ok(())
    }
}

impl<S: ByteStore> Table for ByteTable<S> {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        let label = self.meta.label();
        let _guard = self.meta.lock(LockMode::Shared)?;
        for (mode, stored_key) in self.nul.candidates(key.as_bytes()) {
            let found = self
                .store
                .get(&stored_key)
                .map_err(|e| DictError::io(&label, e))?;
            if let Some(value) = found {
                self.nul = mode;
                return Ok(Some(String::from_utf8_lossy(&mode.decode(&value)).into_owned()));
            }
        }
        Ok(None)
    }

    fn update(&mut self, key: &str, value: &str) -> Result<DictStatus> {
        let label = self.meta.label();
        let io_err = |e| DictError::io(&label, e);
        let _guard = self.meta.lock(LockMode::Exclusive)?;
        self.nul = self.nul.settled();
        let stored_key = self.nul.encode(key.as_bytes());

        if self.store.get(&stored_key).map_err(io_err)?.is_some() {
            let flags = self.meta.flags;
            if flags.contains(DictFlags::DUP_IGNORE) {
                return Ok(DictStatus::Fail);
            }
            if flags.contains(DictFlags::DUP_WARN) {
                warn!("{}: duplicate entry: \"{}\"", label, key);
                return Ok(DictStatus::Fail);
            }
            if !flags.contains(DictFlags::DUP_REPLACE) {
                return Err(DictError::DuplicateKey {
                    table: label,
                    key: key.to_string(),
                });
            }
        }
        self.store
            .put(&stored_key, &self.nul.encode(value.as_bytes()))
            .map_err(io_err)?;
        drop(_guard);
        self.after_write()?;
        Ok(DictStatus::Success)
    }

    fn delete(&mut self, key: &str) -> Result<DictStatus> {
        let label = self.meta.label();
        let _guard = self.meta.lock(LockMode::Exclusive)?;
        let mut removed = false;
        for (mode, stored_key) in self.nul.candidates(key.as_bytes()) {
            if self
                .store
                .remove(&stored_key)
                .map_err(|e| DictError::io(&label, e))?
            {
                self.nul = mode;
                removed = true;
                break;
            }
        }
        drop(_guard);
        if !removed {
            return Ok(DictStatus::Fail);
        }
        self.after_write()?;
        Ok(DictStatus::Success)
    }

    fn sequence(&mut self, how: Seq) -> Result<Option<(String, String)>> {
        let label = self.meta.label();
        let _guard = self.meta.lock(LockMode::Shared)?;
        let after = match (how, self.cursor.take()) {
            (Seq::First, _) => None,
            (Seq::Next, Some(cursor)) => Some(cursor),
            (Seq::Next, None) => return Ok(None),
        };
        let entry = self
            .store
            .next_entry(after.as_deref())
            .map_err(|e| DictError::io(&label, e))?;
        let Some((key, value)) = entry else {
            return Ok(None);
        };
        let mode = self.nul.settled();
        let decoded = (
            String::from_utf8_lossy(&mode.decode(&key)).into_owned(),
            String::from_utf8_lossy(&mode.decode(&value)).into_owned(),
        );
        self.cursor = Some(key);
        Ok(Some(decoded))
    }

    fn close(&mut self) {
        if let Err(e) = self.store.sync() {
            warn!("{}: sync on close failed: {}", self.meta.label(), e);
        }
    }
}

/// In-memory [`ByteStore`], optionally tied to a file for locking and
/// change detection
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    file: Option<File>,
    syncs: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: File) -> Self {
        Self {
            file: Some(file),
            ..Self::default()
        }
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            map: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Raw stored bytes, trailing zeros included
    pub fn raw(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    /// Number of `sync` calls so far
    pub fn sync_count(&self) -> usize {
        self.syncs
    }
}

impl ByteStore for MemoryStore {
    fn get(&mut self, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> io::Result<()> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> io::Result<bool> {
        Ok(self.map.remove(key).is_some())
    }

    fn next_entry(&mut self, after: Option<&[u8]>) -> io::Result<Option<(Vec<u8>, Vec<u8>)>> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(self
            .map
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn sync(&mut self) -> io::Result<()> {
        self.syncs += 1;
        Ok(())
    }

    fn backing_file(&self) -> Option<&File> {
        self.file.as_ref()
    }
}
