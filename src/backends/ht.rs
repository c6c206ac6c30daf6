//! `ht`: in-memory table
//!
//! Full read/write/delete/iterate support with no persistence. Also the
//! table the registry provisions for unknown names on update or load.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::warn;

use super::OpenRequest;
use crate::error::{DictStatus, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::table::{Seq, Table, TableMeta};

pub const KIND: &str = "ht";

#[derive(Debug)]
pub struct HashTable {
    meta: TableMeta,
    map: BTreeMap<String, String>,
    /// Last key returned by `sequence`
    cursor: Option<String>,
}

impl HashTable {
    pub fn new(name: impl Into<String>, mode: OpenMode, flags: DictFlags) -> Self {
        Self::with_kind(KIND, name, mode, flags)
    }

    /// An in-memory table presented under another type tag.
    pub(crate) fn with_kind(
        kind: &str,
        name: impl Into<String>,
        mode: OpenMode,
        flags: DictFlags,
    ) -> Self {
        Self {
            meta: TableMeta::new(kind, name, mode, flags | DictFlags::FIXED),
            map: BTreeMap::new(),
            cursor: None,
        }
    }

    pub fn open(req: &OpenRequest<'_>) -> Result<Self> {
        Ok(Self::new(req.name, req.mode, req.flags))
    }

    /// Store a value without going through a handle, applying the
    /// duplicate-key policy. Used while populating a table at open time.
    pub(crate) fn insert(&mut self, key: &str, value: &str) -> DictStatus {
        let flags = self.meta.flags;
        if let Some(old) = self.map.get(key) {
            if flags.contains(DictFlags::DUP_IGNORE) {
                return DictStatus::Fail;
            }
            if flags.contains(DictFlags::DUP_WARN) {
                warn!(
                    "{}: duplicate entry: \"{}\" (keeping \"{}\")",
                    self.meta.label(),
                    key,
                    old
                );
                return DictStatus::Fail;
            }
        }
        self.map.insert(key.to_string(), value.to_string());
        DictStatus::Success
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Table for HashTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn update(&mut self, key: &str, value: &str) -> Result<DictStatus> {
        Ok(self.insert(key, value))
    }

    fn delete(&mut self, key: &str) -> Result<DictStatus> {
        Ok(match self.map.remove(key) {
            Some(_) => DictStatus::Success,
            None => DictStatus::Fail,
        })
    }

    fn sequence(&mut self, how: Seq) -> Result<Option<(String, String)>> {
        let next = match (how, &self.cursor) {
            (Seq::First, _) => self.map.iter().next(),
            (Seq::Next, Some(last)) => self
                .map
                .range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                .next(),
            (Seq::Next, None) => None,
        };
        let next = next.map(|(k, v)| (k.clone(), v.clone()));
        self.cursor = next.as_ref().map(|(k, _)| k.clone());
        Ok(next)
    }

    fn close(&mut self) {
        self.map.clear();
        self.cursor = None;
    }
}
