//! `texthash`: a `key value` text file loaded into memory at open time
//!
//! Each logical line (see [`crate::loader::LogicalLines`]) holds a key, white
//! space and a value. The file stays open so the registry can notice when it
//! changes and the table should be reopened.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tracing::debug;

use super::ht::HashTable;
use super::OpenRequest;
use crate::error::{DictError, Result};
use crate::flags::DictFlags;
use crate::loader::LogicalLines;
use crate::owner::Owner;
use crate::table::{FileLock, FileWatch, LockMode, Table};

pub const KIND: &str = "texthash";

pub fn open(req: &OpenRequest<'_>) -> Result<HashTable> {
    if !req.mode.is_read_only() {
        return Err(DictError::usage(req.label(), "texthash map requires read-only access"));
    }
    let label = req.label();
    let io_err = |e| DictError::io(&label, e);

    let file = File::open(req.name).map_err(io_err)?;
    let lock_mode = if req.flags.contains(DictFlags::OPEN_LOCK) {
        Some(LockMode::Exclusive)
    } else if req.flags.contains(DictFlags::LOCK) {
        Some(LockMode::Shared)
    } else {
        None
    };
    let lock = FileLock::new(file.try_clone().map_err(io_err)?);
    let _guard = match lock_mode {
        Some(mode) => Some(lock.acquire(mode).map_err(io_err)?),
        None => None,
    };

    let mut table = HashTable::with_kind(KIND, req.name, req.mode, req.flags);
    let flags = table.meta().flags;
    for item in LogicalLines::new(BufReader::new(&file)) {
        let (line, text) = item.map_err(io_err)?;
        let (key, value) = match text.split_once(|c: char| c.is_whitespace()) {
            Some((key, value)) => (key, value.trim()),
            None => {
                return Err(DictError::Syntax {
                    origin: PathBuf::from(req.name),
                    line,
                    message: format!("expected format: key whitespace value: \"{text}\""),
                })
            }
        };
        let key = flags.fold(key);
        if table.contains_key(&key) && !flags.intersects(DictFlags::DUP_MASK) {
            return Err(DictError::DuplicateKey {
                table: label.clone(),
                key: key.into_owned(),
            });
        }
        table.insert(&key, value);
    }

    let meta = file.metadata().map_err(io_err)?;
    let owner = Owner::from_metadata(&meta);
    let watch = FileWatch::new(file).map_err(io_err)?;
    let table_meta = table.meta_mut();
    table_meta.owner = owner;
    table_meta.watch = Some(watch);
    debug!("{}: loaded {} entries", label, table.len());
    Ok(table)
}
