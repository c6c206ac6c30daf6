//! `env`: the process environment as a table
//!
//! Lookup and update only. Updating calls `set_var`, which is only sound while
//! no other thread reads the environment; see the crate-level threading notes.

use super::OpenRequest;
use crate::error::{DictStatus, Result};
use crate::flags::DictFlags;
use crate::owner::Owner;
use crate::table::{Table, TableMeta};

pub const KIND: &str = "env";

#[derive(Debug)]
pub struct EnvTable {
    meta: TableMeta,
}

impl EnvTable {
    pub fn open(req: &OpenRequest<'_>) -> Result<Self> {
        Ok(Self {
            meta: TableMeta::new(KIND, req.name, req.mode, req.flags | DictFlags::FIXED)
                .with_owner(Owner::Trusted),
        })
    }
}

impl Table for EnvTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Ok(None);
        }
        Ok(std::env::var(key).ok())
    }

    fn update(&mut self, key: &str, value: &str) -> Result<DictStatus> {
        if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
            return Ok(DictStatus::Fail);
        }
        std::env::set_var(key, value);
        Ok(DictStatus::Success)
    }
}
