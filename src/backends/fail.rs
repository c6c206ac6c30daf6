//! `fail`: a table whose every operation fails with a soft error.
//! Useful for testing retry handling in callers.

use super::OpenRequest;
use crate::error::{DictError, DictStatus, Result};
use crate::table::{Seq, Table, TableMeta};

pub const KIND: &str = "fail";

#[derive(Debug)]
pub struct FailTable {
    meta: TableMeta,
}

impl FailTable {
    pub fn open(req: &OpenRequest<'_>) -> Result<Self> {
        Ok(Self {
            meta: TableMeta::new(KIND, req.name, req.mode, req.flags),
        })
    }

    fn fail(&self) -> DictError {
        DictError::Retry {
            table: self.meta.label(),
            reason: "table is configured to fail".to_string(),
        }
    }
}

impl Table for FailTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, _key: &str) -> Result<Option<String>> {
        Err(self.fail())
    }

    fn update(&mut self, _key: &str, _value: &str) -> Result<DictStatus> {
        Err(self.fail())
    }

    fn delete(&mut self, _key: &str) -> Result<DictStatus> {
        Err(self.fail())
    }

    fn sequence(&mut self, _how: Seq) -> Result<Option<(String, String)>> {
        Err(self.fail())
    }
}
