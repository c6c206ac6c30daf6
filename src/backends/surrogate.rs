//! Stand-in for a table that could not be opened.
//!
//! Remembers why the open failed and answers every operation with that
//! reason, so callers that already handle per-operation errors need no
//! special case for "table failed to open".

use tracing::warn;

use crate::error::{DictError, DictStatus, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::owner::Owner;
use crate::table::{Seq, Table, TableMeta};

#[derive(Debug)]
pub struct SurrogateTable {
    meta: TableMeta,
    reason: String,
}

impl SurrogateTable {
    pub fn new(
        kind: &str,
        name: &str,
        mode: OpenMode,
        flags: DictFlags,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let meta = TableMeta::new(kind, name, mode, flags).with_owner(Owner::Unknown);
        warn!("{} is unavailable. {}", meta.label(), reason);
        Self { meta, reason }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn unavailable(&self) -> DictError {
        DictError::Unavailable {
            table: self.meta.label(),
            reason: self.reason.clone(),
        }
    }
}

impl Table for SurrogateTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, _key: &str) -> Result<Option<String>> {
        Err(self.unavailable())
    }

    fn update(&mut self, _key: &str, _value: &str) -> Result<DictStatus> {
        Err(self.unavailable())
    }

    fn delete(&mut self, _key: &str) -> Result<DictStatus> {
        Err(self.unavailable())
    }

    fn sequence(&mut self, _how: Seq) -> Result<Option<(String, String)>> {
        Err(self.unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::table::DictHandle;

    #[test]
    fn test_every_operation_reports_the_reason() {
        let handle = DictHandle::new(SurrogateTable::new(
            "tcp",
            "localhost:1",
            OpenMode::ReadWrite,
            DictFlags::empty(),
            "connection refused",
        ));

        let err = handle.lookup("k").unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(handle.last_error(), ErrorKind::Config);

        assert!(handle.update("k", "v").is_err());
        assert!(handle.delete("k").is_err());
        assert!(handle.first().is_err());
        assert_eq!(handle.owner(), Owner::Unknown);
    }
}
