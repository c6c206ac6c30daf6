//! `static`: one fixed value for every key
//!
//! `static:value` or `static:{value with spaces}`. With `src_rhs_is_file` the
//! name is a file path and the value is the file's contents, base64 encoded so
//! arbitrary bytes survive.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::{syntax, OpenRequest};
use crate::error::{DictError, Result};
use crate::flags::DictFlags;
use crate::owner::Owner;
use crate::table::{Table, TableMeta};

pub const KIND: &str = "static";

#[derive(Debug)]
pub struct StaticTable {
    meta: TableMeta,
    value: String,
}

impl StaticTable {
    pub fn open(req: &OpenRequest<'_>) -> Result<Self> {
        let value = if req.flags.contains(DictFlags::SRC_RHS_IS_FILE) {
            let path = syntax::unquote(req.name);
            let bytes = std::fs::read(path).map_err(|e| DictError::io(req.label(), e))?;
            STANDARD.encode(bytes)
        } else {
            syntax::unquote(req.name).to_string()
        };
        Ok(Self {
            meta: TableMeta::new(KIND, req.name, req.mode, req.flags | DictFlags::FIXED)
                .with_owner(Owner::Trusted),
            value,
        })
    }
}

impl Table for StaticTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, _key: &str) -> Result<Option<String>> {
        Ok(Some(self.value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DictConfig;
    use crate::flags::OpenMode;
    use std::io::Write;

    fn open(name: &str, flags: DictFlags) -> Result<StaticTable> {
        let config = DictConfig::default();
        StaticTable::open(&OpenRequest {
            kind: KIND,
            name,
            mode: OpenMode::ReadOnly,
            flags,
            config: &config,
        })
    }

    #[test]
    fn test_ignores_key() {
        let mut table = open("OK", DictFlags::empty()).unwrap();
        assert_eq!(table.lookup("anything").unwrap().as_deref(), Some("OK"));
        assert_eq!(table.lookup("").unwrap().as_deref(), Some("OK"));
    }

    #[test]
    fn test_braces_allow_spaces() {
        let mut table = open("{ 550 go away }", DictFlags::empty()).unwrap();
        assert_eq!(table.lookup("k").unwrap().as_deref(), Some("550 go away"));
    }

    #[test]
    fn test_value_from_file_is_base64() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hi\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut table = open(&path, DictFlags::SRC_RHS_IS_FILE).unwrap();
        assert_eq!(table.lookup("k").unwrap().as_deref(), Some("aGkK"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = open("/nonexistent/ob-dict/static", DictFlags::SRC_RHS_IS_FILE).unwrap_err();
        assert!(matches!(err, DictError::Io { .. }));
    }
}
