//! `inline`: a read-only table written into its own name
//!
//! `inline:{key1=value1, {key2 = value with, commas}}`

use super::ht::HashTable;
use super::{syntax, OpenRequest};
use crate::error::{DictError, Result};
use crate::table::Table;

pub const KIND: &str = "inline";

pub fn open(req: &OpenRequest<'_>) -> Result<HashTable> {
    if !req.mode.is_read_only() {
        return Err(DictError::usage(req.label(), "inline map requires read-only access"));
    }
    let body = syntax::strip_braces(req.name)
        .ok_or_else(|| DictError::bad_spec(req.label(), "missing '{' or '}'"))?;
    let items = syntax::split_list(body).map_err(|e| DictError::bad_spec(req.label(), e))?;
    if items.is_empty() {
        return Err(DictError::bad_spec(req.label(), "empty table"));
    }

    let mut table = HashTable::with_kind(KIND, req.name, req.mode, req.flags);
    for item in items {
        let (key, value) = syntax::split_nameval(syntax::unquote(item)).map_err(|e| {
            DictError::bad_spec(req.label(), format!("\"{item}\": {e}"))
        })?;
        let key = table.meta().flags.fold(key).into_owned();
        table.insert(&key, value);
    }
    Ok(table)
}
