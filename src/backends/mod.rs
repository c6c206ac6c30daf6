//! Table backends and the factory map the registry opens them through
//!
//! Every backend is reached through an [`OpenFn`] keyed by its type tag.
//! A spec string `kind:name` selects the factory by `kind` and passes `name`
//! (everything after the first colon) to it unchanged.

pub mod bytes;
pub mod env;
pub mod fail;
pub mod ht;
pub mod inline;
pub mod pipemap;
pub mod static_map;
pub mod surrogate;
pub mod syntax;
pub mod tcp;
pub mod texthash;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DictConfig;
use crate::error::{DictError, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::registry::Registry;
use crate::table::Table;

/// Everything a factory needs to open one table
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub mode: OpenMode,
    pub flags: DictFlags,
    pub config: &'a DictConfig,
}

impl OpenRequest<'_> {
    /// `kind:name`, as used in diagnostics
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }
}

/// Factory for one table type.
///
/// The registry is passed so composite tables can open their members.
pub type OpenFn =
    dyn Fn(&OpenRequest<'_>, &Registry) -> Result<Box<dyn Table>> + Send + Sync;

/// Type tag to factory map
#[derive(Clone)]
pub struct Backends {
    factories: HashMap<String, Arc<OpenFn>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("Backends").field("kinds", &kinds).finish()
    }
}

impl Default for Backends {
    fn default() -> Self {
        let mut backends = Self::empty();
        backends.insert(ht::KIND, |req, _| Ok(Box::new(ht::HashTable::open(req)?)));
        backends.insert(env::KIND, |req, _| Ok(Box::new(env::EnvTable::open(req)?)));
        backends.insert(static_map::KIND, |req, _| {
            Ok(Box::new(static_map::StaticTable::open(req)?))
        });
        backends.insert(inline::KIND, |req, _| Ok(Box::new(inline::open(req)?)));
        backends.insert(fail::KIND, |req, _| Ok(Box::new(fail::FailTable::open(req)?)));
        backends.insert(texthash::KIND, |req, _| Ok(Box::new(texthash::open(req)?)));
        backends.insert(tcp::KIND, |req, _| Ok(Box::new(tcp::TcpTable::open(req)?)));
        backends.insert(pipemap::KIND, |req, registry| {
            Ok(Box::new(pipemap::PipeTable::open(req, registry)?))
        });
        backends
    }
}

impl Backends {
    /// A map with no backends at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Install or replace the factory for `kind`
    pub fn insert<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&OpenRequest<'_>, &Registry) -> Result<Box<dyn Table>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<OpenFn>> {
        self.factories.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered type tags, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Split `kind:name` at the first colon.
pub fn split_spec(spec: &str) -> Result<(&str, &str)> {
    let (kind, name) = spec
        .split_once(':')
        .ok_or_else(|| DictError::bad_spec(spec, "need \"type:name\""))?;
    if kind.is_empty() {
        return Err(DictError::bad_spec(spec, "missing table type"));
    }
    if name.is_empty() {
        return Err(DictError::bad_spec(spec, "missing table name"));
    }
    Ok((kind, name))
}
