//! `pipemap`: chain lookups through several tables
//!
//! `pipemap:{type1:name1, type2:name2, ...}` looks the key up in the first
//! table, the result in the second, and so on. The first miss ends the
//! chain with "not found"; the first error ends it with that error.

use tracing::debug;

use super::{syntax, OpenRequest};
use crate::error::{DictError, Result};
use crate::flags::{DictFlags, OpenMode};
use crate::owner::Owner;
use crate::registry::{Registry, WeakRegistry};
use crate::table::{DictHandle, Table, TableMeta};

pub const KIND: &str = "pipemap";

#[derive(Debug)]
pub struct PipeTable {
    meta: TableMeta,
    registry: WeakRegistry,
    /// Member tables with the names they are registered under
    members: Vec<(String, DictHandle)>,
}

impl PipeTable {
    pub fn open(req: &OpenRequest<'_>, registry: &Registry) -> Result<Self> {
        if !req.mode.is_read_only() {
            return Err(DictError::usage(req.label(), "pipemap requires read-only access"));
        }
        let body = syntax::strip_braces(req.name)
            .ok_or_else(|| DictError::bad_spec(req.label(), "missing '{' or '}'"))?;
        let specs = syntax::split_list(body).map_err(|e| DictError::bad_spec(req.label(), e))?;
        if specs.len() < 2 {
            return Err(DictError::bad_spec(req.label(), "need at least two tables"));
        }

        // The pipeline folds the key once before the first member; members
        // see keys and intermediate values as they are.
        let member_flags = req.flags - DictFlags::FOLD_ANY;
        let mut members: Vec<(String, DictHandle)> = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = syntax::unquote(spec);
            let opened = registry
                .registered_name(spec, OpenMode::ReadOnly, member_flags)
                .and_then(|name| {
                    let handle = registry.open(spec, OpenMode::ReadOnly, member_flags)?;
                    Ok((name, handle))
                });
            match opened {
                Ok(member) => members.push(member),
                Err(e) => {
                    for (name, _) in &members {
                        registry.unregister(name);
                    }
                    return Err(e);
                }
            }
        }

        let owner = Owner::aggregate(members.iter().map(|(_, handle)| handle.owner()));
        let match_style = DictFlags::FIXED | DictFlags::PATTERN;
        let inherited = members
            .first()
            .map(|(_, handle)| handle.flags() & match_style)
            .unwrap_or_else(DictFlags::empty);
        let flags = (req.flags - match_style) | inherited;
        debug!("{}: {} members, owner {}", req.label(), members.len(), owner);

        Ok(Self {
            meta: TableMeta::new(KIND, req.name, req.mode, flags).with_owner(owner),
            registry: registry.downgrade(),
            members,
        })
    }

    /// Registered names of the member tables, in lookup order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }
}

impl Table for PipeTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        let mut current = key.to_string();
        for (_, member) in &self.members {
            match member.lookup(&current)? {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn close(&mut self) {
        let members = std::mem::take(&mut self.members);
        if let Some(registry) = self.registry.upgrade() {
            for (name, _) in &members {
                registry.unregister(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{ht::HashTable, split_spec};
    use crate::error::DictStatus;

    /// Register a populated `ht` table where a read-only pipeline member
    /// with no extra flags will find it.
    fn install(registry: &Registry, spec: &str, pairs: &[(&str, &str)]) {
        let (_, name) = split_spec(spec).unwrap();
        let mut table = HashTable::new(name, OpenMode::ReadOnly, DictFlags::empty());
        for (key, value) in pairs {
            table.insert(key, value);
        }
        let registered = registry
            .registered_name(spec, OpenMode::ReadOnly, DictFlags::empty())
            .unwrap();
        registry.register(&registered, DictHandle::new(table)).unwrap();
    }

    #[test]
    fn test_chained_lookup() {
        let registry = Registry::new();
        install(&registry, "ht:users", &[("alice", "staff")]);
        install(&registry, "ht:groups", &[("staff", "/home/staff")]);

        let pipe = registry
            .open("pipemap:{ht:users, ht:groups}", OpenMode::ReadOnly, DictFlags::empty())
            .unwrap();
        assert_eq!(pipe.lookup("alice").unwrap().as_deref(), Some("/home/staff"));
        assert_eq!(pipe.lookup("bob").unwrap(), None);
        assert_eq!(registry.refcount("ht:users(read_only,)"), 2);
    }

    #[test]
    fn test_members_do_not_block_writers() {
        let registry = Registry::new();
        let pipe = registry
            .open("pipemap:{ht:a, ht:b}", OpenMode::ReadOnly, DictFlags::empty())
            .unwrap();
        assert_eq!(registry.update("ht:a", "k", "m").unwrap(), DictStatus::Success);
        let writable = registry
            .open("ht:b", OpenMode::ReadWrite, DictFlags::empty())
            .unwrap();
        assert_eq!(writable.update("m", "v").unwrap(), DictStatus::Success);
        // Separate instances: the pipeline's read-only members stay empty.
        assert_eq!(pipe.lookup("k").unwrap(), None);
    }

    #[test]
    fn test_open_rejects_bad_specs() {
        let registry = Registry::new();
        for spec in ["pipemap:ht:a, ht:b", "pipemap:{ht:a}", "pipemap:{ht:a, ht:b"] {
            let err = registry
                .open(spec, OpenMode::ReadOnly, DictFlags::empty())
                .unwrap_err();
            assert!(matches!(err, DictError::BadSpec { .. }), "{spec}: {err}");
        }
        let err = registry
            .open("pipemap:{ht:a, ht:b}", OpenMode::ReadWrite, DictFlags::empty())
            .unwrap_err();
        assert!(matches!(err, DictError::Usage { .. }));
    }

    #[test]
    fn test_failed_member_releases_earlier_ones() {
        let registry = Registry::new();
        let err = registry
            .open("pipemap:{ht:a, nosuch:b}", OpenMode::ReadOnly, DictFlags::empty())
            .unwrap_err();
        assert!(matches!(err, DictError::UnknownKind { .. }));
        assert!(registry.names().is_empty());
    }
}
