//! Named, reference-counted table registry
//!
//! Tables are registered under a name and shared by everyone who asks for
//! that name. Each `register`/`open` adds a reference and each `unregister`
//! drops one; the table is closed when the last reference goes.
//!
//! Tables created by `open` are registered as `kind:name(mode,flags)`, so a
//! spec opened with another mode or other flags gets its own instance. Use
//! [`Registry::registered_name`] to release them.
//!
//! The registry lock is never held while a table or a backend factory runs,
//! so composite tables may open and release other tables from inside their
//! own `open` and `close`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info};

use crate::backends::{split_spec, Backends, OpenRequest};
use crate::backends::{ht::HashTable, surrogate::SurrogateTable};
use crate::config::DictConfig;
use crate::error::{DictError, DictStatus, ErrorKind, Result};
use crate::expand::{Expander, Recursion};
use crate::flags::{DictFlags, OpenMode};
use crate::loader;
use crate::table::{DictHandle, Seq, Table};

#[derive(Debug)]
struct Entry {
    handle: DictHandle,
    refcount: usize,
}

#[derive(Debug)]
struct State {
    tables: BTreeMap<String, Entry>,
    backends: Backends,
    config: Arc<DictConfig>,
}

/// Shared registry of open tables
#[derive(Debug, Clone)]
pub struct Registry {
    state: Arc<Mutex<State>>,
}

/// Non-owning reference to a [`Registry`], held by tables that need to call
/// back into the registry that opened them
#[derive(Debug, Clone)]
pub struct WeakRegistry {
    state: Weak<Mutex<State>>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<Registry> {
        self.state.upgrade().map(|state| Registry { state })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with default configuration and the built-in backends
    pub fn new() -> Self {
        Self::with_config(DictConfig::default())
    }

    pub fn with_config(config: DictConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                tables: BTreeMap::new(),
                backends: Backends::default(),
                config: Arc::new(config),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn config(&self) -> Arc<DictConfig> {
        Arc::clone(&self.state().config)
    }

    /// Install or replace the open factory for a table type.
    pub fn register_backend<F>(&self, kind: &str, factory: F)
    where
        F: Fn(&OpenRequest<'_>, &Registry) -> Result<Box<dyn Table>> + Send + Sync + 'static,
    {
        debug!("registering table type '{}'", kind);
        self.state().backends.insert(kind, factory);
    }

    /// Registered table types, sorted
    pub fn backend_kinds(&self) -> Vec<String> {
        self.state()
            .backends
            .kinds()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Register `handle` under `name`, or add a reference if that exact
    /// instance is already registered there.
    pub fn register(&self, name: &str, handle: DictHandle) -> Result<()> {
        let mut state = self.state();
        match state.tables.get_mut(name) {
            Some(entry) if entry.handle.ptr_eq(&handle) => {
                entry.refcount += 1;
                debug!("{}: refcount {}", name, entry.refcount);
                Ok(())
            }
            Some(_) => Err(DictError::DuplicateName {
                name: name.to_string(),
            }),
            None => {
                debug!("{}: registered", name);
                state.tables.insert(name.to_string(), Entry { handle, refcount: 1 });
                Ok(())
            }
        }
    }

    /// Look up a registered table without touching its refcount.
    pub fn handle(&self, name: &str) -> Option<DictHandle> {
        self.state().tables.get(name).map(|entry| entry.handle.clone())
    }

    /// Current reference count, zero when `name` is not registered
    pub fn refcount(&self, name: &str) -> usize {
        self.state()
            .tables
            .get(name)
            .map_or(0, |entry| entry.refcount)
    }

    /// Drop one reference to `name`, closing the table with the last one.
    ///
    /// # Panics
    ///
    /// If `name` is not registered: releasing a reference that was never
    /// taken is a lifetime bug in the caller.
    pub fn unregister(&self, name: &str) {
        let closing = {
            let mut state = self.state();
            let Some(entry) = state.tables.get_mut(name) else {
                drop(state);
                panic!("unregister: unknown table name '{name}'");
            };
            entry.refcount -= 1;
            if entry.refcount > 0 {
                debug!("{}: refcount {}", name, entry.refcount);
                None
            } else {
                state.tables.remove(name).map(|entry| entry.handle)
            }
        };
        if let Some(handle) = closing {
            debug!("{}: unregistered", name);
            handle.close();
        }
    }

    /// Name under which `open(spec, mode, flags)` registers its table,
    /// e.g. `ht:aliases(read_write,fold_fix)`. The configured default flags
    /// are included.
    pub fn registered_name(&self, spec: &str, mode: OpenMode, flags: DictFlags) -> Result<String> {
        let flags = flags | self.default_flags()?;
        Ok(registered_name(spec, mode, flags))
    }

    fn default_flags(&self) -> Result<DictFlags> {
        DictFlags::parse_names(&self.config().default_flags)
    }

    /// Open `kind:name`, reusing the instance opened earlier with the same
    /// mode and flags.
    ///
    /// The table is registered under [`Registry::registered_name`]. Runtime
    /// failures produce a surrogate table that reports the failure on every
    /// operation; malformed specs, unknown types and illegal mode or flag
    /// combinations are returned as errors.
    pub fn open(&self, spec: &str, mode: OpenMode, flags: DictFlags) -> Result<DictHandle> {
        let flags = flags | self.default_flags()?;
        let (kind, name) = split_spec(spec)?;
        if flags.contains(DictFlags::FIXED | DictFlags::PATTERN) {
            return Err(DictError::usage(spec, "fixed and pattern are mutually exclusive"));
        }
        let key = registered_name(spec, mode, flags);

        let (factory, config) = {
            let mut state = self.state();
            if let Some(entry) = state.tables.get_mut(&key) {
                entry.refcount += 1;
                debug!("{}: reusing, refcount {}", key, entry.refcount);
                return Ok(entry.handle.clone());
            }
            let factory = state.backends.get(kind).ok_or_else(|| DictError::UnknownKind {
                kind: kind.to_string(),
            })?;
            (factory, Arc::clone(&state.config))
        };

        let req = OpenRequest {
            kind,
            name,
            mode,
            flags,
            config: &config,
        };
        let handle = match factory(&req, self) {
            Ok(table) => {
                info!("opened {} ({})", spec, table.meta().flags.to_names());
                DictHandle::from_box(table)
            }
            Err(e) if e.is_contract_violation() => return Err(e),
            Err(e) => DictHandle::new(SurrogateTable::new(kind, name, mode, flags, e.to_string())),
        };

        let mut state = self.state();
        if let Some(entry) = state.tables.get_mut(&key) {
            // Opened meanwhile by a member of our own table; keep that one.
            entry.refcount += 1;
            let existing = entry.handle.clone();
            drop(state);
            handle.close();
            return Ok(existing);
        }
        state.tables.insert(
            key,
            Entry {
                handle: handle.clone(),
                refcount: 1,
            },
        );
        Ok(handle)
    }

    /// Registered table, or a fresh writable in-memory table registered
    /// under `name`.
    fn handle_or_create(&self, name: &str) -> Result<DictHandle> {
        let config = {
            let state = self.state();
            if let Some(entry) = state.tables.get(name) {
                return Ok(entry.handle.clone());
            }
            Arc::clone(&state.config)
        };
        let flags = DictFlags::parse_names(&config.default_flags)?;
        let handle = DictHandle::new(HashTable::new(name, OpenMode::ReadWrite, flags));
        debug!("{}: created in-memory table", name);
        self.register(name, handle.clone())?;
        Ok(handle)
    }

    /// Store `key = value` in table `name`, creating an in-memory table if
    /// nothing is registered under that name.
    pub fn update(&self, name: &str, key: &str, value: &str) -> Result<DictStatus> {
        self.handle_or_create(name)?.update(key, value)
    }

    /// Unknown table names find nothing.
    pub fn lookup(&self, name: &str, key: &str) -> Result<Option<String>> {
        match self.handle(name) {
            Some(handle) => handle.lookup(key),
            None => Ok(None),
        }
    }

    pub fn delete(&self, name: &str, key: &str) -> Result<DictStatus> {
        match self.handle(name) {
            Some(handle) => handle.delete(key),
            None => Ok(DictStatus::Fail),
        }
    }

    pub fn sequence(&self, name: &str, how: Seq) -> Result<Option<(String, String)>> {
        match self.handle(name) {
            Some(handle) => handle.sequence(how),
            None => Ok(None),
        }
    }

    /// Last error recorded by table `name`; `None` for unknown names.
    pub fn error(&self, name: &str) -> ErrorKind {
        self.handle(name)
            .map_or(ErrorKind::None, |handle| handle.last_error())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    fn snapshot(&self) -> Vec<(String, DictHandle)> {
        self.state()
            .tables
            .iter()
            .map(|(name, entry)| (name.clone(), entry.handle.clone()))
            .collect()
    }

    /// Visit every registered table, in name order.
    ///
    /// The visitor works on a snapshot: tables registered or released while
    /// walking do not affect which entries are visited.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &DictHandle),
    {
        for (name, handle) in self.snapshot() {
            visit(&name, &handle);
        }
    }

    /// Name of the first table whose backing file changed since it was opened
    pub fn changed_name(&self) -> Option<String> {
        let name = self
            .snapshot()
            .into_iter()
            .find(|(_, handle)| handle.changed())
            .map(|(name, _)| name);
        if let Some(name) = &name {
            info!("table {} has changed", name);
        }
        name
    }

    /// Load a `name = value` file into table `name`.
    pub fn load_file(&self, name: &str, path: &Path) -> Result<usize> {
        let handle = self.handle_or_create(name)?;
        let config = self.config();
        loader::load_file(&handle, path, &config.loader)
    }

    /// Load `name = value` lines from `reader` into table `name`.
    pub fn load_stream<R: BufRead>(&self, name: &str, reader: R, origin: &Path) -> Result<usize> {
        let handle = self.handle_or_create(name)?;
        loader::load_stream(&handle, reader, origin)
    }

    /// Expand `$name` references in `text` with values from table `name`.
    pub fn eval(&self, name: &str, text: &str, recursion: Recursion) -> Result<String> {
        let config = self.config();
        let mut expander = Expander::new(config.expand.max_depth);
        let expanded = expander.expand(text, recursion, &mut |key: &str| self.lookup(name, key))?;
        Ok(expanded.to_string())
    }
}

fn registered_name(spec: &str, mode: OpenMode, flags: DictFlags) -> String {
    format!("{}({},{})", spec, mode, flags.to_names())
}
