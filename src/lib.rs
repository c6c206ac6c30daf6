//! ob-dict: named lookup tables behind one interface
//!
//! Tables map string keys to string values. Each one is implemented by a
//! backend (`ht`, `env`, `static`, `inline`, `texthash`, `tcp`, `pipemap`,
//! `fail`, or one registered at run time) and opened by a spec string
//! `kind:name`. A [`Registry`] shares open tables by name and closes each
//! one when its last reference is released.
//!
//! ## Quick Start
//!
//! ```rust
//! use ob_dict::{DictFlags, OpenMode, Recursion, Registry};
//!
//! let registry = Registry::new();
//! registry.update("vars", "host", "mail.example.com").unwrap();
//! assert_eq!(
//!     registry.eval("vars", "smtp://$host/", Recursion::Once).unwrap(),
//!     "smtp://mail.example.com/"
//! );
//!
//! let aliases = registry
//!     .open("inline:{postmaster=root, abuse=root}", OpenMode::ReadOnly, DictFlags::empty())
//!     .unwrap();
//! assert_eq!(aliases.lookup("abuse").unwrap().as_deref(), Some("root"));
//! ```
//!
//! ## Threading
//!
//! The crate is written for single-threaded use. Registry state and each
//! table sit behind a mutex so handles can move between threads, but no
//! operation is designed to run concurrently with another on the same table.

// Error types and status codes
pub mod error;

// Flags, open modes and provenance
pub mod flags;
pub mod owner;

// Runtime configuration
pub mod config;

// Table interface and shared handle
pub mod table;

// Backends and the factory map
pub mod backends;

// Registry, loader and macro expansion
pub mod expand;
pub mod loader;
pub mod registry;

pub use backends::{OpenRequest, bytes::ByteStore, bytes::ByteTable, bytes::MemoryStore};
pub use config::DictConfig;
pub use error::{DictError, DictStatus, ErrorKind, Result};
pub use expand::{Expander, Recursion};
pub use flags::{DictFlags, OpenMode};
pub use owner::Owner;
pub use registry::Registry;
pub use table::{DictHandle, Seq, Table, TableMeta};
