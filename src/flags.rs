//! Request and behavior flags for lookup tables.

use std::borrow::Cow;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{DictError, Result};

bitflags! {
    /// Per-table request/behavior flags. Independent bits, OR-combinable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DictFlags: u32 {
        /// Warn about duplicate keys and keep the first value.
        const DUP_WARN = 1 << 0;
        /// Silently keep the first value of a duplicate key.
        const DUP_IGNORE = 1 << 1;
        /// Keys/values may be stored without a trailing zero byte.
        const TRY0NULL = 1 << 2;
        /// Keys/values may be stored with a trailing zero byte.
        const TRY1NULL = 1 << 3;
        /// Fixed-key table: lookup keys are matched literally.
        const FIXED = 1 << 4;
        /// Pattern table: lookup keys are matched against patterns.
        const PATTERN = 1 << 5;
        /// Advisory lock around each access.
        const LOCK = 1 << 6;
        /// Replace the value of a duplicate key.
        const DUP_REPLACE = 1 << 7;
        /// Flush each update to stable storage.
        const SYNC_UPDATE = 1 << 8;
        /// Log every access.
        const DEBUG = 1 << 9;
        /// Disallow regular-expression substitution in results.
        const NO_REGSUB = 1 << 10;
        /// Disallow use through a lookup proxy.
        const NO_PROXY = 1 << 11;
        /// Disallow data from unauthenticated channels.
        const NO_UNAUTH = 1 << 12;
        /// Case-fold lookup keys of fixed-key tables.
        const FOLD_FIX = 1 << 13;
        /// Case-fold lookup keys of pattern tables.
        const FOLD_MUL = 1 << 14;
        /// Exclusive lock while the table is opened.
        const OPEN_LOCK = 1 << 15;
        /// The table is being rebuilt in bulk.
        const BULK_UPDATE = 1 << 16;
        /// Use a backend that tolerates concurrent writers.
        const MULTI_WRITER = 1 << 17;
        /// The table name is a file whose contents form the value.
        const SRC_RHS_IS_FILE = 1 << 18;

        const FOLD_ANY = Self::FOLD_FIX.bits() | Self::FOLD_MUL.bits();
        const DUP_MASK = Self::DUP_WARN.bits() | Self::DUP_IGNORE.bits() | Self::DUP_REPLACE.bits();
        const NUL_MASK = Self::TRY0NULL.bits() | Self::TRY1NULL.bits();
    }
}

/// Flag name table used for diagnostics and configuration parsing.
pub const NAMES: &[(&str, DictFlags)] = &[
    ("warn_dup", DictFlags::DUP_WARN),
    ("ignore_dup", DictFlags::DUP_IGNORE),
    ("try0null", DictFlags::TRY0NULL),
    ("try1null", DictFlags::TRY1NULL),
    ("fixed", DictFlags::FIXED),
    ("pattern", DictFlags::PATTERN),
    ("lock", DictFlags::LOCK),
    ("replace", DictFlags::DUP_REPLACE),
    ("sync_update", DictFlags::SYNC_UPDATE),
    ("debug", DictFlags::DEBUG),
    ("no_regsub", DictFlags::NO_REGSUB),
    ("no_proxy", DictFlags::NO_PROXY),
    ("no_unauth", DictFlags::NO_UNAUTH),
    ("fold_fix", DictFlags::FOLD_FIX),
    ("fold_mul", DictFlags::FOLD_MUL),
    ("open_lock", DictFlags::OPEN_LOCK),
    ("bulk_update", DictFlags::BULK_UPDATE),
    ("multi_writer", DictFlags::MULTI_WRITER),
    ("src_rhs_is_file", DictFlags::SRC_RHS_IS_FILE),
];

impl DictFlags {
    /// Render the set as `name|name|...` in table order.
    pub fn to_names(self) -> String {
        let mut out = Vec::new();
        let mut rest = self;
        for (name, flag) in NAMES {
            if self.contains(*flag) {
                out.push(Cow::Borrowed(*name));
                rest.remove(*flag);
            }
        }
        if !rest.is_empty() {
            out.push(Cow::Owned(format!("0x{:x}", rest.bits())));
        }
        out.join("|")
    }

    /// Parse a list of flag names separated by `|`, `,` or whitespace.
    pub fn parse_names(text: &str) -> Result<Self> {
        let mut flags = DictFlags::empty();
        for word in text
            .split(|c: char| c == '|' || c == ',' || c.is_whitespace())
            .filter(|w| !w.is_empty())
        {
            let flag = NAMES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(word))
                .map(|(_, flag)| *flag)
                .ok_or_else(|| DictError::bad_spec(text, format!("unknown flag name '{word}'")))?;
            flags |= flag;
        }
        Ok(flags)
    }

    /// Whether lookup keys must be lower-cased before they reach the backend.
    pub fn folds_key(self) -> bool {
        (self.contains(DictFlags::FIXED) && self.contains(DictFlags::FOLD_FIX))
            || (self.contains(DictFlags::PATTERN) && self.contains(DictFlags::FOLD_MUL))
    }

    /// Apply case folding to a key if this flag set calls for it.
    pub fn fold<'a>(self, key: &'a str) -> Cow<'a, str> {
        if self.folds_key() && key.chars().any(|c| c.is_uppercase()) {
            Cow::Owned(key.to_lowercase())
        } else {
            Cow::Borrowed(key)
        }
    }
}

/// How a table is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    #[default]
    ReadOnly,
    ReadWrite,
    /// Read-write, creating the table if it does not exist.
    Create,
}

impl OpenMode {
    pub fn is_read_only(self) -> bool {
        self == OpenMode::ReadOnly
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::ReadOnly => "read_only",
            OpenMode::ReadWrite => "read_write",
            OpenMode::Create => "create",
        })
    }
}
