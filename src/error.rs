//! Error types for lookup tables
//!
//! Two independent taxonomies are used:
//! - [`DictStatus`] reports the outcome of a write-style operation that
//!   completed without an access error (stored vs. not stored / not found).
//! - [`DictError`] reports access failures. Every error maps onto an
//!   [`ErrorKind`], which is what a table remembers as its last error.

use std::path::PathBuf;

use thiserror::Error;

/// Outcome of an update or delete that did not hit an access error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictStatus {
    /// The request was applied
    Success,
    /// Not found (delete) or not stored (duplicate key kept)
    Fail,
}

impl DictStatus {
    pub fn is_success(self) -> bool {
        self == DictStatus::Success
    }
}

/// Coarse classification recorded as a table's last error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Last operation succeeded or simply found nothing
    #[default]
    None,
    /// Soft error: try again later
    Retry,
    /// The table is unusable as configured
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::None => "none",
            ErrorKind::Retry => "retry",
            ErrorKind::Config => "config",
        };
        f.write_str(s)
    }
}

/// Main error type for table access, registry and expansion
#[derive(Error, Debug)]
pub enum DictError {
    #[error("{table}: {op} operation is not supported")]
    NotSupported { table: String, op: &'static str },

    #[error("{table} is unavailable: {reason}")]
    Unavailable { table: String, reason: String },

    #[error("{table}: I/O error: {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{table}: {reason}")]
    Retry { table: String, reason: String },

    #[error("{table}: table is opened read-only")]
    ReadOnly { table: String },

    #[error("{table}: duplicate entry: \"{key}\"")]
    DuplicateKey { table: String, key: String },

    #[error("table name '{name}' is already registered with a different table")]
    DuplicateName { name: String },

    #[error("unsupported table type '{kind}'")]
    UnknownKind { kind: String },

    #[error("malformed table specification '{spec}': {reason}")]
    BadSpec { spec: String, reason: String },

    #[error("{table}: {reason}")]
    Usage { table: String, reason: String },

    #[error("{}, line {line}: {message}", origin.display())]
    Syntax {
        origin: PathBuf,
        line: usize,
        message: String,
    },

    #[error("macro expansion: {message}")]
    MacroSyntax { message: String },

    #[error("macro expansion: unreasonable macro call nesting: \"{name}\"")]
    MacroNesting { name: String },

    #[error("macro expansion: lookup of \"{name}\" failed: {source}")]
    MacroLookup {
        name: String,
        #[source]
        source: Box<DictError>,
    },
}

impl DictError {
    /// The last-error classification a table records for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DictError::Io { .. } | DictError::Retry { .. } => ErrorKind::Retry,
            DictError::MacroLookup { source, .. } => source.kind(),
            _ => ErrorKind::Config,
        }
    }

    /// Errors that indicate a bug in the caller rather than a runtime
    /// condition. These are never replaced by a surrogate table.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            DictError::UnknownKind { .. }
                | DictError::BadSpec { .. }
                | DictError::Usage { .. }
                | DictError::DuplicateName { .. }
        )
    }

    pub(crate) fn io(table: impl Into<String>, source: std::io::Error) -> Self {
        DictError::Io {
            table: table.into(),
            source,
        }
    }

    pub(crate) fn usage(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DictError::Usage {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        DictError::BadSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = DictError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let io = DictError::io("ht:x", std::io::Error::other("boom"));
        assert_eq!(io.kind(), ErrorKind::Retry);

        let unavailable = DictError::Unavailable {
            table: "tcp:h:1".into(),
            reason: "refused".into(),
        };
        assert_eq!(unavailable.kind(), ErrorKind::Config);

        let wrapped = DictError::MacroLookup {
            name: "a".into(),
            source: Box::new(io),
        };
        assert_eq!(wrapped.kind(), ErrorKind::Retry);
    }

    #[test]
    fn test_contract_violations() {
        assert!(DictError::UnknownKind { kind: "x".into() }.is_contract_violation());
        assert!(DictError::bad_spec("pipemap:x", "missing braces").is_contract_violation());
        assert!(!DictError::ReadOnly { table: "t".into() }.is_contract_violation());
    }

    #[test]
    fn test_syntax_message_names_file_and_line() {
        let err = DictError::Syntax {
            origin: PathBuf::from("/etc/example.cf"),
            line: 7,
            message: "missing '='".into(),
        };
        assert_eq!(err.to_string(), "/etc/example.cf, line 7: missing '='");
    }
}
