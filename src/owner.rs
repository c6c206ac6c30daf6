//! Provenance of table data
//!
//! Every table records who controls its contents. When tables are combined
//! (for example in a pipeline) their owners are merged pairwise into one
//! aggregate owner.

use std::fmt;
use std::fs::Metadata;

/// Trust classification of a table's data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Owner {
    /// Controlled by the super-user or built into the process
    #[default]
    Trusted,
    /// Controlled by a non-privileged user
    Untrusted(u32),
    /// Unauthenticated network or proxied source
    Unknown,
}

impl Owner {
    /// Derive the owner of a file-backed table from the file's metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        match meta.uid() {
            0 => Owner::Trusted,
            uid => Owner::Untrusted(uid),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_meta: &Metadata) -> Self {
        Owner::Unknown
    }

    /// Merge `other` into `self`.
    ///
    /// Trusted is the identity and Unknown absorbs everything; two untrusted
    /// owners with different uids become Unknown.
    pub fn merge(self, other: Owner) -> Owner {
        match (self, other) {
            (Owner::Trusted, src) | (_, src @ Owner::Unknown) => src,
            (Owner::Untrusted(a), Owner::Untrusted(b)) if a != b => Owner::Unknown,
            (dest, _) => dest,
        }
    }

    /// Merge any number of owners, starting from Trusted.
    pub fn aggregate<I>(owners: I) -> Owner
    where
        I: IntoIterator<Item = Owner>,
    {
        owners.into_iter().fold(Owner::Trusted, Owner::merge)
    }

    pub fn is_trusted(self) -> bool {
        self == Owner::Trusted
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Trusted => f.write_str("trusted"),
            Owner::Untrusted(uid) => write!(f, "untrusted (uid {uid})"),
            Owner::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_merge_table() {
        assert_eq!(Owner::Trusted.merge(Owner::Untrusted(5)), Owner::Untrusted(5));
        assert_eq!(Owner::Untrusted(5).merge(Owner::Trusted), Owner::Untrusted(5));
        assert_eq!(Owner::Untrusted(5).merge(Owner::Untrusted(7)), Owner::Unknown);
        assert_eq!(Owner::Untrusted(5).merge(Owner::Untrusted(5)), Owner::Untrusted(5));
        assert_eq!(Owner::Trusted.merge(Owner::Trusted), Owner::Trusted);
        assert_eq!(Owner::Unknown.merge(Owner::Trusted), Owner::Unknown);
        assert_eq!(Owner::Trusted.merge(Owner::Unknown), Owner::Unknown);
    }

    #[test]
    fn test_aggregate_empty_is_trusted() {
        assert_eq!(Owner::aggregate(Vec::new()), Owner::Trusted);
        assert_eq!(
            Owner::aggregate([Owner::Trusted, Owner::Untrusted(3), Owner::Untrusted(3)]),
            Owner::Untrusted(3)
        );
    }

    fn any_owner() -> impl Strategy<Value = Owner> {
        prop_oneof![
            Just(Owner::Trusted),
            Just(Owner::Unknown),
            (0u32..4).prop_map(Owner::Untrusted),
        ]
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in any_owner(), b in any_owner()) {
            prop_assert_eq!(a.merge(b), b.merge(a));
        }

        #[test]
        fn merge_is_associative(a in any_owner(), b in any_owner(), c in any_owner()) {
            prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        }

        #[test]
        fn unknown_absorbs(a in any_owner()) {
            prop_assert_eq!(Owner::Unknown.merge(a), Owner::Unknown);
            prop_assert_eq!(a.merge(Owner::Unknown), Owner::Unknown);
        }
    }
}
