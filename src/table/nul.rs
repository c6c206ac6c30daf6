//! Trailing-zero-byte compatibility for byte-oriented stores
//!
//! Older tools wrote keys and values with a terminating zero byte, newer ones
//! without. A store that must read both decides which variant it holds once,
//! and uses that variant for the rest of its lifetime.

use crate::flags::DictFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NulMode {
    /// Not decided yet: the store was empty at open time.
    Unknown,
    WithTrailingZero,
    WithoutTrailingZero,
}

/// Mode used for the first write to an undecided store.
pub const DEFAULT_NUL_MODE: NulMode = NulMode::WithTrailingZero;

impl NulMode {
    /// Initial mode from the `try0null`/`try1null` flags.
    ///
    /// When both variants are allowed, `first_key` (the first key stored, if
    /// any) decides.
    pub fn resolve(flags: DictFlags, first_key: Option<&[u8]>) -> NulMode {
        let with = flags.contains(DictFlags::TRY1NULL);
        let without = flags.contains(DictFlags::TRY0NULL);
        match (with, without) {
            (true, false) => NulMode::WithTrailingZero,
            (false, _) => NulMode::WithoutTrailingZero,
            (true, true) => match first_key {
                Some(key) if key.last() == Some(&0) => NulMode::WithTrailingZero,
                Some(_) => NulMode::WithoutTrailingZero,
                None => NulMode::Unknown,
            },
        }
    }

    /// Candidate encodings of `key` to try for a lookup, in order.
    pub fn candidates(self, key: &[u8]) -> Vec<(NulMode, Vec<u8>)> {
        match self {
            NulMode::WithTrailingZero => vec![(self, with_zero(key))],
            NulMode::WithoutTrailingZero => vec![(self, key.to_vec())],
            NulMode::Unknown => vec![
                (NulMode::WithTrailingZero, with_zero(key)),
                (NulMode::WithoutTrailingZero, key.to_vec()),
            ],
        }
    }

    /// Encoding used when writing.
    pub fn encode(self, bytes: &[u8]) -> Vec<u8> {
        match self.settled() {
            NulMode::WithTrailingZero => with_zero(bytes),
            _ => bytes.to_vec(),
        }
    }

    /// Strip the trailing zero from a stored key or value, if present.
    pub fn decode(self, bytes: &[u8]) -> Vec<u8> {
        match (self, bytes.split_last()) {
            (NulMode::WithTrailingZero, Some((0, rest))) => rest.to_vec(),
            _ => bytes.to_vec(),
        }
    }

    /// The mode to commit to when a decision is forced.
    pub fn settled(self) -> NulMode {
        match self {
            NulMode::Unknown => DEFAULT_NUL_MODE,
            mode => mode,
        }
    }
}

fn with_zero(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_flags() {
        assert_eq!(
            NulMode::resolve(DictFlags::TRY1NULL, None),
            NulMode::WithTrailingZero
        );
        assert_eq!(
            NulMode::resolve(DictFlags::TRY0NULL, Some(b"x\0")),
            NulMode::WithoutTrailingZero
        );
        assert_eq!(
            NulMode::resolve(DictFlags::empty(), None),
            NulMode::WithoutTrailingZero
        );
    }

    #[test]
    fn test_resolve_by_probe() {
        let both = DictFlags::NUL_MASK;
        assert_eq!(NulMode::resolve(both, Some(b"key\0")), NulMode::WithTrailingZero);
        assert_eq!(NulMode::resolve(both, Some(b"key")), NulMode::WithoutTrailingZero);
        assert_eq!(NulMode::resolve(both, None), NulMode::Unknown);
    }

    #[test]
    fn test_unknown_tries_both_variants() {
        let candidates = NulMode::Unknown.candidates(b"k");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].1, b"k\0");
        assert_eq!(candidates[1].1, b"k");
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(NulMode::WithTrailingZero.encode(b"v"), b"v\0");
        assert_eq!(NulMode::Unknown.encode(b"v"), b"v\0");
        assert_eq!(NulMode::WithoutTrailingZero.encode(b"v"), b"v");
        assert_eq!(NulMode::WithTrailingZero.decode(b"v\0"), b"v");
        assert_eq!(NulMode::WithoutTrailingZero.decode(b"v\0"), b"v\0");
    }
}
