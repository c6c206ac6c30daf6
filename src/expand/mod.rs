//! Macro expansion: `$name`, `${name}` and `$(name)` references in text
//!
//! Values come from a caller-supplied resolver, usually a registered table.
//! Inside braces or parentheses two conditional forms are accepted:
//!
//! - `${name?text}` expands to `text` when `name` is defined and non-empty
//! - `${name:text}` expands to `text` when `name` is undefined or empty
//!
//! `$$` is a literal dollar sign. An undefined reference expands to nothing
//! and is remembered in [`Expander::undefined`].

mod parser;

pub use parser::{Cond, Segment};

use crate::error::{DictError, Result};
use parser::{describe_error, parse_segments};

/// Whether substituted values are themselves expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    #[default]
    Once,
    Recursive,
}

/// Default limit on nested expansions in [`Recursion::Recursive`] mode
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Reusable expander; the result buffer is kept between calls.
#[derive(Debug)]
pub struct Expander {
    buf: String,
    undefined: Vec<String>,
    max_depth: usize,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Expander {
    pub fn new(max_depth: usize) -> Self {
        Self {
            buf: String::new(),
            undefined: Vec::new(),
            max_depth,
        }
    }

    /// Expand `text`, resolving names through `resolver`.
    ///
    /// The result borrows the expander's buffer and is overwritten by the
    /// next call.
    pub fn expand(
        &mut self,
        text: &str,
        recursion: Recursion,
        resolver: &mut dyn FnMut(&str) -> Result<Option<String>>,
    ) -> Result<&str> {
        let mut out = std::mem::take(&mut self.buf);
        out.clear();
        self.undefined.clear();
        let mut walk = Walk {
            out: &mut out,
            undefined: &mut self.undefined,
            recursion,
            max_depth: self.max_depth,
            resolver,
        };
        let result = walk.expand(text, 0);
        self.buf = out;
        result?;
        Ok(&self.buf)
    }

    /// Names that were referenced but not defined during the last call
    pub fn undefined(&self) -> &[String] {
        &self.undefined
    }
}

struct Walk<'a> {
    out: &'a mut String,
    undefined: &'a mut Vec<String>,
    recursion: Recursion,
    max_depth: usize,
    resolver: &'a mut dyn FnMut(&str) -> Result<Option<String>>,
}

impl Walk<'_> {
    fn expand(&mut self, text: &str, depth: usize) -> Result<()> {
        let segments = parse_segments(text).map_err(|rest| DictError::MacroSyntax {
            message: describe_error(rest),
        })?;
        for segment in segments {
            match segment {
                Segment::Literal(s) => self.out.push_str(s),
                Segment::Dollar => self.out.push('$'),
                Segment::Ref { name, cond: None } => match self.resolve(name)? {
                    Some(value) => self.substitute(name, &value, depth)?,
                    None => {
                        if !self.undefined.iter().any(|n| n == name) {
                            self.undefined.push(name.to_string());
                        }
                    }
                },
                Segment::Ref {
                    name,
                    cond: Some((cond, text)),
                } => {
                    let defined = self.resolve(name)?.is_some_and(|v| !v.is_empty());
                    let wanted = match cond {
                        Cond::IfDefined => defined,
                        Cond::IfUndefined => !defined,
                    };
                    if wanted {
                        self.substitute(name, text, depth)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> Result<Option<String>> {
        (self.resolver)(name).map_err(|e| DictError::MacroLookup {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    fn substitute(&mut self, name: &str, value: &str, depth: usize) -> Result<()> {
        match self.recursion {
            Recursion::Once => {
                self.out.push_str(value);
                Ok(())
            }
            Recursion::Recursive if depth >= self.max_depth => Err(DictError::MacroNesting {
                name: name.to_string(),
            }),
            Recursion::Recursive => self.expand(value, depth + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn expand_with(pairs: &[(&str, &str)], text: &str, recursion: Recursion) -> Result<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut expander = Expander::default();
        let mut resolver =
            |name: &str| -> Result<Option<String>> { Ok(vars.get(name).cloned()) };
        expander
            .expand(text, recursion, &mut resolver)
            .map(str::to_string)
    }

    #[test]
    fn test_once_vs_recursive() {
        let vars = [("a", "$b"), ("b", "x")];
        assert_eq!(expand_with(&vars, "$a", Recursion::Once).unwrap(), "$b");
        assert_eq!(expand_with(&vars, "$a", Recursion::Recursive).unwrap(), "x");
        assert_eq!(expand_with(&vars, "<${a}>", Recursion::Recursive).unwrap(), "<x>");
    }

    #[test]
    fn test_conditionals() {
        let vars = [("set", "yes"), ("empty", "")];
        let once = |text| expand_with(&vars, text, Recursion::Once).unwrap();
        assert_eq!(once("${set?on}"), "on");
        assert_eq!(once("${empty?on}"), "");
        assert_eq!(once("${missing?on}"), "");
        assert_eq!(once("${set:off}"), "");
        assert_eq!(once("${empty:off}"), "off");
        assert_eq!(once("$(missing:off)"), "off");
        // Conditional text is only expanded in recursive mode.
        assert_eq!(once("${set?[$set]}"), "[$set]");
        assert_eq!(
            expand_with(&vars, "${set?[$set]}", Recursion::Recursive).unwrap(),
            "[yes]"
        );
    }

    #[test]
    fn test_undefined_names_are_reported() {
        let mut expander = Expander::default();
        let mut resolver = |_: &str| -> Result<Option<String>> { Ok(None) };
        let out = expander
            .expand("a${x}b$y$x", Recursion::Once, &mut resolver)
            .unwrap();
        assert_eq!(out, "ab");
        assert_eq!(expander.undefined(), ["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_runaway_recursion() {
        let err = expand_with(&[("loop", "$loop")], "$loop", Recursion::Recursive).unwrap_err();
        assert!(matches!(err, DictError::MacroNesting { ref name } if name == "loop"));
        // Non-recursive mode never looks at the value again.
        assert_eq!(
            expand_with(&[("loop", "$loop")], "$loop", Recursion::Once).unwrap(),
            "$loop"
        );
    }

    #[test]
    fn test_lookup_failure_aborts() {
        let mut expander = Expander::default();
        let mut resolver = |name: &str| -> Result<Option<String>> {
            Err(DictError::Retry {
                table: "fail:x".into(),
                reason: format!("cannot look up {name}"),
            })
        };
        let err = expander
            .expand("a $b c", Recursion::Once, &mut resolver)
            .unwrap_err();
        assert!(matches!(err, DictError::MacroLookup { ref name, .. } if name == "b"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Retry);
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            expand_with(&[], "trailing $", Recursion::Once),
            Err(DictError::MacroSyntax { .. })
        ));
    }

    #[test]
    fn test_buffer_is_reused() {
        let mut expander = Expander::default();
        let mut resolver = |_: &str| -> Result<Option<String>> { Ok(Some("v".to_string())) };
        let first = expander
            .expand("$a and $a", Recursion::Once, &mut resolver)
            .unwrap()
            .to_string();
        let second = expander.expand("x", Recursion::Once, &mut resolver).unwrap();
        assert_eq!(first, "v and v");
        assert_eq!(second, "x");
    }

    proptest! {
        #[test]
        fn prop_dollar_free_text_is_unchanged(text in "[^$]*") {
            let out = expand_with(&[("a", "b")], &text, Recursion::Recursive).unwrap();
            prop_assert_eq!(out, text);
        }
    }
}
