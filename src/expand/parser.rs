//! Nom parser for macro references in text
//!
//! ```text
//! text      := (literal | "$$" | reference)*
//! reference := "$" name
//!            | "${" name [cond] "}"
//!            | "$(" name [cond] ")"
//! cond      := ("?" | ":") balanced-text
//! name      := [A-Za-z0-9_]+
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{char, one_of},
    combinator::{map, opt, value},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Which way a conditional reference tests its macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    /// `${name?text}`: text if defined and non-empty
    IfDefined,
    /// `${name:text}`: text if undefined or empty
    IfUndefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// `$$`
    Dollar,
    Ref {
        name: &'a str,
        cond: Option<(Cond, &'a str)>,
    },
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Split `text` into segments.
///
/// On failure returns the unparsed remainder, which starts at the offending
/// `$`.
pub fn parse_segments(text: &str) -> Result<Vec<Segment<'_>>, &str> {
    let mut segments = Vec::new();
    let mut input = text;
    while !input.is_empty() {
        match segment(input) {
            Ok((rest, seg)) => {
                segments.push(seg);
                input = rest;
            }
            Err(_) => return Err(input),
        }
    }
    Ok(segments)
}

/// Human-readable reason why `rest` (as returned by [`parse_segments`]) does
/// not parse.
pub fn describe_error(rest: &str) -> String {
    let mut chars = rest.chars().skip(1);
    match chars.next() {
        None => "'$' at end of text".to_string(),
        Some(open @ ('{' | '(')) => {
            let close = if open == '{' { '}' } else { ')' };
            let inner = &rest[2..];
            match take_name(inner) {
                Err(_) => format!("bad macro name in \"{}\"", excerpt(rest)),
                Ok(_) if balanced(open, close)(inner).is_err() => {
                    format!("missing '{close}' in \"{}\"", excerpt(rest))
                }
                Ok(_) => format!("bad macro expression \"{}\"", excerpt(rest)),
            }
        }
        Some(c) => format!("bad macro name character '{c}' in \"{}\"", excerpt(rest)),
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(40) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

// =============================================================================
// SEGMENTS
// =============================================================================

fn segment(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        map(take_till1(|c: char| c == '$'), Segment::Literal),
        value(Segment::Dollar, tag("$$")),
        preceded(char('$'), reference),
    ))(input)
}

fn reference(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        delimited(char('{'), reference_body('{', '}'), char('}')),
        delimited(char('('), reference_body('(', ')'), char(')')),
        map(take_name, |name| Segment::Ref { name, cond: None }),
    ))(input)
}

fn reference_body(
    open: char,
    close: char,
) -> impl FnMut(&str) -> IResult<&str, Segment<'_>> {
    move |input: &str| {
        map(
            pair(take_name, opt(pair(condition, balanced(open, close)))),
            |(name, cond)| Segment::Ref { name, cond },
        )(input)
    }
}

fn condition(input: &str) -> IResult<&str, Cond> {
    map(one_of("?:"), |c: char| match c {
        '?' => Cond::IfDefined,
        _ => Cond::IfUndefined,
    })(input)
}

// =============================================================================
// HELPER PARSERS
// =============================================================================

fn take_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// Text up to (not including) the `close` that balances the one already
/// consumed; nested `open`/`close` pairs are kept.
fn balanced(open: char, close: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input: &str| {
        let mut depth = 0usize;
        for (i, c) in input.char_indices() {
            if c == open {
                depth += 1;
            } else if c == close {
                if depth == 0 {
                    return Ok((&input[i..], &input[..i]));
                }
                depth -= 1;
            }
        }
        Err(nom::Err::Error(Error::new(input, ErrorKind::TakeUntil)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(name: &str) -> Segment<'_> {
        Segment::Ref { name, cond: None }
    }

    #[test]
    fn test_reference_forms() {
        assert_eq!(
            parse_segments("a $x b ${y}c $(z)").unwrap(),
            vec![
                Segment::Literal("a "),
                r("x"),
                Segment::Literal(" b "),
                r("y"),
                Segment::Literal("c "),
                r("z"),
            ]
        );
    }

    #[test]
    fn test_bare_name_stops_at_non_name_char() {
        assert_eq!(
            parse_segments("$user@$domain.").unwrap(),
            vec![r("user"), Segment::Literal("@"), r("domain"), Segment::Literal(".")]
        );
    }

    #[test]
    fn test_dollar_escape() {
        assert_eq!(
            parse_segments("cost: $$5").unwrap(),
            vec![Segment::Literal("cost: "), Segment::Dollar, Segment::Literal("5")]
        );
    }

    #[test]
    fn test_conditionals_keep_nested_braces() {
        assert_eq!(
            parse_segments("${a?x ${b} y}$(c:{d})").unwrap(),
            vec![
                Segment::Ref {
                    name: "a",
                    cond: Some((Cond::IfDefined, "x ${b} y")),
                },
                Segment::Ref {
                    name: "c",
                    cond: Some((Cond::IfUndefined, "{d}")),
                },
            ]
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_segments("ab$").unwrap_err(), "$");
        assert!(describe_error("$").contains("end of text"));

        let rest = parse_segments("x ${abc").unwrap_err();
        assert_eq!(rest, "${abc");
        assert!(describe_error(rest).contains("missing '}'"));

        let rest = parse_segments("${a-b}").unwrap_err();
        assert!(describe_error(rest).contains("bad macro expression"));

        let rest = parse_segments("$-").unwrap_err();
        assert!(describe_error(rest).contains("'-'"));

        let rest = parse_segments("${}").unwrap_err();
        assert!(describe_error(rest).contains("bad macro name"));
    }
}
