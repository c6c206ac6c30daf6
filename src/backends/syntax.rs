//! Brace-quoted list syntax shared by `pipemap`, `inline` and `static`.
//!
//! `{a, {b c, d}, e}` is a list of three items; braces quote separators and
//! nest arbitrarily.

/// Strip one level of enclosing braces and the whitespace inside them.
///
/// Returns `None` when `text` is not enclosed in a matching brace pair.
pub fn strip_braces(text: &str) -> Option<&str> {
    let text = text.trim();
    let inner = text.strip_prefix('{')?.strip_suffix('}')?;
    // "{a} {b}" starts and ends with braces but the first one closes early
    let mut depth = 0usize;
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return None,
            '}' => depth -= 1,
            _ => {}
        }
    }
    (depth == 0).then(|| inner.trim())
}

/// Like [`strip_braces`], but returns the input unchanged when it is not
/// brace-enclosed.
pub fn unquote(text: &str) -> &str {
    strip_braces(text).unwrap_or_else(|| text.trim())
}

/// Split on commas and whitespace outside of braces.
pub fn split_list(text: &str) -> Result<Vec<&str>, String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match c {
            '{' => {
                depth += 1;
                start.get_or_insert(i);
            }
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced '}}' at offset {i}"))?;
            }
            c if depth == 0 && (c == ',' || c.is_whitespace()) => {
                if let Some(s) = start.take() {
                    items.push(&text[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if depth != 0 {
        return Err("missing '}'".to_string());
    }
    if let Some(s) = start {
        items.push(&text[s..]);
    }
    Ok(items)
}

/// Split `name = value`, trimming whitespace around both parts.
pub fn split_nameval(text: &str) -> Result<(&str, &str), &'static str> {
    let (name, value) = text.split_once('=').ok_or("missing '='")?;
    let name = name.trim();
    if name.is_empty() {
        return Err("missing attribute name");
    }
    Ok((name, value.trim()))
}
