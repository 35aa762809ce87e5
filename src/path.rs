//! Attribute paths: dotted tokens with bracketed selectors.
//!
//! `a.b[0].c` walks object key `a`, key `b`, array index 0, key `c`.
//! Bracket content is an array index when numeric and a literal key
//! otherwise, so a `.` inside `[…]` is not a separator. The combined
//! `id@path` form splits on the first `@`.

use serde_json::Value;

/// One step of an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

/// Split the combined `id@path` syntax on the first `@`.
pub fn split_id_and_path(combined: &str) -> (&str, Option<&str>) {
    match combined.split_once('@') {
        Some((id, path)) => (id, Some(path)),
        None => (combined, None),
    }
}

/// Tokenize an attribute path.
///
/// # Errors
///
/// Returns a message for unclosed brackets, empty tokens, and text
/// directly following a `]`.
pub fn parse_path(path: &str) -> Result<Vec<PathToken>, String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if buf.is_empty() {
                    return Err(format!("empty token in path {path:?}"));
                }
                tokens.push(PathToken::Key(std::mem::take(&mut buf)));
            }
            '[' => {
                if !buf.is_empty() {
                    tokens.push(PathToken::Key(std::mem::take(&mut buf)));
                } else if tokens.is_empty() {
                    return Err(format!("path {path:?} starts with '['"));
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => inner.push(c),
                        None => return Err(format!("unclosed '[' in path {path:?}")),
                    }
                }
                if inner.is_empty() {
                    return Err(format!("empty selector in path {path:?}"));
                }
                if inner.bytes().all(|b| b.is_ascii_digit()) {
                    let index = inner
                        .parse()
                        .map_err(|_| format!("index out of range in path {path:?}"))?;
                    tokens.push(PathToken::Index(index));
                } else {
                    tokens.push(PathToken::Key(inner));
                }
                // Only '.', another selector, or the end may follow ']'.
                match chars.peek() {
                    Some('.') => {
                        chars.next();
                        if chars.peek().is_none() {
                            return Err(format!("trailing '.' in path {path:?}"));
                        }
                    }
                    Some('[') | None => {}
                    Some(other) => {
                        return Err(format!("unexpected {other:?} after ']' in path {path:?}"))
                    }
                }
            }
            _ => buf.push(c),
        }
    }

    if !buf.is_empty() {
        tokens.push(PathToken::Key(buf));
    } else if path.ends_with('.') {
        return Err(format!("trailing '.' in path {path:?}"));
    }
    if tokens.is_empty() {
        return Err("empty path".to_owned());
    }
    Ok(tokens)
}

/// Resolve an attribute path against a JSON value.
///
/// # Errors
///
/// Returns the tokenizer's message for malformed paths; a well-formed
/// path that misses yields `Ok(None)`.
pub fn resolve_path<'v>(value: &'v Value, path: &str) -> Result<Option<&'v Value>, String> {
    let mut current = value;
    for token in parse_path(path)? {
        let next = match &token {
            PathToken::Key(key) => current.get(key.as_str()),
            PathToken::Index(i) => current.get(*i),
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
