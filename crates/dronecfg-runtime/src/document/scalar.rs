//! Inline value grammar: scalars, quoted strings, flow collections.
//!
//! | Text | Value |
//! |------|-------|
//! | empty, `null`, `~` | `Null` |
//! | `???` | `Missing` |
//! | `true`, `False`, ... | `Bool` |
//! | `5_000_000`, `-1` | `Int` |
//! | `0.`, `.5`, `1e-4` | `Float` |
//! | `[a, b]` | `Seq` |
//! | `{a: 1}` | `Group` |
//! | `"..."`, `'...'`, other | `Str` (or `Deferred` if it contains `${`) |

use super::template::parse_template;
use crate::error::ParseErrorKind;
use dronecfg_types::{Deferred, Group, Origin, Part, Value, MISSING_MARKER};

/// Parses an inline value.
pub(crate) fn parse_value(text: &str, origin: &Origin) -> Result<Value, ParseErrorKind> {
    let text = text.trim();

    match text.chars().next() {
        Some('[') => parse_flow_seq(text, origin),
        Some('{') => parse_flow_group(text, origin),
        Some(q @ ('"' | '\'')) => {
            let content = unquote(text, q)?;
            make_string(content, origin)
        }
        _ => parse_plain(text, origin),
    }
}

/// Splits `key: value` (or `key:`) into its parts.
///
/// Returns `None` if the text is not a mapping entry.
pub(crate) fn split_key(text: &str) -> Option<(String, &str)> {
    if let Some(q @ ('"' | '\'')) = text.chars().next() {
        let close = find_closing_quote(text, q)?;
        let rest = text[close + 1..].strip_prefix(':')?;
        if !(rest.is_empty() || rest.starts_with(' ')) {
            return None;
        }
        let key = unquote(&text[..=close], q).ok()?;
        return Some((key, rest.trim()));
    }

    if text.starts_with(['[', '{']) || text.starts_with("- ") {
        return None;
    }

    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b':' && (i + 1 == bytes.len() || bytes[i + 1] == b' ') {
            let key = text[..i].trim();
            if key.is_empty() || key.contains("${") {
                return None;
            }
            return Some((key.to_string(), text[i + 1..].trim()));
        }
    }
    None
}

fn parse_plain(text: &str, origin: &Origin) -> Result<Value, ParseErrorKind> {
    let value = match text {
        "" | "null" | "Null" | "NULL" | "~" => Value::Null,
        MISSING_MARKER => Value::Missing,
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        ".inf" | "+.inf" | ".Inf" => Value::Float(f64::INFINITY),
        "-.inf" | "-.Inf" => Value::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" => Value::Float(f64::NAN),
        _ if text.contains("${") => return make_string(text.to_string(), origin),
        _ => match parse_number(text)? {
            Some(number) => number,
            None => Value::Str(text.to_string()),
        },
    };
    Ok(value)
}

/// Parses a numeric literal.
///
/// Returns `Ok(None)` for text that is not numeric at all, and an error
/// for numeric-looking text with misplaced `_` separators.
pub(crate) fn parse_number(text: &str) -> Result<Option<Value>, ParseErrorKind> {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);

    let Some(first) = body.chars().next() else {
        return Ok(None);
    };
    let numeric_charset = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '_' | '.' | 'e' | 'E' | '+' | '-'));
    if !(first.is_ascii_digit() || first == '_' || first == '.')
        || !numeric_charset
        || !body.chars().any(|c| c.is_ascii_digit())
    {
        return Ok(None);
    }

    let has_underscore = body.contains('_');
    if has_underscore && !underscores_between_digits(body) {
        return Err(ParseErrorKind::InvalidNumber(text.to_string()));
    }
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let cleaned_body = cleaned.strip_prefix(['+', '-']).unwrap_or(&cleaned);

    if cleaned_body.chars().all(|c| c.is_ascii_digit()) {
        return cleaned
            .parse::<i64>()
            .map(|i| Some(Value::Int(i)))
            .map_err(|_| ParseErrorKind::InvalidNumber(text.to_string()));
    }

    match cleaned.parse::<f64>() {
        Ok(f) => Ok(Some(Value::Float(f))),
        Err(_) if has_underscore => Err(ParseErrorKind::InvalidNumber(text.to_string())),
        Err(_) => Ok(None),
    }
}

fn underscores_between_digits(body: &str) -> bool {
    let chars: Vec<char> = body.chars().collect();
    chars.iter().enumerate().all(|(i, c)| {
        *c != '_'
            || (i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit())
    })
}

/// Builds a string value, turning `${...}` into a deferred reference.
pub(crate) fn make_string(text: String, origin: &Origin) -> Result<Value, ParseErrorKind> {
    if !text.contains("${") {
        return Ok(Value::Str(text));
    }

    let template = parse_template(&text, origin)?;
    if template.has_expr() {
        return Ok(Value::Deferred(Deferred {
            template,
            origin: origin.clone(),
        }));
    }

    // Only escaped markers: collapse to the literal text.
    let literal = template
        .parts
        .into_iter()
        .map(|part| match part {
            Part::Literal(s) => s,
            Part::Expr(_) => String::new(),
        })
        .collect();
    Ok(Value::Str(literal))
}

fn parse_flow_seq(text: &str, origin: &Origin) -> Result<Value, ParseErrorKind> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or(ParseErrorKind::UnterminatedTuple)?;

    let items = split_flow(inner).ok_or(ParseErrorKind::UnterminatedTuple)?;
    let values = items
        .into_iter()
        .map(|item| parse_value(item, origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Seq(values))
}

fn parse_flow_group(text: &str, origin: &Origin) -> Result<Value, ParseErrorKind> {
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or(ParseErrorKind::UnterminatedFlowGroup)?;

    let items = split_flow(inner).ok_or(ParseErrorKind::UnterminatedFlowGroup)?;
    let mut group = Group::new();
    for item in items {
        let (key, rest) =
            split_key(item).ok_or_else(|| ParseErrorKind::ExpectedEntry(item.to_string()))?;
        if group.contains_key(&key) {
            return Err(ParseErrorKind::DuplicateKey(key));
        }
        let value = parse_value(rest, origin)?;
        group.insert(key, value);
    }
    Ok(Value::Group(group))
}

/// Splits flow-collection contents on top-level commas.
///
/// Returns `None` if brackets or quotes are unbalanced or an item is
/// empty. A single trailing comma is allowed.
fn split_flow(inner: &str) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (i, c) in inner.char_indices() {
        match quote {
            Some(q) => {
                if c == q && !(q == '"' && prev == Some('\\')) {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '{' => depth += 1,
                ']' | '}' => depth = depth.checked_sub(1)?,
                ',' if depth == 0 => {
                    items.push(inner[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
        prev = Some(c);
    }

    if depth != 0 || quote.is_some() {
        return None;
    }

    if items.iter().any(|s| s.is_empty()) {
        return None;
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        items.push(last);
    }
    Some(items)
}

fn find_closing_quote(text: &str, q: char) -> Option<usize> {
    let mut escaped = false;
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if q == '"' {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Some(i);
            }
        } else if c == '\'' {
            // '' is an escaped quote inside single-quoted strings.
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
            } else {
                return Some(i);
            }
        }
    }
    None
}

/// Removes quotes from a complete quoted token and applies escapes.
fn unquote(text: &str, q: char) -> Result<String, ParseErrorKind> {
    let close = find_closing_quote(text, q).ok_or(ParseErrorKind::UnterminatedString)?;
    if close + q.len_utf8() != text.len() {
        return Err(ParseErrorKind::ExpectedEntry(text.to_string()));
    }
    let body = &text[1..close];

    if q == '\'' {
        return Ok(body.replace("''", "'"));
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            // Unknown escapes (including `\$`) are kept verbatim.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}
