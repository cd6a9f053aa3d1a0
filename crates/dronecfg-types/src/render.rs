//! Rendering values back to document syntax.
//!
//! The output re-parses to an equal tree: strings and keys that would
//! otherwise be read as another type, or split inside a flow collection,
//! are double-quoted, and literal `${` is escaped.

use crate::value::{Group, Value, MISSING_MARKER};
use std::fmt::{self, Write};

const INDENT: usize = 2;

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_group(f, self, 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flow(f, self, false)
    }
}

/// Context a scalar is written in; flow collections also split on `,[]{}`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Block,
    Flow,
}

fn write_group<W: Write>(out: &mut W, group: &Group, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    for (key, value) in group.iter() {
        out.write_str(&pad)?;
        write_key(out, key, Context::Block)?;
        match value {
            Value::Group(inner) if !inner.is_empty() => {
                writeln!(out)?;
                write_group(out, inner, indent + INDENT)?;
            }
            Value::Seq(items) if needs_block(items) => {
                writeln!(out)?;
                for item in items {
                    write_seq_item(out, item, indent + INDENT)?;
                }
            }
            other => {
                out.write_char(' ')?;
                write_flow(out, other, false)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

fn write_seq_item<W: Write>(out: &mut W, item: &Value, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    match item {
        Value::Group(inner) if !inner.is_empty() => {
            // Render the group one level deeper, then put the dash where
            // the first key's indentation begins.
            let mut body = String::new();
            write_group(&mut body, inner, indent + INDENT)?;
            let skip = indent + INDENT;
            out.write_str(&pad)?;
            out.write_str("- ")?;
            out.write_str(&body[skip..])
        }
        other => {
            write!(out, "{pad}- ")?;
            write_flow(out, other, false)?;
            writeln!(out)
        }
    }
}

fn needs_block(items: &[Value]) -> bool {
    items
        .iter()
        .any(|v| matches!(v, Value::Group(g) if !g.is_empty()))
}

/// Writes `value` inline; `nested` is set inside `[..]` and `{..}`.
fn write_flow<W: Write>(out: &mut W, value: &Value, nested: bool) -> fmt::Result {
    let context = if nested { Context::Flow } else { Context::Block };
    match value {
        Value::Null => out.write_str("null"),
        Value::Missing => out.write_str(MISSING_MARKER),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Int(i) => write!(out, "{i}"),
        Value::Float(x) => write_float(out, *x),
        Value::Str(s) => write_string(out, s, context),
        Value::Deferred(d) => write_template_source(out, &d.template.source, context),
        Value::Seq(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_flow(out, item, true)?;
            }
            out.write_char(']')
        }
        Value::Group(g) => {
            out.write_char('{')?;
            for (i, (k, v)) in g.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_key(out, k, Context::Flow)?;
                out.write_char(' ')?;
                write_flow(out, v, true)?;
            }
            out.write_char('}')
        }
    }
}

fn write_float<W: Write>(out: &mut W, x: f64) -> fmt::Result {
    if x.is_nan() {
        out.write_str(".nan")
    } else if x.is_infinite() {
        out.write_str(if x > 0.0 { ".inf" } else { "-.inf" })
    } else {
        // Debug keeps a fractional part or exponent, so it re-parses as a float.
        write!(out, "{x:?}")
    }
}

fn write_string<W: Write>(out: &mut W, s: &str, context: Context) -> fmt::Result {
    if s.contains("${") {
        return write_quoted(out, s, true);
    }
    if needs_quotes(s, context) {
        write_quoted(out, s, false)
    } else {
        out.write_str(s)
    }
}

fn write_template_source<W: Write>(out: &mut W, source: &str, context: Context) -> fmt::Result {
    if needs_quotes(source, context) {
        write_quoted(out, source, false)
    } else {
        out.write_str(source)
    }
}

/// Keys are always strings, and `${` is never interpolated in them.
fn write_key<W: Write>(out: &mut W, key: &str, context: Context) -> fmt::Result {
    if needs_quotes(key, context) || key.contains("${") {
        write_quoted(out, key, false)?;
    } else {
        out.write_str(key)?;
    }
    out.write_char(':')
}

/// Double-quotes `s`; `escape_markers` turns `${` into `\${`.
fn write_quoted<W: Write>(out: &mut W, s: &str, escape_markers: bool) -> fmt::Result {
    out.write_char('"')?;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '$' if escape_markers && chars.peek() == Some(&'{') => out.write_str("\\$")?,
            other => out.write_char(other)?,
        }
    }
    out.write_char('"')
}

/// Returns `true` if a plain rendering of `s` would not read back as the
/// same string.
fn needs_quotes(s: &str, context: Context) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };

    if context == Context::Flow && s.contains([',', '[', ']', '{', '}']) {
        return true;
    }
    if s.trim() != s {
        return true;
    }
    if matches!(
        first,
        '-' | '+' | '.' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!'
            | '|' | '>' | '\'' | '"' | '%' | '@' | '`' | '~'
    ) || first.is_ascii_digit()
    {
        return true;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') || s.contains('"') {
        return true;
    }
    if s.contains('\n') || s.contains('\t') {
        return true;
    }
    matches!(
        s,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" | "null" | "Null" | "NULL"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Expr, Origin, Part, RefPath, Template};
    use crate::value::Deferred;

    #[test]
    fn renders_nested_groups() {
        let mut viewer = Group::new();
        viewer.insert(
            "eye",
            Value::Seq(vec![Value::Float(8.0), Value::Float(0.0), Value::Float(6.0)]),
        );
        let mut root = Group::new();
        root.insert("headless", Value::Bool(true));
        root.insert("total_frames", Value::Int(5_000_000));
        root.insert("viewer", Value::Group(viewer));
        root.insert("entity", Value::Null);

        assert_eq!(
            root.to_string(),
            "headless: true\ntotal_frames: 5000000\nviewer:\n  eye: [8.0, 0.0, 6.0]\nentity: null\n"
        );
    }

    #[test]
    fn renders_sequence_of_groups_as_block() {
        let mut entry = Group::new();
        entry.insert("task", Value::Str("Manipulation/RopeDragging".into()));
        entry.insert("weight", Value::Int(2));
        let mut root = Group::new();
        root.insert(
            "items",
            Value::Seq(vec![Value::Group(entry), Value::Str("plain".into())]),
        );

        assert_eq!(
            root.to_string(),
            "items:\n  - task: Manipulation/RopeDragging\n    weight: 2\n  - plain\n"
        );
    }

    #[test]
    fn quotes_ambiguous_strings() {
        let cases = [
            ("", "\"\""),
            ("true", "\"true\""),
            ("5000", "\"5000\""),
            ("-1", "\"-1\""),
            ("a: b", "\"a: b\""),
            ("online", "online"),
            ("RopeDragging-ppo", "RopeDragging-ppo"),
        ];
        for (input, expected) in cases {
            assert_eq!(Value::Str(input.into()).to_string(), expected, "{input:?}");
        }
    }

    #[test]
    fn flow_items_quote_separators() {
        let tags = Value::Seq(vec![
            Value::Str("sweep, v2".into()),
            Value::Str("baseline".into()),
            Value::Str("a]b".into()),
        ]);
        assert_eq!(tags.to_string(), r#"["sweep, v2", baseline, "a]b"]"#);

        let mut g = Group::new();
        g.insert("note", Value::Str("{x}".into()));
        assert_eq!(Value::Group(g).to_string(), r#"{note: "{x}"}"#);

        // block context keeps commas plain
        assert_eq!(Value::Str("sweep, v2".into()).to_string(), "sweep, v2");
    }

    #[test]
    fn keys_are_quoted_when_ambiguous() {
        let mut g = Group::new();
        g.insert("k: v", Value::Int(1));
        g.insert("plain", Value::Int(2));
        g.insert("a,b", Value::Int(3));
        assert_eq!(g.to_string(), "\"k: v\": 1\nplain: 2\na,b: 3\n");
        assert_eq!(
            Value::Group(g).to_string(),
            r#"{"k: v": 1, plain: 2, "a,b": 3}"#
        );
    }

    #[test]
    fn quoted_strings_escape_backslashes() {
        assert_eq!(
            Value::Str("C:\\data\" x".into()).to_string(),
            r#""C:\\data\" x""#
        );
    }

    #[test]
    fn escapes_literal_interpolation_markers() {
        assert_eq!(Value::Str("${x}".into()).to_string(), "\"\\${x}\"");
        assert_eq!(Value::Str("a ${x} b".into()).to_string(), "\"a \\${x} b\"");
    }

    #[test]
    fn deferred_renders_source() {
        let value = Value::Deferred(Deferred {
            template: Template::new(
                "${task.sim}",
                vec![Part::Expr(Expr::Lookup(RefPath::absolute(["task", "sim"])))],
            ),
            origin: Origin::default(),
        });
        assert_eq!(value.to_string(), "${task.sim}");
    }

    #[test]
    fn floats_keep_fraction() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), ".inf");
    }
}
