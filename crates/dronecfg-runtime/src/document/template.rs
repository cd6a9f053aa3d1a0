//! `${...}` interpolation grammar.
//!
//! ```text
//! template  := (literal | "\${" | "${" expr "}")*
//! expr      := resolver ":" args | path
//! resolver  := "oc.select" | "oc.env"
//! path      := "."* segment ("." segment)*
//! ```

use super::scalar::parse_value;
use crate::error::ParseErrorKind;
use dronecfg_types::{Expr, Origin, Part, RefPath, Template, ENV_RESOLVER, SELECT_RESOLVER};

/// Parses a string containing `${...}` into a [`Template`].
pub(crate) fn parse_template(text: &str, origin: &Origin) -> Result<Template, ParseErrorKind> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        if rest.starts_with("\\${") {
            literal.push_str("${");
            i += 3;
            continue;
        }

        if rest.starts_with("${") {
            let end = find_closing_brace(text, i + 2).ok_or_else(|| invalid(text, "missing '}'"))?;
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            let expr = parse_expr(&text[i + 2..end], text, origin)?;
            parts.push(Part::Expr(expr));
            i = end + 1;
            continue;
        }

        // Advance one character, respecting UTF-8 boundaries.
        let c = rest.chars().next().unwrap_or_default();
        literal.push(c);
        i += c.len_utf8().max(1);
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }

    Ok(Template::new(text, parts))
}

/// Finds the `}` closing an expression whose body starts at `from`.
fn find_closing_brace(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, c) in text[from..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_expr(inner: &str, text: &str, origin: &Origin) -> Result<Expr, ParseErrorKind> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(invalid(text, "empty interpolation"));
    }

    let Some((name, args)) = split_resolver(inner) else {
        return parse_ref_path(inner, text).map(Expr::Lookup);
    };

    let args = split_args(args).ok_or_else(|| invalid(text, "unbalanced resolver arguments"))?;

    match name {
        SELECT_RESOLVER => {
            let (path, fallback) = match args.as_slice() {
                [path] => (path, None),
                [path, fallback] => (path, Some(fallback)),
                _ => return Err(invalid(text, "oc.select takes a key and an optional default")),
            };
            Ok(Expr::Select {
                path: parse_ref_path(path, text)?,
                fallback: fallback
                    .map(|f| parse_value(f, origin).map(Box::new))
                    .transpose()?,
            })
        }
        ENV_RESOLVER => {
            let (var, fallback) = match args.as_slice() {
                [var] => (var, None),
                [var, fallback] => (var, Some(fallback)),
                _ => return Err(invalid(text, "oc.env takes a name and an optional default")),
            };
            if var.is_empty() {
                return Err(invalid(text, "oc.env needs a variable name"));
            }
            Ok(Expr::Env {
                var: (*var).to_string(),
                fallback: fallback
                    .map(|f| parse_value(f, origin).map(Box::new))
                    .transpose()?,
            })
        }
        other => Err(ParseErrorKind::UnknownResolver(other.to_string())),
    }
}

/// Splits `name:args` when `name` looks like a resolver identifier.
fn split_resolver(inner: &str) -> Option<(&str, &str)> {
    let colon = inner.find(':')?;
    let name = inner[..colon].trim();
    let is_ident = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    is_ident.then(|| (name, &inner[colon + 1..]))
}

/// Splits resolver arguments on top-level commas.
fn split_args(args: &str) -> Option<Vec<&str>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => depth = depth.checked_sub(1)?,
                ',' if depth == 0 => {
                    out.push(args[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    out.push(args[start..].trim());
    Some(out)
}

fn parse_ref_path(text: &str, template: &str) -> Result<RefPath, ParseErrorKind> {
    let trimmed = text.trim();
    let up = trimmed.chars().take_while(|c| *c == '.').count();
    let rest = &trimmed[up..];

    if rest.is_empty() {
        return Err(invalid(template, "reference has no key"));
    }

    let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
    let valid = segments.iter().all(|s| {
        !s.is_empty()
            && !s
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '$' | '{' | '}' | ':' | ','))
    });
    if !valid {
        return Err(invalid(template, &format!("invalid key '{trimmed}'")));
    }

    Ok(RefPath { up, segments })
}

fn invalid(text: &str, reason: &str) -> ParseErrorKind {
    ParseErrorKind::InvalidInterpolation {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronecfg_types::Value;

    fn parse(text: &str) -> Template {
        parse_template(text, &Origin::default()).expect("should parse template")
    }

    fn path(up: usize, dotted: &str) -> RefPath {
        RefPath {
            up,
            segments: dotted.split('.').map(str::to_string).collect(),
        }
    }

    #[test]
    fn plain_lookup() {
        let t = parse("${task.sim}");
        assert_eq!(
            t.as_single_expr(),
            Some(&Expr::Lookup(path(0, "task.sim")))
        );
    }

    #[test]
    fn select_with_relative_path() {
        let t = parse("${oc.select:..task.name}");
        assert_eq!(
            t.as_single_expr(),
            Some(&Expr::Select {
                path: path(2, "task.name"),
                fallback: None,
            })
        );
    }

    #[test]
    fn select_fallback_is_typed() {
        let t = parse("${oc.select:..task.name,test}");
        let Some(Expr::Select { fallback, .. }) = t.as_single_expr() else {
            panic!("expected select");
        };
        assert_eq!(fallback.as_deref(), Some(&Value::Str("test".into())));

        let t = parse("${oc.select:a.b, 3}");
        let Some(Expr::Select { fallback, .. }) = t.as_single_expr() else {
            panic!("expected select");
        };
        assert_eq!(fallback.as_deref(), Some(&Value::Int(3)));
    }

    #[test]
    fn concatenation() {
        let t = parse("${oc.select:..task.name,test}-${oc.select:..algo.name,none}");
        assert_eq!(t.parts.len(), 3);
        assert_eq!(t.parts[1], Part::Literal("-".into()));
        assert!(t.as_single_expr().is_none());
    }

    #[test]
    fn nested_reference_in_fallback() {
        let t = parse("${oc.select:a.b,${c.d}}");
        let Some(Expr::Select { fallback, .. }) = t.as_single_expr() else {
            panic!("expected select");
        };
        assert!(matches!(fallback.as_deref(), Some(Value::Deferred(_))));
    }

    #[test]
    fn escaped_marker_is_literal() {
        let t = parse("cost: \\${x}");
        assert_eq!(t.parts, vec![Part::Literal("cost: ${x}".into())]);
        assert!(!t.has_expr());
    }

    #[test]
    fn env_resolver() {
        let t = parse("${oc.env:HOME,/tmp}");
        assert_eq!(
            t.as_single_expr(),
            Some(&Expr::Env {
                var: "HOME".into(),
                fallback: Some(Box::new(Value::Str("/tmp".into()))),
            })
        );
    }

    #[test]
    fn errors() {
        let origin = Origin::default();
        assert!(matches!(
            parse_template("${task.sim", &origin),
            Err(ParseErrorKind::InvalidInterpolation { .. })
        ));
        assert!(matches!(
            parse_template("${}", &origin),
            Err(ParseErrorKind::InvalidInterpolation { .. })
        ));
        assert!(matches!(
            parse_template("${..}", &origin),
            Err(ParseErrorKind::InvalidInterpolation { .. })
        ));
        assert_eq!(
            parse_template("${now:%Y}", &origin),
            Err(ParseErrorKind::UnknownResolver("now".into()))
        );
        assert!(matches!(
            parse_template("${a..b}", &origin),
            Err(ParseErrorKind::InvalidInterpolation { .. })
        ));
    }
}
