//! Deferred-reference AST.
//!
//! A string value containing `${...}` is parsed once, when its document
//! is parsed, into a [`Template`]. Templates are never re-parsed; the
//! resolver walks the AST.
//!
//! ```text
//! run_name: ${oc.select:..task.name,test}-${oc.select:..algo.name,none}
//!
//! Template
//! ├── Expr(Select { path: ..task.name, fallback: "test" })
//! ├── Literal("-")
//! └── Expr(Select { path: ..algo.name, fallback: "none" })
//! ```

use crate::value::Value;
use std::fmt;
use std::path::PathBuf;

/// Name of the select-with-fallback resolver.
pub const SELECT_RESOLVER: &str = "oc.select";

/// Name of the environment-variable resolver.
pub const ENV_RESOLVER: &str = "oc.env";

/// A parsed string template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Original text, kept for rendering unresolved trees and for errors.
    pub source: String,
    /// Parsed parts in order.
    pub parts: Vec<Part>,
}

impl Template {
    /// Creates a template from its source text and parsed parts.
    #[must_use]
    pub fn new(source: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            source: source.into(),
            parts,
        }
    }

    /// Returns the single expression if the template is exactly `${...}`.
    ///
    /// Such templates resolve to the target's typed value instead of a string.
    #[must_use]
    pub fn as_single_expr(&self) -> Option<&Expr> {
        match self.parts.as_slice() {
            [Part::Expr(expr)] => Some(expr),
            _ => None,
        }
    }

    /// Returns `true` if the template contains at least one expression.
    #[must_use]
    pub fn has_expr(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Expr(_)))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One piece of a [`Template`].
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Literal text copied verbatim.
    Literal(String),
    /// A `${...}` expression.
    Expr(Expr),
}

/// A `${...}` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `${a.b.c}`: plain lookup, fails if the target is absent.
    Lookup(RefPath),
    /// `${oc.select:path[,fallback]}`: lookup with fallback.
    ///
    /// The fallback is typed by the scalar grammar and may itself be a
    /// [`Value::Deferred`].
    Select {
        path: RefPath,
        fallback: Option<Box<Value>>,
    },
    /// `${oc.env:VAR[,fallback]}`: process environment lookup.
    Env {
        var: String,
        fallback: Option<Box<Value>>,
    },
}

/// A dotted reference path.
///
/// `up == 0` means absolute from the root. `up == 1` (`.x`) starts at the
/// group containing the reference; every further dot climbs one level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefPath {
    pub up: usize,
    pub segments: Vec<String>,
}

impl RefPath {
    /// Creates an absolute path from dotted segments.
    #[must_use]
    pub fn absolute<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            up: 0,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if the path is relative to the referencing key.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.up > 0
    }

    /// Resolves this path against the key path of the referencing value.
    ///
    /// Returns `None` if the path climbs above the root.
    #[must_use]
    pub fn absolutize(&self, from: &[String]) -> Option<Vec<String>> {
        if self.up == 0 {
            return Some(self.segments.clone());
        }

        // `from` names the referencing key itself; its container is one level up.
        let climb = self.up;
        if climb > from.len() {
            return None;
        }
        let mut base = from[..from.len() - climb].to_vec();
        base.extend(self.segments.iter().cloned());
        Some(base)
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.up {
            f.write_str(".")?;
        }
        f.write_str(&self.segments.join("."))
    }
}

/// Where a value came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Origin {
    /// Document path, `None` for inline text and command-line overrides.
    pub source: Option<PathBuf>,
    /// 1-based line number, `0` when unknown.
    pub line: usize,
}

impl Origin {
    /// Creates an origin at `line` of `source`.
    #[must_use]
    pub fn new(source: Option<PathBuf>, line: usize) -> Self {
        Self { source, line }
    }

    /// Origin used for command-line overrides.
    #[must_use]
    pub fn command_line() -> Self {
        Self::default()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(path), 0) => write!(f, "{}", path.display()),
            (Some(path), line) => write!(f, "{}:{line}", path.display()),
            (None, 0) => f.write_str("<override>"),
            (None, line) => write!(f, "<input>:{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> Vec<String> {
        path.split('.').map(str::to_string).collect()
    }

    #[test]
    fn absolute_path_ignores_position() {
        let path = RefPath::absolute(["task", "sim"]);
        assert_eq!(path.absolutize(&key("sim")), Some(key("task.sim")));
        assert!(!path.is_relative());
    }

    #[test]
    fn single_dot_is_sibling() {
        let path = RefPath {
            up: 1,
            segments: vec!["project".into()],
        };
        assert_eq!(
            path.absolutize(&key("wandb.group")),
            Some(key("wandb.project"))
        );
    }

    #[test]
    fn double_dot_climbs_to_parent_group() {
        let path = RefPath {
            up: 2,
            segments: key("task.name"),
        };
        assert_eq!(path.absolutize(&key("wandb.group")), Some(key("task.name")));
    }

    #[test]
    fn climbing_above_root_fails() {
        let path = RefPath {
            up: 3,
            segments: key("task.name"),
        };
        assert_eq!(path.absolutize(&key("wandb.group")), None);
    }

    #[test]
    fn ref_path_display() {
        let path = RefPath {
            up: 2,
            segments: key("task.name"),
        };
        assert_eq!(path.to_string(), "..task.name");
    }

    #[test]
    fn single_expr_detection() {
        let single = Template::new(
            "${task.sim}",
            vec![Part::Expr(Expr::Lookup(RefPath::absolute(["task", "sim"])))],
        );
        assert!(single.as_single_expr().is_some());

        let concat = Template::new(
            "${a}-x",
            vec![
                Part::Expr(Expr::Lookup(RefPath::absolute(["a"]))),
                Part::Literal("-x".into()),
            ],
        );
        assert!(concat.as_single_expr().is_none());
        assert!(concat.has_expr());
    }

    #[test]
    fn origin_display() {
        let origin = Origin::new(Some(PathBuf::from("cfg/train.yaml")), 12);
        assert_eq!(origin.to_string(), "cfg/train.yaml:12");
        assert_eq!(Origin::command_line().to_string(), "<override>");
    }
}
