//! Deferred-reference resolution.
//!
//! Runs once over the fully composed tree. Every [`Value::Deferred`] is
//! evaluated on first demand, cached by key path, and replaced by its typed
//! result; a reference that depends on itself is reported as a
//! [`ResolutionError::Cycle`] with the full chain.
//!
//! # Paths
//!
//! | Reference | From `wandb.group` |
//! |-----------|--------------------|
//! | `${task.name}` | `task.name` (absolute) |
//! | `${.job_type}` | `wandb.job_type` (sibling) |
//! | `${..task.name}` | `task.name` (one level up) |

use crate::error::ResolutionError;
use dronecfg_types::{Deferred, Expr, Group, Origin, Part, Template, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type EnvLookup<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

/// Resolves every deferred reference in `tree`, reading `oc.env` values
/// from the process environment.
///
/// # Errors
///
/// The first [`ResolutionError`] encountered.
pub fn resolve(tree: &Group) -> Result<Group, ResolutionError> {
    Resolver::new(tree).resolve_all()
}

/// Memoising evaluator over an immutable composed tree.
pub struct Resolver<'a> {
    tree: &'a Group,
    cache: HashMap<Vec<String>, Value>,
    /// Deferred values currently being evaluated, outermost first.
    stack: Vec<Vec<String>>,
    env: EnvLookup<'a>,
    /// Where `???` markers were declared, by dotted key.
    missing_origins: Option<&'a BTreeMap<String, Origin>>,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(tree: &'a Group) -> Self {
        Self {
            tree,
            cache: HashMap::new(),
            stack: Vec::new(),
            env: Box::new(|name| std::env::var(name).ok()),
            missing_origins: None,
        }
    }

    /// Locates leftover `???` values in [`ResolutionError::MissingValue`].
    #[must_use]
    pub fn with_missing_origins(mut self, origins: &'a BTreeMap<String, Origin>) -> Self {
        self.missing_origins = Some(origins);
        self
    }

    /// Replaces the environment used by `oc.env`.
    #[must_use]
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Resolves the whole tree.
    ///
    /// # Errors
    ///
    /// The first [`ResolutionError`] encountered.
    pub fn resolve_all(mut self) -> Result<Group, ResolutionError> {
        let tree = self.tree;
        let mut path = Vec::new();
        let mut out = Group::new();
        for (key, value) in tree.iter() {
            path.push(key.to_string());
            let resolved = self.resolve_value(value, &mut path)?;
            path.pop();
            out.insert(key, resolved);
        }
        debug!(references = self.cache.len(), "Resolved deferred references");
        Ok(out)
    }

    /// Resolves the value at a dotted key on demand.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Any [`ResolutionError`] raised while resolving the value.
    pub fn resolve_key(&mut self, dotted: &str) -> Result<Option<Value>, ResolutionError> {
        let target: Vec<String> = dotted.split('.').map(str::to_string).collect();
        match self.lookup(&target)? {
            Some(Value::Missing) => Err(self.missing(dotted.to_string())),
            other => Ok(other),
        }
    }

    fn resolve_value(
        &mut self,
        value: &Value,
        path: &mut Vec<String>,
    ) -> Result<Value, ResolutionError> {
        match value {
            Value::Missing => Err(self.missing(path.join("."))),
            Value::Deferred(deferred) => self.resolve_deferred(deferred, path),
            Value::Group(group) => {
                let mut out = Group::new();
                for (key, child) in group.iter() {
                    path.push(key.to_string());
                    let resolved = self.resolve_value(child, path)?;
                    path.pop();
                    out.insert(key, resolved);
                }
                Ok(Value::Group(out))
            }
            Value::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    out.push(self.resolve_value(item, path)?);
                    path.pop();
                }
                Ok(Value::Seq(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_deferred(
        &mut self,
        deferred: &Deferred,
        path: &[String],
    ) -> Result<Value, ResolutionError> {
        if let Some(value) = self.cache.get(path) {
            return Ok(value.clone());
        }

        if let Some(start) = self.stack.iter().position(|p| p == path) {
            let mut chain: Vec<String> = self.stack[start..].iter().map(|p| p.join(".")).collect();
            chain.push(path.join("."));
            return Err(ResolutionError::Cycle {
                chain,
                origin: deferred.origin.clone(),
            });
        }

        self.stack.push(path.to_vec());
        let result = self.eval_template(&deferred.template, path, &deferred.origin);
        self.stack.pop();

        let value = result?;
        debug!(key = %path.join("."), reference = %deferred.template, "Resolved reference");
        self.cache.insert(path.to_vec(), value.clone());
        Ok(value)
    }

    fn eval_template(
        &mut self,
        template: &Template,
        path: &[String],
        origin: &Origin,
    ) -> Result<Value, ResolutionError> {
        if let Some(expr) = template.as_single_expr() {
            return self.eval_expr(expr, path, origin);
        }

        let mut out = String::new();
        for part in &template.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Expr(expr) => {
                    let value = self.eval_expr(expr, path, origin)?;
                    let text = scalar_text(&value).ok_or_else(|| ResolutionError::NotAScalar {
                        key: path.join("."),
                        reference: describe(expr),
                        kind: value.kind(),
                        origin: origin.clone(),
                    })?;
                    out.push_str(&text);
                }
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_expr(
        &mut self,
        expr: &Expr,
        path: &[String],
        origin: &Origin,
    ) -> Result<Value, ResolutionError> {
        match expr {
            Expr::Lookup(reference) => {
                let not_found = || ResolutionError::ReferenceNotFound {
                    key: path.join("."),
                    reference: reference.to_string(),
                    origin: origin.clone(),
                };
                let target = reference.absolutize(path).ok_or_else(not_found)?;
                match self.lookup(&target)? {
                    Some(Value::Missing) => Err(self.missing(target.join("."))),
                    Some(value) => Ok(value),
                    None => Err(not_found()),
                }
            }
            Expr::Select {
                path: reference,
                fallback,
            } => {
                let found = match reference.absolutize(path) {
                    Some(target) => self.lookup(&target)?,
                    None => None,
                };
                match (found, fallback) {
                    (Some(value), _) if !value.is_empty_like() => Ok(value),
                    (_, Some(fallback)) => self.eval_fallback(fallback, path, origin),
                    (_, None) => Ok(Value::Null),
                }
            }
            Expr::Env { var, fallback } => match ((self.env)(var), fallback) {
                (Some(value), _) => Ok(Value::Str(value)),
                (None, Some(fallback)) => self.eval_fallback(fallback, path, origin),
                (None, None) => Err(ResolutionError::EnvNotSet {
                    var: var.clone(),
                    key: path.join("."),
                    origin: origin.clone(),
                }),
            },
        }
    }

    /// Evaluates a literal fallback. Not cached: it has no key of its own.
    fn eval_fallback(
        &mut self,
        fallback: &Value,
        path: &[String],
        origin: &Origin,
    ) -> Result<Value, ResolutionError> {
        match fallback {
            Value::Deferred(deferred) => self.eval_template(&deferred.template, path, origin),
            Value::Missing => Err(ResolutionError::MissingValue {
                key: path.join("."),
                origin: origin.clone(),
            }),
            Value::Seq(items) => items
                .iter()
                .map(|item| self.eval_fallback(item, path, origin))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq),
            Value::Group(group) => {
                let mut out = Group::new();
                for (key, item) in group.iter() {
                    out.insert(key, self.eval_fallback(item, path, origin)?);
                }
                Ok(Value::Group(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Finds the fully resolved value at an absolute key path.
    ///
    /// Deferred values met on the way are resolved first, so a path may
    /// pass through a reference (`sim.dt` where `sim` is `${task.sim}`).
    /// A raw `???` target is returned as [`Value::Missing`] for the caller
    /// to judge.
    fn lookup(&mut self, target: &[String]) -> Result<Option<Value>, ResolutionError> {
        let tree = self.tree;
        let Some((first, rest)) = target.split_first() else {
            return Ok(None);
        };
        let Some(mut node) = tree.get(first) else {
            return Ok(None);
        };

        for (i, segment) in rest.iter().enumerate() {
            if let Value::Deferred(deferred) = node {
                let resolved = self.resolve_deferred(deferred, &target[..=i])?;
                return Ok(descend(&resolved, &rest[i..]).cloned());
            }
            match node.child(segment) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }

        match node {
            Value::Missing => Ok(Some(Value::Missing)),
            _ => self.resolve_value(node, &mut target.to_vec()).map(Some),
        }
    }

    fn missing(&self, key: String) -> ResolutionError {
        let origin = self
            .missing_origins
            .and_then(|origins| origins.get(&key))
            .cloned()
            .unwrap_or_default();
        ResolutionError::MissingValue { key, origin }
    }
}

fn descend<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(value, |node, segment| node.child(segment))
}

/// String form of a scalar inside a concatenation.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("None".to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(format!("{f:?}")),
        Value::Str(s) => Some(s.clone()),
        _ => None,
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Lookup(path) | Expr::Select { path, .. } => path.to_string(),
        Expr::Env { var, .. } => format!("env:{var}"),
    }
}
