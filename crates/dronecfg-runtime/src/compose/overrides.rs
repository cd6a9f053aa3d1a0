//! Command-line overrides.
//!
//! | Syntax | Effect |
//! |--------|--------|
//! | `key.path=value` | replace an existing key |
//! | `+key.path=value` | add a key that must not exist |
//! | `++key.path=value` | set, adding if absent |
//! | `~key.path` | delete an existing key |
//!
//! `group=variant` for a group named in a `defaults` list is a choice, not
//! a key override; the composer consumes those before the rest are applied.

use super::merge::merge_values;
use crate::document::parse_value;
use crate::error::SchemaError;
use dronecfg_types::{Group, Origin, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// One parsed command-line override.
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    Set { key: String, value: Value },
    Add { key: String, value: Value },
    ForceAdd { key: String, value: Value },
    Delete { key: String },
}

impl Override {
    /// Parses `text`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidOverride`] for a missing `=`, an invalid key or
    /// a value that does not parse.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidOverride {
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = text.trim();

        if let Some(key) = trimmed.strip_prefix('~') {
            if key.contains('=') {
                return Err(invalid("deletion takes no value"));
            }
            return Ok(Self::Delete {
                key: valid_key(key).ok_or_else(|| invalid("invalid key"))?,
            });
        }

        let (prefix, rest) = if let Some(rest) = trimmed.strip_prefix("++") {
            ("++", rest)
        } else if let Some(rest) = trimmed.strip_prefix('+') {
            ("+", rest)
        } else {
            ("", trimmed)
        };

        let (key, raw) = rest.split_once('=').ok_or_else(|| invalid("expected key=value"))?;
        let key = valid_key(key).ok_or_else(|| invalid("invalid key"))?;
        let value =
            parse_value(raw, &Origin::command_line()).map_err(|kind| invalid(&kind.to_string()))?;

        Ok(match prefix {
            "++" => Self::ForceAdd { key, value },
            "+" => Self::Add { key, value },
            _ => Self::Set { key, value },
        })
    }

    /// The dotted key this override targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Add { key, .. }
            | Self::ForceAdd { key, .. }
            | Self::Delete { key } => key,
        }
    }

    /// For a plain `key=value`, the variant it would select if `key` names
    /// a defaults group. `null` disables the group.
    #[must_use]
    pub fn as_choice(&self) -> Option<(String, Option<String>)> {
        let Self::Set { key, value } = self else {
            return None;
        };
        let variant = match value {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            _ => return None,
        };
        Some((key.replace('.', "/"), variant))
    }
}

impl FromStr for Override {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { key, value } => write!(f, "{key}={value}"),
            Self::Add { key, value } => write!(f, "+{key}={value}"),
            Self::ForceAdd { key, value } => write!(f, "++{key}={value}"),
            Self::Delete { key } => write!(f, "~{key}"),
        }
    }
}

fn valid_key(key: &str) -> Option<String> {
    let key = key.trim();
    let ok = !key.is_empty()
        && key
            .split(['.', '/'])
            .all(|s| !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '='));
    ok.then(|| key.to_string())
}

/// Applies `overrides` to `tree` in order.
///
/// # Errors
///
/// [`SchemaError::UnknownOverrideKey`] when replacing or deleting a key
/// that does not exist, [`SchemaError::OverrideKeyExists`] when adding one
/// that does, and [`SchemaError::TypeMismatch`] when a leaf and a group
/// collide.
pub fn apply_overrides(mut tree: Group, overrides: &[Override]) -> Result<Group, SchemaError> {
    for ov in overrides {
        let path: Vec<String> = ov.key().split('.').map(str::to_string).collect();
        match ov {
            Override::Set { key, value } => {
                let slot = tree
                    .get_path_mut(&path)
                    .ok_or_else(|| SchemaError::UnknownOverrideKey { key: key.clone() })?;
                replace(slot, value.clone(), &path)?;
            }
            Override::Add { key, value } => {
                if tree.get_path(&path).is_some() {
                    return Err(SchemaError::OverrideKeyExists { key: key.clone() });
                }
                set_creating(&mut tree, &path, value.clone())?;
            }
            Override::ForceAdd { value, .. } => match tree.get_path_mut(&path) {
                Some(slot) => replace(slot, value.clone(), &path)?,
                None => set_creating(&mut tree, &path, value.clone())?,
            },
            Override::Delete { key } => {
                if !delete(&mut tree, &path) {
                    return Err(SchemaError::UnknownOverrideKey { key: key.clone() });
                }
            }
        }
        debug!(override_ = %ov, "Applied override");
    }
    Ok(tree)
}

fn replace(slot: &mut Value, value: Value, path: &[String]) -> Result<(), SchemaError> {
    let existing = std::mem::replace(slot, Value::Null);
    *slot = merge_values(existing, value, &mut path.to_vec(), &|_| Origin::command_line())?;
    Ok(())
}

/// Sets `path`, creating missing (or null) intermediate groups.
fn set_creating(tree: &mut Group, path: &[String], value: Value) -> Result<(), SchemaError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = tree;
    for (depth, key) in parents.iter().enumerate() {
        let slot = current.get_or_insert_with(key, || Value::Group(Group::new()));
        if slot.is_null() {
            *slot = Value::Group(Group::new());
        }
        current = match slot {
            Value::Group(g) => g,
            other => {
                return Err(SchemaError::TypeMismatch {
                    key: path[..=depth].join("."),
                    existing: other.kind(),
                    incoming: "group",
                    origin: Origin::command_line(),
                })
            }
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

fn delete(tree: &mut Group, path: &[String]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    if parents.is_empty() {
        return tree.remove(last).is_some();
    }
    match tree.get_path_mut(parents) {
        Some(Value::Group(g)) => g.remove(last).is_some(),
        _ => false,
    }
}
