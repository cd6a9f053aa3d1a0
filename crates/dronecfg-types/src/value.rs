//! Configuration value tree.
//!
//! A parsed document is a [`Group`] whose leaves are [`Value`]s. The same
//! type is used for every stage: parsed documents, the composed tree, and
//! the resolved output (which contains no [`Value::Deferred`] or
//! [`Value::Missing`]).

use crate::template::{Origin, Template};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// The mandatory-value marker.
pub const MISSING_MARKER: &str = "???";

/// A configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty `key:`, `null` or `~`.
    Null,
    /// `???`: must be supplied by a later layer.
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Flow `[a, b]` or block `- item` sequence.
    Seq(Vec<Value>),
    /// Nested settings group.
    Group(Group),
    /// Unresolved `${...}` reference.
    Deferred(Deferred),
}

/// An unresolved deferred reference and where it was declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Deferred {
    pub template: Template,
    pub origin: Origin,
}

impl Value {
    /// Short type name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Missing => "missing",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Group(_) => "group",
            Self::Deferred(_) => "reference",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Returns `true` for null, missing, and empty strings.
    ///
    /// `oc.select` falls back on these.
    #[must_use]
    pub fn is_empty_like(&self) -> bool {
        match self {
            Self::Null | Self::Missing => true,
            Self::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` if no deferred or missing value remains anywhere below.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Deferred(_) | Self::Missing => false,
            Self::Seq(items) => items.iter().all(Value::is_resolved),
            Self::Group(g) => g.values().all(Value::is_resolved),
            _ => true,
        }
    }

    /// Descends one path segment: a key for groups, an index for sequences.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Self::Group(g) => g.get(segment),
            Self::Seq(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut Value> {
        match self {
            Self::Group(g) => g.get_mut(segment),
            Self::Seq(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Group> for Value {
    fn from(v: Group) -> Self {
        Self::Group(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Seq(v)
    }
}

/// An insertion-ordered settings group with unique keys.
///
/// Lookup is by key; order only matters for rendering, and equality
/// ignores it. Replacing an existing key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    entries: IndexMap<String, Value>,
}

impl Group {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Inserts or replaces `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Returns the value at `key`, inserting `default()` at the end first
    /// if the key is absent.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> Value) -> &mut Value {
        self.entries.entry(key.to_string()).or_insert_with(default)
    }

    /// Removes `key`, returning its value. Later keys keep their order.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Looks up a key path, descending through groups and sequences.
    #[must_use]
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get(first.as_ref())?;
        for segment in rest {
            current = current.child(segment.as_ref())?;
        }
        Some(current)
    }

    /// Mutable variant of [`get_path`](Self::get_path).
    pub fn get_path_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get_mut(first.as_ref())?;
        for segment in rest {
            current = current.child_mut(segment.as_ref())?;
        }
        Some(current)
    }

    /// Looks up a dotted key such as `"wandb.group"`.
    #[must_use]
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let segments: Vec<&str> = dotted.split('.').collect();
        self.get_path(&segments)
    }

    /// Sorts keys recursively, for stable output.
    pub fn sort_keys(&mut self) {
        self.entries.sort_keys();
        self.entries.values_mut().for_each(sort_value);
    }
}

fn sort_value(value: &mut Value) {
    match value {
        Value::Group(g) => g.sort_keys(),
        Value::Seq(items) => items.iter_mut().for_each(sort_value),
        _ => {}
    }
}

impl FromIterator<(String, Value)> for Group {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Group {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Missing => serializer.serialize_str(MISSING_MARKER),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Deferred(d) => serializer.serialize_str(&d.template.source),
            Self::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Group(g) => g.serialize(serializer),
        }
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
