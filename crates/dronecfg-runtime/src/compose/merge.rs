//! Key-by-key tree merge.
//!
//! Nested groups merge recursively; any other incoming value replaces the
//! existing one (sequences included). A key keeps its kind across layers:
//! replacing a value with one of another kind is a
//! [`SchemaError::TypeMismatch`] unless either side is a placeholder
//! (`null`, `???` or a deferred reference). An integer may replace a float
//! and is widened.

use crate::error::SchemaError;
use dronecfg_types::{Group, Origin, Value};
use std::collections::BTreeMap;

/// Maps a full key path to the source location of the incoming value.
pub(crate) type OriginAt<'a> = &'a dyn Fn(&[String]) -> Origin;

/// Merges `overlay` into `base`; `overlay` wins on every colliding leaf.
pub(crate) fn merge_groups(
    mut base: Group,
    overlay: Group,
    path: &mut Vec<String>,
    origin_at: OriginAt<'_>,
) -> Result<Group, SchemaError> {
    for (key, incoming) in overlay {
        path.push(key.clone());
        match base.get_mut(&key) {
            Some(slot) => {
                let existing = std::mem::replace(slot, Value::Null);
                *slot = merge_values(existing, incoming, path, origin_at)?;
            }
            None => {
                base.insert(key, incoming);
            }
        }
        path.pop();
    }
    Ok(base)
}

/// Merges a single value at `path`.
pub(crate) fn merge_values(
    existing: Value,
    incoming: Value,
    path: &mut Vec<String>,
    origin_at: OriginAt<'_>,
) -> Result<Value, SchemaError> {
    match (existing, incoming) {
        (Value::Group(base), Value::Group(overlay)) => {
            merge_groups(base, overlay, path, origin_at).map(Value::Group)
        }
        (Value::Group(_), incoming) if !is_placeholder(&incoming) => {
            Err(mismatch(path, "group", incoming.kind(), origin_at))
        }
        (existing, Value::Group(_)) if !is_placeholder(&existing) => {
            Err(mismatch(path, existing.kind(), "group", origin_at))
        }
        #[allow(clippy::cast_precision_loss)]
        (Value::Float(_), Value::Int(i)) => Ok(Value::Float(i as f64)),
        (existing, incoming) if !same_kind(&existing, &incoming) => {
            Err(mismatch(path, existing.kind(), incoming.kind(), origin_at))
        }
        (_, incoming) => Ok(incoming),
    }
}

fn same_kind(existing: &Value, incoming: &Value) -> bool {
    is_placeholder(existing)
        || is_placeholder(incoming)
        || std::mem::discriminant(existing) == std::mem::discriminant(incoming)
}

/// Records where each `???` in `body` was declared, by dotted key.
///
/// Items of a sequence share the sequence's origin.
pub(crate) fn record_missing(
    body: &Group,
    path: &mut Vec<String>,
    origin_at: OriginAt<'_>,
    out: &mut BTreeMap<String, Origin>,
) {
    for (key, value) in body.iter() {
        path.push(key.to_string());
        match value {
            Value::Missing => {
                out.insert(path.join("."), origin_at(path));
            }
            Value::Group(inner) => record_missing(inner, path, origin_at, out),
            Value::Seq(items) => {
                let dotted = path.join(".");
                for (i, item) in items.iter().enumerate() {
                    if matches!(item, Value::Missing) {
                        out.insert(format!("{dotted}.{i}"), origin_at(path));
                    }
                }
            }
            _ => {}
        }
        path.pop();
    }
}

/// Wraps `body` in nested groups along `package`.
pub(crate) fn at_package(body: Group, package: &[String]) -> Group {
    package.iter().rev().fold(body, |inner, key| {
        let mut outer = Group::new();
        outer.insert(key.clone(), Value::Group(inner));
        outer
    })
}

fn is_placeholder(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Missing | Value::Deferred(_))
}

fn mismatch(
    path: &[String],
    existing: &'static str,
    incoming: &'static str,
    origin_at: OriginAt<'_>,
) -> SchemaError {
    SchemaError::TypeMismatch {
        key: path.join("."),
        existing,
        incoming,
        origin: origin_at(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(entries: &[(&str, Value)]) -> Group {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn merge(base: Group, overlay: Group) -> Result<Group, SchemaError> {
        merge_groups(base, overlay, &mut Vec::new(), &|_| Origin::command_line())
    }

    #[test]
    fn nested_groups_merge_key_by_key() {
        let base = group(&[(
            "wandb",
            Value::Group(group(&[("project", "omnidrones".into()), ("mode", "online".into())])),
        )]);
        let overlay = group(&[(
            "wandb",
            Value::Group(group(&[("mode", "disabled".into()), ("job_type", "train".into())])),
        )]);

        let merged = merge(base, overlay).expect("should merge");
        assert_eq!(merged.lookup("wandb.project"), Some(&"omnidrones".into()));
        assert_eq!(merged.lookup("wandb.mode"), Some(&"disabled".into()));
        assert_eq!(merged.lookup("wandb.job_type"), Some(&"train".into()));
        let keys: Vec<&str> = merged
            .get("wandb")
            .and_then(Value::as_group)
            .expect("group")
            .keys()
            .collect();
        assert_eq!(keys, ["project", "mode", "job_type"]);
    }

    #[test]
    fn sequences_are_replaced() {
        let base = group(&[("eye", Value::Seq(vec![Value::Int(1), Value::Int(2)]))]);
        let overlay = group(&[("eye", Value::Seq(vec![Value::Int(3)]))]);
        let merged = merge(base, overlay).expect("should merge");
        assert_eq!(merged.get("eye"), Some(&Value::Seq(vec![Value::Int(3)])));
    }

    #[test]
    fn leaf_over_group_is_type_mismatch() {
        let base = group(&[("viewer", Value::Group(group(&[("eye", Value::Int(1))])))]);
        let overlay = group(&[("viewer", Value::Int(3))]);
        let err = merge(base, overlay).expect_err("should fail");
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                key: "viewer".into(),
                existing: "group",
                incoming: "int",
                origin: Origin::command_line(),
            }
        );
    }

    #[test]
    fn group_over_number_is_type_mismatch() {
        let base = group(&[("seed", Value::Int(0))]);
        let overlay = group(&[("seed", Value::Group(group(&[("a", Value::Int(1))])))]);
        assert!(matches!(
            merge(base, overlay),
            Err(SchemaError::TypeMismatch { existing: "int", incoming: "group", .. })
        ));
    }

    #[test]
    fn leaf_kind_is_stable() {
        let base = group(&[("num_drones", Value::Int(2))]);
        let overlay = group(&[("num_drones", "two".into())]);
        assert!(matches!(
            merge(base, overlay),
            Err(SchemaError::TypeMismatch { existing: "int", incoming: "string", .. })
        ));

        let base = group(&[("resolution", Value::Seq(vec![Value::Int(960), Value::Int(720)]))]);
        let overlay = group(&[("resolution", Value::Int(5))]);
        assert!(matches!(
            merge(base, overlay),
            Err(SchemaError::TypeMismatch { existing: "sequence", incoming: "int", .. })
        ));

        let base = group(&[("seed", Value::Int(0))]);
        let overlay = group(&[("seed", Value::Float(1.5))]);
        assert!(merge(base, overlay).is_err());
    }

    #[test]
    fn int_widens_into_float() {
        let base = group(&[("lr", Value::Float(0.0005))]);
        let overlay = group(&[("lr", Value::Int(1))]);
        let merged = merge(base, overlay).expect("should merge");
        assert_eq!(merged.get("lr"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn placeholders_take_any_kind() {
        let base = group(&[
            ("entity", Value::Null),
            ("name", Value::Missing),
            ("group", "RopeDragging".into()),
        ]);
        let overlay = group(&[
            ("entity", "lab".into()),
            ("name", Value::Int(3)),
            ("group", Value::Null),
        ]);
        let merged = merge(base, overlay).expect("should merge");
        assert_eq!(merged.get("entity"), Some(&"lab".into()));
        assert_eq!(merged.get("name"), Some(&Value::Int(3)));
        assert_eq!(merged.get("group"), Some(&Value::Null));
    }

    #[test]
    fn placeholders_may_become_groups() {
        let base = group(&[("entity", Value::Null), ("sim", Value::Missing)]);
        let overlay = group(&[
            ("entity", Value::Group(group(&[("name", "lab".into())]))),
            ("sim", Value::Group(group(&[("dt", Value::Float(0.016))]))),
        ]);
        let merged = merge(base, overlay).expect("should merge");
        assert_eq!(merged.lookup("sim.dt"), Some(&Value::Float(0.016)));
        assert_eq!(merged.lookup("entity.name"), Some(&"lab".into()));
    }

    #[test]
    fn missing_markers_are_located() {
        let body = group(&[
            ("name", Value::Missing),
            (
                "sim",
                Value::Group(group(&[("dt", Value::Missing), ("substeps", Value::Int(1))])),
            ),
            ("eye", Value::Seq(vec![Value::Int(1), Value::Missing])),
        ]);
        let mut out = BTreeMap::new();
        record_missing(&body, &mut Vec::new(), &|p: &[String]| Origin::new(None, p.len()), &mut out);

        let keys: Vec<(&str, usize)> = out.iter().map(|(k, o)| (k.as_str(), o.line)).collect();
        assert_eq!(keys, [("eye.1", 1), ("name", 1), ("sim.dt", 2)]);
    }

    #[test]
    fn package_wrapping() {
        let body = group(&[("name", "ppo".into())]);
        let wrapped = at_package(body, &["algo".to_string(), "inner".to_string()]);
        assert_eq!(wrapped.lookup("algo.inner.name"), Some(&"ppo".into()));
    }
}
