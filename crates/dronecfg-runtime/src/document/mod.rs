//! Configuration documents.
//!
//! A [`Document`] is one parsed file: its body (every top-level key other
//! than the composition directives), its `defaults` list and its
//! `searchpath` declarations.
//!
//! # Syntax
//!
//! ```text
//! headless: true
//! total_frames: 150_000_000
//! viewer:
//!   resolution: [960, 720]
//! wandb:
//!   group: ${oc.select:..task.name}
//! defaults:
//!   - task: Manipulation/RopeDragging
//!   - _self_
//! searchpath:
//!   - file://../cfg
//! ```

mod lines;
mod parser;
mod scalar;
mod template;

pub(crate) use scalar::parse_value;

use crate::error::{LoadError, ParseError, SchemaError};
use dronecfg_types::{Group, Origin, Value};
use parser::BlockParser;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key holding the composition list.
pub const DEFAULTS_KEY: &str = "defaults";

/// Key holding extra search roots.
pub const SEARCHPATH_KEY: &str = "searchpath";

/// The defaults entry marking where a document's own keys are merged.
pub const SELF_ENTRY: &str = "_self_";

const OPTIONAL_PREFIX: &str = "optional ";

/// One entry of a `defaults` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultEntry {
    /// `_self_`.
    SelfRef { line: usize },
    /// `group: variant`, `group: null` or `optional group: variant`.
    ///
    /// A `None` variant disables the entry.
    Group {
        group: String,
        variant: Option<String>,
        optional: bool,
        line: usize,
    },
    /// A bare name: a document next to the declaring one.
    Config { name: String, line: usize },
}

impl DefaultEntry {
    /// The group name for `group: variant` entries.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Group { group, .. } => Some(group),
            _ => None,
        }
    }

    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::SelfRef { line } | Self::Group { line, .. } | Self::Config { line, .. } => *line,
        }
    }
}

/// A `searchpath` entry as written, with its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathDecl {
    pub entry: String,
    pub line: usize,
}

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File the document was read from; `None` for in-memory input.
    pub source: Option<PathBuf>,
    /// Top-level keys other than `defaults`/`searchpath`.
    pub body: Group,
    /// The `defaults` list, if the document declares one.
    pub defaults: Option<Vec<DefaultEntry>>,
    pub searchpath: Vec<SearchPathDecl>,
    key_lines: BTreeMap<String, usize>,
}

impl Document {
    /// Parses `text`. `source` is only used for error locations and for
    /// resolving relative search paths.
    ///
    /// # Errors
    ///
    /// [`LoadError::Parse`] on malformed syntax, [`LoadError::Schema`] on an
    /// invalid `defaults` or `searchpath` declaration.
    pub fn parse(text: &str, source: Option<PathBuf>) -> Result<Self, LoadError> {
        let lines = lines::split_lines(text)
            .map_err(|(line, kind)| ParseError::new(Origin::new(source.clone(), line), kind))?;
        let (mut body, key_lines) = BlockParser::new(lines, source.clone()).parse_root()?;

        let mut doc = Self {
            source,
            body: Group::new(),
            defaults: None,
            searchpath: Vec::new(),
            key_lines,
        };

        if let Some(value) = body.remove(DEFAULTS_KEY) {
            doc.defaults = doc.defaults_from(value)?;
        }
        if let Some(value) = body.remove(SEARCHPATH_KEY) {
            doc.searchpath = doc.searchpath_from(value)?;
        }
        doc.body = body;

        Ok(doc)
    }

    /// Reads and parses a file.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] if the file cannot be read, otherwise as
    /// [`parse`](Self::parse).
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        let doc = Self::parse(&text, Some(path.to_path_buf()))?;
        debug!(
            path = %path.display(),
            keys = doc.body.len(),
            defaults = doc.defaults.as_ref().map_or(0, Vec::len),
            "Parsed document"
        );
        Ok(doc)
    }

    /// Line on which a dotted key path was declared.
    #[must_use]
    pub fn line_of(&self, key: &str) -> Option<usize> {
        self.key_lines.get(key).copied()
    }

    /// Source location of a dotted key path (line 0 if unknown).
    #[must_use]
    pub fn origin_of(&self, key: &str) -> Origin {
        Origin::new(self.source.clone(), self.line_of(key).unwrap_or(0))
    }

    /// Directory containing the document, if it came from a file.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    fn defaults_from(&self, value: Value) -> Result<Option<Vec<DefaultEntry>>, SchemaError> {
        let items = match value {
            Value::Null => return Ok(None),
            Value::Seq(items) => items,
            other => {
                return Err(SchemaError::InvalidDefaultsEntry {
                    origin: self.origin_of(DEFAULTS_KEY),
                    reason: format!("expected a list, found {}", other.kind()),
                })
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let key = format!("{DEFAULTS_KEY}.{i}");
            let line = self.line_of(&key).unwrap_or(0);
            entries.push(self.default_entry(item, line)?);
        }

        self.validate_defaults(&entries)?;
        Ok(Some(entries))
    }

    fn default_entry(&self, item: Value, line: usize) -> Result<DefaultEntry, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidDefaultsEntry {
            origin: Origin::new(self.source.clone(), line),
            reason,
        };

        match item {
            Value::Str(name) if name == SELF_ENTRY => Ok(DefaultEntry::SelfRef { line }),
            Value::Str(name) => Ok(DefaultEntry::Config { name, line }),
            Value::Group(group) if group.len() == 1 => {
                let Some((key, variant)) = group.into_iter().next() else {
                    return Err(invalid("empty entry".to_string()));
                };
                let (name, optional) = match key.strip_prefix(OPTIONAL_PREFIX) {
                    Some(rest) => (rest.trim().to_string(), true),
                    None => (key, false),
                };
                if name.is_empty() {
                    return Err(invalid("entry has no group name".to_string()));
                }
                let variant = match variant {
                    Value::Null => None,
                    Value::Str(s) => Some(s),
                    Value::Int(i) => Some(i.to_string()),
                    other => {
                        return Err(invalid(format!(
                            "variant of '{name}' must be a name, found {}",
                            other.kind()
                        )))
                    }
                };
                Ok(DefaultEntry::Group {
                    group: name,
                    variant,
                    optional,
                    line,
                })
            }
            Value::Group(_) => Err(invalid("expected exactly one 'group: variant' pair".to_string())),
            other => Err(invalid(format!("expected a name or 'group: variant', found {}", other.kind()))),
        }
    }

    fn validate_defaults(&self, entries: &[DefaultEntry]) -> Result<(), SchemaError> {
        let document = self.origin_of(DEFAULTS_KEY);
        let selfs = entries
            .iter()
            .filter(|e| matches!(e, DefaultEntry::SelfRef { .. }))
            .count();
        match selfs {
            0 => return Err(SchemaError::MissingSelf { document }),
            1 => {}
            _ => return Err(SchemaError::DuplicateSelf { document }),
        }

        let mut seen = HashSet::new();
        for entry in entries {
            if let DefaultEntry::Group { group, line, .. } = entry {
                if !seen.insert(group.trim_start_matches('/')) {
                    return Err(SchemaError::DuplicateGroup {
                        group: group.clone(),
                        origin: Origin::new(self.source.clone(), *line),
                    });
                }
            }
        }
        Ok(())
    }

    fn searchpath_from(&self, value: Value) -> Result<Vec<SearchPathDecl>, SchemaError> {
        let items = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Str(entry) => {
                let line = self.line_of(SEARCHPATH_KEY).unwrap_or(0);
                return Ok(vec![SearchPathDecl { entry, line }]);
            }
            Value::Seq(items) => items,
            other => {
                return Err(SchemaError::InvalidSearchPath {
                    entry: other.to_string(),
                    origin: self.origin_of(SEARCHPATH_KEY),
                    reason: "expected a list of paths".to_string(),
                })
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let key = format!("{SEARCHPATH_KEY}.{i}");
                match item {
                    Value::Str(entry) => Ok(SearchPathDecl {
                        entry,
                        line: self.line_of(&key).unwrap_or(0),
                    }),
                    other => Err(SchemaError::InvalidSearchPath {
                        entry: other.to_string(),
                        origin: self.origin_of(&key),
                        reason: format!("expected a string, found {}", other.kind()),
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use dronecfg_types::{Expr, RefPath};

    const TRAIN_YAML: &str = r#"# hydra.job.chdir: false
headless: true

sim: ${task.sim}
env: ${task.env}

total_frames: 150_000_000
max_iters: -1
eval_interval: -1
save_interval: -1
seed: 0

viewer:
  resolution: [960, 720]
  eye: [8, 0., 6.]
  lookat: [0., 0., 1.]

wandb:
  group: ${oc.select:..task.name}
  run_name: ${oc.select:..task.name,test}-${oc.select:..algo.name,none}
  job_type: train
  entity:
  project: omnidrones
  mode: online # set to 'disabled' when debugging locally
  run_id:
  monitor_gym: True
  tags:

defaults:
  - task: Manipulation/RopeDragging
  - algo: ppo
  - _self_

searchpath:
  - file://../cfg
"#;

    fn parse(text: &str) -> Document {
        Document::parse(text, None).expect("should parse document")
    }

    fn parse_err(text: &str) -> ParseErrorKind {
        match Document::parse(text, None) {
            Err(LoadError::Parse(e)) => e.kind,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    fn schema_err(text: &str) -> SchemaError {
        match Document::parse(text, None) {
            Err(LoadError::Schema(e)) => e,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn parses_training_document() {
        let doc = parse(TRAIN_YAML);
        let body = &doc.body;

        assert_eq!(body.get("headless"), Some(&Value::Bool(true)));
        assert_eq!(body.get("total_frames"), Some(&Value::Int(150_000_000)));
        assert_eq!(body.get("max_iters"), Some(&Value::Int(-1)));
        assert_eq!(body.get("seed"), Some(&Value::Int(0)));
        assert_eq!(
            body.lookup("viewer.resolution"),
            Some(&Value::Seq(vec![Value::Int(960), Value::Int(720)]))
        );
        assert_eq!(
            body.lookup("viewer.eye"),
            Some(&Value::Seq(vec![
                Value::Int(8),
                Value::Float(0.0),
                Value::Float(6.0)
            ]))
        );
        assert_eq!(body.lookup("wandb.entity"), Some(&Value::Null));
        assert_eq!(body.lookup("wandb.tags"), Some(&Value::Null));
        assert_eq!(body.lookup("wandb.mode"), Some(&Value::Str("online".into())));
        assert_eq!(body.lookup("wandb.monitor_gym"), Some(&Value::Bool(true)));

        let Some(Value::Deferred(sim)) = body.get("sim") else {
            panic!("sim should be deferred");
        };
        assert_eq!(
            sim.template.as_single_expr(),
            Some(&Expr::Lookup(RefPath::absolute(["task", "sim"])))
        );
        assert_eq!(sim.origin.line, 4);

        assert!(!body.contains_key(DEFAULTS_KEY));
        assert!(!body.contains_key(SEARCHPATH_KEY));
        assert_eq!(
            doc.defaults,
            Some(vec![
                DefaultEntry::Group {
                    group: "task".into(),
                    variant: Some("Manipulation/RopeDragging".into()),
                    optional: false,
                    line: 30,
                },
                DefaultEntry::Group {
                    group: "algo".into(),
                    variant: Some("ppo".into()),
                    optional: false,
                    line: 31,
                },
                DefaultEntry::SelfRef { line: 32 },
            ])
        );
        assert_eq!(
            doc.searchpath,
            vec![SearchPathDecl {
                entry: "file://../cfg".into(),
                line: 35,
            }]
        );
        assert_eq!(doc.line_of("wandb.group"), Some(19));
    }

    #[test]
    fn underscore_grouped_integers() {
        let doc = parse("total_frames: 5_000_000");
        assert_eq!(doc.body.get("total_frames"), Some(&Value::Int(5_000_000)));
    }

    #[test]
    fn malformed_underscores_are_parse_errors() {
        for text in ["n: 5__000", "n: 5_000_", "n: -_5"] {
            assert!(
                matches!(parse_err(text), ParseErrorKind::InvalidNumber(_)),
                "{text}"
            );
        }
    }

    #[test]
    fn duplicate_key_reports_line() {
        let err = Document::parse("seed: 0\nheadless: true\nseed: 1\n", Some("t.yaml".into()))
            .expect_err("duplicate key should fail");
        let LoadError::Parse(err) = err else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::DuplicateKey("seed".into()));
        assert_eq!(err.location.line, 3);
        assert_eq!(err.to_string(), "t.yaml:3: duplicate key 'seed'");
    }

    #[test]
    fn malformed_indentation() {
        assert_eq!(
            parse_err("viewer:\n  eye: [1, 2, 3]\n    lookat: [0, 0, 0]"),
            ParseErrorKind::MalformedIndentation
        );
        assert_eq!(
            parse_err("  headless: true"),
            ParseErrorKind::MalformedIndentation
        );
        assert_eq!(
            parse_err("seed: 0\n  extra: 1"),
            ParseErrorKind::MalformedIndentation
        );
    }

    #[test]
    fn unterminated_tuple() {
        assert_eq!(
            parse_err("viewer:\n  eye: [8, 0., 6."),
            ParseErrorKind::UnterminatedTuple
        );
    }

    #[test]
    fn block_sequences_and_item_groups() {
        let doc = parse("tags:\n  - a\n  - b\nrewards:\n- name: effort\n  weight: 0.1\n- name: spin\n  weight: 0.8\n");
        assert_eq!(
            doc.body.get("tags"),
            Some(&Value::Seq(vec!["a".into(), "b".into()]))
        );
        let rewards = doc.body.get("rewards").and_then(Value::as_seq).expect("seq");
        assert_eq!(rewards.len(), 2);
        assert_eq!(
            rewards[1].child("weight"),
            Some(&Value::Float(0.8))
        );
    }

    #[test]
    fn defaults_variants() {
        let doc = parse(
            "defaults:\n  - base\n  - optional algo: ppo\n  - task: null\n  - _self_\n",
        );
        let defaults = doc.defaults.expect("defaults");
        assert_eq!(
            defaults[0],
            DefaultEntry::Config {
                name: "base".into(),
                line: 2
            }
        );
        assert_eq!(
            defaults[1],
            DefaultEntry::Group {
                group: "algo".into(),
                variant: Some("ppo".into()),
                optional: true,
                line: 3,
            }
        );
        assert_eq!(
            defaults[2],
            DefaultEntry::Group {
                group: "task".into(),
                variant: None,
                optional: false,
                line: 4,
            }
        );
    }

    #[test]
    fn missing_self_is_schema_error() {
        assert!(matches!(
            schema_err("defaults:\n  - task: A\n"),
            SchemaError::MissingSelf { .. }
        ));
    }

    #[test]
    fn duplicate_self_is_schema_error() {
        assert!(matches!(
            schema_err("defaults:\n  - _self_\n  - task: A\n  - _self_\n"),
            SchemaError::DuplicateSelf { .. }
        ));
    }

    #[test]
    fn duplicate_group_is_schema_error() {
        let err = schema_err("defaults:\n  - task: A\n  - task: B\n  - _self_\n");
        let SchemaError::DuplicateGroup { group, origin } = err else {
            panic!("expected duplicate group");
        };
        assert_eq!(group, "task");
        assert_eq!(origin.line, 3);
    }

    #[test]
    fn no_defaults_key() {
        let doc = parse("name: ppo\n");
        assert_eq!(doc.defaults, None);
        assert!(doc.searchpath.is_empty());
    }

    #[test]
    fn non_string_searchpath_is_rejected() {
        assert!(matches!(
            schema_err("searchpath:\n  - 3\n"),
            SchemaError::InvalidSearchPath { .. }
        ));
    }

    #[test]
    fn rendered_body_parses_back_unchanged() {
        let doc = parse(
            r#"
tags: ["sweep, v2", baseline]
"k: v": 1
flow: {"a, b": "[x]", c: 2}
path: "C:\\data"
quote: "say \"hi\""
"#,
        );
        let rendered = doc.body.to_string();
        assert!(rendered.contains(r#"tags: ["sweep, v2", baseline]"#), "{rendered}");
        assert!(rendered.contains(r#""k: v": 1"#), "{rendered}");
        assert_eq!(parse(&rendered).body, doc.body, "{rendered}");
    }

    #[test]
    fn dir_is_parent_of_source() {
        let doc = Document::parse("a: 1", Some(PathBuf::from("a/b/this.yaml")))
            .expect("should parse");
        assert_eq!(doc.dir(), Some(Path::new("a/b")));
    }
}
