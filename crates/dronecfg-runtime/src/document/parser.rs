//! Indentation-structured block parser.
//!
//! Turns preprocessed [`Line`]s into a [`Group`]. Inline values are handed
//! to the scalar grammar in [`super::scalar`].

use super::lines::Line;
use super::scalar::{parse_value, split_key};
use crate::error::{ParseError, ParseErrorKind};
use dronecfg_types::{Group, Origin, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub(crate) struct BlockParser {
    lines: Vec<Line>,
    pos: usize,
    source: Option<PathBuf>,
    /// Line of every key path, e.g. `"wandb.group" -> 14`.
    key_lines: BTreeMap<String, usize>,
}

impl BlockParser {
    pub fn new(lines: Vec<Line>, source: Option<PathBuf>) -> Self {
        Self {
            lines,
            pos: 0,
            source,
            key_lines: BTreeMap::new(),
        }
    }

    /// Parses the whole input as one top-level group.
    pub fn parse_root(mut self) -> Result<(Group, BTreeMap<String, usize>), ParseError> {
        let Some(first) = self.lines.first() else {
            return Ok((Group::new(), self.key_lines));
        };

        if first.indent != 0 {
            return Err(self.error(first.number, ParseErrorKind::MalformedIndentation));
        }
        if first.is_seq_item() {
            return Err(self.error(
                first.number,
                ParseErrorKind::ExpectedEntry(first.text.clone()),
            ));
        }

        let root = self.parse_mapping(0, &[])?;

        // Anything left over is dedented below the root or otherwise stray.
        if let Some(line) = self.lines.get(self.pos) {
            return Err(self.error(line.number, ParseErrorKind::MalformedIndentation));
        }

        Ok((root, self.key_lines))
    }

    fn parse_mapping(&mut self, indent: usize, path: &[String]) -> Result<Group, ParseError> {
        let mut group = Group::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(self.error(line.number, ParseErrorKind::MalformedIndentation));
            }
            if line.is_seq_item() {
                return Err(self.error(
                    line.number,
                    ParseErrorKind::ExpectedEntry(line.text.clone()),
                ));
            }

            let number = line.number;
            let (key, rest) = split_key(&line.text)
                .map(|(k, r)| (k, r.to_string()))
                .ok_or_else(|| {
                    self.error(number, ParseErrorKind::ExpectedEntry(line.text.clone()))
                })?;
            self.pos += 1;

            if group.contains_key(&key) {
                return Err(self.error(number, ParseErrorKind::DuplicateKey(key)));
            }

            let child_path = child(path, &key);
            self.key_lines.insert(child_path.join("."), number);

            let value = if rest.is_empty() {
                self.parse_nested(indent, &child_path, true)?
            } else {
                self.parse_inline(&rest, number)?
            };
            group.insert(key, value);
        }

        Ok(group)
    }

    /// Parses the block under a `key:` or `-` with no inline value.
    ///
    /// `allow_compact` permits a sequence at the parent's own indentation
    /// (`defaults:` followed by `- x` in the same column).
    fn parse_nested(
        &mut self,
        parent_indent: usize,
        path: &[String],
        allow_compact: bool,
    ) -> Result<Value, ParseError> {
        let Some(next) = self.lines.get(self.pos) else {
            return Ok(Value::Null);
        };

        if next.indent > parent_indent {
            let indent = next.indent;
            return if next.is_seq_item() {
                self.parse_sequence(indent, path)
            } else {
                self.parse_mapping(indent, path).map(Value::Group)
            };
        }

        if allow_compact && next.indent == parent_indent && next.is_seq_item() {
            return self.parse_sequence(parent_indent, path);
        }

        Ok(Value::Null)
    }

    fn parse_sequence(&mut self, indent: usize, path: &[String]) -> Result<Value, ParseError> {
        let mut items = Vec::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent || (line.indent == indent && !line.is_seq_item()) {
                break;
            }
            if line.indent > indent {
                return Err(self.error(line.number, ParseErrorKind::MalformedIndentation));
            }

            let number = line.number;
            let item_path = child(path, &items.len().to_string());
            let rest = line.text[1..].trim_start().to_string();
            let offset = line.text.len() - rest.len();
            self.key_lines.insert(item_path.join("."), number);

            let value = if rest.is_empty() {
                self.pos += 1;
                self.parse_nested(indent, &item_path, false)?
            } else if opens_inline_group(&rest) {
                // `- key: value` starts a group whose keys align with `key`.
                let item_indent = indent + offset;
                if let Some(current) = self.lines.get_mut(self.pos) {
                    current.indent = item_indent;
                    current.text = rest;
                }
                Value::Group(self.parse_mapping(item_indent, &item_path)?)
            } else {
                self.pos += 1;
                self.parse_inline(&rest, number)?
            };

            items.push(value);
        }

        Ok(Value::Seq(items))
    }

    fn parse_inline(&self, text: &str, number: usize) -> Result<Value, ParseError> {
        let origin = self.origin(number);
        parse_value(text, &origin).map_err(|kind| ParseError::new(origin, kind))
    }

    fn origin(&self, line: usize) -> Origin {
        Origin::new(self.source.clone(), line)
    }

    fn error(&self, line: usize, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.origin(line), kind)
    }
}

fn opens_inline_group(text: &str) -> bool {
    !text.starts_with(['"', '\'', '[', '{']) && split_key(text).is_some()
}

fn child(path: &[String], key: &str) -> Vec<String> {
    let mut p = path.to_vec();
    p.push(key.to_string());
    p
}
