//! Defaults-list composition.
//!
//! The composer walks a document's `defaults` list in order, loading each
//! named group document (depth-first: a sub-document's own `defaults` are
//! processed before its keys are merged upward) and folding everything into
//! one tree. `_self_` marks where the declaring document's own keys land:
//! entries before it are overridden by the document, entries after it
//! override the document.
//!
//! ```text
//! defaults:                       tree
//!   - task: Manipulation/RopeDragging  ->  task.*   (cfg/task/Manipulation/RopeDragging.yaml)
//!   - algo: ppo                        ->  algo.*   (cfg/algo/ppo.yaml)
//!   - _self_                           ->  <root>   (this document, wins)
//! ```

mod merge;
mod overrides;

pub use overrides::{apply_overrides, Override};

use crate::document::{DefaultEntry, Document};
use crate::error::{LoadError, ResolutionError, SchemaError};
use crate::searchpath::SearchPath;
use dronecfg_types::{Group, Origin};
use merge::{at_package, merge_groups, record_missing};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One document merged into the composed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDefault {
    /// Group path (`task`, `task/drone`); `None` for the primary document
    /// and bare-name includes.
    pub group: Option<String>,
    /// Variant or document name.
    pub variant: String,
    /// File the document was read from.
    pub path: Option<PathBuf>,
    /// Dotted key path the document was merged under; empty for the root.
    pub package: String,
}

impl fmt::Display for AppliedDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}: {}", self.variant)?,
            None => write!(f, "{}", self.variant)?,
        }
        let package = if self.package.is_empty() {
            "<root>"
        } else {
            &self.package
        };
        write!(f, " -> {package}")?;
        if let Some(path) = &self.path {
            write!(f, " ({})", path.display())?;
        }
        Ok(())
    }
}

/// The merged tree plus the documents it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// Composed tree; deferred references are still unresolved.
    pub tree: Group,
    /// Documents in merge order.
    pub applied: Vec<AppliedDefault>,
    /// Every group path named by a defaults list, including disabled ones.
    pub groups: BTreeSet<String>,
    /// Where each `???` in the tree was declared, by dotted key.
    pub missing: BTreeMap<String, Origin>,
}

/// Composes a primary document and its defaults.
///
/// Holds only the caller's configuration; every call to
/// [`compose`](Self::compose) starts from a fresh state.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    search_path: SearchPath,
    choices: BTreeMap<String, Option<String>>,
}

/// Fold state threaded through the recursive walk.
struct Fold {
    tree: Group,
    applied: Vec<AppliedDefault>,
    groups: BTreeSet<String>,
    missing: BTreeMap<String, Origin>,
    /// Files currently being composed, to reject recursive includes.
    stack: Vec<PathBuf>,
}

/// Where a document sits: its package and the group directory relative
/// groups inside it are resolved against.
struct Placement<'a> {
    package: Vec<String>,
    group_dir: PathBuf,
    label: AppliedDefault,
    search_path: &'a SearchPath,
}

impl Composer {
    /// Creates a composer searching `search_path` before any roots the
    /// documents declare.
    #[must_use]
    pub fn new(search_path: SearchPath) -> Self {
        Self {
            search_path,
            choices: BTreeMap::new(),
        }
    }

    /// Selects `variant` for `group` wherever a defaults list names it.
    /// `None` disables the group.
    #[must_use]
    pub fn with_choice(mut self, group: impl Into<String>, variant: Option<String>) -> Self {
        self.choices.insert(group.into(), variant);
        self
    }

    /// Composes `primary` into one tree.
    ///
    /// # Errors
    ///
    /// [`LoadError`] if a group document cannot be found, read or parsed,
    /// or if merging hits a type mismatch.
    pub fn compose(&self, primary: &Document) -> Result<Composition, LoadError> {
        // The primary document's directory is always the last root searched.
        let mut implicit = SearchPath::new();
        if let Some(dir) = primary.dir() {
            implicit = implicit.with_root(dir);
        }

        let name = primary
            .source
            .as_deref()
            .and_then(Path::file_stem)
            .map_or_else(|| "<input>".to_string(), |s| s.to_string_lossy().into_owned());

        let fold = Fold {
            tree: Group::new(),
            applied: Vec::new(),
            groups: BTreeSet::new(),
            missing: BTreeMap::new(),
            stack: primary.source.iter().cloned().collect(),
        };
        let placement = Placement {
            package: Vec::new(),
            group_dir: PathBuf::new(),
            label: AppliedDefault {
                group: None,
                variant: name,
                path: primary.source.clone(),
                package: String::new(),
            },
            search_path: &self.search_path,
        };

        let fold = self.compose_document(primary, placement, &implicit, fold)?;
        debug!(documents = fold.applied.len(), "Composed defaults");

        Ok(Composition {
            tree: fold.tree,
            applied: fold.applied,
            groups: fold.groups,
            missing: fold.missing,
        })
    }

    fn compose_document(
        &self,
        doc: &Document,
        placement: Placement<'_>,
        implicit: &SearchPath,
        mut fold: Fold,
    ) -> Result<Fold, LoadError> {
        let search_path = placement.search_path.extended(&doc.searchpath, doc)?;

        let Some(entries) = &doc.defaults else {
            return merge_self(doc, &placement, fold);
        };

        for entry in entries {
            fold = match entry {
                DefaultEntry::SelfRef { .. } => merge_self(doc, &placement, fold)?,
                DefaultEntry::Group {
                    group,
                    variant,
                    optional,
                    line,
                } => {
                    let origin = Origin::new(doc.source.clone(), *line);
                    let (group_dir, package) = group_location(group, &placement);
                    let key = group_key(&group_dir);
                    fold.groups.insert(key.clone());

                    let variant = match self.choices.get(&key) {
                        Some(chosen) => chosen.clone(),
                        None => variant.clone(),
                    };
                    let Some(variant) = variant else {
                        debug!(group = %key, "Skipped disabled group");
                        continue;
                    };

                    let lookup = search_path.chained(implicit);
                    let Some(path) = lookup.locate(&group_dir, &variant) else {
                        if *optional {
                            warn!(
                                group = %key,
                                variant = %variant,
                                "Skipped missing optional document"
                            );
                            continue;
                        }
                        return Err(ResolutionError::DocumentNotFound {
                            group: key,
                            variant,
                            searched: lookup.candidates(&group_dir),
                            origin,
                        }
                        .into());
                    };

                    let sub_group_dir = group_dir
                        .join(&variant)
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    let label = AppliedDefault {
                        group: Some(key),
                        variant,
                        path: Some(path.clone()),
                        package: package.join("."),
                    };
                    self.include(
                        &path,
                        origin,
                        label,
                        package,
                        sub_group_dir,
                        &search_path,
                        implicit,
                        fold,
                    )?
                }
                DefaultEntry::Config { name, line } => {
                    let origin = Origin::new(doc.source.clone(), *line);
                    let dir = doc.dir().map(Path::to_path_buf).unwrap_or_default();
                    let local = SearchPath::with_roots([dir.clone()]);
                    let Some(path) = local.locate(Path::new(""), name) else {
                        return Err(ResolutionError::DocumentNotFound {
                            group: String::new(),
                            variant: name.clone(),
                            searched: vec![dir],
                            origin,
                        }
                        .into());
                    };
                    let label = AppliedDefault {
                        group: None,
                        variant: name.clone(),
                        path: Some(path.clone()),
                        package: placement.package.join("."),
                    };
                    self.include(
                        &path,
                        origin,
                        label,
                        placement.package.clone(),
                        placement.group_dir.clone(),
                        &search_path,
                        implicit,
                        fold,
                    )?
                }
            };
        }

        Ok(fold)
    }

    #[allow(clippy::too_many_arguments)]
    fn include(
        &self,
        path: &Path,
        origin: Origin,
        label: AppliedDefault,
        package: Vec<String>,
        group_dir: PathBuf,
        search_path: &SearchPath,
        implicit: &SearchPath,
        mut fold: Fold,
    ) -> Result<Fold, LoadError> {
        if fold.stack.iter().any(|p| p == path) {
            return Err(SchemaError::InvalidDefaultsEntry {
                origin,
                reason: format!("'{}' includes itself", path.display()),
            }
            .into());
        }

        debug!(document = %label, "Loading group document");
        let sub = Document::from_file(path)?;

        fold.stack.push(path.to_path_buf());
        let placement = Placement {
            package,
            group_dir,
            label,
            search_path,
        };
        let mut fold = self.compose_document(&sub, placement, implicit, fold)?;
        fold.stack.pop();
        Ok(fold)
    }
}

/// Merges `doc`'s own body at its package.
fn merge_self(doc: &Document, placement: &Placement<'_>, mut fold: Fold) -> Result<Fold, LoadError> {
    let depth = placement.package.len();
    let origin_at = |full: &[String]| {
        let key = full.get(depth..).map(|k| k.join(".")).unwrap_or_default();
        doc.origin_of(&key)
    };

    let body = at_package(doc.body.clone(), &placement.package);
    record_missing(&body, &mut Vec::new(), &origin_at, &mut fold.missing);
    fold.tree = merge_groups(fold.tree, body, &mut Vec::new(), &origin_at)?;
    debug!(document = %placement.label, keys = doc.body.len(), "Merged document");
    fold.applied.push(placement.label.clone());
    Ok(fold)
}

/// Group directory (relative to a search root) and package for a
/// `group: variant` entry.
///
/// `/group` is absolute; otherwise the group nests under the declaring
/// document's group directory and package.
fn group_location(group: &str, placement: &Placement<'_>) -> (PathBuf, Vec<String>) {
    let (absolute, name) = match group.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, group),
    };
    let segments: Vec<String> = name
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if absolute {
        return (segments.iter().collect(), segments);
    }

    let dir = segments
        .iter()
        .fold(placement.group_dir.clone(), |dir, s| dir.join(s));
    let mut package = placement.package.clone();
    package.extend(segments);
    (dir, package)
}

/// Choice key for a group directory: `/`-joined components.
fn group_key(group_dir: &Path) -> String {
    group_dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
