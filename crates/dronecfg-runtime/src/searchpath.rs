//! Search roots for group documents.
//!
//! A [`SearchPath`] is an ordered list of directories. `defaults` entries
//! are located by probing `<root>/<group>/<variant>.yaml` (then `.yml`) in
//! each root; the first hit wins.
//!
//! The path is an immutable value threaded through every recursive load:
//! [`SearchPath::extended`] returns a new path with a document's declared
//! roots appended after the ones already present.

use crate::document::{Document, SearchPathDecl};
use crate::error::SchemaError;
use dronecfg_types::Origin;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Extensions probed for a document name, in order.
pub const DOCUMENT_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

const FILE_SCHEME: &str = "file://";

/// Ordered, deduplicated search roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a path from explicit roots (first = highest priority).
    #[must_use]
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        roots.into_iter().fold(Self::new(), |sp, r| sp.with_root(r))
    }

    /// Appends a root unless it is already present.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = normalize(&root.into());
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    /// Returns a copy followed by every root of `fallback` not already present.
    #[must_use]
    pub fn chained(&self, fallback: &SearchPath) -> Self {
        fallback
            .roots
            .iter()
            .fold(self.clone(), |sp, r| sp.with_root(r.clone()))
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Returns a new path with `decls` (declared by `declaring`) appended.
    ///
    /// Entries are resolved relative to the declaring document's directory.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidSearchPath`] for an empty entry or a scheme
    /// other than `file://`.
    pub fn extended(
        &self,
        decls: &[SearchPathDecl],
        declaring: &Document,
    ) -> Result<Self, SchemaError> {
        let mut next = self.clone();
        for decl in decls {
            let origin = Origin::new(declaring.source.clone(), decl.line);
            let root = resolve_uri(&decl.entry, declaring.dir(), &origin)?;
            debug!(entry = %decl.entry, root = %root.display(), "Added search root");
            next = next.with_root(root);
        }
        Ok(next)
    }

    /// Finds `<root>/<group_dir>/<name>.<ext>` in the first root that has it.
    ///
    /// A root that does not exist is skipped.
    #[must_use]
    pub fn locate(&self, group_dir: &Path, name: &str) -> Option<PathBuf> {
        for dir in self.candidates(group_dir) {
            for ext in DOCUMENT_EXTENSIONS {
                let path = dir.join(format!("{name}.{ext}"));
                if path.is_file() {
                    debug!(path = %path.display(), "Located document");
                    return Some(path);
                }
                debug!(path = %path.display(), "Probed document");
            }
        }
        None
    }

    /// Directories searched for a group, in priority order.
    #[must_use]
    pub fn candidates(&self, group_dir: &Path) -> Vec<PathBuf> {
        self.roots.iter().map(|r| normalize(&r.join(group_dir))).collect()
    }
}

/// Resolves a `searchpath` entry to a directory.
///
/// `file://<path>` and bare paths are accepted; relative paths are joined
/// onto `base` (the declaring document's directory).
///
/// # Errors
///
/// [`SchemaError::InvalidSearchPath`] for other URI schemes or an empty path.
pub fn resolve_uri(entry: &str, base: Option<&Path>, origin: &Origin) -> Result<PathBuf, SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidSearchPath {
        entry: entry.to_string(),
        origin: origin.clone(),
        reason: reason.to_string(),
    };

    let path = match entry.strip_prefix(FILE_SCHEME) {
        Some(rest) => rest,
        None if entry.contains("://") => return Err(invalid("only file:// roots are supported")),
        None => entry,
    };
    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }

    let path = Path::new(path);
    let joined = match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    };
    Ok(normalize(&joined))
}

/// Lexically removes `.` and resolves `..` where a parent is known.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}
