//! End-to-end loading: parse, compose, override, resolve.
//!
//! ```text
//! train.yaml ──► Document ──► Composer ──► overrides ──► Resolver ──► ResolvedConfig
//!                  │             │  ▲
//!                  │             │  └── group=variant choices
//!                  └ searchpath ─┘
//! ```

use crate::compose::{apply_overrides, AppliedDefault, Composer, Composition, Override};
use crate::document::Document;
use crate::error::{LoadError, SchemaError};
use crate::interpolate::Resolver;
use crate::run::{RunConfig, ValidationError};
use crate::searchpath::SearchPath;
use dronecfg_types::{Group, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use dronecfg_runtime::loader::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_search_root("cfg")
///     .with_override_args(["task=Hover", "seed=7"])?
///     .load("scripts/train.yaml")?;
///
/// let run = config.run_config()?;
/// assert_eq!(run.seed, 7);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Roots searched before any the documents declare.
    search_roots: Vec<PathBuf>,

    /// Command-line overrides, in the order given.
    overrides: Vec<Override>,
}

/// A composed and fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Resolved tree: no deferred or missing values remain.
    pub tree: Group,
    /// Documents merged into the tree, in merge order.
    pub applied: Vec<AppliedDefault>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search root, probed after the roots added before it.
    #[must_use]
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_roots.push(root.into());
        self
    }

    #[must_use]
    pub fn with_search_roots<I, P>(self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        roots.into_iter().fold(self, Self::with_search_root)
    }

    #[must_use]
    pub fn with_override(mut self, ov: Override) -> Self {
        self.overrides.push(ov);
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = Override>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Parses and adds command-line override arguments.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidOverride`] for the first argument that does not
    /// parse.
    pub fn with_override_args<I, S>(self, args: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let overrides = args
            .into_iter()
            .map(|a| Override::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_overrides(overrides))
    }

    /// Composes the document at `path` and applies overrides, without
    /// resolving deferred references.
    ///
    /// Plain `key=value` overrides whose key names a defaults group select
    /// that group's variant; the rest are applied to the composed tree in
    /// order.
    ///
    /// # Errors
    ///
    /// [`LoadError`] for unreadable or malformed documents, schema
    /// violations, missing group documents and failed overrides.
    pub fn compose(&self, path: impl AsRef<Path>) -> Result<Composition, LoadError> {
        let path = path.as_ref();
        let primary = Document::from_file(path)?;

        let composer = self
            .overrides
            .iter()
            .filter_map(Override::as_choice)
            .fold(
                Composer::new(SearchPath::with_roots(&self.search_roots)),
                |composer, (group, variant)| composer.with_choice(group, variant),
            );
        let mut composition = composer.compose(&primary)?;

        let rest: Vec<Override> = self
            .overrides
            .iter()
            .filter(|ov| {
                ov.as_choice()
                    .map_or(true, |(group, _)| !composition.groups.contains(&group))
            })
            .cloned()
            .collect();
        debug!(
            choices = self.overrides.len() - rest.len(),
            overrides = rest.len(),
            "Split command-line overrides"
        );
        composition.tree = apply_overrides(composition.tree, &rest)?;

        Ok(composition)
    }

    /// Composes and resolves the document at `path`.
    ///
    /// # Errors
    ///
    /// Everything [`compose`](Self::compose) reports, plus resolution
    /// failures (missing references, cycles, unset environment variables,
    /// leftover `???` values).
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ResolvedConfig, LoadError> {
        let path = path.as_ref();
        let composition = self.compose(path)?;
        let tree = Resolver::new(&composition.tree)
            .with_missing_origins(&composition.missing)
            .resolve_all()?;

        info!(
            config = %path.display(),
            documents = composition.applied.len(),
            keys = tree.len(),
            "Loaded configuration"
        );

        Ok(ResolvedConfig {
            tree,
            applied: composition.applied,
        })
    }
}

impl ResolvedConfig {
    /// Value at a dotted path.
    #[must_use]
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        self.tree.lookup(dotted)
    }

    /// Typed, validated run parameters.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if a run parameter has the wrong type or an
    /// out-of-range value.
    pub fn run_config(&self) -> Result<RunConfig, ValidationError> {
        let run = RunConfig::from_tree(&self.tree)?;
        run.validate()?;
        Ok(run)
    }
}
