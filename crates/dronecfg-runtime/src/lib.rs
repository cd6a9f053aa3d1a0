//! dronecfg runtime: loading layered training configurations.
//!
//! A primary document (`scripts/train.yaml`) names the group documents it
//! is built from in a `defaults` list, declares where to find them in
//! `searchpath`, and wires values together with `${...}` references. This
//! crate turns that into one resolved tree.
//!
//! # Pipeline
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ document   │──►│ searchpath   │──►│ compose     │──►│ interpolate │
//! │ parse text │   │ locate group │   │ fold        │   │ ${...}      │
//! │ + lines    │   │ documents    │   │ defaults,   │   │ memoised,   │
//! │            │   │              │   │ overrides   │   │ cycle-safe  │
//! └────────────┘   └──────────────┘   └─────────────┘   └─────────────┘
//!                                                              │
//!                                                              ▼
//!                                                      run::RunConfig
//! ```
//!
//! # Modules
//!
//! ## [`document`] - Parsing
//!
//! - [`Document`](document::Document): body tree plus `defaults`/`searchpath`
//!
//! ## [`searchpath`] - Locating group documents
//!
//! - [`SearchPath`](searchpath::SearchPath): ordered roots, probed `.yaml` then `.yml`
//!
//! ## [`compose`] - Defaults and overrides
//!
//! - [`Composer`](compose::Composer): depth-first defaults fold
//! - [`Override`](compose::Override): `key=value`, `+key=value`, `++key=value`, `~key`
//!
//! ## [`interpolate`] - Deferred references
//!
//! - [`Resolver`](interpolate::Resolver): `${path}`, `${oc.select:...}`, `${oc.env:...}`
//!
//! ## [`loader`] - Everything above in one call
//!
//! - [`ConfigLoader`](loader::ConfigLoader) → [`ResolvedConfig`](loader::ResolvedConfig)
//!
//! ## [`settings`] - The loader's own settings
//!
//! - [`SettingsLoader`](settings::SettingsLoader): global → project → `DRONECFG_*`
//!
//! # Example
//!
//! ```
//! use dronecfg_runtime::document::Document;
//! use dronecfg_runtime::interpolate::resolve;
//!
//! let doc = Document::parse("task:\n  name: Hover\nrun_name: ${task.name}-ppo\n", None)?;
//! let tree = resolve(&doc.body)?;
//! assert_eq!(tree.lookup("run_name").and_then(|v| v.as_str()), Some("Hover-ppo"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compose;
pub mod document;
pub mod error;
pub mod interpolate;
pub mod loader;
pub mod run;
pub mod searchpath;
pub mod settings;

// Re-exports for convenience
pub use compose::{AppliedDefault, Composer, Composition, Override};
pub use document::Document;
pub use error::{LoadError, ParseError, ParseErrorKind, ResolutionError, SchemaError};
pub use loader::{ConfigLoader, ResolvedConfig};
pub use run::{RunConfig, ValidationError};
pub use searchpath::SearchPath;
pub use settings::{Settings, SettingsError, SettingsLoader};
