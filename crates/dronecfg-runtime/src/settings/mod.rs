//! The loader's own settings.
//!
//! Settings decide where documents are looked up and how results are
//! printed. They never appear in a composed tree.
//!
//! # Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ CLI flags (SettingsResolver)            │  highest
//! ├─────────────────────────────────────────┤
//! │ DRONECFG_* environment variables        │
//! ├─────────────────────────────────────────┤
//! │ <project>/.dronecfg/config.toml         │
//! ├─────────────────────────────────────────┤
//! │ ~/.dronecfg/config.toml                 │
//! ├─────────────────────────────────────────┤
//! │ Settings::default()                     │  lowest
//! └─────────────────────────────────────────┘
//! ```
//!
//! Relative paths in a settings file are taken relative to the directory
//! that holds its `.dronecfg/` folder (the home directory for the global
//! file, the project root for the project file).

mod error;
mod loader;
mod resolver;
mod types;

pub use error::SettingsError;
pub use loader::SettingsLoader;
pub use resolver::{NoOpResolver, SettingsResolver};
pub use types::{OutputFormat, OutputSettings, Settings};

use std::path::PathBuf;

/// Directory name holding settings, both under the home directory and in a
/// project root.
pub const SETTINGS_DIR: &str = ".dronecfg";

/// Settings file name inside [`SETTINGS_DIR`].
pub const SETTINGS_FILE: &str = "config.toml";

/// `~/.dronecfg`, or `./.dronecfg` when the home directory is unknown.
#[must_use]
pub fn default_settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_DIR)
}

/// `~/.dronecfg/config.toml`.
#[must_use]
pub fn default_settings_path() -> PathBuf {
    default_settings_dir().join(SETTINGS_FILE)
}
