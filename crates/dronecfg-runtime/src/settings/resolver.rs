//! Final settings layer applied by the caller.
//!
//! ```text
//! SettingsLoader.load()  →  Settings (files + env)
//!                               │
//!                               ▼
//!                      SettingsResolver.apply()
//!                               │
//!                               ▼
//!                          Settings (final)
//! ```

use super::Settings;

/// Applies caller-side overrides (command-line flags) to loaded settings.
///
/// Implementations should only touch the fields they were given a value
/// for.
pub trait SettingsResolver {
    fn apply(&self, settings: &mut Settings);
}

/// Resolver that makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl SettingsResolver for NoOpResolver {
    fn apply(&self, _settings: &mut Settings) {}
}
