//! Settings loader with layered merging.
//!
//! # Load Order
//!
//! 1. Default values
//! 2. Global settings (`~/.dronecfg/config.toml`)
//! 3. Project settings (`<project>/.dronecfg/config.toml`)
//! 4. Environment variables (`DRONECFG_*`)
//!
//! Each layer overrides the previous.

use super::{default_settings_path, OutputFormat, Settings, SettingsError, SETTINGS_DIR, SETTINGS_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Separator between entries of `DRONECFG_SEARCH_PATH`.
const SEARCH_PATH_SEPARATOR: char = ':';

macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| SettingsError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Settings loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use dronecfg_runtime::settings::SettingsLoader;
///
/// let settings = SettingsLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars()
///     .load()?;
/// # Ok::<(), dronecfg_runtime::settings::SettingsError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    /// Global settings file (defaults to `~/.dronecfg/config.toml`).
    global_path: Option<PathBuf>,

    project_root: Option<PathBuf>,

    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl SettingsLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global settings file.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Sets the project root; settings are read from
    /// `<project_root>/.dronecfg/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variables (deterministic tests).
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges settings from all layers.
    ///
    /// # Errors
    ///
    /// [`SettingsError`] if a settings file exists but cannot be read or
    /// parsed, or an environment variable holds an invalid value. Missing
    /// files are ignored.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::default();

        if !self.skip_global {
            let global_path = self
                .global_path
                .clone()
                .unwrap_or_else(default_settings_path);

            if let Some(global) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global settings");
                settings.merge(&global);
            }
        }

        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_path = project_root.join(SETTINGS_DIR).join(SETTINGS_FILE);

                if let Some(project) = load_file(&project_path)? {
                    debug!(
                        path = %project_path.display(),
                        project = %project_root.display(),
                        "Loaded project settings"
                    );
                    settings.merge(&project);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut settings)?;
        }

        Ok(settings)
    }
}

/// Loads a settings file, returning `None` if it doesn't exist.
///
/// Relative paths inside are rebased onto the directory that holds the
/// file's `.dronecfg/` folder.
fn load_file(path: &Path) -> Result<Option<Settings>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::read_file(path, e))?;
    let mut settings =
        Settings::from_toml(&content).map_err(|e| SettingsError::parse_toml(path, e))?;

    if let Some(base) = path.parent().and_then(Path::parent) {
        settings.rebase(base);
    }
    Ok(Some(settings))
}

fn apply_env_vars(settings: &mut Settings) -> Result<(), SettingsError> {
    if let Ok(val) = std::env::var("DRONECFG_CONFIG_DIR") {
        settings.config_dir = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("DRONECFG_SEARCH_PATH") {
        let roots: Vec<PathBuf> = val
            .split(SEARCH_PATH_SEPARATOR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .collect();
        settings.merge(&Settings {
            search_roots: roots,
            ..Settings::default()
        });
    }

    if let Ok(val) = std::env::var("DRONECFG_FORMAT") {
        settings.output.format = val
            .parse::<OutputFormat>()
            .map_err(|message| SettingsError::invalid_env_var("DRONECFG_FORMAT", message))?;
    }

    parse_env_bool!(settings.output.sort_keys, "DRONECFG_SORT_KEYS");

    Ok(())
}

/// Parses a boolean: `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(dir: &Path, content: &str) -> PathBuf {
        let settings_dir = dir.join(SETTINGS_DIR);
        std::fs::create_dir_all(&settings_dir).expect("should create settings dir");
        let path = settings_dir.join(SETTINGS_FILE);
        std::fs::write(&path, content).expect("should write settings file");
        path
    }

    #[test]
    fn load_defaults_only() {
        let settings = SettingsLoader::new()
            .skip_global_config()
            .skip_project_config()
            .skip_env_vars()
            .load()
            .expect("should load defaults");

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_global_settings() {
        let home = TempDir::new().expect("should create temp dir");
        let path = write_settings(
            home.path(),
            r#"
config_dir = "omnidrones/scripts"

[output]
format = "json"
"#,
        );

        let settings = SettingsLoader::new()
            .with_global_config(&path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .expect("should load global settings");

        assert_eq!(
            settings.config_dir,
            Some(home.path().join("omnidrones/scripts"))
        );
        assert_eq!(settings.output.format, OutputFormat::Json);
    }

    #[test]
    fn project_overrides_global() {
        let home = TempDir::new().expect("should create temp dir");
        let project = TempDir::new().expect("should create temp dir");

        let global_path = write_settings(
            home.path(),
            r#"
config_dir = "/global/scripts"
search_roots = ["/global/cfg"]
"#,
        );
        write_settings(
            project.path(),
            r#"
config_dir = "scripts"
search_roots = ["cfg"]

[output]
sort_keys = true
"#,
        );

        let settings = SettingsLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project.path())
            .skip_env_vars()
            .load()
            .expect("should load layered settings");

        assert_eq!(settings.config_dir, Some(project.path().join("scripts")));
        assert_eq!(
            settings.search_roots,
            vec![project.path().join("cfg"), PathBuf::from("/global/cfg")]
        );
        assert!(settings.output.sort_keys);
        assert_eq!(settings.output.format, OutputFormat::Yaml);
    }

    #[test]
    fn missing_files_ok() {
        let settings = SettingsLoader::new()
            .with_global_config("/nonexistent/.dronecfg/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .expect("missing files should be ignored");

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let project = TempDir::new().expect("should create temp dir");
        write_settings(project.path(), "search_roots = \"not a list\"\n");

        let err = SettingsLoader::new()
            .skip_global_config()
            .with_project_root(project.path())
            .skip_env_vars()
            .load()
            .expect_err("wrong type should fail");

        assert!(matches!(err, SettingsError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn env_var_override() {
        // Only this test reads DRONECFG_* variables; the others skip them.
        std::env::set_var("DRONECFG_CONFIG_DIR", "/env/scripts");
        std::env::set_var("DRONECFG_SEARCH_PATH", "/env/a::/env/b");
        std::env::set_var("DRONECFG_FORMAT", "json");
        std::env::set_var("DRONECFG_SORT_KEYS", "yes");

        let result = SettingsLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::set_var("DRONECFG_FORMAT", "xml");
        let invalid = SettingsLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::remove_var("DRONECFG_CONFIG_DIR");
        std::env::remove_var("DRONECFG_SEARCH_PATH");
        std::env::remove_var("DRONECFG_FORMAT");
        std::env::remove_var("DRONECFG_SORT_KEYS");

        let settings = result.expect("should load env settings");
        assert_eq!(settings.config_dir, Some(PathBuf::from("/env/scripts")));
        assert_eq!(
            settings.search_roots,
            vec![PathBuf::from("/env/a"), PathBuf::from("/env/b")]
        );
        assert_eq!(settings.output.format, OutputFormat::Json);
        assert!(settings.output.sort_keys);

        let err = invalid.expect_err("xml should be rejected");
        assert!(matches!(err, SettingsError::InvalidEnvVar { ref name, .. } if name == "DRONECFG_FORMAT"));
    }
}
