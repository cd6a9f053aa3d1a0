//! Settings types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Document extension used when a config is named rather than given as a path.
const NAMED_CONFIG_EXTENSION: &str = "yaml";

/// Loader settings.
///
/// # Example
///
/// ```
/// use dronecfg_runtime::settings::{OutputFormat, Settings};
///
/// let settings = Settings::from_toml("search_roots = [\"cfg\"]\n[output]\nformat = \"json\"\n")
///     .expect("valid settings");
/// assert_eq!(settings.output.format, OutputFormat::Json);
/// assert_eq!(settings.search_roots.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding named configs (`compose train` → `<config_dir>/train.yaml`).
    pub config_dir: Option<PathBuf>,

    /// Extra search roots, probed before any root a document declares.
    pub search_roots: Vec<PathBuf>,

    pub output: OutputSettings,
}

/// How resolved configs are printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,

    /// Sort group keys alphabetically instead of keeping document order.
    pub sort_keys: bool,
}

/// Output format for rendered trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(format!("expected yaml or json, got '{other}'")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => f.write_str("yaml"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl Settings {
    /// Parses settings from TOML.
    ///
    /// # Errors
    ///
    /// The TOML error if the text is malformed or a field has the wrong type.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Merges another layer into this one.
    ///
    /// `config_dir` and `output.format` are taken from `other` when set
    /// there; `other`'s search roots come before the ones already present;
    /// `sort_keys` is enabled if either layer enables it.
    pub fn merge(&mut self, other: &Settings) {
        if other.config_dir.is_some() {
            self.config_dir.clone_from(&other.config_dir);
        }

        if !other.search_roots.is_empty() {
            let mut roots = other.search_roots.clone();
            for root in self.search_roots.drain(..) {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
            self.search_roots = roots;
        }

        if other.output.format != OutputFormat::default() {
            self.output.format = other.output.format;
        }
        self.output.sort_keys |= other.output.sort_keys;
    }

    /// Makes relative paths absolute against `base`.
    pub fn rebase(&mut self, base: &Path) {
        if let Some(dir) = self.config_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        for root in &mut self.search_roots {
            if root.is_relative() {
                *root = base.join(&*root);
            }
        }
    }

    /// Maps a `<config>` argument to a document path.
    ///
    /// An existing file, or anything that looks like a path (has an
    /// extension or a separator), is used as given. A bare name is looked up
    /// as `<config_dir>/<name>.yaml` when a config dir is set.
    #[must_use]
    pub fn config_path(&self, arg: &str) -> PathBuf {
        let given = PathBuf::from(arg);
        if given.is_file() || given.extension().is_some() || given.components().count() > 1 {
            return given;
        }
        match &self.config_dir {
            Some(dir) => dir.join(format!("{arg}.{NAMED_CONFIG_EXTENSION}")),
            None => given,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.config_dir, None);
        assert!(settings.search_roots.is_empty());
        assert_eq!(settings.output.format, OutputFormat::Yaml);
        assert!(!settings.output.sort_keys);
    }

    #[test]
    fn from_toml_partial() {
        let settings = Settings::from_toml("[output]\nsort_keys = true\n").expect("should parse");
        assert!(settings.output.sort_keys);
        assert_eq!(settings.output.format, OutputFormat::Yaml);
        assert_eq!(settings.config_dir, None);
    }

    #[test]
    fn from_toml_rejects_unknown_format() {
        assert!(Settings::from_toml("[output]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn merge_layers() {
        let mut base = Settings {
            config_dir: Some(PathBuf::from("/global/scripts")),
            search_roots: vec![PathBuf::from("/global/cfg"), PathBuf::from("/shared")],
            output: OutputSettings {
                format: OutputFormat::Json,
                sort_keys: false,
            },
        };
        let overlay = Settings {
            config_dir: None,
            search_roots: vec![PathBuf::from("/project/cfg"), PathBuf::from("/shared")],
            output: OutputSettings {
                format: OutputFormat::Yaml,
                sort_keys: true,
            },
        };

        base.merge(&overlay);

        assert_eq!(base.config_dir, Some(PathBuf::from("/global/scripts")));
        assert_eq!(
            base.search_roots,
            vec![
                PathBuf::from("/project/cfg"),
                PathBuf::from("/shared"),
                PathBuf::from("/global/cfg"),
            ]
        );
        // yaml is the default, so it does not override json
        assert_eq!(base.output.format, OutputFormat::Json);
        assert!(base.output.sort_keys);
    }

    #[test]
    fn rebase_only_touches_relative_paths() {
        let mut settings = Settings {
            config_dir: Some(PathBuf::from("scripts")),
            search_roots: vec![PathBuf::from("cfg"), PathBuf::from("/abs")],
            ..Settings::default()
        };
        settings.rebase(Path::new("/proj"));
        assert_eq!(settings.config_dir, Some(PathBuf::from("/proj/scripts")));
        assert_eq!(
            settings.search_roots,
            vec![PathBuf::from("/proj/cfg"), PathBuf::from("/abs")]
        );
    }

    #[test]
    fn config_path_lookup() {
        let settings = Settings {
            config_dir: Some(PathBuf::from("/proj/scripts")),
            ..Settings::default()
        };
        assert_eq!(
            settings.config_path("train"),
            PathBuf::from("/proj/scripts/train.yaml")
        );
        assert_eq!(
            settings.config_path("other/train.yaml"),
            PathBuf::from("other/train.yaml")
        );
        assert_eq!(
            Settings::default().config_path("train"),
            PathBuf::from("train")
        );
    }

    #[test]
    fn format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("yml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert!("toml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
