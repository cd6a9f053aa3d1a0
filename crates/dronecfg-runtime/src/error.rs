//! Load errors.
//!
//! Every failure aborts the load; there is no partially resolved output.
//!
//! | Type | When |
//! |------|------|
//! | [`ParseError`] | malformed syntax, indentation, duplicate key |
//! | [`SchemaError`] | bad `defaults`/`searchpath`, type-mismatched override |
//! | [`ResolutionError`] | missing document or reference, reference cycle |

use dronecfg_types::{ErrorCode, Origin};
use std::path::PathBuf;
use thiserror::Error;

/// A syntax error at a specific document line.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: {kind}")]
pub struct ParseError {
    pub location: Origin,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(location: Origin, kind: ParseErrorKind) -> Self {
        Self { location, kind }
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("malformed indentation")]
    MalformedIndentation,

    #[error("tab character in indentation")]
    TabIndentation,

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("unterminated sequence literal")]
    UnterminatedTuple,

    #[error("unterminated group literal")]
    UnterminatedFlowGroup,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),

    #[error("expected 'key: value' or '- item', found '{0}'")]
    ExpectedEntry(String),

    #[error("invalid interpolation '{text}': {reason}")]
    InvalidInterpolation { text: String, reason: String },

    #[error("unknown resolver '{0}'")]
    UnknownResolver(String),
}

/// Structural errors in composition directives and overrides.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("{document}: defaults list has no '_self_' entry")]
    MissingSelf { document: Origin },

    #[error("{document}: defaults list has more than one '_self_' entry")]
    DuplicateSelf { document: Origin },

    #[error("{origin}: group '{group}' appears more than once in defaults")]
    DuplicateGroup { group: String, origin: Origin },

    #[error("{origin}: invalid defaults entry: {reason}")]
    InvalidDefaultsEntry { origin: Origin, reason: String },

    #[error("{origin}: invalid search path '{entry}': {reason}")]
    InvalidSearchPath {
        entry: String,
        origin: Origin,
        reason: String,
    },

    #[error("{origin}: cannot merge {incoming} into {existing} at '{key}'")]
    TypeMismatch {
        key: String,
        existing: &'static str,
        incoming: &'static str,
        origin: Origin,
    },

    #[error("invalid override '{text}': {reason}")]
    InvalidOverride { text: String, reason: String },

    #[error("cannot override '{key}': key not found (use +{key}=... to add it)")]
    UnknownOverrideKey { key: String },

    #[error("cannot add '{key}': key already exists (use ++{key}=... to force)")]
    OverrideKeyExists { key: String },
}

/// Errors locating documents or evaluating deferred references.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error(
        "{origin}: document '{}' not found in search path ({})",
        qualified_name(.group, .variant),
        display_paths(.searched)
    )]
    DocumentNotFound {
        group: String,
        variant: String,
        searched: Vec<PathBuf>,
        origin: Origin,
    },

    #[error("{origin}: '{key}' references '{reference}', which does not exist")]
    ReferenceNotFound {
        key: String,
        reference: String,
        origin: Origin,
    },

    #[error("{origin}: reference cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String>, origin: Origin },

    #[error("{origin}: '{key}' interpolates '{reference}' ({kind}) into a string")]
    NotAScalar {
        key: String,
        reference: String,
        kind: &'static str,
        origin: Origin,
    },

    #[error("{origin}: environment variable '{var}' used by '{key}' is not set")]
    EnvNotSet {
        var: String,
        key: String,
        origin: Origin,
    },

    #[error("{origin}: missing mandatory value '{key}'")]
    MissingValue { key: String, origin: Origin },
}

fn qualified_name(group: &str, variant: &str) -> String {
    if group.is_empty() {
        variant.to_string()
    } else {
        format!("{group}/{variant}")
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no roots".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Any failure while loading a configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl LoadError {
    /// Creates a read error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl ErrorCode for ParseError {
    fn code(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::MalformedIndentation => "PARSE_MALFORMED_INDENTATION",
            ParseErrorKind::TabIndentation => "PARSE_TAB_INDENTATION",
            ParseErrorKind::DuplicateKey(_) => "PARSE_DUPLICATE_KEY",
            ParseErrorKind::UnterminatedTuple => "PARSE_UNTERMINATED_TUPLE",
            ParseErrorKind::UnterminatedFlowGroup => "PARSE_UNTERMINATED_GROUP",
            ParseErrorKind::UnterminatedString => "PARSE_UNTERMINATED_STRING",
            ParseErrorKind::InvalidNumber(_) => "PARSE_INVALID_NUMBER",
            ParseErrorKind::ExpectedEntry(_) => "PARSE_EXPECTED_ENTRY",
            ParseErrorKind::InvalidInterpolation { .. } => "PARSE_INVALID_INTERPOLATION",
            ParseErrorKind::UnknownResolver(_) => "PARSE_UNKNOWN_RESOLVER",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

impl ErrorCode for SchemaError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingSelf { .. } => "SCHEMA_MISSING_SELF",
            Self::DuplicateSelf { .. } => "SCHEMA_DUPLICATE_SELF",
            Self::DuplicateGroup { .. } => "SCHEMA_DUPLICATE_GROUP",
            Self::InvalidDefaultsEntry { .. } => "SCHEMA_INVALID_DEFAULTS_ENTRY",
            Self::InvalidSearchPath { .. } => "SCHEMA_INVALID_SEARCH_PATH",
            Self::TypeMismatch { .. } => "SCHEMA_TYPE_MISMATCH",
            Self::InvalidOverride { .. } => "SCHEMA_INVALID_OVERRIDE",
            Self::UnknownOverrideKey { .. } => "SCHEMA_UNKNOWN_OVERRIDE_KEY",
            Self::OverrideKeyExists { .. } => "SCHEMA_OVERRIDE_KEY_EXISTS",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

impl ErrorCode for ResolutionError {
    fn code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound { .. } => "RESOLVE_DOCUMENT_NOT_FOUND",
            Self::ReferenceNotFound { .. } => "RESOLVE_REFERENCE_NOT_FOUND",
            Self::Cycle { .. } => "RESOLVE_CYCLE",
            Self::NotAScalar { .. } => "RESOLVE_NOT_A_SCALAR",
            Self::EnvNotSet { .. } => "RESOLVE_ENV_NOT_SET",
            Self::MissingValue { .. } => "RESOLVE_MISSING_VALUE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::EnvNotSet { .. })
    }
}

impl ErrorCode for LoadError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "LOAD_IO",
            Self::Parse(e) => e.code(),
            Self::Schema(e) => e.code(),
            Self::Resolution(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Parse(e) => e.is_recoverable(),
            Self::Schema(e) => e.is_recoverable(),
            Self::Resolution(e) => e.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronecfg_types::{assert_error_code, assert_error_codes};

    fn at(line: usize) -> Origin {
        Origin::new(Some(PathBuf::from("cfg/train.yaml")), line)
    }

    #[test]
    fn parse_error_display_includes_location() {
        let err = ParseError::new(at(7), ParseErrorKind::DuplicateKey("seed".into()));
        assert_eq!(err.to_string(), "cfg/train.yaml:7: duplicate key 'seed'");
        assert_error_code(&err, "PARSE_");
    }

    #[test]
    fn document_not_found_lists_roots() {
        let err = ResolutionError::DocumentNotFound {
            group: "task".into(),
            variant: "Missing".into(),
            searched: vec![PathBuf::from("a/cfg"), PathBuf::from("a/b")],
            origin: at(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("'task/Missing'"), "{msg}");
        assert!(msg.contains("a/cfg, a/b"), "{msg}");
    }

    #[test]
    fn cycle_display_shows_chain() {
        let err = ResolutionError::Cycle {
            chain: vec!["x".into(), "y".into(), "x".into()],
            origin: at(1),
        };
        assert!(err.to_string().ends_with("reference cycle: x -> y -> x"));
    }

    #[test]
    fn schema_codes() {
        assert_error_codes(
            &[
                SchemaError::MissingSelf { document: at(0) },
                SchemaError::DuplicateSelf { document: at(0) },
                SchemaError::UnknownOverrideKey { key: "x".into() },
                SchemaError::OverrideKeyExists { key: "x".into() },
            ],
            "SCHEMA_",
        );
    }

    #[test]
    fn resolution_codes() {
        assert_error_codes(
            &[
                ResolutionError::MissingValue {
                    key: "a".into(),
                    origin: at(0),
                },
                ResolutionError::Cycle {
                    chain: vec![],
                    origin: at(0),
                },
            ],
            "RESOLVE_",
        );
    }

    #[test]
    fn load_error_delegates_codes() {
        let err: LoadError = ResolutionError::MissingValue {
            key: "a".into(),
            origin: at(0),
        }
        .into();
        assert_eq!(err.code(), "RESOLVE_MISSING_VALUE");
        assert!(!err.is_recoverable());

        let err = LoadError::io(
            "nope.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "LOAD_IO");
        assert!(err.is_recoverable());
    }
}
