//! Unified error interface for dronecfg.
//!
//! Every error type produced while loading a configuration document
//! implements [`ErrorCode`], so front ends can report a stable,
//! machine-readable code next to the human message.
//!
//! # Example
//!
//! ```
//! use dronecfg_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     NotFound(String),
//!     Locked,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NotFound(_) => "LOOKUP_NOT_FOUND",
//!             Self::Locked => "LOOKUP_LOCKED",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Locked)
//!     }
//! }
//!
//! let err = LookupError::Locked;
//! assert_eq!(err.code(), "LOOKUP_LOCKED");
//! assert!(err.is_recoverable());
//! ```

/// Machine-readable error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"PARSE_DUPLICATE_KEY"`
/// - **Namespace-prefixed**: `PARSE_`, `RESOLVE_`, `SCHEMA_`, `SETTINGS_`, ...
/// - **Stable**: codes are part of the CLI's output contract
///
/// # Recoverability
///
/// Configuration loading is deterministic: retrying with the same inputs
/// yields the same error. Only conditions the user can fix outside the
/// document set (an unreadable file, a missing environment variable)
/// report `true`.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error may go away without editing any document.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code follows dronecfg conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use dronecfg_types::{assert_error_code, ErrorCode};
///
/// struct Timeout;
///
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "IO_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "IO_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates multiple error codes at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
