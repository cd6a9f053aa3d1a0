//! Rendering results and error codes for the terminal.

use dronecfg_runtime::settings::{OutputFormat, OutputSettings};
use dronecfg_runtime::{LoadError, SchemaError, SettingsError, ValidationError};
use dronecfg_types::{ErrorCode, Group};

/// Renders `tree` in the configured format, newline-terminated.
pub fn render(mut tree: Group, output: &OutputSettings) -> serde_json::Result<String> {
    if output.sort_keys {
        tree.sort_keys();
    }
    match output.format {
        OutputFormat::Yaml => Ok(tree.to_string()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&tree)? + "\n"),
    }
}

/// The [`ErrorCode`] of the first error in the chain that has one.
pub fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<LoadError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SchemaError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SettingsError>() {
            Some(e.code())
        } else {
            cause.downcast_ref::<ValidationError>().map(ErrorCode::code)
        }
    })
}
