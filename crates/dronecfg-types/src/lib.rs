//! Core types for dronecfg.
//!
//! This crate holds the data model shared by the loader and its front ends:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  dronecfg-types   : Value, Group, Template, ErrorCode ◄── HERE
//! ├──────────────────────────────────────────────────────────┤
//! │  dronecfg-runtime : parse → search path → compose → resolve
//! ├──────────────────────────────────────────────────────────┤
//! │  dronecfg-cli     : `dronecfg` binary
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use dronecfg_types::{Group, Value};
//!
//! let mut wandb = Group::new();
//! wandb.insert("project", Value::from("omnidrones"));
//!
//! let mut root = Group::new();
//! root.insert("wandb", Value::Group(wandb));
//!
//! assert_eq!(root.lookup("wandb.project").and_then(Value::as_str), Some("omnidrones"));
//! assert_eq!(root.to_string(), "wandb:\n  project: omnidrones\n");
//! ```

#![forbid(unsafe_code)]

mod error;
mod render;
mod template;
mod value;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use template::{Expr, Origin, Part, RefPath, Template, ENV_RESOLVER, SELECT_RESOLVER};
pub use value::{Deferred, Group, Value, MISSING_MARKER};
