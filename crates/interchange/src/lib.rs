//! compass-interchange: the construction document model.
//!
//! Typed structs for the JSON document the interpreter consumes, the rule
//! that tells object references apart from literal command arguments, and
//! the structural checks run on load (`from_json_str`, `from_value`).

pub mod deserialize;
pub mod types;

pub use deserialize::{check, from_json_str, from_value, InterchangeError};
pub use types::*;
