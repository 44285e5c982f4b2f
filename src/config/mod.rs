//! Declarative source loading (the forward path's front door).
//!
//! ```text
//! YAML text ──> schema check ──> alias normalization ──> Processor
//!                  │                    │
//!                  └── accumulated      └── element schema table
//!                      issues               (config::schema)
//! ```

mod aliases;
mod elements;
mod loader;
mod schema;

pub use aliases::{FORM_ATTRIBUTE_TYPES, Resolved, resolve_element_type, resolve_form_attribute_type};
pub use elements::ElementParser;
pub use loader::{LoadedConfig, load_config, load_config_str};
pub use schema::{
    COLUMN_GROUP_ALLOWED_CHILDREN, ChildrenKey, DefaultValue, ElementSchema, PropSpec, schema_for,
};

pub(crate) use loader::strip_bom;

use std::path::PathBuf;
use thiserror::Error;

/// Declarative-source failures. Schema problems are accumulated so the
/// author sees every issue in one run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML parse error: {message}")]
    Parse { message: String },

    #[error("configuration is invalid:\n{}", issues.iter().map(|i| format!("  - {i}")).collect::<Vec<_>>().join("\n"))]
    Schema { issues: Vec<String> },
}
