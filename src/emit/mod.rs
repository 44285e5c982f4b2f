//! The forward path's back half: id allocation, element preparation,
//! module assembly, finalization, and artifact writing.

mod allocator;
mod finalize;
mod modules;
mod prepare;
mod writer;

pub use allocator::{DEFAULT_INCREMENT, IdAllocator, TABLE_COLUMN_INCREMENT, increment_for};
pub use finalize::{IdentityFinalizer, ModuleFinalizer, ModuleKind};
pub use modules::{
    REGION_COMMANDS, REGION_DOCUMENTATION, REGION_ELEMENT_EVENTS, REGION_FORM_EVENTS,
    REGION_LONG_OPERATIONS, REGION_UTILITIES, assemble_form_module, assemble_object_module,
};
pub use prepare::{EmitNode, PreparedForm, collect_ids, prepare_form};
pub use writer::{
    ArtifactWriter, MODULE_EXTENSION, WrittenArtifacts, platform_whitespace,
    render_form_metadata, render_form_xml, render_root_descriptor,
};

use std::path::PathBuf;
use thiserror::Error;

/// Artifact emission failures (mutation phase: fail fast).
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("form {form:?}: {message}")]
    Form { form: String, message: String },
}
