//! Error taxonomy for the compiler core.
//!
//! Errors are grouped by the phase that raises them. Analysis-phase errors
//! (config loading, model validation) are accumulated so the user sees every
//! problem at once; mutation-phase errors (artifact writing, sync apply) are
//! fail-fast. Warnings never abort generation.

use thiserror::Error;

/// Top-level error for the generation and sync pipelines.
#[derive(Debug, Error)]
pub enum Error {
    /// Declarative source could not be loaded: schema violation, unresolvable
    /// include, unknown element type after alias resolution, pipe-escape
    /// syntax error, missing referenced file.
    #[error(transparent)]
    MalformedConfig(#[from] crate::config::ConfigError),

    /// Model rule violations (naming, reservation, qualifiers, references).
    #[error(transparent)]
    InvalidModel(#[from] crate::validate::ModelError),

    /// A long-operation command is missing its business-logic handler.
    #[error(transparent)]
    MissingHandler(#[from] crate::handlers::MissingHandler),

    /// Artifact emission failed.
    #[error(transparent)]
    Emit(#[from] crate::emit::EmitError),

    /// Platform driver failure or timeout.
    #[error(transparent)]
    Driver(#[from] crate::driver::DriverError),

    /// Snapshot store failure.
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    /// Reverse-path failure that triggered a rollback.
    #[error("sync apply failed: {0}")]
    SyncApplyFailure(String),

    /// A structural delete was blocked by existing references.
    #[error("delete blocked by {} reference(s) to '{name}'", citations.len())]
    ReferenceBlocked {
        name: String,
        citations: Vec<String>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error. `0` is success; the reserved codes
    /// match the published contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedConfig(_) => 2,
            Error::InvalidModel(_) => 3,
            Error::Driver(e) if e.is_timeout() => 4,
            Error::ReferenceBlocked { .. } => 5,
            Error::MissingHandler(_) => 6,
            _ => 1,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
