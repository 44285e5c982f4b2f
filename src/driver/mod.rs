//! Platform driver contract.
//!
//! The proprietary compiler binary is an external collaborator: the core
//! only calls through this trait. Calls may block for minutes, so every
//! entry point takes a cancellation token that the coordinator cancels at
//! its deadline; an implementation is expected to poll it.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default wall-clock budget for a driver call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("platform driver failed: {0}")]
    Failed(String),

    #[error("platform driver timed out after {0:?}")]
    Timeout(Duration),

    #[error("platform driver cancelled")]
    Cancelled,

    #[error("platform driver unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }
}

/// Options for a compile call.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub validate: bool,
    pub timeout: Duration,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            validate: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Options for compiling against a host configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationOptions {
    pub ignore_validation_errors: bool,
    /// Metadata objects the configuration must provide before the artifact
    /// can be assembled inside it.
    pub metadata_requirements: Vec<String>,
}

/// Options for a decompile call.
#[derive(Debug, Clone)]
pub struct DecompileOptions {
    pub timeout: Duration,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The external platform compiler. Consumed, never implemented, by the core.
pub trait PlatformDriver {
    /// Package an artifact tree into a distributable extension.
    fn compile(
        &self,
        xml_root: &Path,
        epf_path: &Path,
        options: &CompileOptions,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError>;

    /// Package inside a full host configuration (needed when the artifact
    /// references configuration metadata).
    fn compile_with_configuration(
        &self,
        xml_root: &Path,
        epf_path: &Path,
        options: &CompileOptions,
        configuration: &ConfigurationOptions,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError>;

    /// Unpack a packaged extension back into an artifact tree.
    fn decompile(
        &self,
        epf_path: &Path,
        output_dir: &Path,
        options: &DecompileOptions,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError>;
}

/// Run a driver call under a deadline. The child token is cancelled when
/// the closure returns `Cancelled`, which is mapped to `Timeout` — the
/// caller-visible contract is "the driver honored the signal".
pub fn with_deadline<T>(
    timeout: Duration,
    cancel: &CancellationToken,
    call: impl FnOnce(&CancellationToken) -> Result<T, DriverError>,
) -> Result<T, DriverError> {
    let child = cancel.child_token();
    let started = std::time::Instant::now();
    match call(&child) {
        Err(DriverError::Cancelled) if started.elapsed() >= timeout => {
            Err(DriverError::Timeout(timeout))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_after_deadline_reports_timeout() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> =
            with_deadline(Duration::ZERO, &cancel, |_| Err(DriverError::Cancelled));
        assert!(matches!(result, Err(DriverError::Timeout(_))));
    }

    #[test]
    fn early_cancellation_stays_cancelled() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = with_deadline(Duration::from_secs(3600), &cancel, |_| {
            Err(DriverError::Cancelled)
        });
        assert!(matches!(result, Err(DriverError::Cancelled)));
    }
}
