//! Forward-path orchestration: declarative source in, artifact tree out.
//!
//! ```text
//! config loader ─> handler injector ─> validator ─> writer ─> snapshot
//! ```
//!
//! Analysis-phase problems (config, validation) abort before anything is
//! written; the writer stages into a scratch directory so a failing emit
//! leaves no partial tree.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::emit::{ArtifactWriter, IdentityFinalizer, ModuleFinalizer, WrittenArtifacts};
use crate::error::Result;
use crate::model::Processor;
use crate::snapshot::{SnapshotType, write_snapshot};

/// Knobs for one generation run.
pub struct GenerateOptions<'a> {
    /// Persist the snapshot after a successful emit.
    pub save_snapshot: bool,
    pub finalizer: &'a dyn ModuleFinalizer,
}

impl Default for GenerateOptions<'_> {
    fn default() -> Self {
        Self {
            save_snapshot: true,
            finalizer: &IdentityFinalizer,
        }
    }
}

/// What a successful run produced.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub processor: Processor,
    pub artifacts: WrittenArtifacts,
    pub snapshot_dir: Option<PathBuf>,
    /// Non-fatal notices accumulated along the way.
    pub warnings: Vec<String>,
}

/// Run the full forward path for one configuration file.
pub fn generate(config_path: &Path, output_dir: &Path) -> Result<GenerateOutcome> {
    generate_with_options(config_path, output_dir, &GenerateOptions::default())
}

pub fn generate_with_options(
    config_path: &Path,
    output_dir: &Path,
    options: &GenerateOptions<'_>,
) -> Result<GenerateOutcome> {
    let loaded = crate::config::load_config(config_path)?;
    let mut processor = loaded.processor;
    let mut warnings = loaded.warnings;

    warnings.extend(crate::handlers::inject_processor(&mut processor)?);

    crate::validate::validate(&processor)?;

    let writer = ArtifactWriter::with_finalizer(&processor, options.finalizer);
    let artifacts = writer.write(output_dir)?;

    let snapshot_dir = if options.save_snapshot {
        Some(write_snapshot(
            output_dir,
            &processor,
            &artifacts,
            config_path.parent(),
            SnapshotType::Initial,
        )?)
    } else {
        None
    };

    info!(
        processor = %processor.name,
        forms = processor.forms.len(),
        warnings = warnings.len(),
        "generation complete"
    );
    Ok(GenerateOutcome {
        processor,
        artifacts,
        snapshot_dir,
        warnings,
    })
}

/// Convenience used by embedding shells: run generation and translate the
/// outcome into a process exit code.
pub fn generate_exit_code(config_path: &Path, output_dir: &Path) -> i32 {
    match generate(config_path, output_dir) {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            e.exit_code()
        }
    }
}
