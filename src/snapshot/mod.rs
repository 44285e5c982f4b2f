//! Snapshot store.
//!
//! After a successful emit, the just-written root descriptor, the
//! concatenated handler modules, and a metadata record are persisted under
//! `<output>/_snapshot/`. The snapshot is the ground-truth "before" for the
//! reverse path; per-form `Form.xml` copies let the differ work on form
//! trees without relying on embedded fragments.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::emit::WrittenArtifacts;
use crate::model::Processor;

pub const SNAPSHOT_DIR: &str = "_snapshot";
pub const ORIGINAL_XML: &str = "original.xml";
pub const ORIGINAL_HANDLERS: &str = "original_handlers.bsl";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot metadata is invalid: {0}")]
    Metadata(String),

    #[error("snapshot is incomplete: missing {0}")]
    Missing(String),
}

/// How the snapshot's `original.xml` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    /// Straight from the writer.
    Initial,
    /// Re-derived by decompiling the packaged artifact — preferred, since it
    /// mirrors the canonical form the platform reads back.
    EpfExport,
}

/// The documented `metadata.json` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub generated_at: String,
    pub processor_name: String,
    pub platform_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<String>,
    pub generator_version: String,
    pub snapshot_type: SnapshotType,
    pub has_form_xml: u32,
}

/// A loaded snapshot, ready for the differ.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dir: PathBuf,
    pub original_xml: PathBuf,
    pub handlers: String,
    pub metadata: SnapshotMetadata,
    /// `form name → Form.xml copy` when the emit saved them.
    pub form_xml: IndexMap<String, PathBuf>,
}

/// Persist a snapshot after a successful emit.
pub fn write_snapshot(
    output_dir: &Path,
    processor: &Processor,
    artifacts: &WrittenArtifacts,
    config_dir: Option<&Path>,
    snapshot_type: SnapshotType,
) -> Result<PathBuf, SnapshotError> {
    let dir = output_dir.join(SNAPSHOT_DIR);
    std::fs::create_dir_all(&dir).map_err(|source| SnapshotError::Io {
        path: dir.clone(),
        source,
    })?;

    copy(&artifacts.root_xml, &dir.join(ORIGINAL_XML))?;
    write(&dir.join(ORIGINAL_HANDLERS), &artifacts.modules_concat)?;

    for (form_name, path) in &artifacts.form_xml {
        let copy_path = dir
            .join(&processor.name)
            .join("Forms")
            .join(form_name)
            .join("Ext")
            .join("Form.xml");
        if let Some(parent) = copy_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SnapshotError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        copy(path, &copy_path)?;
    }

    let metadata = SnapshotMetadata {
        generated_at: iso8601_utc_now(),
        processor_name: processor.name.clone(),
        platform_version: processor.platform_version.clone(),
        config_dir: config_dir.map(|p| p.display().to_string()),
        generator_version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot_type,
        has_form_xml: artifacts.form_xml.len() as u32,
    };
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| SnapshotError::Metadata(e.to_string()))?;
    write(&dir.join(METADATA_FILE), &json)?;

    info!(dir = %dir.display(), forms = metadata.has_form_xml, "snapshot written");
    Ok(dir)
}

/// Load a snapshot directory; `original.xml`, the handler concatenation,
/// and metadata are required.
pub fn load_snapshot(dir: &Path) -> Result<Snapshot, SnapshotError> {
    let original_xml = dir.join(ORIGINAL_XML);
    if !original_xml.exists() {
        return Err(SnapshotError::Missing(ORIGINAL_XML.into()));
    }
    let handlers_path = dir.join(ORIGINAL_HANDLERS);
    if !handlers_path.exists() {
        return Err(SnapshotError::Missing(ORIGINAL_HANDLERS.into()));
    }
    let handlers = std::fs::read_to_string(&handlers_path)
        .map(|t| crate::config::strip_bom(&t).to_string())
        .map_err(|source| SnapshotError::Io {
            path: handlers_path,
            source,
        })?;
    let metadata_path = dir.join(METADATA_FILE);
    let metadata_text =
        std::fs::read_to_string(&metadata_path).map_err(|source| SnapshotError::Io {
            path: metadata_path,
            source,
        })?;
    let metadata: SnapshotMetadata = serde_json::from_str(&metadata_text)
        .map_err(|e| SnapshotError::Metadata(e.to_string()))?;

    let mut form_xml = IndexMap::new();
    let forms_dir = dir.join(&metadata.processor_name).join("Forms");
    if forms_dir.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(&forms_dir)
            .map_err(|source| SnapshotError::Io {
                path: forms_dir.clone(),
                source,
            })?
            .flatten()
            .map(|e| e.path())
            .collect();
        entries.sort();
        for entry in entries {
            let candidate = entry.join("Ext").join("Form.xml");
            if candidate.exists() {
                if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                    form_xml.insert(name.to_string(), candidate);
                }
            }
        }
    }

    Ok(Snapshot {
        dir: dir.to_path_buf(),
        original_xml,
        handlers,
        metadata,
        form_xml,
    })
}

fn copy(from: &Path, to: &Path) -> Result<(), SnapshotError> {
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| SnapshotError::Io {
            path: to.to_path_buf(),
            source,
        })
}

fn write(path: &Path, content: &str) -> Result<(), SnapshotError> {
    std::fs::write(path, content).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Timestamps ──────────────────────────────────────────────────────
// Derived from SystemTime; no wall-clock crate in the dependency tree.

/// Seconds since the epoch split into an ISO-8601 UTC timestamp.
pub fn iso8601_utc_now() -> String {
    let (y, mo, d, h, mi, s) = civil_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

/// `YYYYMMDD_HHMMSS`, used for backup directory names.
pub fn compact_timestamp_now() -> String {
    let (y, mo, d, h, mi, s) = civil_now();
    format!("{y:04}{mo:02}{d:02}_{h:02}{mi:02}{s:02}")
}

fn civil_now() -> (i64, u32, u32, u32, u32, u32) {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    civil_from_unix(secs)
}

/// Days-to-civil conversion (Howard Hinnant's algorithm).
fn civil_from_unix(secs: i64) -> (i64, u32, u32, u32, u32, u32) {
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if m <= 2 { y + 1 } else { y };
    (
        year,
        m,
        d,
        (rem / 3600) as u32,
        (rem % 3600 / 60) as u32,
        (rem % 60) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::ArtifactWriter;
    use crate::model::{Attribute, DataType, Form, FormElement};

    fn emit_sample(dir: &Path) -> (Processor, WrittenArtifacts) {
        let mut p = Processor::new("SnapProc");
        p.attributes.push(Attribute::new("Note", DataType::String));
        let mut form = Form::new("F");
        let mut el = FormElement::new(crate::model::ElementType::InputField, "NoteField");
        el.attribute = Some("Note".into());
        form.elements.push(el);
        p.forms.push(form);
        let artifacts = ArtifactWriter::new(&p).write(dir).unwrap();
        (p, artifacts)
    }

    #[test]
    fn snapshot_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let (p, artifacts) = emit_sample(dir.path());
        let snap_dir =
            write_snapshot(dir.path(), &p, &artifacts, None, SnapshotType::Initial).unwrap();

        let snapshot = load_snapshot(&snap_dir).unwrap();
        assert_eq!(snapshot.metadata.processor_name, "SnapProc");
        assert_eq!(snapshot.metadata.has_form_xml, 1);
        assert!(snapshot.handlers.contains("#Region"));
        assert!(snapshot.form_xml.contains_key("F"));
        assert!(snapshot.original_xml.exists());
    }

    #[test]
    fn missing_original_xml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(dir.path()).unwrap_err();
        assert!(matches!(err, SnapshotError::Missing(_)));
    }

    #[test]
    fn civil_conversion_handles_known_dates() {
        // 2022-01-08 00:00:00 UTC
        let (y, m, d, h, mi, s) = civil_from_unix(1_641_600_000);
        assert_eq!((y, m, d), (2022, 1, 8));
        assert_eq!((h, mi, s), (0, 0, 0));
        // epoch
        assert_eq!(civil_from_unix(0), (1970, 1, 1, 0, 0, 0));
    }
}
