//! Reverse-path orchestration.
//!
//! snapshot-load → diff → map → per-change confirmation → backup → apply →
//! on-failure rollback → structured report. A "quit" answer is an atomic
//! abort: no backup is created and no file is touched. Apply ordering:
//! scalar patches in diff order, then structural deletes, then structural
//! adds in ascending index order, then handler patches.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::changes::{Patch, StructuralOp, StructuralPatch};
use super::mapper::ChangeMapper;
use super::refs::ReferenceChecker;
use super::report::{ChangesApplied, SyncReport, SyncStatus};
use super::scalar_diff::{DescriptorSet, detect_changes};
use crate::handlers::{apply_patches, diff_handlers};
use crate::snapshot::{Snapshot, load_snapshot};
use crate::xmltree::XmlNode;
use crate::ydoc;

/// Answer to a single confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Skip,
    ApplyAll,
    SkipAll,
    ShowDetail,
    ShowSideBySide,
    Quit,
}

/// Interactive confirmation hook. The CLI shell supplies a prompting
/// implementation; the core ships the auto-approving one.
pub trait ConflictResolver {
    /// `references` is non-empty for structural deletes with citations.
    fn resolve(&mut self, preview: &str, references: &[String]) -> Decision;
}

/// Approves every change; used by non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl ConflictResolver for AutoApprove {
    fn resolve(&mut self, _preview: &str, _references: &[String]) -> Decision {
        Decision::Apply
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Skip confirmation entirely.
    pub auto_approve: bool,
    /// Apply deletes even when the reference checker finds citations.
    pub force: bool,
}

/// Drives one reverse-path run.
pub struct SyncCoordinator<'a> {
    pub snapshot_dir: PathBuf,
    /// Root descriptor of the user-edited export.
    pub modified_xml: PathBuf,
    pub config_path: PathBuf,
    pub handlers_path: PathBuf,
    pub options: SyncOptions,
    pub resolver: &'a mut dyn ConflictResolver,
}

impl<'a> SyncCoordinator<'a> {
    pub fn run(&mut self) -> SyncReport {
        let snapshot = match load_snapshot(&self.snapshot_dir) {
            Ok(s) => s,
            Err(e) => return SyncReport::error(e.to_string()),
        };
        let original = match build_original_set(&snapshot) {
            Ok(set) => set,
            Err(e) => return SyncReport::error(e),
        };
        let modified = match build_modified_set(&self.modified_xml, &snapshot) {
            Ok(set) => set,
            Err(e) => return SyncReport::error(e),
        };
        let modified_handlers = collect_modified_handlers(&self.modified_xml, &snapshot);

        let config_text = match std::fs::read_to_string(&self.config_path) {
            Ok(t) => t,
            Err(e) => return SyncReport::error(format!("cannot read config: {e}")),
        };
        let mut config_doc = match ydoc::parse(&config_text) {
            Ok(d) => d,
            Err(e) => return SyncReport::error(e.to_string()),
        };
        let handler_text = std::fs::read_to_string(&self.handlers_path)
            .map(|t| crate::config::strip_bom(&t).to_string())
            .unwrap_or_default();

        // Diff and map.
        let changes = detect_changes(&original, &modified);
        let handler_changes = diff_handlers(&snapshot.handlers, &modified_handlers);
        let mapper = ChangeMapper::new(&config_doc);
        let (mut patches, mut details) = mapper.map_changes(&changes, &modified);
        patches.extend(ChangeMapper::map_handler_changes(&handler_changes));
        info!(changes = changes.len(), patches = patches.len(), "sync mapped");

        if patches.is_empty() {
            return SyncReport {
                status: SyncStatus::Success,
                backup_dir: None,
                changes_applied: ChangesApplied::default(),
                details,
                error: None,
            };
        }

        // Confirmation. Quit is atomic: nothing has been modified yet.
        let checker = ReferenceChecker::new(&config_doc, &handler_text);
        let mut approved = Vec::new();
        let mut apply_rest = self.options.auto_approve;
        let mut skip_rest = false;
        for patch in patches {
            if skip_rest {
                details.push(format!("skipped: {patch}"));
                continue;
            }
            let references = structural_delete_refs(&patch, &checker);

            if !apply_rest {
                // Detail requests re-prompt; everything else settles the patch.
                let decision = loop {
                    match self.resolver.resolve(&patch.to_string(), &references) {
                        Decision::ShowDetail | Decision::ShowSideBySide => continue,
                        settled => break settled,
                    }
                };
                match decision {
                    Decision::Quit => return SyncReport::cancelled(),
                    Decision::Skip => {
                        details.push(format!("skipped: {patch}"));
                        continue;
                    }
                    Decision::SkipAll => {
                        skip_rest = true;
                        details.push(format!("skipped: {patch}"));
                        continue;
                    }
                    Decision::ApplyAll => apply_rest = true,
                    _ => {}
                }
            }

            // Reference blocking applies even on approved deletes.
            if !references.is_empty() && !self.options.force {
                warn!(patch = %patch, "delete blocked by references");
                details.push(format!(
                    "conflict: {patch} blocked by references:\n{}",
                    references
                        .iter()
                        .map(|r| format!("  - {r}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                ));
                continue;
            }
            if !references.is_empty() {
                details.push(format!(
                    "forced delete with {} reference(s): {patch}",
                    references.len()
                ));
            }
            approved.push(patch);
        }

        if approved.is_empty() {
            return SyncReport {
                status: SyncStatus::Success,
                backup_dir: None,
                changes_applied: ChangesApplied::default(),
                details,
                error: None,
            };
        }

        // Backup before any mutation.
        let backup_dir = match self.create_backup() {
            Ok(dir) => dir,
            Err(e) => return SyncReport::error(format!("backup failed: {e}")),
        };

        match self.apply(&mut config_doc, &handler_text, &approved, &mut details) {
            Ok(applied) => SyncReport {
                status: SyncStatus::Success,
                backup_dir: Some(backup_dir.display().to_string()),
                changes_applied: applied,
                details,
                error: None,
            },
            Err(e) => {
                self.restore_backup(&backup_dir);
                SyncReport {
                    status: SyncStatus::Error,
                    backup_dir: Some(backup_dir.display().to_string()),
                    changes_applied: ChangesApplied::default(),
                    details,
                    error: Some(e),
                }
            }
        }
    }

    fn apply(
        &self,
        config_doc: &mut ydoc::Document,
        handler_text: &str,
        approved: &[Patch],
        details: &mut Vec<String>,
    ) -> Result<ChangesApplied, String> {
        let mut applied = ChangesApplied::default();

        // Scalars first, in diff order.
        for patch in approved {
            if let Patch::Scalar(p) = patch {
                ydoc::set(config_doc, &p.path, ydoc::YamlValue::plain(p.new_value.clone()))
                    .map_err(|e| format!("scalar patch {}: {e}", p.path))?;
                applied.yaml_updates += 1;
            }
        }

        // Structural deletes before adds, so insertion indices stay valid;
        // adds in ascending index order.
        let mut deletes: Vec<&StructuralPatch> = Vec::new();
        let mut adds: Vec<&StructuralPatch> = Vec::new();
        for patch in approved {
            if let Patch::Structural(p) = patch {
                match p.op {
                    StructuralOp::Delete => deletes.push(p),
                    StructuralOp::Add => adds.push(p),
                }
            }
        }
        for patch in deletes {
            match ydoc::delete_named(config_doc, &patch.parent_path, &patch.name) {
                Ok(_) => applied.structural_updates += 1,
                Err(ydoc::PatchError::NoSuchChild { .. }) => {
                    // The entity never existed in the declarative source
                    // (e.g. a generated artifact); surface and continue.
                    details.push(format!(
                        "skipped: delete of {:?} — not present in the declarative source",
                        patch.name
                    ));
                }
                Err(e) => return Err(format!("structural delete {:?}: {e}", patch.name)),
            }
        }
        adds.sort_by_key(|p| (p.parent_path.clone(), p.insertion_index.unwrap_or(usize::MAX)));
        for patch in adds {
            let data = patch
                .element_data
                .clone()
                .unwrap_or_else(|| serde_yaml::Value::String(patch.name.clone()));
            let value = ydoc::YamlValue::from_serde(&data);
            let index = patch.insertion_index.unwrap_or(usize::MAX);
            let mut result = ydoc::insert(config_doc, &patch.parent_path, index, value.clone());
            if matches!(result, Err(ydoc::PatchError::NotFound(_))) {
                // Descriptor paths always address children as `child_items`;
                // groups in the declarative source author theirs under
                // `elements`.
                if let Some(alt) = patch
                    .parent_path
                    .strip_suffix(".child_items")
                    .map(|p| format!("{p}.elements"))
                {
                    result = ydoc::insert(config_doc, &alt, index, value);
                }
            }
            match result {
                Ok(()) => applied.structural_updates += 1,
                Err(ydoc::PatchError::NameCollision { .. }) => {
                    details.push(format!(
                        "skipped: add of {:?} — an entry with that name already exists",
                        patch.name
                    ));
                }
                Err(e) => return Err(format!("structural add {:?}: {e}", patch.name)),
            }
        }

        // Handler patches.
        let handler_patches: Vec<crate::handlers::HandlerPatch> = approved
            .iter()
            .filter_map(|p| match p {
                Patch::Handler(h) => Some(h.clone()),
                _ => None,
            })
            .collect();
        let mut new_handler_text = None;
        if !handler_patches.is_empty() {
            let (text, skipped) = apply_patches(handler_text, &handler_patches);
            applied.handler_updates = handler_patches.len() - skipped.len();
            details.extend(skipped.into_iter().map(|s| format!("handler skip: {s}")));
            new_handler_text = Some(text);
        }

        // All in-memory mutations succeeded; now touch the disk.
        std::fs::write(&self.config_path, ydoc::emit(config_doc))
            .map_err(|e| format!("writing config: {e}"))?;
        if let Some(text) = new_handler_text {
            std::fs::write(&self.handlers_path, format!("\u{feff}{text}"))
                .map_err(|e| format!("writing handlers: {e}"))?;
        }
        info!(
            yaml = applied.yaml_updates,
            structural = applied.structural_updates,
            handlers = applied.handler_updates,
            "sync applied"
        );
        Ok(applied)
    }

    fn create_backup(&self) -> std::io::Result<PathBuf> {
        let parent = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let dir = parent.join(format!(
            ".sync_backup_{}",
            crate::snapshot::compact_timestamp_now()
        ));
        std::fs::create_dir_all(&dir)?;
        if let Some(name) = self.config_path.file_name() {
            std::fs::copy(&self.config_path, dir.join(name))?;
        }
        if self.handlers_path.exists() {
            if let Some(name) = self.handlers_path.file_name() {
                std::fs::copy(&self.handlers_path, dir.join(name))?;
            }
        }
        info!(dir = %dir.display(), "backup created");
        Ok(dir)
    }

    fn restore_backup(&self, backup_dir: &Path) {
        for target in [&self.config_path, &self.handlers_path] {
            if let Some(name) = target.file_name() {
                let source = backup_dir.join(name);
                if source.exists() {
                    if let Err(e) = std::fs::copy(&source, target) {
                        warn!(target = %target.display(), error = %e, "restore failed");
                    }
                }
            }
        }
        warn!(dir = %backup_dir.display(), "restored from backup after apply failure");
    }
}

fn structural_delete_refs(patch: &Patch, checker: &ReferenceChecker<'_>) -> Vec<String> {
    match patch {
        Patch::Structural(p) if p.op == StructuralOp::Delete => checker.check(p.entity, &p.name),
        _ => Vec::new(),
    }
}

fn build_original_set(snapshot: &Snapshot) -> Result<DescriptorSet, String> {
    let root = XmlNode::parse_file(&snapshot.original_xml).map_err(|e| e.to_string())?;
    let mut set = DescriptorSet::new(root);
    for (name, path) in &snapshot.form_xml {
        set.forms
            .insert(name.clone(), XmlNode::parse_file(path).map_err(|e| e.to_string())?);
    }
    Ok(set)
}

fn build_modified_set(modified_xml: &Path, snapshot: &Snapshot) -> Result<DescriptorSet, String> {
    let root = XmlNode::parse_file(modified_xml).map_err(|e| e.to_string())?;
    let mut set = DescriptorSet::new(root);
    let forms_dir = modified_xml
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&snapshot.metadata.processor_name)
        .join("Forms");
    if forms_dir.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(&forms_dir)
            .map_err(|e| e.to_string())?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();
        for entry in entries {
            let form_xml = entry.join("Ext").join("Form.xml");
            if form_xml.exists() {
                if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                    set.forms.insert(
                        name.to_string(),
                        XmlNode::parse_file(&form_xml).map_err(|e| e.to_string())?,
                    );
                }
            }
        }
    }
    Ok(set)
}

/// Concatenate the modified export's modules: the object module plus every
/// form module.
fn collect_modified_handlers(modified_xml: &Path, snapshot: &Snapshot) -> String {
    let base = modified_xml
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&snapshot.metadata.processor_name);
    let mut parts = Vec::new();
    let object_module = base.join("Ext").join("ObjectModule.bsl");
    if let Ok(text) = std::fs::read_to_string(&object_module) {
        parts.push(crate::config::strip_bom(&text).to_string());
    }
    let forms_dir = base.join("Forms");
    if forms_dir.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(&forms_dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|e| e.path())
            .collect();
        entries.sort();
        for entry in entries {
            let module = entry.join("Ext").join("Form").join("Module.bsl");
            if let Ok(text) = std::fs::read_to_string(&module) {
                parts.push(crate::config::strip_bom(&text).to_string());
            }
        }
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_reports_error_without_side_effects() {
        // missing snapshot → error report, nothing touched
        let mut resolver = AutoApprove;
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = SyncCoordinator {
            snapshot_dir: dir.path().join("no_snapshot"),
            modified_xml: dir.path().join("missing.xml"),
            config_path: dir.path().join("config.yaml"),
            handlers_path: dir.path().join("handlers.bsl"),
            options: SyncOptions::default(),
            resolver: &mut resolver,
        };
        let report = coordinator.run();
        assert_eq!(report.status, SyncStatus::Error);
        assert!(!dir.path().join("config.yaml").exists());
    }
}
