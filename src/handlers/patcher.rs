//! Procedure-level patching of handler source.
//!
//! Three operations keyed on procedure name. Locating a procedure goes
//! through the grammar scanner, so the patch splices exact byte ranges; for
//! `Modify`, failure to locate falls back to exact-text replacement of the
//! captured old body, and failing that the patch is skipped — never guess,
//! never corrupt the file.

use tracing::{info, warn};

use super::splitter::scan_procedures;

/// A single handler patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerPatch {
    Add {
        name: String,
        body: String,
    },
    Delete {
        name: String,
    },
    Modify {
        name: String,
        new_body: String,
        old_body: Option<String>,
    },
}

impl HandlerPatch {
    pub fn name(&self) -> &str {
        match self {
            HandlerPatch::Add { name, .. }
            | HandlerPatch::Delete { name }
            | HandlerPatch::Modify { name, .. } => name,
        }
    }
}

/// Outcome of one patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(String),
    Skipped { reason: String },
}

/// Apply one patch to a handler source, returning the new text or a skip.
pub fn apply_patch(source: &str, patch: &HandlerPatch) -> PatchOutcome {
    match patch {
        HandlerPatch::Add { name, body } => apply_add(source, name, body),
        HandlerPatch::Delete { name } => apply_delete(source, name),
        HandlerPatch::Modify {
            name,
            new_body,
            old_body,
        } => apply_modify(source, name, new_body, old_body.as_deref()),
    }
}

/// Apply a batch in order; skipped patches are reported, the rest proceed.
pub fn apply_patches(source: &str, patches: &[HandlerPatch]) -> (String, Vec<String>) {
    let mut text = source.to_string();
    let mut skipped = Vec::new();
    for patch in patches {
        match apply_patch(&text, patch) {
            PatchOutcome::Applied(next) => {
                info!(procedure = patch.name(), "handler patch applied");
                text = next;
            }
            PatchOutcome::Skipped { reason } => {
                warn!(procedure = patch.name(), reason, "handler patch skipped");
                skipped.push(format!("{}: {reason}", patch.name()));
            }
        }
    }
    (text, skipped)
}

fn apply_add(source: &str, name: &str, body: &str) -> PatchOutcome {
    if find_span(source, name).is_some() {
        return PatchOutcome::Skipped {
            reason: format!("procedure {name:?} already exists"),
        };
    }
    // Insert before the last #EndRegion so the utilities region keeps
    // closing the module; append otherwise.
    let insert_at = last_end_region_offset(source);
    let mut out = String::with_capacity(source.len() + body.len() + 2);
    match insert_at {
        Some(pos) => {
            out.push_str(&source[..pos]);
            out.push_str(body.trim_end());
            out.push_str("\n\n");
            out.push_str(&source[pos..]);
        }
        None => {
            out.push_str(source.trim_end());
            out.push_str("\n\n");
            out.push_str(body.trim_end());
            out.push('\n');
        }
    }
    PatchOutcome::Applied(out)
}

fn apply_delete(source: &str, name: &str) -> PatchOutcome {
    let Some((start, end)) = find_span(source, name) else {
        return PatchOutcome::Skipped {
            reason: format!("procedure {name:?} not found"),
        };
    };
    let mut out = String::with_capacity(source.len());
    out.push_str(source[..start].trim_end_matches([' ', '\t']));
    let tail = source[end..].trim_start_matches(['\n']);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(tail);
    PatchOutcome::Applied(out)
}

fn apply_modify(
    source: &str,
    name: &str,
    new_body: &str,
    old_body: Option<&str>,
) -> PatchOutcome {
    if let Some((start, end)) = find_span(source, name) {
        let mut out = String::with_capacity(source.len() + new_body.len());
        out.push_str(&source[..start]);
        out.push_str(new_body.trim_end());
        out.push_str(&source[end..]);
        return PatchOutcome::Applied(out);
    }
    // Grammar match failed; try exact-text replacement of the old body.
    if let Some(old) = old_body {
        if let Some(pos) = source.find(old) {
            let mut out = String::with_capacity(source.len());
            out.push_str(&source[..pos]);
            out.push_str(new_body.trim_end());
            out.push_str(&source[pos + old.len()..]);
            return PatchOutcome::Applied(out);
        }
    }
    PatchOutcome::Skipped {
        reason: format!("procedure {name:?} not found and old body does not match"),
    }
}

/// Byte span of a named procedure (annotations included).
fn find_span(source: &str, name: &str) -> Option<(usize, usize)> {
    scan_procedures(source)
        .into_iter()
        .find(|p| p.name == name)
        .map(|p| (usize::from(p.range.start()), usize::from(p.range.end())))
}

/// Offset of the line holding the last `#EndRegion` marker.
fn last_end_region_offset(source: &str) -> Option<usize> {
    let mut offset = 0usize;
    let mut last = None;
    for line in source.split_inclusive('\n') {
        let lowered = line.trim_start().to_lowercase();
        if lowered.starts_with("#endregion") || lowered.starts_with("#конецобласти") {
            last = Some(offset);
        }
        offset += line.len();
    }
    last
}
