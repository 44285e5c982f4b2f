//! Procedure-identity diff over two handler sources.
//!
//! Bodies are compared through the whitespace- and comment-insensitive
//! fingerprint, so formatting-only edits produce no change.

use rustc_hash::FxHashSet;
use tracing::debug;

use super::splitter::split_source;

/// One procedure-level difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerChange {
    Added {
        name: String,
        new_body: String,
    },
    Deleted {
        name: String,
        old_body: String,
    },
    Modified {
        name: String,
        old_body: String,
        new_body: String,
    },
}

impl HandlerChange {
    pub fn name(&self) -> &str {
        match self {
            HandlerChange::Added { name, .. }
            | HandlerChange::Deleted { name, .. }
            | HandlerChange::Modified { name, .. } => name,
        }
    }
}

/// Diff two handler sources by procedure identity, in the modified source's
/// order for additions and the original's order for deletions.
pub fn diff_handlers(original: &str, modified: &str) -> Vec<HandlerChange> {
    let old = split_source(original);
    let new = split_source(modified);

    let old_names: FxHashSet<&str> = old.procedures.keys().map(String::as_str).collect();
    let new_names: FxHashSet<&str> = new.procedures.keys().map(String::as_str).collect();

    let mut changes = Vec::new();
    for (name, proc) in &new.procedures {
        if !old_names.contains(name.as_str()) {
            changes.push(HandlerChange::Added {
                name: name.clone(),
                new_body: proc.text.clone(),
            });
        }
    }
    for (name, proc) in &old.procedures {
        if !new_names.contains(name.as_str()) {
            changes.push(HandlerChange::Deleted {
                name: name.clone(),
                old_body: proc.text.clone(),
            });
        }
    }
    for (name, old_proc) in &old.procedures {
        if let Some(new_proc) = new.procedures.get(name) {
            if old_proc.normalized_body() != new_proc.normalized_body() {
                changes.push(HandlerChange::Modified {
                    name: name.clone(),
                    old_body: old_proc.text.clone(),
                    new_body: new_proc.text.clone(),
                });
            }
        }
    }
    debug!(changes = changes.len(), "handler diff complete");
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "\
Procedure FormOnOpen(Cancel)
\tX = 1;
EndProcedure

Procedure Removed()
\tY = 2;
EndProcedure
";

    #[test]
    fn detects_added_deleted_modified() {
        let modified = "\
Procedure FormOnOpen(Cancel)
\tX = 42;
EndProcedure

Procedure Fresh()
\tZ = 3;
EndProcedure
";
        let changes = diff_handlers(ORIGINAL, modified);
        let names: Vec<(&str, &str)> = changes
            .iter()
            .map(|c| match c {
                HandlerChange::Added { name, .. } => ("added", name.as_str()),
                HandlerChange::Deleted { name, .. } => ("deleted", name.as_str()),
                HandlerChange::Modified { name, .. } => ("modified", name.as_str()),
            })
            .collect();
        assert!(names.contains(&("added", "Fresh")));
        assert!(names.contains(&("deleted", "Removed")));
        assert!(names.contains(&("modified", "FormOnOpen")));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn formatting_only_changes_are_suppressed() {
        let reformatted = "\
Procedure FormOnOpen(Cancel)
    X  =  1;   // reindented and commented
EndProcedure

Procedure Removed()
\tY = 2;
EndProcedure
";
        assert!(diff_handlers(ORIGINAL, reformatted).is_empty());
    }

    #[test]
    fn identical_sources_diff_empty() {
        assert!(diff_handlers(ORIGINAL, ORIGINAL).is_empty());
    }
}
