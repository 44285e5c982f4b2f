//! Patch operations over a comment-preserving document.
//!
//! - `set` replaces a scalar (keeping its quoting style) or merges a
//!   mapping key-by-key rather than replacing it wholesale.
//! - `insert` splices into a sequence; name collisions are rejected.
//! - `delete_named` removes a named child and hoists its leading comments
//!   onto the next sibling, so section headers authored as comments
//!   survive element removal.

use tracing::debug;

use super::node::{Document, ScalarStyle, SeqItem, YamlValue};
use super::path::{Path, Seg, resolve_mut};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("{0} is not a sequence")]
    NotASequence(String),

    #[error("{0} is not a mapping")]
    NotAMapping(String),

    #[error("an entry named {name:?} already exists under {parent}")]
    NameCollision { parent: String, name: String },

    #[error("no child named {name:?} under {parent}")]
    NoSuchChild { parent: String, name: String },

    #[error(transparent)]
    Path(#[from] super::path::PathError),
}

/// Set the value at `path`. Mapping-into-mapping merges key-by-key;
/// scalar-into-scalar keeps the existing quoting style.
pub fn set(doc: &mut Document, path: &str, new_value: YamlValue) -> Result<(), PatchError> {
    let parsed = Path::parse(path)?;
    if super::path::resolve(&doc.body, &parsed).is_some() {
        let target = resolve_mut(&mut doc.body, &parsed).expect("resolved above");
        apply_set(target, new_value);
        debug!(path, "scalar patch applied");
        return Ok(());
    }
    // Creating a missing final key under an existing mapping is allowed.
    let Some((parent_path, Seg::Key(key))) = parsed.split_last() else {
        return Err(PatchError::NotFound(path.to_string()));
    };
    let parent = resolve_mut(&mut doc.body, &parent_path)
        .ok_or_else(|| PatchError::NotFound(path.to_string()))?;
    let mapping = parent
        .as_mapping_mut()
        .ok_or_else(|| PatchError::NotAMapping(parent_path.to_string()))?;
    mapping
        .entries
        .push(super::node::MapEntry::new(key.clone(), new_value));
    debug!(path, "scalar patch created a new key");
    Ok(())
}

fn apply_set(target: &mut YamlValue, new_value: YamlValue) {
    match (&mut *target, new_value) {
        (YamlValue::Mapping(existing), YamlValue::Mapping(incoming)) => {
            for entry in incoming.entries {
                match existing.entry_mut(&entry.key) {
                    Some(slot) => apply_set(&mut slot.value, entry.value),
                    None => existing.entries.push(entry),
                }
            }
        }
        (YamlValue::Scalar(existing), YamlValue::Scalar(incoming)) => {
            // Keep the author's quoting; literal blocks keep their shape.
            let style = if existing.style == ScalarStyle::Literal
                && incoming.style == ScalarStyle::Plain
            {
                ScalarStyle::Literal
            } else if incoming.style == ScalarStyle::Plain {
                existing.style
            } else {
                incoming.style
            };
            existing.value = incoming.value;
            existing.style = style;
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Insert `value` into the sequence at `parent_path` at `index` (clamped to
/// the end). When the value carries a `name`, a sibling with the same name
/// rejects the insert.
pub fn insert(
    doc: &mut Document,
    parent_path: &str,
    index: usize,
    value: YamlValue,
) -> Result<(), PatchError> {
    let parsed = Path::parse(parent_path)?;
    let parent = resolve_mut(&mut doc.body, &parsed)
        .ok_or_else(|| PatchError::NotFound(parent_path.to_string()))?;
    if matches!(parent, YamlValue::Scalar(s) if s.value.is_empty()) {
        // An empty key (`elements:` with nothing under it) becomes a
        // sequence on first insert.
        *parent = YamlValue::empty_sequence();
    }
    let seq = parent
        .as_sequence_mut()
        .ok_or_else(|| PatchError::NotASequence(parent_path.to_string()))?;
    if let Some(name) = value.name() {
        if seq.items.iter().any(|item| item.value.name() == Some(name)) {
            return Err(PatchError::NameCollision {
                parent: parent_path.to_string(),
                name: name.to_string(),
            });
        }
    }
    let at = index.min(seq.items.len());
    seq.items.insert(at, SeqItem::new(value));
    debug!(parent = parent_path, index = at, "structural insert applied");
    Ok(())
}

/// Delete the child of the sequence at `parent_path` whose `name` equals
/// `name`. Leading comments of the removed item are hoisted onto the item
/// that takes its position, when one exists.
pub fn delete_named(
    doc: &mut Document,
    parent_path: &str,
    name: &str,
) -> Result<YamlValue, PatchError> {
    let parsed = Path::parse(parent_path)?;
    let parent = resolve_mut(&mut doc.body, &parsed)
        .ok_or_else(|| PatchError::NotFound(parent_path.to_string()))?;
    let seq = parent
        .as_sequence_mut()
        .ok_or_else(|| PatchError::NotASequence(parent_path.to_string()))?;
    let index = seq
        .items
        .iter()
        .position(|item| item.value.name() == Some(name))
        .ok_or_else(|| PatchError::NoSuchChild {
            parent: parent_path.to_string(),
            name: name.to_string(),
        })?;
    let removed = seq.items.remove(index);
    if !removed.leading.is_empty() {
        if let Some(next) = seq.items.get_mut(index) {
            let mut hoisted = removed.leading.clone();
            hoisted.append(&mut next.leading);
            next.leading = hoisted;
        }
    }
    debug!(parent = parent_path, name, "structural delete applied");
    Ok(removed.value)
}
