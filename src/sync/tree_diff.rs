//! Minimal delta between two element trees.
//!
//! Identity is the element name (unique per form); moves are same-identity
//! nodes whose parent or sibling position changed; renames are add/delete
//! pairs with a matching structural fingerprint. Equal inputs yield an
//! empty delta, and swapping the inputs swaps adds with deletes.

use rustc_hash::FxHashSet;

use super::extract::{ElementNode, flatten};

/// A node that appeared or disappeared.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub name: String,
    pub element_type: String,
    pub path: String,
    pub depth: usize,
    pub parent: Option<String>,
    pub insertion_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovedEntry {
    pub name: String,
    pub element_type: String,
    pub from_path: String,
    pub to_path: String,
    pub from_index: usize,
    pub to_index: usize,
    pub from_parent: Option<String>,
    pub to_parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDelta {
    pub property: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedEntry {
    pub name: String,
    pub path: String,
    /// Type change, when the tag itself changed.
    pub type_change: Option<(String, String)>,
    pub properties: Vec<PropertyDelta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameEntry {
    pub old_name: String,
    pub new_name: String,
    pub element_type: String,
    pub path: String,
}

/// Four disjoint change lists plus detected renames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDelta {
    pub added: Vec<NodeRef>,
    pub deleted: Vec<NodeRef>,
    pub moved: Vec<MovedEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub renamed: Vec<RenameEntry>,
}

impl TreeDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.deleted.is_empty()
            && self.moved.is_empty()
            && self.modified.is_empty()
            && self.renamed.is_empty()
    }
}

/// Compare two element forests.
pub fn diff_trees(original: &[ElementNode], modified: &[ElementNode]) -> TreeDelta {
    let original_flat = flatten(original);
    let modified_flat = flatten(modified);

    let original_names: FxHashSet<&str> = original_flat.keys().copied().collect();
    let modified_names: FxHashSet<&str> = modified_flat.keys().copied().collect();

    let mut delta = TreeDelta::default();

    let mut added: Vec<&ElementNode> = modified_flat
        .values()
        .filter(|n| !original_names.contains(n.name.as_str()))
        .copied()
        .collect();
    let mut deleted: Vec<&ElementNode> = original_flat
        .values()
        .filter(|n| !modified_names.contains(n.name.as_str()))
        .copied()
        .collect();

    // Rename adjudication: an add and a delete with the same structural
    // fingerprint under the same parent are one rename. Ambiguity falls
    // back to delete+add, which the user reviews.
    let mut renamed_new: FxHashSet<String> = FxHashSet::default();
    let mut renamed_old: FxHashSet<String> = FxHashSet::default();
    for old_node in &deleted {
        let candidates: Vec<&&ElementNode> = added
            .iter()
            .filter(|new_node| {
                !renamed_new.contains(new_node.name.as_str())
                    && fingerprints_match(old_node, new_node)
            })
            .collect();
        if let [only] = candidates.as_slice() {
            delta.renamed.push(RenameEntry {
                old_name: old_node.name.clone(),
                new_name: only.name.clone(),
                element_type: only.element_type.clone(),
                path: only.path.clone(),
            });
            renamed_new.insert(only.name.clone());
            renamed_old.insert(old_node.name.clone());
        }
    }
    added.retain(|n| !renamed_new.contains(n.name.as_str()));
    deleted.retain(|n| !renamed_old.contains(n.name.as_str()));

    for node in added {
        delta.added.push(node_ref(node));
    }
    for node in deleted {
        delta.deleted.push(node_ref(node));
    }

    // Common nodes: moves and modifications.
    for (name, old_node) in &original_flat {
        let Some(new_node) = modified_flat.get(name) else {
            continue;
        };
        if old_node.parent != new_node.parent || old_node.index != new_node.index {
            delta.moved.push(MovedEntry {
                name: (*name).to_string(),
                element_type: new_node.element_type.clone(),
                from_path: old_node.path.clone(),
                to_path: new_node.path.clone(),
                from_index: old_node.index,
                to_index: new_node.index,
                from_parent: old_node.parent.clone(),
                to_parent: new_node.parent.clone(),
            });
        }

        let type_change = (old_node.element_type != new_node.element_type).then(|| {
            (
                old_node.element_type.clone(),
                new_node.element_type.clone(),
            )
        });
        let mut properties = Vec::new();
        for (key, old_value) in &old_node.properties {
            // Only keys present on both sides participate; the forward path
            // fills languages the declarative source may omit on purpose.
            if let Some(new_value) = new_node.properties.get(key) {
                if old_value != new_value {
                    properties.push(PropertyDelta {
                        property: key.clone(),
                        old: old_value.clone(),
                        new: new_value.clone(),
                    });
                }
            }
        }
        if type_change.is_some() || !properties.is_empty() {
            delta.modified.push(ModifiedEntry {
                name: (*name).to_string(),
                path: new_node.path.clone(),
                type_change,
                properties,
            });
        }
    }

    delta
}

fn node_ref(node: &ElementNode) -> NodeRef {
    NodeRef {
        name: node.name.clone(),
        element_type: node.element_type.clone(),
        path: parent_of(&node.path),
        depth: node.depth,
        parent: node.parent.clone(),
        insertion_index: node.index,
    }
}

/// `forms[0].elements[2]` → `forms[0].elements`.
fn parent_of(path: &str) -> String {
    match path.rfind('[') {
        Some(pos) => path[..pos].to_string(),
        None => path.to_string(),
    }
}

/// Same tag, same child count, same sibling position, same parent.
fn fingerprints_match(a: &ElementNode, b: &ElementNode) -> bool {
    a.element_type == b.element_type
        && a.children.len() == b.children.len()
        && a.index == b.index
        && a.parent == b.parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::extract::extract_form_tree;
    use crate::xmltree::XmlNode;

    fn tree(xml: &str) -> Vec<ElementNode> {
        extract_form_tree(&XmlNode::parse(xml).unwrap(), 0)
    }

    const BASE: &str = r#"<Form>
<ChildItems>
<InputField name="A" id="1"><DataPath>Object.A</DataPath></InputField>
<UsualGroup name="G" id="4">
<ChildItems><Button name="Go" id="7"/></ChildItems>
</UsualGroup>
</ChildItems>
</Form>"#;

    #[test]
    fn equal_inputs_yield_empty_delta() {
        let a = tree(BASE);
        let b = tree(BASE);
        assert!(diff_trees(&a, &b).is_empty());
    }

    #[test]
    fn equal_inputs_are_deterministic() {
        let a = tree(BASE);
        let modified = tree(&BASE.replace("name=\"Go\"", "name=\"Stop\""));
        let d1 = diff_trees(&a, &modified);
        let d2 = diff_trees(&a, &modified);
        assert_eq!(d1, d2);
    }

    #[test]
    fn added_and_deleted_invert_on_swap() {
        let a = tree(BASE);
        // A disappears, C appears under the group: different parents, so
        // the rename fingerprint does not pair them.
        let b = tree(&BASE.replace(
            "<InputField name=\"A\" id=\"1\"><DataPath>Object.A</DataPath></InputField>\n",
            "",
        ).replace(
            "<Button name=\"Go\" id=\"7\"/>",
            "<Button name=\"Go\" id=\"7\"/><InputField name=\"C\" id=\"9\"/>",
        ));
        let forward = diff_trees(&a, &b);
        let backward = diff_trees(&b, &a);
        assert!(!forward.added.is_empty());
        assert!(!forward.deleted.is_empty());
        let fwd_added: Vec<&str> = forward.added.iter().map(|n| n.name.as_str()).collect();
        let bwd_deleted: Vec<&str> = backward.deleted.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(fwd_added, bwd_deleted);
        let fwd_deleted: Vec<&str> = forward.deleted.iter().map(|n| n.name.as_str()).collect();
        let bwd_added: Vec<&str> = backward.added.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(fwd_deleted, bwd_added);
    }

    #[test]
    fn rename_detected_by_fingerprint() {
        let a = tree(BASE);
        let b = tree(&BASE.replace("name=\"Go\"", "name=\"Run\""));
        let delta = diff_trees(&a, &b);
        assert_eq!(delta.renamed.len(), 1);
        assert_eq!(delta.renamed[0].old_name, "Go");
        assert_eq!(delta.renamed[0].new_name, "Run");
        assert!(delta.added.is_empty());
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn move_reports_from_and_to() {
        let moved = r#"<Form>
<ChildItems>
<UsualGroup name="G" id="4">
<ChildItems><Button name="Go" id="7"/><InputField name="A" id="1"><DataPath>Object.A</DataPath></InputField></ChildItems>
</UsualGroup>
</ChildItems>
</Form>"#;
        let delta = diff_trees(&tree(BASE), &tree(moved));
        let entry = delta.moved.iter().find(|m| m.name == "A").unwrap();
        assert_eq!(entry.from_path, "forms[0].elements[0]");
        assert_eq!(entry.to_path, "forms[0].elements[0].child_items[1]");
        assert_eq!(entry.to_parent.as_deref(), Some("G"));

        // moved entries invert from <-> to on swapped inputs
        let back = diff_trees(&tree(moved), &tree(BASE));
        let inverse = back.moved.iter().find(|m| m.name == "A").unwrap();
        assert_eq!(inverse.from_path, entry.to_path);
        assert_eq!(inverse.to_path, entry.from_path);
    }

    #[test]
    fn property_change_detected_on_common_keys_only() {
        let b = tree(&BASE.replace(
            "<DataPath>Object.A</DataPath>",
            "<DataPath>Object.A</DataPath><Width>20</Width>",
        ));
        // Width exists only on one side: ignored
        let delta = diff_trees(&tree(BASE), &b);
        assert!(delta.modified.is_empty(), "{delta:?}");

        let c = tree(&BASE.replace("Object.A", "Object.Other"));
        let delta = diff_trees(&tree(BASE), &c);
        assert_eq!(delta.modified.len(), 1);
        assert_eq!(delta.modified[0].properties[0].property, "data_path");
    }

    #[test]
    fn added_nested_group_reports_parent_path_and_index() {
        let b = tree(&BASE.replace(
            "</ChildItems>\n</Form>",
            "<ButtonGroup name=\"BG\" id=\"9\"><ChildItems><Button name=\"B1\" id=\"10\"/><Button name=\"B2\" id=\"12\"/></ChildItems></ButtonGroup></ChildItems>\n</Form>",
        ));
        let delta = diff_trees(&tree(BASE), &b);
        let bg = delta.added.iter().find(|n| n.name == "BG").unwrap();
        assert_eq!(bg.path, "forms[0].elements");
        assert_eq!(bg.insertion_index, 2);
    }
}
