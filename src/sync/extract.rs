//! Hierarchical extraction of UI element trees from form descriptors.
//!
//! Rebuilds a lightweight mirror of the form element tree from `Form.xml`.
//! Node identity is `(name, type)`; the normalized path string
//! (`forms[0].elements[1].child_items[0]`) is the canonical address of the
//! *position* in the tree.

use indexmap::IndexMap;

use crate::xmltree::XmlNode;

/// Element types whose children participate in tree comparison. Tables are
/// deliberately excluded: their columns are derived artifacts and would
/// churn every diff.
const CONTAINER_TYPES: &[&str] = &[
    "UsualGroup",
    "ButtonGroup",
    "ColumnGroup",
    "CommandBarGroup",
    "Page",
    "Pages",
    "Popup",
];

/// A mirror of one form element reconstructed from a descriptor tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub name: String,
    pub element_type: String,
    pub properties: IndexMap<String, String>,
    pub events: IndexMap<String, String>,
    pub children: Vec<ElementNode>,
    /// Normalized position address.
    pub path: String,
    pub depth: usize,
    pub index: usize,
    pub parent: Option<String>,
}

impl ElementNode {
    pub fn is_container(&self) -> bool {
        CONTAINER_TYPES.contains(&self.element_type.as_str())
    }
}

/// Extract the root element forest of a form descriptor.
pub fn extract_form_tree(form_root: &XmlNode, form_index: usize) -> Vec<ElementNode> {
    let Some(container) = form_root.child("ChildItems") else {
        return Vec::new();
    };
    let parent_path = format!("forms[{form_index}].elements");
    let mut roots = Vec::new();
    let mut index = 0usize;
    for item in &container.children {
        if let Some(node) = extract_node(item, None, 0, index, &parent_path) {
            roots.push(node);
            index += 1;
        }
    }
    roots
}

fn extract_node(
    element: &XmlNode,
    parent: Option<&str>,
    depth: usize,
    index: usize,
    parent_path: &str,
) -> Option<ElementNode> {
    let name = element.attr("name")?.to_string();
    let element_type = element.tag.clone();
    let path = format!("{parent_path}[{index}]");

    let mut node = ElementNode {
        properties: extract_properties(element),
        events: extract_events(element),
        children: Vec::new(),
        parent: parent.map(str::to_string),
        name,
        element_type,
        depth,
        index,
        path,
    };

    if node.is_container() {
        if let Some(container) = element.child("ChildItems") {
            let child_path = format!("{}.child_items", node.path);
            let mut child_index = 0usize;
            for child in &container.children {
                if let Some(child_node) =
                    extract_node(child, Some(&node.name), depth + 1, child_index, &child_path)
                {
                    node.children.push(child_node);
                    child_index += 1;
                }
            }
        }
    }
    Some(node)
}

/// Scalar properties: every leaf child with text, keyed by the snake-case
/// form of its tag. Multilingual titles flatten to `title_<lang>`.
fn extract_properties(element: &XmlNode) -> IndexMap<String, String> {
    let mut props = IndexMap::new();
    for child in &element.children {
        match child.tag.as_str() {
            "ChildItems" | "Events" => continue,
            "Title" | "ToolTip" | "InputHint" => {
                let prefix = snake_case(&child.tag);
                for (lang, content) in element.multilang(&child.tag) {
                    props.insert(format!("{prefix}_{lang}"), content);
                }
            }
            _ if child.children.is_empty() && !child.text.is_empty() => {
                props.insert(snake_case(&child.tag), child.text.clone());
            }
            _ => {}
        }
    }
    props
}

fn extract_events(element: &XmlNode) -> IndexMap<String, String> {
    let mut events = IndexMap::new();
    if let Some(container) = element.child("Events") {
        for event in &container.children {
            if let (Some(name), Some(action)) = (event.attr("name"), event.child_text("Action")) {
                events.insert(name.to_string(), action.to_string());
            }
        }
    }
    events
}

pub(crate) fn snake_case(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len() + 4);
    for (i, c) in tag.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Flatten a forest into `name → node`, depth-first.
pub fn flatten<'a>(roots: &'a [ElementNode]) -> IndexMap<&'a str, &'a ElementNode> {
    let mut out = IndexMap::new();
    fn rec<'a>(node: &'a ElementNode, out: &mut IndexMap<&'a str, &'a ElementNode>) {
        out.insert(node.name.as_str(), node);
        for child in &node.children {
            rec(child, out);
        }
    }
    for root in roots {
        rec(root, &mut out);
    }
    out
}

/// Find a node's normalized path by element name.
pub fn find_path<'a>(roots: &'a [ElementNode], name: &str) -> Option<&'a str> {
    flatten(roots).get(name).map(|n| n.path.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"<Form xmlns="urn:f">
<ChildItems>
<InputField name="NoteField" id="1">
<DataPath>Object.Note</DataPath>
<Events><Event name="OnChange"><Action>NoteOnChange</Action></Event></Events>
</InputField>
<UsualGroup name="G" id="4">
<ChildItems>
<Button name="Go" id="7"><CommandName>Form.Command.Go</CommandName></Button>
</ChildItems>
</UsualGroup>
</ChildItems>
</Form>"#;

    fn roots() -> Vec<ElementNode> {
        extract_form_tree(&XmlNode::parse(FORM).unwrap(), 0)
    }

    #[test]
    fn builds_tree_with_normalized_paths() {
        let roots = roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].path, "forms[0].elements[0]");
        assert_eq!(roots[1].children[0].path, "forms[0].elements[1].child_items[0]");
        assert_eq!(roots[1].children[0].parent.as_deref(), Some("G"));
    }

    #[test]
    fn properties_and_events_extract() {
        let roots = roots();
        assert_eq!(
            roots[0].properties.get("data_path").map(String::as_str),
            Some("Object.Note")
        );
        assert_eq!(
            roots[0].events.get("OnChange").map(String::as_str),
            Some("NoteOnChange")
        );
    }

    #[test]
    fn snake_case_tags() {
        assert_eq!(snake_case("DataPath"), "data_path");
        assert_eq!(snake_case("ReadOnly"), "read_only");
        assert_eq!(snake_case("Width"), "width");
    }

    #[test]
    fn flatten_and_find() {
        let roots = roots();
        let flat = flatten(&roots);
        assert_eq!(flat.len(), 3);
        assert_eq!(find_path(&roots, "Go"), Some("forms[0].elements[1].child_items[0]"));
        assert_eq!(find_path(&roots, "Nope"), None);
    }
}
