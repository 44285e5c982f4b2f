//! Scalar (flat-collection) diff over descriptor trees.
//!
//! Compares the name-keyed collections of two descriptor sets: processor
//! attributes, tabular sections and their columns, forms, commands,
//! form-local value tables and attributes, templates, and form parameters.
//! Form element trees route through the hierarchical differ.

use indexmap::IndexMap;
use tracing::debug;

use super::changes::{ChangeKind, ElementChange, EntityKind};
use super::extract::extract_form_tree;
use super::tree_diff::diff_trees;
use crate::xmltree::XmlNode;

/// A parsed artifact tree: the root descriptor plus per-form `Form.xml`
/// trees keyed by form name.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub root: XmlNode,
    pub forms: IndexMap<String, XmlNode>,
}

impl DescriptorSet {
    pub fn new(root: XmlNode) -> Self {
        Self {
            root,
            forms: IndexMap::new(),
        }
    }
}

/// Detect every scalar and tree change between two descriptor sets.
pub fn detect_changes(original: &DescriptorSet, modified: &DescriptorSet) -> Vec<ElementChange> {
    let mut differ = Differ {
        changes: Vec::new(),
    };
    differ.compare_forms(original, modified);
    differ.compare_attributes(original, modified);
    differ.compare_tabular_sections(original, modified);
    differ.compare_form_trees(original, modified);
    differ.compare_commands(original, modified);
    differ.compare_value_tables(original, modified);
    differ.compare_form_attributes(original, modified);
    differ.compare_form_parameters(original, modified);
    differ.compare_templates(original, modified);
    debug!(changes = differ.changes.len(), "scalar diff complete");
    differ.changes
}

struct Differ {
    changes: Vec<ElementChange>,
}

type Collection<'a> = IndexMap<String, &'a XmlNode>;

impl Differ {
    // ── Collection plumbing ─────────────────────────────────────────

    fn compare_collections<'a>(
        &mut self,
        original: &Collection<'a>,
        modified: &Collection<'a>,
        entity: EntityKind,
        parent_name: Option<&str>,
        mut detail: impl FnMut(&mut Self, &str, &XmlNode, &XmlNode),
    ) {
        let mut added: Vec<&String> = modified
            .keys()
            .filter(|k| !original.contains_key(*k))
            .collect();
        let mut deleted: Vec<&String> = original
            .keys()
            .filter(|k| !modified.contains_key(*k))
            .collect();

        // Rename detection by structural similarity, first match wins.
        let mut renames: Vec<(String, String)> = Vec::new();
        for old_name in deleted.clone() {
            for new_name in added.clone() {
                if nodes_similar(original[old_name], modified[new_name]) {
                    renames.push((old_name.clone(), new_name.clone()));
                    deleted.retain(|n| *n != old_name);
                    added.retain(|n| *n != new_name);
                    break;
                }
            }
        }
        for (old_name, new_name) in renames {
            let mut change = ElementChange::new(
                ChangeKind::Rename,
                entity,
                format!("//{}[@name='{new_name}']", entity.as_str()),
            );
            change.old_value = Some(old_name);
            change.new_value = Some(new_name);
            change.parent_name = parent_name.map(str::to_string);
            self.changes.push(change);
        }

        for name in added {
            let mut change = ElementChange::new(
                ChangeKind::Add,
                entity,
                format!("//{}[@name='{name}']", entity.as_str()),
            );
            change.new_value = Some(name.clone());
            change.element_name = parent_name.map(str::to_string);
            self.changes.push(change);
        }
        for name in deleted {
            let mut change = ElementChange::new(
                ChangeKind::Delete,
                entity,
                format!("//{}[@name='{name}']", entity.as_str()),
            );
            change.old_value = Some(name.clone());
            change.element_name = parent_name.map(str::to_string);
            self.changes.push(change);
        }

        for (name, old_node) in original {
            if let Some(new_node) = modified.get(name) {
                detail(self, name, old_node, new_node);
            }
        }
    }

    fn push_property_change(
        &mut self,
        entity: EntityKind,
        name: &str,
        property: &str,
        old: impl Into<String>,
        new: impl Into<String>,
    ) {
        let mut change = ElementChange::new(
            ChangeKind::PropertyChange,
            entity,
            format!("//{}[@name='{name}']/{property}", entity.as_str()),
        );
        change.element_name = Some(name.to_string());
        change.property_name = Some(property.to_string());
        change.old_value = Some(old.into());
        change.new_value = Some(new.into());
        self.changes.push(change);
    }

    fn push_type_change(&mut self, entity: EntityKind, name: &str, old: &str, new: &str) {
        let mut change = ElementChange::new(
            ChangeKind::TypeChange,
            entity,
            format!("//{}[@name='{name}']/Type", entity.as_str()),
        );
        change.element_name = Some(name.to_string());
        change.old_value = Some(old.to_string());
        change.new_value = Some(new.to_string());
        self.changes.push(change);
    }

    /// Multilingual compare over languages present on both sides only.
    fn compare_multilang(
        &mut self,
        entity: EntityKind,
        name: &str,
        property_tag: &str,
        old_node: &XmlNode,
        new_node: &XmlNode,
    ) {
        let old: IndexMap<String, String> = old_node.multilang(property_tag).into_iter().collect();
        let new: IndexMap<String, String> = new_node.multilang(property_tag).into_iter().collect();
        let mut old_parts = Vec::new();
        let mut new_parts = Vec::new();
        for (lang, old_text) in &old {
            if let Some(new_text) = new.get(lang) {
                if old_text != new_text {
                    old_parts.push(format!("{lang}:'{old_text}'"));
                    new_parts.push(format!("{lang}:'{new_text}'"));
                }
            }
        }
        if !old_parts.is_empty() {
            self.push_property_change(
                entity,
                name,
                &property_tag.to_lowercase(),
                old_parts.join(", "),
                new_parts.join(", "),
            );
        }
    }

    // ── Collections ─────────────────────────────────────────────────

    fn compare_forms(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for name in modified.forms.keys() {
            if !original.forms.contains_key(name) {
                let mut change =
                    ElementChange::new(ChangeKind::Add, EntityKind::Form, format!("/Forms/{name}"));
                change.new_value = Some(name.clone());
                change.element_name = Some(name.clone());
                self.changes.push(change);
            }
        }
        for name in original.forms.keys() {
            if !modified.forms.contains_key(name) {
                let mut change = ElementChange::new(
                    ChangeKind::Delete,
                    EntityKind::Form,
                    format!("/Forms/{name}"),
                );
                change.old_value = Some(name.clone());
                change.element_name = Some(name.clone());
                self.changes.push(change);
            }
        }
    }

    fn compare_attributes(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        let old = processor_attributes(&original.root);
        let new = processor_attributes(&modified.root);
        self.compare_collections(&old, &new, EntityKind::Attribute, None, |this, name, o, n| {
            let old_type = attribute_type(o);
            let new_type = attribute_type(n);
            if old_type != new_type {
                this.push_type_change(EntityKind::Attribute, name, &old_type, &new_type);
            }
            this.compare_multilang(EntityKind::Attribute, name, "Synonym", o, n);
        });
    }

    fn compare_tabular_sections(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        let old = tabular_sections(&original.root);
        let new = tabular_sections(&modified.root);
        self.compare_collections(
            &old,
            &new,
            EntityKind::TabularSection,
            None,
            |this, name, o, n| {
                this.compare_multilang(EntityKind::TabularSection, name, "Synonym", o, n);
            },
        );
        for (name, old_section) in &old {
            if let Some(new_section) = new.get(name) {
                let old_cols = section_columns(old_section);
                let new_cols = section_columns(new_section);
                self.compare_collections(
                    &old_cols,
                    &new_cols,
                    EntityKind::TabularColumn,
                    Some(name.as_str()),
                    |this, col_name, o, n| {
                        let old_type = attribute_type(o);
                        let new_type = attribute_type(n);
                        if old_type != new_type {
                            this.push_type_change(
                                EntityKind::TabularColumn,
                                col_name,
                                &old_type,
                                &new_type,
                            );
                        }
                    },
                );
            }
        }
    }

    fn compare_form_trees(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for (form_index, (name, old_form)) in original.forms.iter().enumerate() {
            let Some(new_form) = modified.forms.get(name) else {
                continue;
            };
            let old_tree = extract_form_tree(old_form, form_index);
            let new_tree = extract_form_tree(new_form, form_index);
            let delta = diff_trees(&old_tree, &new_tree);

            for rename in delta.renamed {
                let mut change = ElementChange::new(
                    ChangeKind::Rename,
                    EntityKind::FormElement,
                    format!("//Item[@name='{}']", rename.new_name),
                );
                change.old_value = Some(rename.old_name);
                change.new_value = Some(rename.new_name);
                self.changes.push(change);
            }
            // Children of an added or deleted container ride along inside
            // the parent's structural patch; emitting them separately would
            // double-apply the subtree.
            let added_names: rustc_hash::FxHashSet<String> =
                delta.added.iter().map(|n| n.name.clone()).collect();
            let deleted_names: rustc_hash::FxHashSet<String> =
                delta.deleted.iter().map(|n| n.name.clone()).collect();
            for added in delta.added {
                if added
                    .parent
                    .as_ref()
                    .is_some_and(|p| added_names.contains(p))
                {
                    continue;
                }
                let mut change = ElementChange::new(
                    ChangeKind::Add,
                    EntityKind::FormElement,
                    format!("//Item[@name='{}']", added.name),
                );
                change.new_value = Some(added.name.clone());
                change.element_name = Some(added.name);
                change.parent_path = Some(added.path);
                change.insertion_index = Some(added.insertion_index);
                change.depth = added.depth;
                change.parent_name = added.parent;
                self.changes.push(change);
            }
            for deleted in delta.deleted {
                if deleted
                    .parent
                    .as_ref()
                    .is_some_and(|p| deleted_names.contains(p))
                {
                    continue;
                }
                let mut change = ElementChange::new(
                    ChangeKind::Delete,
                    EntityKind::FormElement,
                    format!("//Item[@name='{}']", deleted.name),
                );
                change.old_value = Some(deleted.name.clone());
                change.element_name = Some(deleted.name);
                change.parent_path = Some(deleted.path);
                change.depth = deleted.depth;
                change.parent_name = deleted.parent;
                self.changes.push(change);
            }
            for moved in delta.moved {
                let mut change = ElementChange::new(
                    ChangeKind::PropertyChange,
                    EntityKind::FormElement,
                    format!("//Item[@name='{}']", moved.name),
                );
                change.element_name = Some(moved.name);
                change.property_name = Some("position".into());
                change.old_value = Some(moved.from_path);
                change.new_value = Some(moved.to_path.clone());
                change.parent_path = Some(parent_of(&moved.to_path));
                change.insertion_index = Some(moved.to_index);
                change.parent_name = moved.to_parent;
                self.changes.push(change);
            }
            for modified_entry in delta.modified {
                if let Some((old_type, new_type)) = modified_entry.type_change {
                    self.push_type_change(
                        EntityKind::FormElement,
                        &modified_entry.name,
                        &old_type,
                        &new_type,
                    );
                }
                for prop in modified_entry.properties {
                    self.push_property_change(
                        EntityKind::FormElement,
                        &modified_entry.name,
                        &prop.property,
                        prop.old,
                        prop.new,
                    );
                }
            }
        }
    }

    fn compare_commands(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for (name, old_form) in &original.forms {
            let Some(new_form) = modified.forms.get(name) else {
                continue;
            };
            let old = form_commands(old_form);
            let new = form_commands(new_form);
            self.compare_collections(&old, &new, EntityKind::Command, Some(name.as_str()), |this, cmd, o, n| {
                this.compare_multilang(EntityKind::Command, cmd, "Title", o, n);
                let old_action = o.child_text("Action").unwrap_or_default();
                let new_action = n.child_text("Action").unwrap_or_default();
                if old_action != new_action {
                    this.push_property_change(
                        EntityKind::Command,
                        cmd,
                        "action",
                        old_action,
                        new_action,
                    );
                }
            });
        }
    }

    fn compare_value_tables(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for (name, old_form) in &original.forms {
            let Some(new_form) = modified.forms.get(name) else {
                continue;
            };
            let old = value_tables(old_form);
            let new = value_tables(new_form);
            self.compare_collections(&old, &new, EntityKind::ValueTable, Some(name.as_str()), |_, _, _, _| {});
            for (vt_name, old_vt) in &old {
                if let Some(new_vt) = new.get(vt_name) {
                    let old_cols = value_table_columns(old_vt);
                    let new_cols = value_table_columns(new_vt);
                    self.compare_collections(
                        &old_cols,
                        &new_cols,
                        EntityKind::ValueTableColumn,
                        Some(vt_name.as_str()),
                        |_, _, _, _| {},
                    );
                }
            }
        }
    }

    fn compare_form_attributes(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for (name, old_form) in &original.forms {
            let Some(new_form) = modified.forms.get(name) else {
                continue;
            };
            let old = form_attributes(old_form);
            let new = form_attributes(new_form);
            self.compare_collections(
                &old,
                &new,
                EntityKind::FormAttribute,
                Some(name.as_str()),
                |this, attr, o, n| {
                    let old_type = attribute_type(o);
                    let new_type = attribute_type(n);
                    if old_type != new_type {
                        this.push_type_change(EntityKind::FormAttribute, attr, &old_type, &new_type);
                    }
                    this.compare_multilang(EntityKind::FormAttribute, attr, "Title", o, n);
                },
            );
        }
    }

    fn compare_form_parameters(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        for (name, old_form) in &original.forms {
            let Some(new_form) = modified.forms.get(name) else {
                continue;
            };
            let old = form_parameters(old_form);
            let new = form_parameters(new_form);
            self.compare_collections(
                &old,
                &new,
                EntityKind::FormParameter,
                Some(name.as_str()),
                |this, param, o, n| {
                    let old_type = attribute_type(o);
                    let new_type = attribute_type(n);
                    if old_type != new_type {
                        this.push_type_change(EntityKind::FormParameter, param, &old_type, &new_type);
                    }
                    let old_key = o.child_text("KeyParameter").unwrap_or("false");
                    let new_key = n.child_text("KeyParameter").unwrap_or("false");
                    if old_key != new_key {
                        this.push_property_change(
                            EntityKind::FormParameter,
                            param,
                            "key_parameter",
                            old_key,
                            new_key,
                        );
                    }
                },
            );
        }
    }

    fn compare_templates(&mut self, original: &DescriptorSet, modified: &DescriptorSet) {
        let old = template_names(&original.root);
        let new = template_names(&modified.root);
        for name in &new {
            if !old.contains(name) {
                let mut change = ElementChange::new(
                    ChangeKind::Add,
                    EntityKind::Template,
                    format!("//Template[text()='{name}']"),
                );
                change.new_value = Some(name.clone());
                self.changes.push(change);
            }
        }
        for name in &old {
            if !new.contains(name) {
                let mut change = ElementChange::new(
                    ChangeKind::Delete,
                    EntityKind::Template,
                    format!("//Template[text()='{name}']"),
                );
                change.old_value = Some(name.clone());
                self.changes.push(change);
            }
        }
    }
}

// ── Descriptor accessors ────────────────────────────────────────────

fn processor_children(root: &XmlNode) -> Option<&XmlNode> {
    root.child("ExternalDataProcessor")?.child("ChildObjects")
}

fn named_by_properties<'a>(nodes: Vec<&'a XmlNode>) -> Collection<'a> {
    let mut out = IndexMap::new();
    for node in nodes {
        if let Some(name) = node
            .child("Properties")
            .and_then(|p| p.child_text("Name"))
        {
            out.insert(name.to_string(), node);
        }
    }
    out
}

pub(crate) fn processor_attributes(root: &XmlNode) -> Collection<'_> {
    match processor_children(root) {
        Some(children) => named_by_properties(
            children
                .children
                .iter()
                .filter(|c| c.tag == "Attribute")
                .collect(),
        ),
        None => IndexMap::new(),
    }
}

pub(crate) fn tabular_sections(root: &XmlNode) -> Collection<'_> {
    match processor_children(root) {
        Some(children) => named_by_properties(
            children
                .children
                .iter()
                .filter(|c| c.tag == "TabularSection")
                .collect(),
        ),
        None => IndexMap::new(),
    }
}

pub(crate) fn section_columns<'a>(section: &'a XmlNode) -> Collection<'a> {
    match section.child("ChildObjects") {
        Some(children) => named_by_properties(
            children
                .children
                .iter()
                .filter(|c| c.tag == "Attribute")
                .collect(),
        ),
        None => IndexMap::new(),
    }
}

fn named_by_attr<'a>(nodes: Vec<&'a XmlNode>) -> Collection<'a> {
    let mut out = IndexMap::new();
    for node in nodes {
        if let Some(name) = node.attr("name") {
            out.insert(name.to_string(), node);
        }
    }
    out
}

pub(crate) fn form_commands(form: &XmlNode) -> Collection<'_> {
    match form.child("Commands") {
        Some(commands) => named_by_attr(commands.children.iter().collect()),
        None => IndexMap::new(),
    }
}

fn form_data_attributes(form: &XmlNode) -> Vec<&XmlNode> {
    form.child("Attributes")
        .map(|attrs| attrs.children.iter().filter(|c| c.tag == "Attribute").collect())
        .unwrap_or_default()
}

fn data_type_text(node: &XmlNode) -> String {
    node.child("Type")
        .and_then(|t| t.child_text("Type"))
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn value_tables(form: &XmlNode) -> Collection<'_> {
    named_by_attr(
        form_data_attributes(form)
            .into_iter()
            .filter(|a| data_type_text(a).contains("ValueTable"))
            .collect(),
    )
}

pub(crate) fn value_table_columns<'a>(value_table: &'a XmlNode) -> Collection<'a> {
    let mut out = IndexMap::new();
    if let Some(columns) = value_table.child("Columns") {
        for col in columns.children.iter().filter(|c| c.tag == "Column") {
            if let Some(name) = col.child_text("Name") {
                out.insert(name.to_string(), col);
            }
        }
    }
    out
}

pub(crate) fn form_attributes(form: &XmlNode) -> Collection<'_> {
    named_by_attr(
        form_data_attributes(form)
            .into_iter()
            .filter(|a| {
                let name = a.attr("name").unwrap_or_default();
                let ty = data_type_text(a);
                name != "Object"
                    && !ty.contains("ValueTable")
                    && !ty.contains("ValueTree")
                    && ty != "DynamicList"
            })
            .collect(),
    )
}

pub(crate) fn form_parameters(form: &XmlNode) -> Collection<'_> {
    match form.child("Parameters") {
        Some(params) => named_by_attr(params.children.iter().collect()),
        None => IndexMap::new(),
    }
}

pub(crate) fn template_names(root: &XmlNode) -> Vec<String> {
    match processor_children(root) {
        Some(children) => children
            .children
            .iter()
            .filter(|c| c.tag == "Template")
            .map(|c| c.text.clone())
            .collect(),
        None => Vec::new(),
    }
}

/// Attribute/column/parameter type: last token of the wire type.
pub(crate) fn attribute_type(node: &XmlNode) -> String {
    let text = node
        .find("Type")
        .and_then(|t| t.child("Type").map(|inner| inner.text.clone()))
        .unwrap_or_default();
    text.rsplit(':').next().unwrap_or("unknown").to_string()
}

fn parent_of(path: &str) -> String {
    match path.rfind('[') {
        Some(pos) => path[..pos].to_string(),
        None => path.to_string(),
    }
}

/// Same tag, same child count: candidate for a rename.
fn nodes_similar(a: &XmlNode, b: &XmlNode) -> bool {
    a.tag == b.tag && a.children.len() == b.children.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{ArtifactWriter, prepare_form, render_form_xml, render_root_descriptor};
    use crate::model::{Attribute, DataType, ElementType, Form, FormElement, Processor};

    fn sample_processor() -> Processor {
        let mut p = Processor::new("MyProc");
        let mut attr = Attribute::new("Note", DataType::String);
        attr.length = Some(100);
        p.attributes.push(attr);
        let mut form = Form::new("F");
        form.is_default = true;
        let mut el = FormElement::new(ElementType::InputField, "NoteField");
        el.attribute = Some("Note".into());
        form.elements.push(el);
        p.forms.push(form);
        p
    }

    fn descriptor_set(p: &Processor) -> DescriptorSet {
        let root = XmlNode::parse(&render_root_descriptor(p)).unwrap();
        let mut set = DescriptorSet::new(root);
        for form in &p.forms {
            let prepared = prepare_form(p, form);
            let xml = render_form_xml(p, form, &prepared);
            set.forms
                .insert(form.name.clone(), XmlNode::parse(&xml).unwrap());
        }
        set
    }

    #[test]
    fn identical_sets_have_no_changes() {
        let p = sample_processor();
        let a = descriptor_set(&p);
        let b = descriptor_set(&p);
        assert!(detect_changes(&a, &b).is_empty());
    }

    #[test]
    fn emitted_artifacts_round_trip_cleanly() {
        // generate → parse written files → diff against in-memory render
        let p = sample_processor();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactWriter::new(&p).write(dir.path()).unwrap();

        let mut written = DescriptorSet::new(XmlNode::parse_file(&artifacts.root_xml).unwrap());
        for (name, path) in &artifacts.form_xml {
            written
                .forms
                .insert(name.clone(), XmlNode::parse_file(path).unwrap());
        }
        let rendered = descriptor_set(&p);
        assert!(detect_changes(&rendered, &written).is_empty());
    }

    #[test]
    fn attribute_rename_is_detected() {
        let p = sample_processor();
        let a = descriptor_set(&p);
        let mut renamed = sample_processor();
        renamed.attributes[0].name = "Comment".into();
        renamed.attributes[0].synonym = crate::model::MultiLang::uniform("Comment");
        // keep ids stable so only the name differs
        renamed.attributes[0].id = p.attributes[0].id.clone();
        let b = descriptor_set(&renamed);

        let changes = detect_changes(&a, &b);
        let rename = changes
            .iter()
            .find(|c| c.kind == ChangeKind::Rename && c.entity == EntityKind::Attribute)
            .expect("rename expected");
        assert_eq!(rename.old_value.as_deref(), Some("Note"));
        assert_eq!(rename.new_value.as_deref(), Some("Comment"));
    }

    #[test]
    fn attribute_type_change_is_detected() {
        let p = sample_processor();
        let a = descriptor_set(&p);
        let mut changed = sample_processor();
        changed.attributes[0].data_type = DataType::Number;
        changed.attributes[0].length = None;
        let b = descriptor_set(&changed);
        let changes = detect_changes(&a, &b);
        assert!(
            changes
                .iter()
                .any(|c| c.kind == ChangeKind::TypeChange && c.entity == EntityKind::Attribute)
        );
    }

    #[test]
    fn multilang_compares_common_languages_only() {
        let p = sample_processor();
        let a = descriptor_set(&p);
        let mut changed = sample_processor();
        changed.attributes[0].synonym.en = "Changed".into();
        let b = descriptor_set(&changed);

        let changes = detect_changes(&a, &b);
        let synonym_changes: Vec<_> = changes
            .iter()
            .filter(|c| c.property_name.as_deref() == Some("synonym"))
            .collect();
        assert_eq!(synonym_changes.len(), 1);
        assert!(synonym_changes[0].new_value.as_deref().unwrap().contains("en:'Changed'"));
        assert!(!synonym_changes[0].new_value.as_deref().unwrap().contains("ru:"));
    }

    #[test]
    fn form_element_delete_is_detected_with_parent_path() {
        let p = sample_processor();
        let a = descriptor_set(&p);
        let mut without = sample_processor();
        without.forms[0].elements.clear();
        let b = descriptor_set(&without);

        let changes = detect_changes(&a, &b);
        let delete = changes
            .iter()
            .find(|c| c.kind == ChangeKind::Delete && c.entity == EntityKind::FormElement)
            .expect("delete expected");
        assert_eq!(delete.old_value.as_deref(), Some("NoteField"));
        assert_eq!(delete.parent_path.as_deref(), Some("forms[0].elements"));
    }
}
