//! Change mapping: from detected differences to concrete patches.
//!
//! Every XML or handler delta becomes one of three patch shapes: a scalar
//! YAML patch, a structural YAML patch, or a handler patch. Renames fan out
//! to the form elements referencing the old name. Moves are surfaced for
//! review but produce no YAML patch — a positional pseudo-property would
//! pollute the declarative source.

use serde_yaml::{Mapping as SerdeMapping, Value};
use tracing::{debug, warn};

use super::changes::{
    ChangeKind, ElementChange, EntityKind, Patch, ScalarPatch, StructuralOp, StructuralPatch,
};
use super::scalar_diff::{
    DescriptorSet, processor_attributes, section_columns, tabular_sections, value_tables,
};
use crate::handlers::{HandlerChange, HandlerPatch};
use crate::xmltree::XmlNode;
use crate::ydoc::{Document, YamlValue};

/// Maps detected changes into patches against one loaded config document.
pub struct ChangeMapper<'a> {
    config: &'a Document,
}

impl<'a> ChangeMapper<'a> {
    pub fn new(config: &'a Document) -> Self {
        Self { config }
    }

    /// Map XML-side changes. `modified` supplies entity content for
    /// structural adds.
    pub fn map_changes(
        &self,
        changes: &[ElementChange],
        modified: &DescriptorSet,
    ) -> (Vec<Patch>, Vec<String>) {
        let mut patches = Vec::new();
        let mut notes = Vec::new();
        for change in changes {
            match self.map_one(change, modified) {
                Mapped::Patches(mut p) => patches.append(&mut p),
                Mapped::Note(note) => notes.push(note),
                Mapped::Nothing => {
                    debug!(change = %change, "change has no mapping");
                }
            }
        }
        (patches, notes)
    }

    /// Handler deltas map one-to-one onto handler patches.
    pub fn map_handler_changes(changes: &[HandlerChange]) -> Vec<Patch> {
        changes
            .iter()
            .map(|change| {
                Patch::Handler(match change {
                    HandlerChange::Added { name, new_body } => HandlerPatch::Add {
                        name: name.clone(),
                        body: new_body.clone(),
                    },
                    HandlerChange::Deleted { name, .. } => {
                        HandlerPatch::Delete { name: name.clone() }
                    }
                    HandlerChange::Modified {
                        name,
                        old_body,
                        new_body,
                    } => HandlerPatch::Modify {
                        name: name.clone(),
                        new_body: new_body.clone(),
                        old_body: Some(old_body.clone()),
                    },
                })
            })
            .collect()
    }

    fn map_one(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        match change.entity {
            EntityKind::Attribute => self.map_attribute(change, modified),
            EntityKind::FormElement => self.map_form_element(change, modified),
            EntityKind::Command => self.map_command(change, modified),
            EntityKind::TabularSection => self.map_tabular_section(change, modified),
            EntityKind::TabularColumn => self.map_tabular_column(change, modified),
            EntityKind::ValueTable => self.map_value_table(change, modified),
            EntityKind::ValueTableColumn => Mapped::Nothing,
            EntityKind::FormAttribute => self.map_form_attribute(change),
            EntityKind::FormParameter => self.map_form_parameter(change),
            EntityKind::Form => self.map_form(change),
            EntityKind::Template => self.map_template(change),
        }
    }

    // ── Attributes ──────────────────────────────────────────────────

    fn map_attribute(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        match change.kind {
            ChangeKind::Rename => {
                let (Some(old), Some(new)) = (&change.old_value, &change.new_value) else {
                    return Mapped::Nothing;
                };
                let mut patches = Vec::new();
                if let Some(idx) = self.find_index("attributes", old) {
                    patches.push(scalar(
                        format!("attributes[{idx}].name"),
                        Some(old.clone()),
                        new.clone(),
                        "attributes",
                        old,
                    ));
                }
                // Fan out to every element whose binding referenced the
                // old name.
                for path in self.element_paths_bound_to(old) {
                    patches.push(scalar(
                        format!("{path}.attribute"),
                        Some(old.clone()),
                        new.clone(),
                        "forms",
                        old,
                    ));
                }
                Mapped::Patches(patches)
            }
            ChangeKind::TypeChange => self.scalar_on_index(
                "attributes",
                change,
                "type",
                map_wire_type(change.new_value.as_deref().unwrap_or("")),
            ),
            ChangeKind::PropertyChange => {
                let field = change.property_name.clone().unwrap_or_default();
                self.scalar_on_index(
                    "attributes",
                    change,
                    &field,
                    change.new_value.clone().unwrap_or_default(),
                )
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let data = processor_attributes(&modified.root)
                    .get(name.as_str())
                    .map(|node| attribute_data(node));
                Mapped::Patches(vec![structural_add(
                    EntityKind::Attribute,
                    name,
                    "attributes",
                    None,
                    data,
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::Attribute,
                    name,
                    "attributes",
                )])
            }
        }
    }

    // ── Form elements ───────────────────────────────────────────────

    fn map_form_element(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        match change.kind {
            ChangeKind::Rename => {
                let (Some(old), Some(new)) = (&change.old_value, &change.new_value) else {
                    return Mapped::Nothing;
                };
                let Some(path) = self.find_element_path(old) else {
                    warn!(element = %old, "renamed element not present in config");
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![scalar(
                    format!("{path}.name"),
                    Some(old.clone()),
                    new.clone(),
                    "forms",
                    old,
                )])
            }
            ChangeKind::PropertyChange => {
                let property = change.property_name.as_deref().unwrap_or_default();
                if property == "position" {
                    return Mapped::Note(format!(
                        "element {:?} moved: {} -> {} (review manually; layout \
                         moves are not mapped onto the declarative source)",
                        change.element_name.as_deref().unwrap_or(""),
                        change.old_value.as_deref().unwrap_or(""),
                        change.new_value.as_deref().unwrap_or(""),
                    ));
                }
                if property == "data_path" {
                    // Derived from bindings; the binding patch covers it.
                    return Mapped::Nothing;
                }
                let Some(name) = &change.element_name else {
                    return Mapped::Nothing;
                };
                let Some(path) = self.find_element_path(name) else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![scalar(
                    format!("{path}.{property}"),
                    change.old_value.clone(),
                    change.new_value.clone().unwrap_or_default(),
                    "forms",
                    name,
                )])
            }
            ChangeKind::TypeChange => {
                let Some(name) = &change.element_name else {
                    return Mapped::Nothing;
                };
                let Some(path) = self.find_element_path(name) else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![scalar(
                    format!("{path}.type"),
                    change.old_value.clone(),
                    change.new_value.clone().unwrap_or_default(),
                    "forms",
                    name,
                )])
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let data = find_form_element(modified, name).map(form_element_data);
                Mapped::Patches(vec![Patch::Structural(StructuralPatch {
                    op: StructuralOp::Add,
                    entity: EntityKind::FormElement,
                    name: name.clone(),
                    parent_path: change
                        .parent_path
                        .clone()
                        .unwrap_or_else(|| "forms[0].elements".into()),
                    insertion_index: change.insertion_index,
                    element_data: data,
                    depth: change.depth,
                })])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![Patch::Structural(StructuralPatch {
                    op: StructuralOp::Delete,
                    entity: EntityKind::FormElement,
                    name: name.clone(),
                    parent_path: self
                        .find_element_path(name)
                        .map(|p| parent_of(&p))
                        .or_else(|| change.parent_path.clone())
                        .unwrap_or_else(|| "forms[0].elements".into()),
                    insertion_index: None,
                    element_data: None,
                    depth: change.depth,
                })])
            }
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    fn map_command(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        match change.kind {
            ChangeKind::Rename => {
                let (Some(old), Some(new)) = (&change.old_value, &change.new_value) else {
                    return Mapped::Nothing;
                };
                match self.find_command_path(old) {
                    Some(path) => Mapped::Patches(vec![scalar(
                        format!("{path}.name"),
                        Some(old.clone()),
                        new.clone(),
                        "forms",
                        old,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            ChangeKind::PropertyChange => {
                let Some(name) = &change.element_name else {
                    return Mapped::Nothing;
                };
                let Some(path) = self.find_command_path(name) else {
                    return Mapped::Nothing;
                };
                let field = change.property_name.clone().unwrap_or_default();
                Mapped::Patches(vec![scalar(
                    format!("{path}.{field}"),
                    change.old_value.clone(),
                    change.new_value.clone().unwrap_or_default(),
                    "forms",
                    name,
                )])
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let form_idx = change
                    .element_name
                    .as_deref()
                    .and_then(|form| self.find_index("forms", form))
                    .unwrap_or(0);
                let data = modified
                    .forms
                    .values()
                    .find_map(|form| {
                        super::scalar_diff::form_commands(form)
                            .get(name.as_str())
                            .map(|node| command_data(node))
                    });
                Mapped::Patches(vec![structural_add(
                    EntityKind::Command,
                    name,
                    &format!("forms[{form_idx}].commands"),
                    None,
                    data,
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                let parent = self
                    .find_command_path(name)
                    .map(|p| parent_of(&p))
                    .unwrap_or_else(|| "forms[0].commands".into());
                Mapped::Patches(vec![structural_delete(EntityKind::Command, name, &parent)])
            }
            ChangeKind::TypeChange => Mapped::Nothing,
        }
    }

    // ── Tabular sections and columns ────────────────────────────────

    fn map_tabular_section(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        match change.kind {
            ChangeKind::Rename => {
                let (Some(old), Some(new)) = (&change.old_value, &change.new_value) else {
                    return Mapped::Nothing;
                };
                match self.find_index("tabular_sections", old) {
                    Some(idx) => Mapped::Patches(vec![scalar(
                        format!("tabular_sections[{idx}].name"),
                        Some(old.clone()),
                        new.clone(),
                        "tabular_sections",
                        old,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            ChangeKind::PropertyChange => {
                let field = change.property_name.clone().unwrap_or_default();
                self.scalar_on_index(
                    "tabular_sections",
                    change,
                    &field,
                    change.new_value.clone().unwrap_or_default(),
                )
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let data = tabular_sections(&modified.root)
                    .get(name.as_str())
                    .map(|node| tabular_section_data(node));
                Mapped::Patches(vec![structural_add(
                    EntityKind::TabularSection,
                    name,
                    "tabular_sections",
                    None,
                    data,
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::TabularSection,
                    name,
                    "tabular_sections",
                )])
            }
            ChangeKind::TypeChange => Mapped::Nothing,
        }
    }

    fn map_tabular_column(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        let Some(section) = change
            .element_name
            .clone()
            .or_else(|| change.parent_name.clone())
        else {
            return Mapped::Nothing;
        };
        let Some(section_idx) = self.find_index("tabular_sections", &section) else {
            return Mapped::Nothing;
        };
        let columns_path = format!("tabular_sections[{section_idx}].columns");
        match change.kind {
            ChangeKind::Rename => {
                let (Some(old), Some(new)) = (&change.old_value, &change.new_value) else {
                    return Mapped::Nothing;
                };
                match self.find_index_at(&columns_path, old) {
                    Some(idx) => Mapped::Patches(vec![scalar(
                        format!("{columns_path}[{idx}].name"),
                        Some(old.clone()),
                        new.clone(),
                        "tabular_sections",
                        old,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            ChangeKind::TypeChange => {
                let Some(col) = &change.element_name else {
                    return Mapped::Nothing;
                };
                match self.find_index_at(&columns_path, col) {
                    Some(idx) => Mapped::Patches(vec![scalar(
                        format!("{columns_path}[{idx}].type"),
                        change.old_value.clone(),
                        map_wire_type(change.new_value.as_deref().unwrap_or("")),
                        "tabular_sections",
                        col,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let data = tabular_sections(&modified.root)
                    .get(section.as_str())
                    .and_then(|s| section_columns(s).get(name.as_str()).map(|n| attribute_data(n)));
                Mapped::Patches(vec![structural_add(
                    EntityKind::TabularColumn,
                    name,
                    &columns_path,
                    None,
                    data,
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::TabularColumn,
                    name,
                    &columns_path,
                )])
            }
            ChangeKind::PropertyChange => Mapped::Nothing,
        }
    }

    // ── Form-local data ─────────────────────────────────────────────

    fn map_value_table(&self, change: &ElementChange, modified: &DescriptorSet) -> Mapped {
        let form_idx = change
            .element_name
            .as_deref()
            .and_then(|form| self.find_index("forms", form))
            .unwrap_or(0);
        let parent = format!("forms[{form_idx}].value_tables");
        match change.kind {
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let data = modified
                    .forms
                    .values()
                    .find_map(|form| {
                        value_tables(form)
                            .get(name.as_str())
                            .map(|node| value_table_data(node))
                    });
                Mapped::Patches(vec![structural_add(
                    EntityKind::ValueTable,
                    name,
                    &parent,
                    None,
                    data,
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(EntityKind::ValueTable, name, &parent)])
            }
            _ => Mapped::Nothing,
        }
    }

    fn map_form_attribute(&self, change: &ElementChange) -> Mapped {
        let form_idx = change
            .element_name
            .as_deref()
            .and_then(|form| self.find_index("forms", form))
            .unwrap_or(0);
        let parent = format!("forms[{form_idx}].form_attributes");
        match change.kind {
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let mut map = SerdeMapping::new();
                map.insert(Value::from("name"), Value::from(name.clone()));
                Mapped::Patches(vec![structural_add(
                    EntityKind::FormAttribute,
                    name,
                    &parent,
                    None,
                    Some(Value::Mapping(map)),
                )])
            }
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::FormAttribute,
                    name,
                    &parent,
                )])
            }
            ChangeKind::TypeChange => {
                let Some(name) = &change.element_name else {
                    return Mapped::Nothing;
                };
                match self.find_index_at(&parent, name) {
                    Some(idx) => Mapped::Patches(vec![scalar(
                        format!("{parent}[{idx}].type"),
                        change.old_value.clone(),
                        change.new_value.clone().unwrap_or_default(),
                        "forms",
                        name,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            _ => Mapped::Nothing,
        }
    }

    fn map_form_parameter(&self, change: &ElementChange) -> Mapped {
        let form_idx = change
            .element_name
            .as_deref()
            .and_then(|form| self.find_index("forms", form))
            .unwrap_or(0);
        let parent = format!("forms[{form_idx}].parameters");
        match change.kind {
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::FormParameter,
                    name,
                    &parent,
                )])
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let mut map = SerdeMapping::new();
                map.insert(Value::from("name"), Value::from(name.clone()));
                Mapped::Patches(vec![structural_add(
                    EntityKind::FormParameter,
                    name,
                    &parent,
                    None,
                    Some(Value::Mapping(map)),
                )])
            }
            ChangeKind::PropertyChange | ChangeKind::TypeChange => {
                let Some(name) = &change.element_name else {
                    return Mapped::Nothing;
                };
                let field = match change.kind {
                    ChangeKind::TypeChange => "type".to_string(),
                    _ => change.property_name.clone().unwrap_or_default(),
                };
                match self.find_index_at(&parent, name) {
                    Some(idx) => Mapped::Patches(vec![scalar(
                        format!("{parent}[{idx}].{field}"),
                        change.old_value.clone(),
                        change.new_value.clone().unwrap_or_default(),
                        "forms",
                        name,
                    )]),
                    None => Mapped::Nothing,
                }
            }
            ChangeKind::Rename => Mapped::Nothing,
        }
    }

    fn map_form(&self, change: &ElementChange) -> Mapped {
        match change.kind {
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(EntityKind::Form, name, "forms")])
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let mut map = SerdeMapping::new();
                map.insert(Value::from("name"), Value::from(name.clone()));
                Mapped::Patches(vec![structural_add(
                    EntityKind::Form,
                    name,
                    "forms",
                    None,
                    Some(Value::Mapping(map)),
                )])
            }
            _ => Mapped::Nothing,
        }
    }

    fn map_template(&self, change: &ElementChange) -> Mapped {
        match change.kind {
            ChangeKind::Delete => {
                let Some(name) = &change.old_value else {
                    return Mapped::Nothing;
                };
                Mapped::Patches(vec![structural_delete(
                    EntityKind::Template,
                    name,
                    "templates",
                )])
            }
            ChangeKind::Add => {
                let Some(name) = &change.new_value else {
                    return Mapped::Nothing;
                };
                let mut map = SerdeMapping::new();
                map.insert(Value::from("name"), Value::from(name.clone()));
                Mapped::Patches(vec![structural_add(
                    EntityKind::Template,
                    name,
                    "templates",
                    None,
                    Some(Value::Mapping(map)),
                )])
            }
            _ => Mapped::Nothing,
        }
    }

    // ── Config lookups ──────────────────────────────────────────────

    fn scalar_on_index(
        &self,
        section: &str,
        change: &ElementChange,
        field: &str,
        new_value: String,
    ) -> Mapped {
        let Some(name) = &change.element_name else {
            return Mapped::Nothing;
        };
        match self.find_index(section, name) {
            Some(idx) => Mapped::Patches(vec![scalar(
                format!("{section}[{idx}].{field}"),
                change.old_value.clone(),
                new_value,
                section,
                name,
            )]),
            None => {
                warn!(section, name = %name, "entity not found in config");
                Mapped::Nothing
            }
        }
    }

    fn find_index(&self, section: &str, name: &str) -> Option<usize> {
        self.find_index_at(section, name)
    }

    /// Index of the named entry of the sequence at a dotted path.
    fn find_index_at(&self, path: &str, name: &str) -> Option<usize> {
        let parsed = crate::ydoc::Path::parse(path).ok()?;
        let seq = crate::ydoc::resolve(&self.config.body, &parsed)?.as_sequence()?;
        seq.items.iter().position(|i| i.value.name() == Some(name))
    }

    /// Dotted path of a form element by name, searching nested children.
    fn find_element_path(&self, name: &str) -> Option<String> {
        let forms = self
            .config
            .body
            .as_mapping()?
            .get("forms")?
            .as_sequence()?;
        for (form_idx, form) in forms.items.iter().enumerate() {
            let Some(elements) = form
                .value
                .as_mapping()
                .and_then(|m| m.get("elements"))
                .and_then(YamlValue::as_sequence)
            else {
                continue;
            };
            for (idx, item) in elements.items.iter().enumerate() {
                let path = format!("forms[{form_idx}].elements[{idx}]");
                if let Some(found) = find_element_rec(&path, &item.value, name) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn find_command_path(&self, name: &str) -> Option<String> {
        let forms = self
            .config
            .body
            .as_mapping()?
            .get("forms")?
            .as_sequence()?;
        for (form_idx, form) in forms.items.iter().enumerate() {
            let Some(commands) = form
                .value
                .as_mapping()
                .and_then(|m| m.get("commands"))
                .and_then(YamlValue::as_sequence)
            else {
                continue;
            };
            for (idx, item) in commands.items.iter().enumerate() {
                if item.value.name() == Some(name) {
                    return Some(format!("forms[{form_idx}].commands[{idx}]"));
                }
            }
        }
        None
    }

    /// Paths of every element whose `attribute` field equals `name`.
    fn element_paths_bound_to(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let Some(forms) = self
            .config
            .body
            .as_mapping()
            .and_then(|m| m.get("forms"))
            .and_then(YamlValue::as_sequence)
        else {
            return out;
        };
        for (form_idx, form) in forms.items.iter().enumerate() {
            let Some(elements) = form
                .value
                .as_mapping()
                .and_then(|m| m.get("elements"))
                .and_then(YamlValue::as_sequence)
            else {
                continue;
            };
            for (idx, item) in elements.items.iter().enumerate() {
                let path = format!("forms[{form_idx}].elements[{idx}]");
                collect_bound_paths(&path, &item.value, name, &mut out);
            }
        }
        out
    }
}

enum Mapped {
    Patches(Vec<Patch>),
    Note(String),
    Nothing,
}

fn scalar(
    path: String,
    old_value: Option<String>,
    new_value: String,
    section: &str,
    element_name: &str,
) -> Patch {
    Patch::Scalar(ScalarPatch {
        path,
        old_value,
        new_value,
        section: section.to_string(),
        element_name: Some(element_name.to_string()),
    })
}

fn structural_add(
    entity: EntityKind,
    name: &str,
    parent_path: &str,
    insertion_index: Option<usize>,
    element_data: Option<Value>,
) -> Patch {
    Patch::Structural(StructuralPatch {
        op: StructuralOp::Add,
        entity,
        name: name.to_string(),
        parent_path: parent_path.to_string(),
        insertion_index,
        element_data,
        depth: 0,
    })
}

fn structural_delete(entity: EntityKind, name: &str, parent_path: &str) -> Patch {
    Patch::Structural(StructuralPatch {
        op: StructuralOp::Delete,
        entity,
        name: name.to_string(),
        parent_path: parent_path.to_string(),
        insertion_index: None,
        element_data: None,
        depth: 0,
    })
}

fn find_element_rec(path: &str, element: &YamlValue, name: &str) -> Option<String> {
    if element.name() == Some(name) {
        return Some(path.to_string());
    }
    for key in ["child_items", "elements", "pages"] {
        if let Some(children) = element
            .as_mapping()
            .and_then(|m| m.get(key))
            .and_then(YamlValue::as_sequence)
        {
            for (idx, child) in children.items.iter().enumerate() {
                let child_path = format!("{path}.{key}[{idx}]");
                if let Some(found) = find_element_rec(&child_path, &child.value, name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn collect_bound_paths(path: &str, element: &YamlValue, attr: &str, out: &mut Vec<String>) {
    if element
        .as_mapping()
        .and_then(|m| m.get("attribute"))
        .and_then(YamlValue::as_str)
        == Some(attr)
    {
        out.push(path.to_string());
    }
    for key in ["child_items", "elements", "pages"] {
        if let Some(children) = element
            .as_mapping()
            .and_then(|m| m.get(key))
            .and_then(YamlValue::as_sequence)
        {
            for (idx, child) in children.items.iter().enumerate() {
                let child_path = format!("{path}.{key}[{idx}]");
                collect_bound_paths(&child_path, &child.value, attr, out);
            }
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('[') {
        Some(pos) => path[..pos].to_string(),
        None => path.to_string(),
    }
}

// ── Entity-data reconstruction from modified descriptors ────────────

/// Wire type → declarative type tag.
fn map_wire_type(wire: &str) -> String {
    match wire {
        "decimal" | "double" | "float" => "number".into(),
        "dateTime" | "date" => "date".into(),
        "string" | "boolean" | "number" => wire.into(),
        other => {
            if let Some(name) = other.strip_prefix("CatalogRef.") {
                format!("Catalog({name})")
            } else if let Some(name) = other.strip_prefix("DocumentRef.") {
                format!("Document({name})")
            } else {
                other.to_string()
            }
        }
    }
}

fn attribute_data(node: &XmlNode) -> Value {
    let mut map = SerdeMapping::new();
    let props = node.child("Properties");
    let name = props
        .and_then(|p| p.child_text("Name"))
        .unwrap_or("NewAttribute");
    map.insert(Value::from("name"), Value::from(name));
    map.insert(
        Value::from("type"),
        Value::from(map_wire_type(&super::scalar_diff::attribute_type(node))),
    );
    if let Some(props) = props {
        if let Some(len) = props.find("Length").map(|n| n.text.clone()) {
            if let Ok(len) = len.parse::<u64>() {
                if len > 0 {
                    map.insert(Value::from("length"), Value::from(len));
                }
            }
        }
        if let Some(digits) = props.find("Digits").and_then(|n| n.text.parse::<u64>().ok()) {
            map.insert(Value::from("digits"), Value::from(digits));
        }
        if let Some(fraction) = props
            .find("FractionDigits")
            .and_then(|n| n.text.parse::<u64>().ok())
        {
            if fraction > 0 {
                map.insert(Value::from("fraction_digits"), Value::from(fraction));
            }
        }
        for (lang, content) in props.multilang("Synonym") {
            map.insert(Value::from(format!("synonym_{lang}")), Value::from(content));
        }
    }
    Value::Mapping(map)
}

fn tabular_section_data(node: &XmlNode) -> Value {
    let mut map = SerdeMapping::new();
    let name = node
        .child("Properties")
        .and_then(|p| p.child_text("Name"))
        .unwrap_or("NewSection");
    map.insert(Value::from("name"), Value::from(name));
    let columns: Vec<Value> = section_columns(node)
        .values()
        .map(|col| attribute_data(col))
        .collect();
    if !columns.is_empty() {
        map.insert(Value::from("columns"), Value::Sequence(columns));
    }
    Value::Mapping(map)
}

fn command_data(node: &XmlNode) -> Value {
    let mut map = SerdeMapping::new();
    let name = node.attr("name").unwrap_or("NewCommand");
    map.insert(Value::from("name"), Value::from(name));
    for (lang, content) in node.multilang("Title") {
        map.insert(Value::from(format!("title_{lang}")), Value::from(content));
    }
    if let Some(action) = node.child_text("Action") {
        map.insert(Value::from("action"), Value::from(action));
    }
    Value::Mapping(map)
}

fn value_table_data(node: &XmlNode) -> Value {
    let mut map = SerdeMapping::new();
    let name = node.attr("name").unwrap_or("NewTable");
    map.insert(Value::from("name"), Value::from(name));
    let columns: Vec<Value> = super::scalar_diff::value_table_columns(node)
        .iter()
        .map(|(col_name, col)| {
            let mut col_map = SerdeMapping::new();
            col_map.insert(Value::from("name"), Value::from(col_name.clone()));
            if let Some(ty) = col.child_text("Type") {
                col_map.insert(
                    Value::from("type"),
                    Value::from(map_wire_type(ty.rsplit(':').next().unwrap_or(ty))),
                );
            }
            Value::Mapping(col_map)
        })
        .collect();
    if !columns.is_empty() {
        map.insert(Value::from("columns"), Value::Sequence(columns));
    }
    Value::Mapping(map)
}

/// Find a named element anywhere in any modified form tree.
fn find_form_element<'a>(modified: &'a DescriptorSet, name: &str) -> Option<&'a XmlNode> {
    for form in modified.forms.values() {
        if let Some(container) = form.child("ChildItems") {
            if let Some(found) = find_element_xml(container, name) {
                return Some(found);
            }
        }
    }
    None
}

fn find_element_xml<'a>(container: &'a XmlNode, name: &str) -> Option<&'a XmlNode> {
    for child in &container.children {
        if child.attr("name") == Some(name) {
            return Some(child);
        }
        if let Some(inner) = child.child("ChildItems") {
            if let Some(found) = find_element_xml(inner, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Reconstruct declarative element data from a descriptor node, children
/// included.
fn form_element_data(node: &XmlNode) -> Value {
    let mut map = SerdeMapping::new();
    map.insert(Value::from("type"), Value::from(node.tag.clone()));
    map.insert(
        Value::from("name"),
        Value::from(node.attr("name").unwrap_or("NewElement")),
    );
    if let Some(data_path) = node.child_text("DataPath") {
        let attr = data_path.rsplit('.').next().unwrap_or(data_path);
        map.insert(Value::from("attribute"), Value::from(attr));
    }
    if let Some(command) = node.child_text("CommandName") {
        let cmd = command.rsplit('.').next().unwrap_or(command);
        map.insert(Value::from("command"), Value::from(cmd));
    }
    for (lang, content) in node.multilang("Title") {
        map.insert(Value::from(format!("title_{lang}")), Value::from(content));
    }
    if let Some(read_only) = node.child_text("ReadOnly") {
        map.insert(Value::from("read_only"), Value::from(read_only == "true"));
    }
    let events: SerdeMapping = node
        .child("Events")
        .map(|container| {
            container
                .children
                .iter()
                .filter_map(|e| {
                    Some((
                        Value::from(e.attr("name")?),
                        Value::from(e.child_text("Action")?),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
    if !events.is_empty() {
        map.insert(Value::from("events"), Value::Mapping(events));
    }
    if let Some(children) = node.child("ChildItems") {
        let items: Vec<Value> = children
            .children
            .iter()
            .filter(|c| c.attr("name").is_some())
            .map(form_element_data)
            .collect();
        if !items.is_empty() {
            map.insert(Value::from("child_items"), Value::Sequence(items));
        }
    }
    Value::Mapping(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{prepare_form, render_form_xml, render_root_descriptor};
    use crate::model::{Attribute, DataType, ElementType, Form, FormElement, Processor};
    use crate::ydoc;

    const CONFIG: &str = "\
processor:
  name: MyProc
attributes:
- name: Note
  type: string
forms:
- name: F
  default: true
  elements:
  - type: InputField
    name: NoteField
    attribute: Note
  commands:
  - name: Go
    action: GoHandler
";

    fn descriptor_set(p: &Processor) -> DescriptorSet {
        let root = XmlNode::parse(&render_root_descriptor(p)).unwrap();
        let mut set = DescriptorSet::new(root);
        for form in &p.forms {
            let prepared = prepare_form(p, form);
            set.forms.insert(
                form.name.clone(),
                XmlNode::parse(&render_form_xml(p, form, &prepared)).unwrap(),
            );
        }
        set
    }

    fn empty_set() -> DescriptorSet {
        DescriptorSet::new(XmlNode::parse("<MetaDataObject/>").unwrap())
    }

    #[test]
    fn attribute_rename_fans_out_to_bound_elements() {
        let doc = ydoc::parse(CONFIG).unwrap();
        let mapper = ChangeMapper::new(&doc);

        let mut change = ElementChange::new(ChangeKind::Rename, EntityKind::Attribute, "//x");
        change.old_value = Some("Note".into());
        change.new_value = Some("Comment".into());

        let (patches, _) = mapper.map_changes(&[change], &empty_set());
        assert_eq!(patches.len(), 2);
        let paths: Vec<&str> = patches
            .iter()
            .filter_map(|p| match p {
                Patch::Scalar(s) => Some(s.path.as_str()),
                _ => None,
            })
            .collect();
        assert!(paths.contains(&"attributes[0].name"));
        assert!(paths.contains(&"forms[0].elements[0].attribute"));
    }

    #[test]
    fn moved_elements_become_review_notes() {
        let doc = ydoc::parse(CONFIG).unwrap();
        let mapper = ChangeMapper::new(&doc);
        let mut change =
            ElementChange::new(ChangeKind::PropertyChange, EntityKind::FormElement, "//x");
        change.element_name = Some("NoteField".into());
        change.property_name = Some("position".into());
        change.old_value = Some("forms[0].elements[0]".into());
        change.new_value = Some("forms[0].elements[1]".into());

        let (patches, notes) = mapper.map_changes(&[change], &empty_set());
        assert!(patches.is_empty());
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("NoteField"));
    }

    #[test]
    fn element_add_reconstructs_nested_data() {
        // build a modified tree with a button group holding two buttons
        let mut p = Processor::new("MyProc");
        p.attributes.push(Attribute::new("Note", DataType::String));
        let mut form = Form::new("F");
        let mut group = FormElement::new(ElementType::ButtonGroup, "BG");
        let mut b1 = FormElement::new(ElementType::Button, "B1");
        b1.command = Some("Go".into());
        let mut b2 = FormElement::new(ElementType::Button, "B2");
        b2.command = Some("Go".into());
        group.children.push(b1);
        group.children.push(b2);
        form.elements.push(group);
        p.forms.push(form);
        let modified = descriptor_set(&p);

        let doc = ydoc::parse(CONFIG).unwrap();
        let mapper = ChangeMapper::new(&doc);
        let mut change = ElementChange::new(ChangeKind::Add, EntityKind::FormElement, "//x");
        change.new_value = Some("BG".into());
        change.parent_path = Some("forms[0].elements".into());
        change.insertion_index = Some(1);

        let (patches, _) = mapper.map_changes(&[change], &modified);
        let Patch::Structural(patch) = &patches[0] else {
            panic!("expected structural patch");
        };
        assert_eq!(patch.parent_path, "forms[0].elements");
        assert_eq!(patch.insertion_index, Some(1));
        let data = patch.element_data.as_ref().unwrap();
        let children = data.get("child_items").and_then(Value::as_sequence).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[0].get("command").and_then(Value::as_str),
            Some("Go")
        );
    }

    #[test]
    fn handler_changes_map_one_to_one() {
        let changes = vec![HandlerChange::Modified {
            name: "F_OnOpen".into(),
            old_body: "Procedure F_OnOpen()\nEndProcedure".into(),
            new_body: "Procedure F_OnOpen()\nX = 1;\nEndProcedure".into(),
        }];
        let patches = ChangeMapper::map_handler_changes(&changes);
        assert!(matches!(
            &patches[0],
            Patch::Handler(HandlerPatch::Modify { name, .. }) if name == "F_OnOpen"
        ));
    }

    #[test]
    fn wire_types_map_to_declarative_tags() {
        assert_eq!(map_wire_type("decimal"), "number");
        assert_eq!(map_wire_type("dateTime"), "date");
        assert_eq!(map_wire_type("string"), "string");
        assert_eq!(map_wire_type("CatalogRef.Goods"), "Catalog(Goods)");
    }
}
