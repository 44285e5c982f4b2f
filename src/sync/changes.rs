//! Change and patch value types shared across the reverse path.

use serde_yaml::Value;

use crate::handlers::HandlerPatch;

/// What happened to an entity between the snapshot and the edited export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Rename,
    PropertyChange,
    TypeChange,
}

/// Which collection the entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Attribute,
    FormElement,
    Command,
    TabularSection,
    TabularColumn,
    ValueTable,
    ValueTableColumn,
    FormAttribute,
    Form,
    Template,
    FormParameter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Attribute => "attribute",
            EntityKind::FormElement => "form_element",
            EntityKind::Command => "command",
            EntityKind::TabularSection => "tabular_section",
            EntityKind::TabularColumn => "tabular_section_column",
            EntityKind::ValueTable => "value_table",
            EntityKind::ValueTableColumn => "value_table_column",
            EntityKind::FormAttribute => "form_attribute",
            EntityKind::Form => "form",
            EntityKind::Template => "template",
            EntityKind::FormParameter => "form_parameter",
        }
    }
}

/// One detected difference, positioned well enough for the mapper to find
/// its home in the declarative source.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementChange {
    pub kind: ChangeKind,
    pub entity: EntityKind,
    pub xpath: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub element_name: Option<String>,
    pub property_name: Option<String>,
    pub parent_path: Option<String>,
    pub insertion_index: Option<usize>,
    pub depth: usize,
    pub parent_name: Option<String>,
}

impl ElementChange {
    pub fn new(kind: ChangeKind, entity: EntityKind, xpath: impl Into<String>) -> Self {
        Self {
            kind,
            entity,
            xpath: xpath.into(),
            old_value: None,
            new_value: None,
            element_name: None,
            property_name: None,
            parent_path: None,
            insertion_index: None,
            depth: 0,
            parent_name: None,
        }
    }
}

impl std::fmt::Display for ElementChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entity = self.entity.as_str();
        match self.kind {
            ChangeKind::Rename => write!(
                f,
                "{entity} renamed: {:?} -> {:?}",
                self.old_value.as_deref().unwrap_or(""),
                self.new_value.as_deref().unwrap_or("")
            ),
            ChangeKind::PropertyChange => write!(
                f,
                "{entity} {:?} property {:?} changed: {:?} -> {:?}",
                self.element_name.as_deref().unwrap_or(""),
                self.property_name.as_deref().unwrap_or(""),
                self.old_value.as_deref().unwrap_or(""),
                self.new_value.as_deref().unwrap_or("")
            ),
            ChangeKind::TypeChange => write!(
                f,
                "{entity} {:?} type changed: {:?} -> {:?}",
                self.element_name.as_deref().unwrap_or(""),
                self.old_value.as_deref().unwrap_or(""),
                self.new_value.as_deref().unwrap_or("")
            ),
            ChangeKind::Add => write!(
                f,
                "{entity} added: {:?}",
                self.new_value.as_deref().unwrap_or("")
            ),
            ChangeKind::Delete => write!(
                f,
                "{entity} deleted: {:?}",
                self.old_value.as_deref().unwrap_or("")
            ),
        }
    }
}

/// A scalar edit to the declarative source.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPatch {
    /// Dotted path, e.g. `attributes[0].name`.
    pub path: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub section: String,
    pub element_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralOp {
    Add,
    Delete,
}

/// A structural edit: insert or delete a named entry of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralPatch {
    pub op: StructuralOp,
    pub entity: EntityKind,
    pub name: String,
    pub parent_path: String,
    pub insertion_index: Option<usize>,
    /// Reconstructed entry content for adds.
    pub element_data: Option<Value>,
    pub depth: usize,
}

/// A single atomic edit to either source.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Scalar(ScalarPatch),
    Structural(StructuralPatch),
    Handler(HandlerPatch),
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Patch::Scalar(p) => write!(
                f,
                "YAML: {}: {:?} -> {:?}",
                p.path,
                p.old_value.as_deref().unwrap_or(""),
                p.new_value
            ),
            Patch::Structural(p) => match p.op {
                StructuralOp::Add => write!(
                    f,
                    "STRUCTURAL: add {} {:?} at {}[{}]",
                    p.entity.as_str(),
                    p.name,
                    p.parent_path,
                    p.insertion_index.unwrap_or(0)
                ),
                StructuralOp::Delete => write!(
                    f,
                    "STRUCTURAL: delete {} {:?} from {}",
                    p.entity.as_str(),
                    p.name,
                    p.parent_path
                ),
            },
            Patch::Handler(p) => match p {
                HandlerPatch::Add { name, .. } => write!(f, "HANDLER: add procedure {name:?}"),
                HandlerPatch::Delete { name } => write!(f, "HANDLER: delete procedure {name:?}"),
                HandlerPatch::Modify { name, .. } => {
                    write!(f, "HANDLER: modify procedure {name:?}")
                }
            },
        }
    }
}
