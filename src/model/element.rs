//! Form UI elements.
//!
//! A [`FormElement`] is a recursive node in a form's element tree. Its type
//! tag comes from a closed set; per-type parsing rules (accepted properties,
//! data binding, children key) live in the config schema table.

use indexmap::IndexMap;
use serde_yaml::Value;

/// The closed set of element-type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    InputField,
    LabelField,
    LabelDecoration,
    PictureDecoration,
    PictureField,
    Table,
    Button,
    ButtonGroup,
    ColumnGroup,
    UsualGroup,
    Pages,
    Page,
    Popup,
    RadioButtonField,
    CheckBoxField,
    CalendarField,
    ChartField,
    PlannerField,
    HtmlDocumentField,
    SpreadSheetDocumentField,
}

impl ElementType {
    pub const ALL: &'static [ElementType] = &[
        ElementType::InputField,
        ElementType::LabelField,
        ElementType::LabelDecoration,
        ElementType::PictureDecoration,
        ElementType::PictureField,
        ElementType::Table,
        ElementType::Button,
        ElementType::ButtonGroup,
        ElementType::ColumnGroup,
        ElementType::UsualGroup,
        ElementType::Pages,
        ElementType::Page,
        ElementType::Popup,
        ElementType::RadioButtonField,
        ElementType::CheckBoxField,
        ElementType::CalendarField,
        ElementType::ChartField,
        ElementType::PlannerField,
        ElementType::HtmlDocumentField,
        ElementType::SpreadSheetDocumentField,
    ];

    /// Canonical spelling used in the declarative source and descriptors.
    pub fn canonical(&self) -> &'static str {
        match self {
            ElementType::InputField => "InputField",
            ElementType::LabelField => "LabelField",
            ElementType::LabelDecoration => "LabelDecoration",
            ElementType::PictureDecoration => "PictureDecoration",
            ElementType::PictureField => "PictureField",
            ElementType::Table => "Table",
            ElementType::Button => "Button",
            ElementType::ButtonGroup => "ButtonGroup",
            ElementType::ColumnGroup => "ColumnGroup",
            ElementType::UsualGroup => "UsualGroup",
            ElementType::Pages => "Pages",
            ElementType::Page => "Page",
            ElementType::Popup => "Popup",
            ElementType::RadioButtonField => "RadioButtonField",
            ElementType::CheckBoxField => "CheckBoxField",
            ElementType::CalendarField => "CalendarField",
            ElementType::ChartField => "ChartField",
            ElementType::PlannerField => "PlannerField",
            ElementType::HtmlDocumentField => "HTMLDocumentField",
            ElementType::SpreadSheetDocumentField => "SpreadSheetDocumentField",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.canonical() == name)
    }

    /// Container types that recurse during preparation and extraction.
    pub fn supports_children(&self) -> bool {
        matches!(
            self,
            ElementType::Table
                | ElementType::ButtonGroup
                | ElementType::ColumnGroup
                | ElementType::UsualGroup
                | ElementType::Pages
                | ElementType::Page
                | ElementType::Popup
        )
    }

    /// Field-like elements that bind to a data attribute.
    pub fn binds_attribute(&self) -> bool {
        matches!(
            self,
            ElementType::InputField
                | ElementType::LabelField
                | ElementType::PictureField
                | ElementType::RadioButtonField
                | ElementType::CheckBoxField
                | ElementType::CalendarField
                | ElementType::ChartField
                | ElementType::PlannerField
                | ElementType::HtmlDocumentField
                | ElementType::SpreadSheetDocumentField
        )
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// A node in a form's element tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormElement {
    pub element_type: Option<ElementType>,
    pub name: String,
    /// Weak reference, by name, to a processor attribute or form-local datum.
    pub attribute: Option<String>,
    /// Weak reference to a form command (buttons).
    pub command: Option<String>,
    /// Weak reference to a tabular data source (tables).
    pub tabular_section: Option<String>,
    /// `event name → handler name` as authored.
    pub event_handlers: IndexMap<String, String>,
    /// Free-form properties accepted by the element's schema.
    pub properties: IndexMap<String, Value>,
    pub children: Vec<FormElement>,
    /// `event name → woven procedure text`, filled by the injector.
    pub woven_events: IndexMap<String, String>,
}

impl FormElement {
    pub fn new(element_type: ElementType, name: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Depth-first traversal over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FormElement)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Mutable depth-first traversal.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut FormElement)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn prop_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_canonical(ty.canonical()), Some(*ty));
        }
    }

    #[test]
    fn walk_visits_document_order() {
        let mut root = FormElement::new(ElementType::UsualGroup, "G");
        root.children.push(FormElement::new(ElementType::InputField, "A"));
        let mut pages = FormElement::new(ElementType::Pages, "P");
        pages.children.push(FormElement::new(ElementType::Page, "P1"));
        root.children.push(pages);

        let mut seen = Vec::new();
        root.walk(&mut |el| seen.push(el.name.clone()));
        assert_eq!(seen, ["G", "A", "P", "P1"]);
    }
}
