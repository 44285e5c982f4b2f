//! Forms and form-local data.
//!
//! A form references processor-level entities by name only; resolution
//! happens during element preparation, never by pointer.

use indexmap::IndexMap;
use serde_yaml::Value;
use std::path::PathBuf;

use super::element::FormElement;
use super::ids::StableId;
use super::multilang::MultiLang;
use super::processor::{Column, Command};
use super::types::DataType;

/// A screen whose UI is a tree of form elements.
#[derive(Clone, Debug)]
pub struct Form {
    pub name: String,
    pub is_default: bool,
    /// Monolithic handler source for this form, relative to the config.
    pub handlers_file: Option<PathBuf>,
    /// Per-procedure handler directory (one file per handler).
    pub handlers_dir: Option<PathBuf>,
    /// Root forest of the element tree.
    pub elements: Vec<FormElement>,
    /// Parallel list rendered into the auto command bar.
    pub auto_command_bar: Vec<FormElement>,
    pub commands: Vec<Command>,
    /// `event name → handler name` as authored.
    pub events: IndexMap<String, String>,
    /// `handler name → woven procedure text`, filled by the injector.
    pub woven_events: IndexMap<String, String>,
    /// Free-form form properties (window mode, command bar location, ...).
    pub properties: IndexMap<String, Value>,
    pub parameters: Vec<FormParameter>,
    pub form_attributes: Vec<FormAttribute>,
    pub value_tables: Vec<ValueTableAttribute>,
    pub value_trees: Vec<ValueTreeAttribute>,
    pub dynamic_lists: Vec<DynamicListAttribute>,
    /// Orphan procedures emitted verbatim into the utilities region.
    pub helper_procedures: IndexMap<String, String>,
    pub documentation: Option<String>,
    pub id: StableId,
}

impl Form {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            handlers_file: None,
            handlers_dir: None,
            elements: Vec::new(),
            auto_command_bar: Vec::new(),
            commands: Vec::new(),
            events: IndexMap::new(),
            woven_events: IndexMap::new(),
            properties: IndexMap::new(),
            parameters: Vec::new(),
            form_attributes: Vec::new(),
            value_tables: Vec::new(),
            value_trees: Vec::new(),
            dynamic_lists: Vec::new(),
            helper_procedures: IndexMap::new(),
            documentation: None,
            id: StableId::generate(),
        }
    }

    pub fn command_by_name(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Resolve a tabular data source declared on this form.
    pub fn local_table_source(&self, name: &str) -> Option<LocalTableSource<'_>> {
        if let Some(vt) = self.value_tables.iter().find(|v| v.name == name) {
            return Some(LocalTableSource::ValueTable(vt));
        }
        if let Some(vt) = self.value_trees.iter().find(|v| v.name == name) {
            return Some(LocalTableSource::ValueTree(vt));
        }
        if let Some(dl) = self.dynamic_lists.iter().find(|d| d.name == name) {
            return Some(LocalTableSource::DynamicList(dl));
        }
        None
    }

    /// Every element in document order, including auto-command-bar entries.
    pub fn walk_elements<'a>(&'a self, visit: &mut impl FnMut(&'a FormElement)) {
        for el in &self.elements {
            el.walk(visit);
        }
        for el in &self.auto_command_bar {
            el.walk(visit);
        }
    }
}

/// A form-local tabular source resolved by name.
#[derive(Clone, Copy, Debug)]
pub enum LocalTableSource<'a> {
    ValueTable(&'a ValueTableAttribute),
    ValueTree(&'a ValueTreeAttribute),
    DynamicList(&'a DynamicListAttribute),
}

/// A form-local scalar attribute.
#[derive(Clone, Debug)]
pub struct FormAttribute {
    pub name: String,
    /// Canonical snake-case type tag (`string`, `spreadsheet_document`, ...).
    pub attr_type: String,
    pub synonym: MultiLang,
    pub title: MultiLang,
    /// Numeric id inside the form's attribute table.
    pub id_num: u32,
}

impl FormAttribute {
    pub fn new(name: impl Into<String>, attr_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            title: MultiLang::uniform(&name),
            name,
            attr_type: attr_type.into(),
            id_num: 1,
        }
    }
}

/// Form-local tabular data whose columns live on the form.
#[derive(Clone, Debug)]
pub struct ValueTableAttribute {
    pub name: String,
    pub title: MultiLang,
    pub columns: Vec<Column>,
    pub id_num: u32,
}

impl ValueTableAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: MultiLang::uniform(&name),
            name,
            columns: Vec::new(),
            id_num: 1,
        }
    }
}

/// Like a value table, but rendered as a tree.
#[derive(Clone, Debug)]
pub struct ValueTreeAttribute {
    pub name: String,
    pub title: MultiLang,
    pub columns: Vec<Column>,
    pub id_num: u32,
}

/// A query parameter of a dynamic list.
#[derive(Clone, Debug)]
pub struct DynamicListParameter {
    pub name: String,
    pub param_type: DataType,
    pub default_value: Option<Value>,
}

/// A declared dynamic-list column.
#[derive(Clone, Debug)]
pub struct DynamicListColumn {
    pub field: String,
    pub title: MultiLang,
    pub width: Option<u32>,
}

/// A live query bound to a list on the form.
#[derive(Clone, Debug)]
pub struct DynamicListAttribute {
    pub name: String,
    pub title: MultiLang,
    pub manual_query: bool,
    /// Metadata table the query reads; required unless `manual_query`.
    pub main_table: Option<String>,
    pub query_text: Option<String>,
    pub key_fields: Vec<String>,
    pub parameters: Vec<DynamicListParameter>,
    pub columns: Vec<DynamicListColumn>,
    pub main_attribute: bool,
    pub filter_setting_id: StableId,
    pub order_setting_id: StableId,
    pub appearance_setting_id: StableId,
    pub items_setting_id: StableId,
    pub id_num: u32,
}

impl DynamicListAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: MultiLang::uniform(&name),
            name,
            manual_query: false,
            main_table: None,
            query_text: None,
            key_fields: Vec::new(),
            parameters: Vec::new(),
            columns: Vec::new(),
            main_attribute: false,
            filter_setting_id: StableId::generate(),
            order_setting_id: StableId::generate(),
            appearance_setting_id: StableId::generate(),
            items_setting_id: StableId::generate(),
            id_num: 1,
        }
    }

    /// The field shown when the author declared no columns. Derived from the
    /// query's main table; metadata tables expose a `Description` column.
    pub fn default_column_field(&self) -> &'static str {
        "Description"
    }
}

/// A form opening parameter.
#[derive(Clone, Debug)]
pub struct FormParameter {
    pub name: String,
    pub param_type: DataType,
    pub synonym: MultiLang,
    pub key_parameter: bool,
    pub id: StableId,
}

impl FormParameter {
    pub fn new(name: impl Into<String>, param_type: DataType) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            name,
            param_type,
            key_parameter: false,
            id: StableId::generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::ElementType;

    #[test]
    fn local_table_source_resolves_in_declaration_order() {
        let mut form = Form::new("F");
        form.value_tables.push(ValueTableAttribute::new("Rows"));
        form.dynamic_lists.push(DynamicListAttribute::new("List"));

        assert!(matches!(
            form.local_table_source("Rows"),
            Some(LocalTableSource::ValueTable(_))
        ));
        assert!(matches!(
            form.local_table_source("List"),
            Some(LocalTableSource::DynamicList(_))
        ));
        assert!(form.local_table_source("Missing").is_none());
    }

    #[test]
    fn walk_elements_covers_auto_command_bar() {
        let mut form = Form::new("F");
        form.elements
            .push(FormElement::new(ElementType::InputField, "A"));
        form.auto_command_bar
            .push(FormElement::new(ElementType::Button, "B"));

        let mut names = Vec::new();
        form.walk_elements(&mut |el| names.push(el.name.clone()));
        assert_eq!(names, ["A", "B"]);
    }
}
