//! Element preparation: the lookup phase between the model and the writer.
//!
//! Walks each form's element tree and produces a parallel tree of emit
//! records with resolved data paths, materialized table columns, and
//! allocated numeric ids. Name references are resolved here, never earlier,
//! so the model itself stays pointer-free.

use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::{debug, warn};

use super::allocator::IdAllocator;
use crate::model::{
    Column, DataType, ElementType, Form, FormElement, LocalTableSource, Processor,
};

/// A prepared UI node, ready for the artifact writer.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitNode {
    pub element_type: ElementType,
    pub name: String,
    pub id: u32,
    pub data_path: Option<String>,
    pub command: Option<String>,
    pub properties: IndexMap<String, Value>,
    /// `event name → handler name`.
    pub events: IndexMap<String, String>,
    pub children: Vec<EmitNode>,
}

/// The prepared form body plus the allocator position after it.
#[derive(Debug, Clone)]
pub struct PreparedForm {
    pub roots: Vec<EmitNode>,
    pub auto_command_bar: Vec<EmitNode>,
    pub next_id: u32,
}

/// Prepare one form against the processor it belongs to.
pub fn prepare_form(processor: &Processor, form: &Form) -> PreparedForm {
    let mut alloc = IdAllocator::new();
    let mut preparer = Preparer { processor, form };

    let roots = form
        .elements
        .iter()
        .map(|el| preparer.prepare(el, &DataContext::FormRoot, &mut alloc))
        .collect();

    // The auto command bar continues from the allocator's current value.
    let auto_command_bar = form
        .auto_command_bar
        .iter()
        .map(|el| preparer.prepare(el, &DataContext::FormRoot, &mut alloc))
        .collect();

    let prepared = PreparedForm {
        roots,
        auto_command_bar,
        next_id: alloc.peek(),
    };
    debug!(form = %form.name, next_id = prepared.next_id, "form prepared");
    prepared
}

/// Data context of the enclosing node, for data-path synthesis.
enum DataContext {
    FormRoot,
    /// Inside a table bound to a processor-level tabular section.
    ProcessorSection(String),
    /// Inside a table bound to form-local tabular data.
    FormLocalTable(String),
}

struct Preparer<'a> {
    processor: &'a Processor,
    form: &'a Form,
}

impl<'a> Preparer<'a> {
    fn prepare(
        &mut self,
        el: &FormElement,
        context: &DataContext,
        alloc: &mut IdAllocator,
    ) -> EmitNode {
        let element_type = el.element_type.unwrap_or(ElementType::UsualGroup);
        let mut node = EmitNode {
            element_type,
            name: el.name.clone(),
            id: alloc.allocate(element_type),
            data_path: el.prop_str("data_path").map(str::to_string),
            command: el.command.clone(),
            properties: el.properties.clone(),
            events: el.event_handlers.clone(),
            children: Vec::new(),
        };

        if element_type == ElementType::Table {
            self.prepare_table(el, &mut node, alloc);
            return node;
        }

        if node.data_path.is_none() {
            if let Some(attr) = &el.attribute {
                node.data_path = Some(self.data_path_for(attr, context));
            }
        }

        for child in &el.children {
            node.children.push(self.prepare(child, context, alloc));
        }
        node
    }

    /// Synthesize the data path for an attribute reference, using the
    /// enclosing context.
    fn data_path_for(&self, attr: &str, context: &DataContext) -> String {
        match context {
            DataContext::FormRoot => {
                if self.processor.attribute_by_name(attr).is_some() {
                    format!("Object.{attr}")
                } else {
                    // Form-local data binds by bare name.
                    attr.to_string()
                }
            }
            DataContext::ProcessorSection(section) => format!("Object.{section}.{attr}"),
            DataContext::FormLocalTable(table) => format!("{table}.{attr}"),
        }
    }

    fn prepare_table(&mut self, el: &FormElement, node: &mut EmitNode, alloc: &mut IdAllocator) {
        let Some(section_name) = &el.tabular_section else {
            warn!(element = %el.name, "table element without a data source");
            return;
        };

        if let Some(section) = self.processor.tabular_section_by_name(section_name) {
            node.data_path = Some(format!("Object.{section_name}"));
            let context = DataContext::ProcessorSection(section_name.clone());
            if el.children.is_empty() {
                // Synthetic line-number column first, then declared columns.
                node.children.push(line_number_column(section_name, alloc));
                for col in &section.columns {
                    node.children
                        .push(section_column(section_name, col, alloc));
                }
            } else {
                for child in &el.children {
                    node.children.push(self.prepare(child, &context, alloc));
                }
            }
            return;
        }

        match self.form.local_table_source(section_name) {
            Some(LocalTableSource::ValueTable(vt)) => {
                node.data_path = Some(section_name.clone());
                let context = DataContext::FormLocalTable(section_name.clone());
                if el.children.is_empty() {
                    for col in &vt.columns {
                        node.children.push(local_column(section_name, col, alloc));
                    }
                } else {
                    for child in &el.children {
                        node.children.push(self.prepare(child, &context, alloc));
                    }
                }
            }
            Some(LocalTableSource::ValueTree(vt)) => {
                node.data_path = Some(section_name.clone());
                let context = DataContext::FormLocalTable(section_name.clone());
                if el.children.is_empty() {
                    for col in &vt.columns {
                        node.children.push(local_column(section_name, col, alloc));
                    }
                } else {
                    for child in &el.children {
                        node.children.push(self.prepare(child, &context, alloc));
                    }
                }
            }
            Some(LocalTableSource::DynamicList(dl)) => {
                node.data_path = Some(section_name.clone());
                if !dl.columns.is_empty() {
                    for col in &dl.columns {
                        let mut child = EmitNode {
                            element_type: ElementType::InputField,
                            name: format!("{section_name}{}", col.field),
                            id: alloc.allocate_table_column(),
                            data_path: Some(format!("{section_name}.{}", col.field)),
                            command: None,
                            properties: IndexMap::new(),
                            events: IndexMap::new(),
                            children: Vec::new(),
                        };
                        child
                            .properties
                            .insert("title_ru".into(), Value::from(col.title.ru.clone()));
                        if let Some(width) = col.width {
                            child.properties.insert("width".into(), Value::from(width));
                        }
                        node.children.push(child);
                    }
                } else {
                    // No declared columns: a single default column derived
                    // from the query's main table.
                    let field = dl.default_column_field();
                    node.children.push(EmitNode {
                        element_type: ElementType::InputField,
                        name: format!("{section_name}{field}"),
                        id: alloc.allocate_table_column(),
                        data_path: Some(format!("{section_name}.{field}")),
                        command: None,
                        properties: IndexMap::new(),
                        events: IndexMap::new(),
                        children: Vec::new(),
                    });
                }
            }
            None => {
                warn!(element = %el.name, section = %section_name, "unresolved table source");
            }
        }
    }
}

fn line_number_column(section: &str, alloc: &mut IdAllocator) -> EmitNode {
    EmitNode {
        element_type: ElementType::InputField,
        name: format!("{section}LineNumber"),
        id: alloc.allocate_table_column(),
        data_path: Some(format!("Object.{section}.LineNumber")),
        command: None,
        properties: IndexMap::from_iter([("read_only".to_string(), Value::from(true))]),
        events: IndexMap::new(),
        children: Vec::new(),
    }
}

fn section_column(section: &str, col: &Column, alloc: &mut IdAllocator) -> EmitNode {
    let element_type = if col.data_type.is_boolean() {
        ElementType::CheckBoxField
    } else {
        ElementType::InputField
    };
    let mut properties = IndexMap::new();
    if col.read_only {
        properties.insert("read_only".to_string(), Value::from(true));
    }
    EmitNode {
        element_type,
        name: format!("{section}{}", col.name),
        id: alloc.allocate_table_column(),
        data_path: Some(format!("Object.{section}.{}", col.name)),
        command: None,
        properties,
        events: IndexMap::new(),
        children: Vec::new(),
    }
}

fn local_column(table: &str, col: &Column, alloc: &mut IdAllocator) -> EmitNode {
    let element_type = if col.data_type.is_boolean() {
        ElementType::CheckBoxField
    } else {
        ElementType::InputField
    };
    EmitNode {
        element_type,
        name: format!("{table}{}", col.name),
        id: alloc.allocate_table_column(),
        data_path: Some(format!("{table}.{}", col.name)),
        command: None,
        properties: IndexMap::new(),
        events: IndexMap::new(),
        children: Vec::new(),
    }
}

/// Flatten ids in document order, for monotonicity checks.
pub fn collect_ids(nodes: &[EmitNode]) -> Vec<u32> {
    let mut out = Vec::new();
    fn rec(node: &EmitNode, out: &mut Vec<u32>) {
        out.push(node.id);
        for child in &node.children {
            rec(child, out);
        }
    }
    for node in nodes {
        rec(node, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Attribute, DynamicListAttribute, FormAttribute, TabularSection, ValueTableAttribute,
    };

    fn processor() -> Processor {
        let mut p = Processor::new("P");
        p.attributes.push(Attribute::new("Note", DataType::String));
        let mut ts = TabularSection::new("Items");
        ts.columns.push(Column::new("Qty", DataType::Number));
        ts.columns.push(Column::new("Done", DataType::Boolean));
        p.tabular_sections.push(ts);
        p
    }

    #[test]
    fn input_field_gets_object_data_path_and_id_one() {
        let mut form = Form::new("F");
        let mut el = FormElement::new(ElementType::InputField, "NoteField");
        el.attribute = Some("Note".into());
        form.elements.push(el);
        let prepared = prepare_form(&processor(), &form);
        assert_eq!(prepared.roots[0].id, 1);
        assert_eq!(prepared.roots[0].data_path.as_deref(), Some("Object.Note"));
    }

    #[test]
    fn form_attribute_binds_by_bare_name() {
        let mut form = Form::new("F");
        form.form_attributes
            .push(FormAttribute::new("Local", "string"));
        let mut el = FormElement::new(ElementType::InputField, "LocalField");
        el.attribute = Some("Local".into());
        form.elements.push(el);
        let prepared = prepare_form(&processor(), &form);
        assert_eq!(prepared.roots[0].data_path.as_deref(), Some("Local"));
    }

    #[test]
    fn explicit_data_path_wins() {
        let mut form = Form::new("F");
        let mut el = FormElement::new(ElementType::LabelField, "L");
        el.attribute = Some("Note".into());
        el.properties
            .insert("data_path".into(), Value::from("Object.Custom"));
        form.elements.push(el);
        let prepared = prepare_form(&processor(), &form);
        assert_eq!(prepared.roots[0].data_path.as_deref(), Some("Object.Custom"));
    }

    #[test]
    fn section_table_gets_line_number_then_columns() {
        let mut form = Form::new("F");
        let mut table = FormElement::new(ElementType::Table, "ItemsTable");
        table.tabular_section = Some("Items".into());
        form.elements.push(table);
        let prepared = prepare_form(&processor(), &form);

        let table = &prepared.roots[0];
        assert_eq!(table.data_path.as_deref(), Some("Object.Items"));
        let names: Vec<&str> = table.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["ItemsLineNumber", "ItemsQty", "ItemsDone"]);
        assert_eq!(
            table.children[2].element_type,
            ElementType::CheckBoxField,
            "boolean column renders as checkbox"
        );
        assert_eq!(
            table.children[1].data_path.as_deref(),
            Some("Object.Items.Qty")
        );
    }

    #[test]
    fn value_table_columns_live_on_the_form() {
        let mut form = Form::new("F");
        let mut vt = ValueTableAttribute::new("Rows");
        vt.columns.push(Column::new("Name", DataType::String));
        form.value_tables.push(vt);
        let mut table = FormElement::new(ElementType::Table, "RowsTable");
        table.tabular_section = Some("Rows".into());
        form.elements.push(table);
        let prepared = prepare_form(&processor(), &form);
        assert_eq!(prepared.roots[0].data_path.as_deref(), Some("Rows"));
        assert_eq!(
            prepared.roots[0].children[0].data_path.as_deref(),
            Some("Rows.Name")
        );
    }

    #[test]
    fn dynamic_list_without_columns_gets_default_description() {
        let mut form = Form::new("F");
        let mut dl = DynamicListAttribute::new("Goods");
        dl.main_table = Some("Catalog.Goods".into());
        form.dynamic_lists.push(dl);
        let mut table = FormElement::new(ElementType::Table, "GoodsList");
        table.tabular_section = Some("Goods".into());
        form.elements.push(table);
        let prepared = prepare_form(&processor(), &form);
        assert_eq!(
            prepared.roots[0].children[0].data_path.as_deref(),
            Some("Goods.Description")
        );
    }

    #[test]
    fn ids_strictly_increase_in_document_order() {
        let mut form = Form::new("F");
        let mut group = FormElement::new(ElementType::UsualGroup, "G");
        let mut f1 = FormElement::new(ElementType::InputField, "A");
        f1.attribute = Some("Note".into());
        group.children.push(f1);
        let mut table = FormElement::new(ElementType::Table, "T");
        table.tabular_section = Some("Items".into());
        group.children.push(table);
        form.elements.push(group);
        form.auto_command_bar
            .push(FormElement::new(ElementType::Button, "Go"));

        let prepared = prepare_form(&processor(), &form);
        let mut ids = collect_ids(&prepared.roots);
        ids.extend(collect_ids(&prepared.auto_command_bar));
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{ids:?}");
        }
        assert!(prepared.next_id > *ids.last().unwrap());
    }

    #[test]
    fn repeat_preparation_is_deterministic() {
        let mut form = Form::new("F");
        let mut el = FormElement::new(ElementType::InputField, "NoteField");
        el.attribute = Some("Note".into());
        form.elements.push(el);
        let p = processor();
        let a = prepare_form(&p, &form);
        let b = prepare_form(&p, &form);
        assert_eq!(collect_ids(&a.roots), collect_ids(&b.roots));
    }
}
