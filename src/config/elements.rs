//! Schema-table-driven parsing of form elements.

use serde_yaml::Value;
use tracing::warn;

use super::aliases::{Resolved, resolve_element_type};
use super::schema::{COLUMN_GROUP_ALLOWED_CHILDREN, ChildrenKey, DefaultValue, schema_for};
use crate::model::{ElementType, FormElement, MultiLang};

/// Parses element configurations recursively against the schema table.
/// Problems are split into hard `issues` (schema errors, reported in bulk)
/// and soft `warnings` (dropped children).
pub struct ElementParser<'a> {
    languages: &'a [String],
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl<'a> ElementParser<'a> {
    pub fn new(languages: &'a [String]) -> Self {
        Self {
            languages,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Parse a list of element configurations, skipping broken entries after
    /// recording the issue.
    pub fn parse_list(&mut self, configs: &[Value], context: &str) -> Vec<FormElement> {
        configs
            .iter()
            .enumerate()
            .filter_map(|(i, cfg)| self.parse(cfg, &format!("{context}[{i}]")))
            .collect()
    }

    pub fn parse(&mut self, config: &Value, context: &str) -> Option<FormElement> {
        let map = match config.as_mapping() {
            Some(m) => m,
            None => {
                self.issues
                    .push(format!("{context}: element must be a mapping"));
                return None;
            }
        };
        let raw_type = match map.get(&Value::from("type")).and_then(Value::as_str) {
            Some(t) => t,
            None => {
                self.issues.push(format!("{context}: element has no type"));
                return None;
            }
        };
        let element_type = match resolve_element_type(raw_type) {
            Resolved::Canonical(ty) => ty,
            Resolved::Unknown { suggestion } => {
                let hint = suggestion
                    .map(|s| format!(" (did you mean {s:?}?)"))
                    .unwrap_or_default();
                self.issues
                    .push(format!("{context}: unknown element type {raw_type:?}{hint}"));
                return None;
            }
        };
        let name = match map.get(&Value::from("name")).and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                self.issues
                    .push(format!("{context}: element of type {element_type} has no name"));
                return None;
            }
        };

        let schema = schema_for(element_type);
        let mut element = FormElement::new(element_type, name);

        if schema.has_attribute {
            element.attribute = map
                .get(&Value::from("attribute"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        if schema.has_command {
            element.command = map
                .get(&Value::from("command"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        if schema.has_tabular_section {
            self.bind_table_source(map, &mut element);
        }

        if let Some(events) = map.get(&Value::from("events")).and_then(Value::as_mapping) {
            for (k, v) in events {
                if let (Some(event), Some(handler)) = (k.as_str(), v.as_str()) {
                    element
                        .event_handlers
                        .insert(event.to_string(), handler.to_string());
                }
            }
        }

        for spec in schema.props {
            if spec.multilang {
                if let Some(value) = map.get(&Value::from(spec.key)) {
                    match MultiLang::from_value(value, self.languages) {
                        Ok(ml) => {
                            let key = spec.target_key();
                            element
                                .properties
                                .insert(format!("{key}_ru"), Value::from(ml.ru));
                            element
                                .properties
                                .insert(format!("{key}_uk"), Value::from(ml.uk));
                            element
                                .properties
                                .insert(format!("{key}_en"), Value::from(ml.en));
                        }
                        Err(e) => self.issues.push(format!("{context}.{}: {e}", spec.key)),
                    }
                }
                continue;
            }
            if let Some(value) = map.get(&Value::from(spec.key)) {
                element
                    .properties
                    .insert(spec.target_key().to_string(), value.clone());
            } else if let Some(default) = spec.default {
                let value = match default {
                    DefaultValue::Bool(b) => Value::from(b),
                    DefaultValue::Str(s) => Value::from(s),
                };
                element.properties.insert(spec.target_key().to_string(), value);
            }
        }

        if let Some(key) = schema.children_key.as_str() {
            if let Some(children) = map.get(&Value::from(key)).and_then(Value::as_sequence) {
                let child_context = format!("{context}.{key}");
                let mut parsed = self.parse_list(children, &child_context);
                if element_type == ElementType::ColumnGroup {
                    parsed.retain(|child| {
                        let keep = child
                            .element_type
                            .is_some_and(|t| COLUMN_GROUP_ALLOWED_CHILDREN.contains(&t));
                        if !keep {
                            let dropped = child
                                .element_type
                                .map(|t| t.canonical())
                                .unwrap_or("untyped");
                            warn!(child = %child.name, dropped, "column group drops unsupported child");
                            self.warnings.push(format!(
                                "{child_context}: column group {:?} dropped {dropped} child {:?}",
                                element.name, child.name
                            ));
                        }
                        keep
                    });
                }
                element.children = parsed;
            }
        } else if schema.children_key == ChildrenKey::None {
            for key in ["elements", "pages", "child_items"] {
                if map.get(&Value::from(key)).is_some() {
                    self.warnings.push(format!(
                        "{context}: {element_type} does not accept children; {key:?} ignored"
                    ));
                }
            }
        }

        Some(element)
    }

    /// Tables bind one of three tabular sources; the chosen key is recorded
    /// as a property so the preparer knows which lookup to run.
    fn bind_table_source(&mut self, map: &serde_yaml::Mapping, element: &mut FormElement) {
        for (key, flag) in [
            ("tabular_section", None),
            ("value_table", Some("is_value_table")),
            ("dynamic_list", Some("is_dynamic_list")),
        ] {
            if let Some(name) = map.get(&Value::from(key)).and_then(Value::as_str) {
                element.tabular_section = Some(name.to_string());
                if let Some(flag) = flag {
                    element.properties.insert(flag.to_string(), Value::from(true));
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<String> {
        crate::model::default_languages()
    }

    fn parse_one(yaml: &str) -> (Option<FormElement>, Vec<String>, Vec<String>) {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let languages = langs();
        let mut parser = ElementParser::new(&languages);
        let element = parser.parse(&value, "elements[0]");
        (element, parser.issues, parser.warnings)
    }

    #[test]
    fn parses_aliased_type_with_binding() {
        let (el, issues, _) = parse_one("{type: TextBox, name: NoteField, attribute: Note}");
        assert!(issues.is_empty());
        let el = el.unwrap();
        assert_eq!(el.element_type, Some(ElementType::InputField));
        assert_eq!(el.attribute.as_deref(), Some("Note"));
    }

    #[test]
    fn alias_and_canonical_forms_produce_equal_elements() {
        let (a, _, _) = parse_one("{type: Grid, name: T, tabular_section: Rows}");
        let (b, _, _) = parse_one("{type: Table, name: T, tabular_section: Rows}");
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn unknown_type_is_an_issue_with_suggestion() {
        let (el, issues, _) = parse_one("{type: InputFeild, name: X}");
        assert!(el.is_none());
        assert!(issues[0].contains("InputField"), "{issues:?}");
    }

    #[test]
    fn defaults_are_applied() {
        let (el, _, _) = parse_one("{type: UsualGroup, name: G}");
        let el = el.unwrap();
        assert_eq!(el.prop_str("group_direction"), Some("Vertical"));
        assert_eq!(el.prop_bool("show_title"), Some(false));
    }

    #[test]
    fn column_group_drops_foreign_children() {
        let yaml = r#"
type: ColumnGroup
name: CG
elements:
  - {type: InputField, name: Ok}
  - {type: Button, name: Dropped, command: C}
"#;
        let (el, _, warnings) = parse_one(yaml);
        let el = el.unwrap();
        assert_eq!(el.children.len(), 1);
        assert_eq!(el.children[0].name, "Ok");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn pages_parse_from_their_own_key() {
        let yaml = r#"
type: Pages
name: Main
pages:
  - type: Page
    name: First
    title: {ru: Первая, en: First}
    elements:
      - {type: InputField, name: F, attribute: A}
"#;
        let (el, issues, _) = parse_one(yaml);
        assert!(issues.is_empty());
        let el = el.unwrap();
        assert_eq!(el.children.len(), 1);
        assert_eq!(el.children[0].element_type, Some(ElementType::Page));
        assert_eq!(el.children[0].children.len(), 1);
    }

    #[test]
    fn multilang_title_is_flattened() {
        let (el, _, _) = parse_one("{type: UsualGroup, name: G, title: 'Группа|Група|Group'}");
        let el = el.unwrap();
        assert_eq!(el.prop_str("title_ru"), Some("Группа"));
        assert_eq!(el.prop_str("title_uk"), Some("Група"));
        assert_eq!(el.prop_str("title_en"), Some("Group"));
    }
}
