//! Reference checking before structural deletes.
//!
//! Scans the declarative source and the handler source for textual
//! references to the target and returns human-readable citations. A
//! non-empty list blocks the delete unless the caller forces it.

use crate::ydoc::{Document, YamlValue};

/// Reference scanner over one config document and one handler source.
pub struct ReferenceChecker<'a> {
    config: &'a Document,
    handler_source: &'a str,
}

impl<'a> ReferenceChecker<'a> {
    pub fn new(config: &'a Document, handler_source: &'a str) -> Self {
        Self {
            config,
            handler_source,
        }
    }

    /// Dispatch on the entity kind being deleted.
    pub fn check(&self, entity: super::changes::EntityKind, name: &str) -> Vec<String> {
        use super::changes::EntityKind;
        match entity {
            EntityKind::Attribute => self.check_attribute(name),
            EntityKind::FormElement => self.check_form_element(name),
            EntityKind::Command => self.check_command(name),
            EntityKind::TabularSection | EntityKind::ValueTable => self.check_table(name),
            EntityKind::FormAttribute => self.check_form_attribute(name),
            EntityKind::Form => self.check_form(name),
            EntityKind::Template => self.check_template(name),
            EntityKind::FormParameter => self.check_form_parameter(name),
            _ => Vec::new(),
        }
    }

    pub fn check_attribute(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [format!("Object.{name}"), format!("Объект.{name}")] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        self.scan_elements(|path, element| {
            if element_field(element, "attribute") == Some(name) {
                refs.push(format!(
                    "Form element: {path} (name={})",
                    element_field(element, "name").unwrap_or("?")
                ));
            }
        });
        refs
    }

    pub fn check_form_element(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [
            format!("Items.{name}"),
            format!("Элементы.{name}"),
            format!("\"{name}\""),
        ] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        refs
    }

    pub fn check_command(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        if self.handler_source.contains(name) {
            refs.push(format!("Handler code: {name}"));
        }
        refs
    }

    pub fn check_table(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [
            format!("Object.{name}"),
            format!("Объект.{name}"),
            format!("Items.{name}"),
            format!("\"{name}\""),
        ] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        self.scan_elements(|path, element| {
            if element_field(element, "tabular_section") == Some(name)
                || element_field(element, "value_table") == Some(name)
                || element_field(element, "dynamic_list") == Some(name)
            {
                refs.push(format!(
                    "Form element: {path} (name={}) references the table",
                    element_field(element, "name").unwrap_or("?")
                ));
            }
        });
        refs
    }

    pub fn check_form_attribute(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [format!("Items.{name}"), format!("\"{name}\"")] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        self.scan_elements(|path, element| {
            if element_field(element, "attribute") == Some(name) {
                refs.push(format!(
                    "Form element: {path} (name={}) references the attribute",
                    element_field(element, "name").unwrap_or("?")
                ));
            }
        });
        refs
    }

    pub fn check_form(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        if let Some(forms) = self.forms() {
            for (idx, item) in forms.items.iter().enumerate() {
                if item.value.name() == Some(name) {
                    let is_default = item
                        .value
                        .as_mapping()
                        .and_then(|m| m.get("default"))
                        .and_then(YamlValue::as_str)
                        == Some("true");
                    if is_default {
                        refs.push(format!(
                            "Form is marked as default (forms[{idx}].default=true)"
                        ));
                    }
                }
            }
        }
        for pattern in [
            format!("OpenForm(\"{name}\""),
            format!("GetForm(\"{name}\""),
            format!("ОткрытьФорму(\"{name}\""),
        ] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        refs
    }

    pub fn check_template(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [
            format!("GetTemplate(\"{name}\""),
            format!("ПолучитьМакет(\"{name}\""),
        ] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        if let Some(templates) = self
            .config
            .body
            .as_mapping()
            .and_then(|m| m.get("templates"))
            .and_then(YamlValue::as_sequence)
        {
            for item in &templates.items {
                if item.value.name() == Some(name) {
                    let auto = item
                        .value
                        .as_mapping()
                        .and_then(|m| m.get("auto_field"))
                        .and_then(YamlValue::as_str)
                        == Some("true");
                    if auto {
                        refs.push(format!(
                            "Template has auto_field=true and generates a form element for {name}"
                        ));
                    }
                }
            }
        }
        refs
    }

    pub fn check_form_parameter(&self, name: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for pattern in [format!("Parameters.{name}"), format!("Параметры.{name}")] {
            if self.handler_source.contains(&pattern) {
                refs.push(format!("Handler code: {pattern}"));
            }
        }
        refs
    }

    fn forms(&self) -> Option<&crate::ydoc::Sequence> {
        self.config
            .body
            .as_mapping()?
            .get("forms")?
            .as_sequence()
    }

    /// Visit every form element (including nested `child_items`) with its
    /// dotted path.
    fn scan_elements(&self, mut visit: impl FnMut(&str, &YamlValue)) {
        let Some(forms) = self.forms() else {
            return;
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
                scan_element_rec(&path, &item.value, &mut visit);
            }
        }
    }
}

fn scan_element_rec(path: &str, element: &YamlValue, visit: &mut impl FnMut(&str, &YamlValue)) {
    visit(path, element);
    for key in ["child_items", "elements", "pages"] {
        if let Some(children) = element
            .as_mapping()
            .and_then(|m| m.get(key))
            .and_then(YamlValue::as_sequence)
        {
            for (idx, child) in children.items.iter().enumerate() {
                let child_path = format!("{path}.{key}[{idx}]");
                scan_element_rec(&child_path, &child.value, visit);
            }
        }
    }
}

fn element_field<'v>(element: &'v YamlValue, key: &str) -> Option<&'v str> {
    element.as_mapping()?.get(key)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ydoc::parse;

    const CONFIG: &str = "\
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
  - type: UsualGroup
    name: G
    elements:
    - type: CheckBoxField
      name: FlagField
      attribute: Flag
";

    #[test]
    fn attribute_delete_cites_the_bound_element() {
        let doc = parse(CONFIG).unwrap();
        let checker = ReferenceChecker::new(&doc, "");
        let refs = checker.check_attribute("Note");
        assert_eq!(refs.len(), 1);
        assert!(
            refs[0].contains("forms[0].elements[0]") && refs[0].contains("name=NoteField"),
            "{refs:?}"
        );
    }

    #[test]
    fn nested_elements_are_scanned() {
        let doc = parse(CONFIG).unwrap();
        let checker = ReferenceChecker::new(&doc, "");
        let refs = checker.check_attribute("Flag");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].contains("forms[0].elements[1].elements[0]"), "{refs:?}");
    }

    #[test]
    fn handler_source_citations() {
        let doc = parse(CONFIG).unwrap();
        let source = "Value = Object.Note;\nItems.NoteField.Visible = False;";
        let checker = ReferenceChecker::new(&doc, source);
        assert!(!checker.check_attribute("Note").is_empty());
        assert!(!checker.check_form_element("NoteField").is_empty());
        assert!(checker.check_form_element("Other").is_empty());
    }

    #[test]
    fn default_form_blocks_deletion() {
        let doc = parse(CONFIG).unwrap();
        let checker = ReferenceChecker::new(&doc, "");
        let refs = checker.check_form("F");
        assert!(refs.iter().any(|r| r.contains("default=true")), "{refs:?}");
    }

    #[test]
    fn unreferenced_names_pass() {
        let doc = parse(CONFIG).unwrap();
        let checker = ReferenceChecker::new(&doc, "X = 1;");
        assert!(checker.check_attribute("Missing").is_empty());
        assert!(checker.check_form("Q").is_empty());
    }
}
