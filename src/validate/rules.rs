//! Model validation.
//!
//! Every rule runs; violations are accumulated and reported in one shot so
//! the author sees all problems at once, not only the first.

use rustc_hash::{FxHashMap, FxHashSet};
use unicode_ident::{is_xid_continue, is_xid_start};

use super::pictures::{PictureCheck, check_picture};
use super::reserved::{is_builtin_form_method, is_metadata_collection, is_reserved_keyword};
use crate::handlers::has_signature;
use crate::model::{
    DataType, Form, FormElement, MAX_NUMBER_DIGITS, MAX_STRING_LENGTH, Processor, StableId,
};

/// Accumulated rule violations.
#[derive(Debug, thiserror::Error)]
#[error("model is invalid:\n{}", violations.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n"))]
pub struct ModelError {
    pub violations: Vec<String>,
}

/// Validate the frozen model before artifact emission.
pub fn validate(processor: &Processor) -> Result<(), ModelError> {
    let mut v = Validator::default();
    v.check_processor(processor);
    if v.violations.is_empty() {
        Ok(())
    } else {
        Err(ModelError {
            violations: v.violations,
        })
    }
}

/// `[letter|_][letter|digit|_]*`; letters include Cyrillic.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || is_xid_continue(c))
}

#[derive(Default)]
struct Validator {
    violations: Vec<String>,
    seen_ids: FxHashMap<String, String>,
}

impl Validator {
    fn check_processor(&mut self, p: &Processor) {
        self.check_name(&p.name, "processor");
        for id in [
            &p.ids.root,
            &p.ids.object,
            &p.ids.type_id,
            &p.ids.value,
            &p.ids.form_group,
        ] {
            self.check_id(id, "processor");
        }

        let mut attr_names = FxHashSet::default();
        for attr in &p.attributes {
            let ctx = format!("attribute {:?}", attr.name);
            self.check_name(&attr.name, &ctx);
            if !attr_names.insert(attr.name.clone()) {
                self.violations.push(format!("duplicate attribute name {:?}", attr.name));
            }
            self.check_id(&attr.id, &ctx);
            self.check_qualifiers(
                &attr.data_type,
                attr.length,
                attr.digits,
                attr.fraction_digits,
                &ctx,
            );
        }

        let mut section_names = FxHashSet::default();
        for ts in &p.tabular_sections {
            let ctx = format!("tabular section {:?}", ts.name);
            self.check_name(&ts.name, &ctx);
            if !section_names.insert(ts.name.clone()) {
                self.violations
                    .push(format!("duplicate tabular section name {:?}", ts.name));
            }
            for id in [
                &ts.ids.own,
                &ts.ids.type_id,
                &ts.ids.value,
                &ts.ids.row_type,
                &ts.ids.row_value,
            ] {
                self.check_id(id, &ctx);
            }
            let mut column_names = FxHashSet::default();
            for col in &ts.columns {
                let cctx = format!("{ctx} column {:?}", col.name);
                self.check_name(&col.name, &cctx);
                if !column_names.insert(col.name.clone()) {
                    self.violations
                        .push(format!("{ctx}: duplicate column name {:?}", col.name));
                }
                self.check_id(&col.id, &cctx);
                self.check_qualifiers(
                    &col.data_type,
                    col.length,
                    col.digits,
                    col.fraction_digits,
                    &cctx,
                );
            }
        }

        // At most one default form, names unique.
        let defaults: Vec<&str> = p
            .forms
            .iter()
            .filter(|f| f.is_default)
            .map(|f| f.name.as_str())
            .collect();
        if defaults.len() > 1 {
            self.violations.push(format!(
                "more than one default form: {}",
                defaults.join(", ")
            ));
        }
        let mut form_names = FxHashSet::default();
        for form in &p.forms {
            if !form_names.insert(form.name.clone()) {
                self.violations
                    .push(format!("duplicate form name {:?}", form.name));
            }
            self.check_form(p, form);
        }

        for template in &p.templates {
            let ctx = format!("template {:?}", template.name);
            self.check_name(&template.name, &ctx);
            self.check_id(&template.id, &ctx);
            if let Some(target) = &template.target_form {
                if p.form_by_name(target).is_none() {
                    self.violations
                        .push(format!("{ctx}: target form {target:?} does not exist"));
                }
            }
        }
    }

    fn check_form(&mut self, p: &Processor, form: &Form) {
        let ctx = format!("form {:?}", form.name);
        self.check_name(&form.name, &ctx);
        self.check_id(&form.id, &ctx);

        for handler in form.events.values() {
            self.check_handler_name(handler, &ctx);
        }
        for (handler, woven) in &form.woven_events {
            self.check_woven_signature(handler, woven, &ctx);
        }

        let mut command_names = FxHashSet::default();
        for cmd in &form.commands {
            let cctx = format!("{ctx} command {:?}", cmd.name);
            self.check_name(&cmd.name, &cctx);
            if !command_names.insert(cmd.name.clone()) {
                self.violations
                    .push(format!("{ctx}: duplicate command name {:?}", cmd.name));
            }
            self.check_id(&cmd.id, &cctx);
            self.check_handler_name(&cmd.action, &cctx);
            if let Some(picture) = &cmd.picture {
                self.check_picture_ref(picture, &cctx);
            }
            if let Some(settings) = &cmd.long_operation_settings {
                if !(1..=3600).contains(&settings.timeout_seconds) {
                    self.violations.push(format!(
                        "{cctx}: timeout_seconds must be within 1..=3600, got {}",
                        settings.timeout_seconds
                    ));
                }
                if settings.show_progress && settings.progress_message.ru.is_empty() {
                    self.violations.push(format!(
                        "{cctx}: progress message must be non-empty when progress is shown"
                    ));
                }
            }
        }

        for fa in &form.form_attributes {
            self.check_name(&fa.name, &format!("{ctx} form attribute {:?}", fa.name));
        }
        for param in &form.parameters {
            self.check_name(&param.name, &format!("{ctx} parameter {:?}", param.name));
            self.check_id(&param.id, &format!("{ctx} parameter {:?}", param.name));
        }
        for dl in &form.dynamic_lists {
            let dctx = format!("{ctx} dynamic list {:?}", dl.name);
            self.check_name(&dl.name, &dctx);
            for id in [
                &dl.filter_setting_id,
                &dl.order_setting_id,
                &dl.appearance_setting_id,
                &dl.items_setting_id,
            ] {
                self.check_id(id, &dctx);
            }
        }

        // Element tree: sibling name uniqueness, table references, pictures.
        self.check_sibling_names(&form.elements, &ctx);
        self.check_sibling_names(&form.auto_command_bar, &ctx);
        for el in form.elements.iter().chain(form.auto_command_bar.iter()) {
            el.walk(&mut |node| self.check_element(p, form, node, &ctx));
        }
    }

    fn check_element(&mut self, p: &Processor, form: &Form, el: &FormElement, ctx: &str) {
        let ectx = format!("{ctx} element {:?}", el.name);
        self.check_name(&el.name, &ectx);
        for handler in el.event_handlers.values() {
            self.check_handler_name(handler, &ectx);
        }
        if let Some(picture) = el.prop_str("picture") {
            self.check_picture_ref(picture, &ectx);
        }
        if el.element_type == Some(crate::model::ElementType::Table) {
            match &el.tabular_section {
                Some(section) => {
                    let known = p.tabular_section_by_name(section).is_some()
                        || form.local_table_source(section).is_some();
                    if !known {
                        self.violations.push(format!(
                            "{ectx}: tabular section {section:?} is neither a processor \
                             tabular section nor form-local data"
                        ));
                    }
                }
                None => self
                    .violations
                    .push(format!("{ectx}: table element has no data source")),
            }
        }
        self.check_sibling_names(&el.children, &ectx);
    }

    fn check_sibling_names(&mut self, siblings: &[FormElement], ctx: &str) {
        let mut seen = FxHashSet::default();
        for el in siblings {
            if !seen.insert(el.name.clone()) {
                self.violations
                    .push(format!("{ctx}: duplicate sibling element name {:?}", el.name));
            }
        }
    }

    fn check_name(&mut self, name: &str, ctx: &str) {
        if !is_valid_identifier(name) {
            self.violations
                .push(format!("{ctx}: {name:?} is not a valid identifier"));
            return;
        }
        if is_metadata_collection(name) {
            self.violations.push(format!(
                "{ctx}: {name:?} collides with a platform metadata collection"
            ));
        }
    }

    fn check_handler_name(&mut self, name: &str, ctx: &str) {
        if !is_valid_identifier(name) {
            self.violations
                .push(format!("{ctx}: handler name {name:?} is not a valid identifier"));
            return;
        }
        if is_reserved_keyword(name) {
            self.violations
                .push(format!("{ctx}: handler name {name:?} is a reserved keyword"));
        }
        if is_builtin_form_method(name) {
            self.violations.push(format!(
                "{ctx}: handler name {name:?} shadows a built-in form method"
            ));
        }
    }

    fn check_id(&mut self, id: &StableId, ctx: &str) {
        if !StableId::is_well_formed(id.as_str()) {
            self.violations
                .push(format!("{ctx}: malformed identifier {id}"));
            return;
        }
        if let Some(previous) = self
            .seen_ids
            .insert(id.as_str().to_string(), ctx.to_string())
        {
            self.violations.push(format!(
                "{ctx}: identifier {id} already used by {previous}"
            ));
        }
    }

    fn check_qualifiers(
        &mut self,
        data_type: &DataType,
        length: Option<u32>,
        digits: Option<u32>,
        fraction_digits: Option<u32>,
        ctx: &str,
    ) {
        if let Some(length) = length {
            if *data_type != DataType::String {
                self.violations
                    .push(format!("{ctx}: length qualifier on non-string type"));
            }
            if length == 0 || length > MAX_STRING_LENGTH {
                self.violations.push(format!(
                    "{ctx}: length must be within 1..={MAX_STRING_LENGTH}, got {length}"
                ));
            }
        }
        if let Some(digits) = digits {
            if *data_type != DataType::Number {
                self.violations
                    .push(format!("{ctx}: digits qualifier on non-number type"));
            }
            if digits == 0 || digits > MAX_NUMBER_DIGITS {
                self.violations.push(format!(
                    "{ctx}: digits must be within 1..={MAX_NUMBER_DIGITS}, got {digits}"
                ));
            }
            if let Some(fraction) = fraction_digits {
                if fraction >= digits {
                    self.violations.push(format!(
                        "{ctx}: fraction_digits ({fraction}) must be less than digits ({digits})"
                    ));
                }
            }
        } else if fraction_digits.is_some() {
            self.violations
                .push(format!("{ctx}: fraction_digits requires digits"));
        }
    }

    fn check_picture_ref(&mut self, reference: &str, ctx: &str) {
        match check_picture(reference) {
            PictureCheck::Ok => {}
            PictureCheck::UnknownName { suggestion } => {
                let hint = suggestion
                    .map(|s| format!(" (did you mean {s:?}?)"))
                    .unwrap_or_default();
                self.violations
                    .push(format!("{ctx}: unknown picture {reference:?}{hint}"));
            }
            PictureCheck::BadPrefix => self.violations.push(format!(
                "{ctx}: picture {reference:?} must start with Std. or Common."
            )),
        }
    }

    fn check_woven_signature(&mut self, handler: &str, woven: &str, ctx: &str) {
        if !has_signature(woven) {
            self.violations.push(format!(
                "{ctx}: woven handler {handler:?} is missing its directive line"
            ));
            return;
        }
        if !woven.contains(handler) {
            self.violations.push(format!(
                "{ctx}: woven handler does not declare procedure {handler:?}"
            ));
        }
        let tail = woven.trim_end().to_lowercase();
        let closes = ["endprocedure", "endfunction", "конецпроцедуры", "конецфункции"]
            .iter()
            .any(|k| tail.ends_with(k));
        if !closes {
            self.violations
                .push(format!("{ctx}: woven handler {handler:?} does not close properly"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Attribute, Column, Command, ElementType, Form, FormElement, LongOperationSettings,
        Processor, TabularSection, ValueTableAttribute,
    };
    use rstest::rstest;

    fn base() -> Processor {
        let mut p = Processor::new("MyProc");
        p.forms.push(Form::new("F"));
        p
    }

    fn violations(p: &Processor) -> Vec<String> {
        match validate(p) {
            Ok(()) => Vec::new(),
            Err(e) => e.violations,
        }
    }

    #[rstest]
    #[case("Note", true)]
    #[case("_private", true)]
    #[case("Заметка", true)]
    #[case("Note2", true)]
    #[case("2Note", false)]
    #[case("Note Field", false)]
    #[case("", false)]
    fn identifier_rules(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(is_valid_identifier(name), ok, "{name}");
    }

    #[test]
    fn valid_minimal_model_passes() {
        let mut p = base();
        p.attributes
            .push(Attribute::new("Note", DataType::String));
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn metadata_collection_collision_is_rejected() {
        let mut p = base();
        p.attributes
            .push(Attribute::new("Catalogs", DataType::String));
        assert!(violations(&p).iter().any(|v| v.contains("metadata collection")));
    }

    #[test]
    fn reserved_handler_name_is_rejected() {
        let mut p = base();
        p.forms[0]
            .events
            .insert("OnOpen".into(), "Return".into());
        assert!(violations(&p).iter().any(|v| v.contains("reserved keyword")));
    }

    #[test]
    fn duplicate_stable_ids_are_rejected() {
        let mut p = base();
        let mut a = Attribute::new("A", DataType::String);
        let mut b = Attribute::new("B", DataType::String);
        b.id = a.id.clone();
        a.length = None;
        p.attributes.push(a);
        p.attributes.push(b);
        assert!(violations(&p).iter().any(|v| v.contains("already used")));
    }

    #[test]
    fn qualifier_ranges_are_enforced() {
        let mut p = base();
        let mut a = Attribute::new("A", DataType::String);
        a.length = Some(2000);
        let mut b = Attribute::new("B", DataType::Number);
        b.digits = Some(10);
        b.fraction_digits = Some(10);
        p.attributes.push(a);
        p.attributes.push(b);
        let v = violations(&p);
        assert!(v.iter().any(|m| m.contains("length must be within")));
        assert!(v.iter().any(|m| m.contains("fraction_digits")));
        assert_eq!(v.len(), 2, "{v:?}");
    }

    #[test]
    fn two_default_forms_are_rejected() {
        let mut p = Processor::new("P");
        let mut a = Form::new("A");
        a.is_default = true;
        let mut b = Form::new("B");
        b.is_default = true;
        p.forms.push(a);
        p.forms.push(b);
        assert!(violations(&p).iter().any(|v| v.contains("default form")));
    }

    #[test]
    fn table_reference_must_resolve() {
        let mut p = base();
        let mut table = FormElement::new(ElementType::Table, "T");
        table.tabular_section = Some("Missing".into());
        p.forms[0].elements.push(table);
        assert!(violations(&p).iter().any(|v| v.contains("Missing")));
    }

    #[test]
    fn table_reference_resolves_via_form_local_data() {
        let mut p = base();
        p.forms[0].value_tables.push(ValueTableAttribute::new("Rows"));
        let mut table = FormElement::new(ElementType::Table, "T");
        table.tabular_section = Some("Rows".into());
        p.forms[0].elements.push(table);
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn table_reference_resolves_via_processor_section() {
        let mut p = base();
        let mut ts = TabularSection::new("Items");
        ts.columns.push(Column::new("Qty", DataType::Number));
        p.tabular_sections.push(ts);
        let mut table = FormElement::new(ElementType::Table, "T");
        table.tabular_section = Some("Items".into());
        p.forms[0].elements.push(table);
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn long_operation_timeout_bounds() {
        let mut p = base();
        let mut cmd = Command::new("Run");
        cmd.long_operation = true;
        cmd.long_operation_settings = Some(LongOperationSettings {
            timeout_seconds: 0,
            ..LongOperationSettings::default()
        });
        p.forms[0].commands.push(cmd);
        assert!(violations(&p).iter().any(|v| v.contains("timeout_seconds")));
    }

    #[test]
    fn unknown_picture_gets_suggestion() {
        let mut p = base();
        let mut cmd = Command::new("Run");
        cmd.picture = Some("Std.Refersh".into());
        p.forms[0].commands.push(cmd);
        assert!(violations(&p).iter().any(|v| v.contains("Refresh")));
    }

    #[test]
    fn duplicate_sibling_element_names_are_rejected() {
        let mut p = base();
        p.forms[0]
            .elements
            .push(FormElement::new(ElementType::InputField, "X"));
        p.forms[0]
            .elements
            .push(FormElement::new(ElementType::LabelField, "X"));
        assert!(violations(&p).iter().any(|v| v.contains("duplicate sibling")));
    }

    #[test]
    fn all_violations_reported_at_once() {
        let mut p = base();
        p.attributes
            .push(Attribute::new("Catalogs", DataType::String));
        p.forms[0]
            .events
            .insert("OnOpen".into(), "Close".into());
        let v = violations(&p);
        assert!(v.len() >= 2, "{v:?}");
    }
}
