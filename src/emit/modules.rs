//! Module text assembly.
//!
//! Form modules are assembled in a fixed region order; the reverse path
//! depends on the order being stable across regenerations.

use crate::model::{Form, FormElement, Processor};

/// Region names used in emitted modules. The splitter additionally accepts
/// the Russian spellings on input.
pub const REGION_DOCUMENTATION: &str = "Documentation";
pub const REGION_FORM_EVENTS: &str = "FormEventHandlers";
pub const REGION_ELEMENT_EVENTS: &str = "FormElementEventHandlers";
pub const REGION_COMMANDS: &str = "FormCommandHandlers";
pub const REGION_LONG_OPERATIONS: &str = "LongOperations";
pub const REGION_UTILITIES: &str = "UtilityFunctions";

fn region(name: &str, body: &str) -> String {
    format!("#Region {name}\n\n{}\n\n#EndRegion", body.trim_end())
}

/// Assemble a form module in the canonical region order:
/// documentation, form events, element events, commands, long operations,
/// utilities.
pub fn assemble_form_module(processor: &Processor, form: &Form) -> String {
    let mut sections = Vec::new();

    if let Some(doc) = &form.documentation {
        if !doc.trim().is_empty() {
            sections.push(region(REGION_DOCUMENTATION, doc.trim()));
        }
    }

    let form_events: Vec<&str> = form.woven_events.values().map(String::as_str).collect();
    sections.push(region(
        REGION_FORM_EVENTS,
        &join_or_placeholder(&form_events, "// Form event handlers"),
    ));

    let mut element_events = Vec::new();
    for el in &form.elements {
        collect_element_events(el, &mut element_events);
    }
    for el in &form.auto_command_bar {
        collect_element_events(el, &mut element_events);
    }
    let element_refs: Vec<&str> = element_events.iter().map(String::as_str).collect();
    sections.push(region(
        REGION_ELEMENT_EVENTS,
        &join_or_placeholder(&element_refs, "// Form element event handlers"),
    ));

    let commands: Vec<&str> = form
        .commands
        .iter()
        .filter(|c| !c.long_operation)
        .filter_map(|c| c.woven.as_deref())
        .collect();
    sections.push(region(
        REGION_COMMANDS,
        &join_or_placeholder(&commands, "// Form command handlers"),
    ));

    // Long operations belong to the form whose command expanded them.
    let long_op_prefixes: Vec<&str> = form
        .commands
        .iter()
        .filter(|c| c.long_operation)
        .map(|c| c.name.as_str())
        .collect();
    if !long_op_prefixes.is_empty() {
        let bodies: Vec<&str> = processor
            .long_operation_handlers
            .iter()
            .filter(|(name, _)| long_op_prefixes.iter().any(|p| name.starts_with(p)))
            .map(|(_, body)| body.as_str())
            .collect();
        if !bodies.is_empty() {
            sections.push(region(REGION_LONG_OPERATIONS, &bodies.join("\n\n")));
        }
    }

    let helpers: Vec<&str> = form.helper_procedures.values().map(String::as_str).collect();
    sections.push(region(
        REGION_UTILITIES,
        &join_or_placeholder(&helpers, "// Utility procedures and functions"),
    ));

    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

/// Assemble the processor object module: the authored body (file-based or
/// extracted from the handlers source), or the empty two-region skeleton.
pub fn assemble_object_module(processor: &Processor) -> String {
    let authored = processor
        .object_module
        .as_deref()
        .or(processor.object_module_from_handlers.as_deref());
    match authored {
        Some(body) => {
            let mut out = body.trim_end().to_string();
            out.push('\n');
            out
        }
        None => format!(
            "{}\n\n{}\n",
            region("PublicInterface", "// Public export procedures"),
            region(REGION_UTILITIES, "// Utility procedures and functions"),
        ),
    }
}

fn collect_element_events(el: &FormElement, out: &mut Vec<String>) {
    for woven in el.woven_events.values() {
        out.push(woven.clone());
    }
    for child in &el.children {
        collect_element_events(child, out);
    }
}

fn join_or_placeholder(parts: &[&str], placeholder: &str) -> String {
    if parts.is_empty() {
        placeholder.to_string()
    } else {
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::split_source;
    use crate::model::{Command, ElementType, Form};

    #[test]
    fn regions_appear_in_canonical_order() {
        let mut form = Form::new("F");
        form.documentation = Some("Docs.".into());
        form.woven_events.insert(
            "FormOnOpen".into(),
            "&AtClient\nProcedure FormOnOpen(Cancel)\nEndProcedure".into(),
        );
        let mut cmd = Command::new("Go");
        cmd.woven = Some("&AtClient\nProcedure Go(Command)\nEndProcedure".into());
        form.commands.push(cmd);
        let p = Processor::new("P");

        let module = assemble_form_module(&p, &form);
        let order = [
            REGION_DOCUMENTATION,
            REGION_FORM_EVENTS,
            REGION_ELEMENT_EVENTS,
            REGION_COMMANDS,
            REGION_UTILITIES,
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|r| module.find(&format!("#Region {r}")).unwrap_or_else(|| panic!("missing {r}")))
            .collect();
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn empty_regions_carry_placeholder_comments() {
        let form = Form::new("F");
        let p = Processor::new("P");
        let module = assemble_form_module(&p, &form);
        assert!(module.contains("// Form element event handlers"));
        assert!(module.contains("// Form event handlers"));
    }

    #[test]
    fn woven_module_has_unique_procedure_names() {
        let mut form = Form::new("F");
        form.woven_events.insert(
            "FormOnOpen".into(),
            "&AtClient\nProcedure FormOnOpen(Cancel)\nEndProcedure".into(),
        );
        let mut el = crate::model::FormElement::new(ElementType::InputField, "X");
        el.woven_events.insert(
            "OnChange".into(),
            "&AtClient\nProcedure XOnChange(Item)\nEndProcedure".into(),
        );
        form.elements.push(el);
        form.helper_procedures.insert(
            "Helper".into(),
            "Function Helper()\nReturn 1;\nEndFunction".into(),
        );
        let p = Processor::new("P");
        let module = assemble_form_module(&p, &form);

        let split = split_source(&module);
        // IndexMap keys are unique by construction; the real assertion is
        // that nothing got silently merged.
        assert_eq!(split.procedures.len(), 3);
        assert!(split.warnings.is_empty(), "{:?}", split.warnings);
    }

    #[test]
    fn object_module_skeleton_when_nothing_authored() {
        let p = Processor::new("P");
        let module = assemble_object_module(&p);
        assert!(module.contains("#Region PublicInterface"));
        assert!(module.contains("#Region UtilityFunctions"));
    }

    #[test]
    fn authored_object_module_wins() {
        let mut p = Processor::new("P");
        p.object_module = Some("Function Calc() Export\nReturn 1;\nEndFunction".into());
        let module = assemble_object_module(&p);
        assert!(module.contains("Calc"));
        assert!(!module.contains("PublicInterface"));
    }
}
