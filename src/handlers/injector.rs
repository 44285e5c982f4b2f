//! Handler weaving.
//!
//! For every form event, element event, and command, locate the authored
//! body in the handler map, wrap it in the canonical signature when it
//! arrives bare, pair client/server procedures where the event contract
//! requires it, and collect everything the weave did not consume as helper
//! procedures. A missing referenced handler is a warning; the missing
//! business-logic side of a long operation is fatal.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::path::Path;
use tracing::{debug, warn};

use super::contracts::{
    self, AT_CLIENT, AT_SERVER, SERVER_SUFFIX, element_event_contract, form_event_contract,
};
use super::lexer::has_signature;
use super::splitter::{SplitHandlers, split_source};
use crate::model::{Form, FormElement, Processor};

/// Fatal: a long-operation command without its business-logic handler.
#[derive(Debug, thiserror::Error)]
#[error(
    "long operation command {command:?} requires handler {handler:?}; \
     declare `Procedure {handler}(Parameters, ResultAddress) Export` in the handler source"
)]
pub struct MissingHandler {
    pub command: String,
    pub handler: String,
}

/// Handler bodies available to one form's weave. Built either from a split
/// monolithic source (bodies carry their signatures) or from a handler
/// directory (bodies may be bare snippets).
#[derive(Debug, Clone, Default)]
pub struct HandlerSource {
    pub bodies: IndexMap<String, String>,
    pub documentation: Option<String>,
    pub object_module: Option<String>,
    pub warnings: Vec<String>,
}

impl From<SplitHandlers> for HandlerSource {
    fn from(split: SplitHandlers) -> Self {
        Self {
            bodies: split
                .procedures
                .into_iter()
                .map(|(name, proc)| (name, proc.text))
                .collect(),
            documentation: split.documentation,
            object_module: split.object_module,
            warnings: split.warnings,
        }
    }
}

impl HandlerSource {
    /// One `.bsl` file per handler; the stem is the handler name.
    pub fn from_dir(dir: &Path) -> Self {
        let mut source = HandlerSource::default();
        let mut entries: Vec<_> = match std::fs::read_dir(dir) {
            Ok(iter) => iter.flatten().map(|e| e.path()).collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "handlers directory unreadable");
                return source;
            }
        };
        entries.sort();
        for path in entries {
            if path.extension().and_then(|e| e.to_str()) != Some("bsl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    source
                        .bodies
                        .insert(stem.to_string(), crate::config::strip_bom(&text).trim().to_string());
                }
                Err(e) => warn!(path = %path.display(), error = %e, "handler file unreadable"),
            }
        }
        source
    }
}

/// Inject handlers for every form, reading each form's handler source from
/// disk. Returns accumulated warnings.
pub fn inject_processor(processor: &mut Processor) -> Result<Vec<String>, MissingHandler> {
    let mut sources: IndexMap<String, HandlerSource> = IndexMap::new();
    for form in &processor.forms {
        if let Some(path) = &form.handlers_file {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    sources.insert(form.name.clone(), split_source(&text).into());
                }
                Err(e) => {
                    warn!(form = %form.name, path = %path.display(), error = %e,
                          "handler source unreadable");
                }
            }
        } else if let Some(dir) = &form.handlers_dir {
            sources.insert(form.name.clone(), HandlerSource::from_dir(dir));
        }
    }
    inject_with_sources(processor, &sources)
}

/// Inject handlers from prepared sources keyed by form name.
pub fn inject_with_sources(
    processor: &mut Processor,
    sources: &IndexMap<String, HandlerSource>,
) -> Result<Vec<String>, MissingHandler> {
    let mut warnings = Vec::new();
    let mut long_ops: IndexMap<String, String> = IndexMap::new();
    let mut object_module_from_handlers: Option<String> = None;

    for form in &mut processor.forms {
        let Some(source) = sources.get(&form.name) else {
            continue;
        };
        warnings.extend(source.warnings.iter().cloned());

        let mut weaver = Weaver {
            source,
            used: FxHashSet::default(),
            warnings: Vec::new(),
        };
        weaver.weave_form(form, &mut long_ops)?;

        // Anything the weave did not consume is a helper, emitted verbatim.
        for (name, body) in &source.bodies {
            if !weaver.used.contains(name.as_str()) {
                form.helper_procedures.insert(name.clone(), body.clone());
            }
        }

        if let Some(doc) = &source.documentation {
            form.documentation = Some(match form.documentation.take() {
                Some(existing) => format!("{existing}\n\n{doc}"),
                None => doc.clone(),
            });
        }
        if object_module_from_handlers.is_none() {
            object_module_from_handlers = source.object_module.clone();
        }
        warnings.append(&mut weaver.warnings);
    }

    if processor.object_module_from_handlers.is_none() {
        processor.object_module_from_handlers = object_module_from_handlers;
    }
    processor.long_operation_handlers.extend(long_ops);
    Ok(warnings)
}

struct Weaver<'a> {
    source: &'a HandlerSource,
    used: FxHashSet<String>,
    warnings: Vec<String>,
}

impl<'a> Weaver<'a> {
    fn weave_form(
        &mut self,
        form: &mut Form,
        long_ops: &mut IndexMap<String, String>,
    ) -> Result<(), MissingHandler> {
        // Form events.
        let events: Vec<(String, String)> = form
            .events
            .iter()
            .map(|(e, h)| (e.clone(), h.clone()))
            .collect();
        for (event, handler) in events {
            let Some(contract) = form_event_contract(&event) else {
                self.warnings.push(format!("unknown form event {event:?}"));
                continue;
            };
            if let Some(woven) = self.weave_event(
                &handler,
                contract.directive,
                contract.params,
                contract.server_suffix,
                form,
            ) {
                form.woven_events.insert(handler.clone(), woven);
            } else {
                self.warnings
                    .push(format!("handler {handler:?} for form event {event:?} not found"));
            }
        }

        // Commands; long-operation commands expand separately.
        for i in 0..form.commands.len() {
            if form.commands[i].long_operation {
                continue;
            }
            let action = form.commands[i].action.clone();
            let Some(main) = self.lookup(&action, form) else {
                self.warnings
                    .push(format!("handler {action:?} for command not found"));
                continue;
            };
            let mut woven = if has_signature(&main) {
                main
            } else {
                contracts::event_handler(AT_CLIENT, &action, "Command", &main)
            };
            let server_name = format!("{action}{SERVER_SUFFIX}");
            if let Some(server) = self.lookup(&server_name, form) {
                let server_woven = if has_signature(&server) {
                    server
                } else {
                    contracts::event_handler(AT_SERVER, &server_name, "", &server)
                };
                woven.push_str("\n\n");
                woven.push_str(&server_woven);
            }
            form.commands[i].woven = Some(woven);
        }

        // Element events, over the whole tree including the auto command bar.
        let mut elements = std::mem::take(&mut form.elements);
        for el in &mut elements {
            el.walk_mut(&mut |node| self.weave_element(node, form));
        }
        form.elements = elements;
        let mut bar = std::mem::take(&mut form.auto_command_bar);
        for el in &mut bar {
            el.walk_mut(&mut |node| self.weave_element(node, form));
        }
        form.auto_command_bar = bar;

        // Long operations.
        for i in 0..form.commands.len() {
            if !form.commands[i].long_operation {
                continue;
            }
            let cmd = form.commands[i].clone();
            self.weave_long_operation(&cmd, form, long_ops)?;
        }
        Ok(())
    }

    fn weave_element(&mut self, element: &mut FormElement, form: &mut Form) {
        if element.event_handlers.is_empty() {
            return;
        }
        let handlers: Vec<(String, String)> = element
            .event_handlers
            .iter()
            .map(|(e, h)| (e.clone(), h.clone()))
            .collect();
        for (event, handler) in handlers {
            let Some(contract) = element_event_contract(&event) else {
                self.warnings
                    .push(format!("unknown element event {event:?}"));
                continue;
            };
            match self.weave_event(
                &handler,
                contract.directive,
                contract.params,
                contract.server_suffix,
                form,
            ) {
                Some(woven) => {
                    element.woven_events.insert(event, woven);
                }
                None => self.warnings.push(format!(
                    "handler {handler:?} for element event {event:?} not found"
                )),
            }
        }
    }

    /// Weave one event handler. Returns `None` when no body exists on
    /// either the client or server side.
    fn weave_event(
        &mut self,
        handler: &str,
        directive: &'static str,
        params: &'static str,
        server_suffix: Option<&'static str>,
        form: &mut Form,
    ) -> Option<String> {
        let client = self.lookup(handler, form);
        let Some(suffix) = server_suffix else {
            let main = client?;
            return Some(if has_signature(&main) {
                main
            } else {
                contracts::event_handler(directive, handler, params, &main)
            });
        };

        let server_name = format!("{handler}{suffix}");
        let server = self.lookup(&server_name, form);
        if client.is_none() && server.is_none() {
            return None;
        }
        let client_proc = match client {
            Some(main) if has_signature(&main) => main,
            Some(main) => contracts::event_handler(directive, handler, params, &main),
            None => contracts::server_call_through(handler, params, &server_name),
        };
        let server_proc = match server {
            Some(body) if has_signature(&body) => body,
            Some(body) => contracts::event_handler(AT_SERVER, &server_name, "", &body),
            None => contracts::server_stub(&server_name),
        };
        Some(format!("{client_proc}\n\n{server_proc}"))
    }

    fn weave_long_operation(
        &mut self,
        cmd: &crate::model::Command,
        form: &mut Form,
        long_ops: &mut IndexMap<String, String>,
    ) -> Result<(), MissingHandler> {
        let settings = cmd.settings();
        let [button_name, start_name, completion_name, server_name] =
            contracts::long_operation_names(&cmd.name);

        let Some(server_body) = self.lookup(&server_name, form) else {
            return Err(MissingHandler {
                command: cmd.name.clone(),
                handler: server_name,
            });
        };

        let preflight_name = contracts::long_operation_preflight_name(&cmd.name);
        let preflight = self.lookup(&preflight_name, form);
        let result_name = contracts::long_operation_result_name(&cmd.name);
        let result_hook = self.lookup(&result_name, form);

        let mut wait_lines = Vec::new();
        if settings.show_progress {
            wait_lines.push("\tWaitSettings.OutputIdleWindow = True;".to_string());
            wait_lines.push(format!(
                "\tWaitSettings.MessageText = \"{}\";",
                settings.progress_message.ru
            ));
        } else {
            wait_lines.push("\tWaitSettings.OutputIdleWindow = False;".to_string());
        }
        if settings.output_messages {
            wait_lines.push("\tWaitSettings.OutputMessages = True;".to_string());
        }
        if settings.output_progress {
            wait_lines.push("\tWaitSettings.OutputProgressBar = True;".to_string());
        }
        let mut wait_settings = wait_lines.join("\n");
        wait_settings.push('\n');

        let validation_call = if preflight.is_some() {
            format!("\tIf Not {preflight_name}() Then\n\t\tReturn;\n\tEndIf;\n")
        } else {
            String::new()
        };

        let parameters_code = if settings.use_additional_parameters {
            "\tFor Each AttributeInfo In GetAttributes() Do\n\
             \t\tJobParameters.Insert(AttributeInfo.Name, ThisObject[AttributeInfo.Name]);\n\
             \tEndDo;\n"
                .to_string()
        } else {
            String::new()
        };

        let server_proc = if has_signature(&server_body) {
            server_body
        } else {
            contracts::event_handler(
                AT_SERVER,
                &server_name,
                "Parameters, ResultAddress",
                &server_body,
            )
        };

        long_ops.insert(
            button_name,
            contracts::long_operation_button(&cmd.name, &validation_call, &wait_settings),
        );
        long_ops.insert(
            start_name,
            contracts::long_operation_start(&cmd.name, &cmd.title.ru, &parameters_code),
        );
        long_ops.insert(
            completion_name,
            contracts::long_operation_completion(&cmd.name, result_hook.is_some()),
        );
        long_ops.insert(server_name, server_proc);

        if let Some(body) = preflight {
            long_ops.insert(preflight_name, body);
        }
        if let Some(body) = result_hook {
            long_ops.insert(result_name, body);
        }
        debug!(command = %cmd.name, "expanded long operation handlers");
        Ok(())
    }

    /// Look up a handler body. Procedures that appeared in the body's
    /// preamble position are lifted into the form's helpers.
    fn lookup(&mut self, name: &str, form: &mut Form) -> Option<String> {
        let body = self.source.bodies.get(name)?;
        self.used.insert(name.to_string());
        let (main, helpers) = extract_main_and_helpers(body, name);
        for (helper_name, helper_text) in helpers {
            form.helper_procedures.insert(helper_name, helper_text);
        }
        Some(main)
    }
}

/// Split a handler snippet into its main body and accompanying helper
/// procedures. A non-empty preamble is the main body (an already-formed
/// module prefix); otherwise the procedure matching the handler name wins
/// and the rest become helpers.
pub fn extract_main_and_helpers(
    code: &str,
    handler_name: &str,
) -> (String, IndexMap<String, String>) {
    let split = split_source(code);
    if !split.preamble.is_empty() {
        let helpers = split
            .procedures
            .into_iter()
            .map(|(n, p)| (n, p.text))
            .collect();
        return (split.preamble, helpers);
    }
    if split.procedures.is_empty() {
        return (code.to_string(), IndexMap::new());
    }
    if split.procedures.len() == 1 {
        let proc = split.procedures.into_iter().next().unwrap().1;
        return (proc.text, IndexMap::new());
    }
    let main_key = split
        .procedures
        .keys()
        .find(|n| {
            n.as_str() == handler_name
                || handler_name.ends_with(n.as_str())
                || n.starts_with(handler_name)
        })
        .cloned()
        .unwrap_or_else(|| split.procedures.keys().next().unwrap().clone());
    let mut main = String::new();
    let mut helpers = IndexMap::new();
    for (name, proc) in split.procedures {
        if name == main_key {
            main = proc.text;
        } else {
            helpers.insert(name, proc.text);
        }
    }
    (main, helpers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Command, ElementType, Form, FormElement, Processor};

    fn monolith(source: &str) -> HandlerSource {
        split_source(source).into()
    }

    fn bare(entries: &[(&str, &str)]) -> HandlerSource {
        HandlerSource {
            bodies: entries
                .iter()
                .map(|(n, b)| (n.to_string(), b.to_string()))
                .collect(),
            ..HandlerSource::default()
        }
    }

    fn processor_with_form(form: Form) -> Processor {
        let mut p = Processor::new("P");
        p.forms.push(form);
        p
    }

    #[test]
    fn bare_body_is_wrapped_with_canonical_signature() {
        let mut form = Form::new("F");
        form.events
            .insert("OnCreateAtServer".into(), "Setup".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), bare(&[("Setup", "X = 1;")]))]);
        inject_with_sources(&mut p, &sources).unwrap();

        let woven = &p.forms[0].woven_events["Setup"];
        assert!(woven.starts_with("&AtServer\nProcedure Setup(Cancel, StandardProcessing)"));
        assert!(woven.contains("\tX = 1;"));
        assert!(woven.ends_with("EndProcedure"));
    }

    #[test]
    fn signed_body_is_emitted_verbatim() {
        let text =
            "&AtServer\nProcedure Setup(Cancel, StandardProcessing)\n\tX = 1;\nEndProcedure";
        let mut form = Form::new("F");
        form.events
            .insert("OnCreateAtServer".into(), "Setup".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), monolith(text))]);
        inject_with_sources(&mut p, &sources).unwrap();
        assert_eq!(p.forms[0].woven_events["Setup"], text);
    }

    #[test]
    fn paired_event_emits_stub_server_when_absent() {
        let mut form = Form::new("F");
        form.events.insert("OnOpen".into(), "FormOnOpen".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([(
            "F".to_string(),
            monolith("Procedure FormOnOpen(Cancel)\n\tA = 1;\nEndProcedure"),
        )]);
        inject_with_sources(&mut p, &sources).unwrap();
        let woven = &p.forms[0].woven_events["FormOnOpen"];
        assert!(woven.contains("Procedure FormOnOpenAtServer()"));
        assert!(woven.contains("// Insert handler body."));
    }

    #[test]
    fn server_only_pair_gets_call_through_client() {
        let mut form = Form::new("F");
        form.events.insert("OnOpen".into(), "FormOnOpen".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([(
            "F".to_string(),
            bare(&[("FormOnOpenAtServer", "Init();")]),
        )]);
        inject_with_sources(&mut p, &sources).unwrap();
        let woven = &p.forms[0].woven_events["FormOnOpen"];
        assert!(woven.contains("Procedure FormOnOpen(Cancel)"));
        assert!(woven.contains("FormOnOpenAtServer();"));
    }

    #[test]
    fn missing_handler_is_a_warning_not_fatal() {
        let mut form = Form::new("F");
        form.events.insert("OnClose".into(), "Gone".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), HandlerSource::default())]);
        let warnings = inject_with_sources(&mut p, &sources).unwrap();
        assert!(warnings.iter().any(|w| w.contains("Gone")));
    }

    #[test]
    fn unconsumed_procedures_become_helpers() {
        let source = "\
Procedure Used(Cancel)
\tA = 1;
EndProcedure

Function Orphan() Export
\tReturn 2;
EndFunction
";
        let mut form = Form::new("F");
        form.events.insert("OnOpen".into(), "Used".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), monolith(source))]);
        inject_with_sources(&mut p, &sources).unwrap();
        assert!(p.forms[0].helper_procedures.contains_key("Orphan"));
        assert!(!p.forms[0].helper_procedures.contains_key("Used"));
    }

    #[test]
    fn element_event_weaves_with_server_pair() {
        let source = "\
Procedure NoteOnChange(Item)
\tRefresh();
EndProcedure

Procedure NoteOnChangeAtServer()
\tRecalculate();
EndProcedure
";
        let mut el = FormElement::new(ElementType::InputField, "NoteField");
        el.event_handlers
            .insert("OnChange".into(), "NoteOnChange".into());
        let mut form = Form::new("F");
        form.elements.push(el);
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), monolith(source))]);
        inject_with_sources(&mut p, &sources).unwrap();

        let woven = &p.forms[0].elements[0].woven_events["OnChange"];
        assert!(woven.contains("NoteOnChange"));
        assert!(woven.contains("NoteOnChangeAtServer"));
        assert!(woven.contains("Recalculate"));
    }

    #[test]
    fn long_operation_expands_to_four_procedures() {
        let source = "\
&AtServer
Procedure RunJobAtServer(Parameters, ResultAddress) Export
\tResult = 42;
EndProcedure
";
        let mut cmd = Command::new("RunJob");
        cmd.long_operation = true;
        let mut form = Form::new("F");
        form.commands.push(cmd);
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), monolith(source))]);
        inject_with_sources(&mut p, &sources).unwrap();

        for name in [
            "RunJobButton",
            "RunJobStartInBackground",
            "RunJobCompletion",
            "RunJobAtServer",
        ] {
            assert!(
                p.long_operation_handlers.contains_key(name),
                "missing {name}"
            );
        }
    }

    #[test]
    fn long_operation_without_server_handler_is_fatal() {
        let mut cmd = Command::new("RunJob");
        cmd.long_operation = true;
        let mut form = Form::new("F");
        form.commands.push(cmd);
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), HandlerSource::default())]);
        let err = inject_with_sources(&mut p, &sources).unwrap_err();
        assert_eq!(err.handler, "RunJobAtServer");
    }

    #[test]
    fn helpers_in_handler_body_preamble_are_lifted() {
        let code = "\
X = Compute();

Function Compute()
\tReturn 7;
EndFunction
";
        let (main, helpers) = extract_main_and_helpers(code, "H");
        assert_eq!(main, "X = Compute();");
        assert!(helpers.contains_key("Compute"));
    }

    #[test]
    fn documentation_from_handlers_merges_into_form() {
        let source = "\
#Region Documentation
How this form works.
#EndRegion
";
        let mut form = Form::new("F");
        form.documentation = Some("Authored docs.".into());
        let mut p = processor_with_form(form);
        let sources = IndexMap::from([("F".to_string(), monolith(source))]);
        inject_with_sources(&mut p, &sources).unwrap();
        let doc = p.forms[0].documentation.as_deref().unwrap();
        assert!(doc.starts_with("Authored docs."));
        assert!(doc.contains("How this form works."));
    }
}
