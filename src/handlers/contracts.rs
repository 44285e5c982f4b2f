//! Event contracts and procedure templates for handler weaving.
//!
//! Each form or element event has a canonical signature: the compiler
//! directive, the parameter list, and whether the event pairs a client
//! handler with a server-side companion. The injector consults these tables
//! when a handler body arrives without its own signature.

/// Canonical signature for one event.
#[derive(Debug, Clone, Copy)]
pub struct EventContract {
    pub event: &'static str,
    pub directive: &'static str,
    pub params: &'static str,
    /// Suffix of the server companion procedure, when the contract pairs.
    pub server_suffix: Option<&'static str>,
}

pub const AT_CLIENT: &str = "AtClient";
pub const AT_SERVER: &str = "AtServer";
/// Suffix resolved for server companions (`<handler>AtServer`).
pub const SERVER_SUFFIX: &str = "AtServer";

const FORM_EVENTS: &[EventContract] = &[
    EventContract {
        event: "OnCreateAtServer",
        directive: AT_SERVER,
        params: "Cancel, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "OnOpen",
        directive: AT_CLIENT,
        params: "Cancel",
        server_suffix: Some(SERVER_SUFFIX),
    },
    EventContract {
        event: "OnClose",
        directive: AT_CLIENT,
        params: "Exit",
        server_suffix: None,
    },
    EventContract {
        event: "BeforeClose",
        directive: AT_CLIENT,
        params: "Cancel, Exit, WarningText, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "OnReopen",
        directive: AT_CLIENT,
        params: "",
        server_suffix: None,
    },
    EventContract {
        event: "ChoiceProcessing",
        directive: AT_CLIENT,
        params: "ChosenValue, ChoiceSource, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "NotificationProcessing",
        directive: AT_CLIENT,
        params: "EventName, Parameter, Source",
        server_suffix: None,
    },
];

const ELEMENT_EVENTS: &[EventContract] = &[
    EventContract {
        event: "OnChange",
        directive: AT_CLIENT,
        params: "Item",
        server_suffix: Some(SERVER_SUFFIX),
    },
    EventContract {
        event: "StartChoice",
        directive: AT_CLIENT,
        params: "Item, ChoiceData, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "ChoiceProcessing",
        directive: AT_CLIENT,
        params: "Item, ChosenValue, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "Opening",
        directive: AT_CLIENT,
        params: "Item, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "Click",
        directive: AT_CLIENT,
        params: "Item",
        server_suffix: None,
    },
    EventContract {
        event: "Selection",
        directive: AT_CLIENT,
        params: "Item, SelectedRow, Field, StandardProcessing",
        server_suffix: None,
    },
    EventContract {
        event: "OnActivateRow",
        directive: AT_CLIENT,
        params: "Item",
        server_suffix: None,
    },
    EventContract {
        event: "BeforeAddRow",
        directive: AT_CLIENT,
        params: "Item, Cancel, Clone, Parent, IsFolder, Parameter",
        server_suffix: None,
    },
    EventContract {
        event: "BeforeDeleteRow",
        directive: AT_CLIENT,
        params: "Item, Cancel",
        server_suffix: None,
    },
    EventContract {
        event: "OnEditEnd",
        directive: AT_CLIENT,
        params: "Item, NewRow, CancelEdit",
        server_suffix: None,
    },
];

pub fn form_event_contract(event: &str) -> Option<&'static EventContract> {
    FORM_EVENTS.iter().find(|c| c.event == event)
}

pub fn element_event_contract(event: &str) -> Option<&'static EventContract> {
    ELEMENT_EVENTS.iter().find(|c| c.event == event)
}

/// All known event names, for validation diagnostics.
pub fn known_form_events() -> impl Iterator<Item = &'static str> {
    FORM_EVENTS.iter().map(|c| c.event)
}

pub fn known_element_events() -> impl Iterator<Item = &'static str> {
    ELEMENT_EVENTS.iter().map(|c| c.event)
}

// ── Procedure templates ─────────────────────────────────────────────

/// Wrap a raw body in the canonical event signature.
pub fn event_handler(directive: &str, name: &str, params: &str, body: &str) -> String {
    format!(
        "&{directive}\nProcedure {name}({params})\n{}\nEndProcedure",
        indent(body)
    )
}

/// Thin client procedure that forwards to its server companion.
pub fn server_call_through(client: &str, params: &str, server: &str) -> String {
    format!(
        "&{AT_CLIENT}\nProcedure {client}({params})\n\t{server}();\nEndProcedure"
    )
}

/// Stub server procedure emitted when the companion body is absent.
pub fn server_stub(server: &str) -> String {
    format!(
        "&{AT_SERVER}\nProcedure {server}()\n\t// Insert handler body.\nEndProcedure"
    )
}

/// Names of the four fixed procedures a long-operation command expands to.
pub fn long_operation_names(command: &str) -> [String; 4] {
    [
        format!("{command}Button"),
        format!("{command}StartInBackground"),
        format!("{command}Completion"),
        format!("{command}{SERVER_SUFFIX}"),
    ]
}

/// Optional pre-start validation hook looked up by convention.
pub fn long_operation_preflight_name(command: &str) -> String {
    format!("{command}PreflightCheck")
}

/// Optional result-processing hook looked up by convention.
pub fn long_operation_result_name(command: &str) -> String {
    format!("{command}ResultProcessing")
}

/// Client button handler for a long-operation command.
pub fn long_operation_button(
    command: &str,
    validation_call: &str,
    wait_settings: &str,
) -> String {
    format!(
        "&{AT_CLIENT}\nProcedure {command}Button(Command)\n\
         {validation_call}\tJob = {command}StartInBackground();\n\
         \tWaitSettings = TimeConsumingOperationsClient.WaitSettings(ThisObject);\n\
         {wait_settings}\
         \tHandler = New NotifyDescription(\"{command}Completion\", ThisObject);\n\
         \tTimeConsumingOperationsClient.WaitCompletion(Job, Handler, WaitSettings);\n\
         EndProcedure"
    )
}

/// Server-side background starter for a long-operation command.
pub fn long_operation_start(command: &str, job_title: &str, parameters_code: &str) -> String {
    format!(
        "&{AT_SERVER}\nFunction {command}StartInBackground()\n\
         \tJobParameters = New Structure;\n\
         {parameters_code}\
         \tExecutionParameters = TimeConsumingOperations.BackgroundExecutionParameters(UUID);\n\
         \tExecutionParameters.BackgroundJobDescription = \"{job_title}\";\n\
         \tReturn TimeConsumingOperations.ExecuteInBackground(\n\
         \t\t\"{command}{SERVER_SUFFIX}\", JobParameters, ExecutionParameters);\n\
         EndFunction"
    )
}

/// Client completion handler; invokes the optional result hook when the
/// author supplied one.
pub fn long_operation_completion(command: &str, with_result_hook: bool) -> String {
    let mut lines = vec![
        format!("&{AT_CLIENT}"),
        format!("Procedure {command}Completion(Result, AdditionalParameters) Export"),
        "\tIf Result = Undefined Then".to_string(),
        "\t\tMessage(\"Operation was cancelled\");".to_string(),
        "\t\tReturn;".to_string(),
        "\tEndIf;".to_string(),
        "\tIf Result.Status = \"Error\" Then".to_string(),
        "\t\tShowMessageBox(, Result.BriefErrorDescription);".to_string(),
        "\t\tReturn;".to_string(),
        "\tEndIf;".to_string(),
    ];
    if with_result_hook {
        lines.push("\tOperationResult = GetFromTempStorage(Result.ResultAddress);".to_string());
        lines.push(format!(
            "\t{}(OperationResult);",
            long_operation_result_name(command)
        ));
    }
    lines.push("\tMessage(\"Operation completed\");".to_string());
    lines.push("EndProcedure".to_string());
    lines.join("\n")
}

pub fn indent(code: &str) -> String {
    code.lines()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("\t{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_resolve_by_event_name() {
        let c = form_event_contract("OnCreateAtServer").unwrap();
        assert_eq!(c.directive, AT_SERVER);
        assert!(form_event_contract("NoSuchEvent").is_none());
        assert!(element_event_contract("OnChange").unwrap().server_suffix.is_some());
    }

    #[test]
    fn wrapped_handler_has_signature_and_indented_body() {
        let wrapped = event_handler(AT_CLIENT, "FormOnOpen", "Cancel", "X = 1;\nY = 2;");
        assert!(wrapped.starts_with("&AtClient\nProcedure FormOnOpen(Cancel)\n"));
        assert!(wrapped.contains("\tX = 1;"));
        assert!(wrapped.ends_with("EndProcedure"));
    }

    #[test]
    fn long_operation_quad_names_match_contract() {
        assert_eq!(
            long_operation_names("RunJob"),
            [
                "RunJobButton".to_string(),
                "RunJobStartInBackground".to_string(),
                "RunJobCompletion".to_string(),
                "RunJobAtServer".to_string(),
            ]
        );
    }
}
