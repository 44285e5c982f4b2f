//! The handler-language toolchain.
//!
//! Everything that touches host-language source lives here: the token
//! stream, the procedure splitter, the event-contract tables, the weaver
//! that assembles form modules, the procedure-level differ, and the
//! procedure-level patcher. The core never interprets handler code; it only
//! recognizes procedure boundaries and directive annotations.

mod contracts;
mod diff;
mod injector;
mod lexer;
mod patcher;
mod splitter;

pub use contracts::{
    AT_CLIENT, AT_SERVER, EventContract, SERVER_SUFFIX, element_event_contract, event_handler,
    form_event_contract, known_element_events, known_form_events, long_operation_names,
    long_operation_preflight_name, long_operation_result_name,
};
pub use diff::{HandlerChange, diff_handlers};
pub use injector::{
    HandlerSource, MissingHandler, extract_main_and_helpers, inject_processor,
    inject_with_sources,
};
pub use lexer::{Keyword, Spanned, Tok, has_signature, keyword_of, tokenize};
pub use patcher::{HandlerPatch, PatchOutcome, apply_patch, apply_patches};
pub use splitter::{
    ProcKind, Procedure, SplitHandlers, normalize_snippet, scan_procedures, split_source,
};
