//! The processor data model.
//!
//! A standalone representation of everything the compiler emits, decoupled
//! from both the declarative source syntax and the artifact layout:
//!
//! ```text
//! Processor
//! ├── attributes: Vec<Attribute>
//! ├── tabular_sections: Vec<TabularSection> (columns)
//! ├── forms: Vec<Form>
//! │     ├── elements: Vec<FormElement>      (recursive tree)
//! │     ├── commands, events, parameters
//! │     └── form-local data (value tables, dynamic lists, ...)
//! └── templates: Vec<Template>
//! ```
//!
//! Ownership is strict: a processor exclusively owns its collections; forms
//! reference processor-level entities by *name* (weak), resolved in a
//! separate lookup phase during element preparation.

mod element;
mod form;
mod ids;
mod multilang;
mod processor;
mod types;

pub use element::{ElementType, FormElement};
pub use form::{
    DynamicListAttribute, DynamicListColumn, DynamicListParameter, Form, FormAttribute,
    FormParameter, LocalTableSource, ValueTableAttribute, ValueTreeAttribute,
};
pub use ids::StableId;
pub use multilang::{LANGUAGES, MULTILANG_FIELDS, MultiLang, MultiLangError, default_languages};
pub use processor::{
    Attribute, Column, Command, LongOperationSettings, Processor, ProcessorIds, TabularSection,
    TabularSectionIds, Template, TemplateAssets, TemplateKind, TemplatePlaceholder,
    ValidationConfig,
};
pub use types::{DataType, MAX_NUMBER_DIGITS, MAX_STRING_LENGTH, TypeParseError};
