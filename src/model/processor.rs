//! Processor-level entities: the compilation root and everything it owns.

use indexmap::IndexMap;
use std::path::PathBuf;

use super::form::Form;
use super::ids::StableId;
use super::multilang::{MultiLang, default_languages};
use super::types::DataType;

/// Identifiers the platform expects on the root descriptor.
#[derive(Clone, Debug)]
pub struct ProcessorIds {
    pub root: StableId,
    pub object: StableId,
    pub type_id: StableId,
    pub value: StableId,
    pub form_group: StableId,
}

impl Default for ProcessorIds {
    fn default() -> Self {
        Self {
            root: StableId::generate(),
            object: StableId::generate(),
            type_id: StableId::generate(),
            value: StableId::generate(),
            form_group: StableId::generate(),
        }
    }
}

/// The root entity the compiler emits. Constructed by the config loader,
/// mutated by the handler injector, frozen before artifact emission.
#[derive(Clone, Debug)]
pub struct Processor {
    pub name: String,
    pub synonym: MultiLang,
    pub platform_version: String,
    /// Declared language order; drives multilingual expansion.
    pub languages: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub tabular_sections: Vec<TabularSection>,
    pub forms: Vec<Form>,
    pub templates: Vec<Template>,
    pub validation: ValidationConfig,
    /// Object-module body from `object_module.file`.
    pub object_module: Option<String>,
    /// Object-module body extracted from the handlers source's named region.
    pub object_module_from_handlers: Option<String>,
    /// `procedure name → body` emitted into the LongOperations region.
    pub long_operation_handlers: IndexMap<String, String>,
    pub ids: ProcessorIds,
}

impl Processor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            name,
            platform_version: "2.11".into(),
            languages: default_languages(),
            attributes: Vec::new(),
            tabular_sections: Vec::new(),
            forms: Vec::new(),
            templates: Vec::new(),
            validation: ValidationConfig::default(),
            object_module: None,
            object_module_from_handlers: None,
            long_operation_handlers: IndexMap::new(),
            ids: ProcessorIds::default(),
        }
    }

    pub fn default_form(&self) -> Option<&Form> {
        self.forms
            .iter()
            .find(|f| f.is_default)
            .or_else(|| self.forms.first())
    }

    pub fn form_by_name(&self, name: &str) -> Option<&Form> {
        self.forms.iter().find(|f| f.name == name)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn tabular_section_by_name(&self, name: &str) -> Option<&TabularSection> {
        self.tabular_sections.iter().find(|t| t.name == name)
    }
}

/// A scalar attribute on the processor object.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub synonym: MultiLang,
    pub length: Option<u32>,
    pub digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub id: StableId,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            name,
            data_type,
            length: None,
            digits: None,
            fraction_digits: None,
            id: StableId::generate(),
        }
    }
}

/// A column of a tabular section or a form-local value table.
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub synonym: MultiLang,
    pub length: Option<u32>,
    pub digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub read_only: bool,
    pub id: StableId,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            name,
            data_type,
            length: None,
            digits: None,
            fraction_digits: None,
            read_only: false,
            id: StableId::generate(),
        }
    }
}

/// Identifiers a tabular section carries in the descriptor.
#[derive(Clone, Debug)]
pub struct TabularSectionIds {
    pub own: StableId,
    pub type_id: StableId,
    pub value: StableId,
    pub row_type: StableId,
    pub row_value: StableId,
}

impl Default for TabularSectionIds {
    fn default() -> Self {
        Self {
            own: StableId::generate(),
            type_id: StableId::generate(),
            value: StableId::generate(),
            row_type: StableId::generate(),
            row_value: StableId::generate(),
        }
    }
}

/// A processor-owned collection with columns.
#[derive(Clone, Debug)]
pub struct TabularSection {
    pub name: String,
    pub synonym: MultiLang,
    pub columns: Vec<Column>,
    pub ids: TabularSectionIds,
}

impl TabularSection {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            synonym: MultiLang::uniform(&name),
            name,
            columns: Vec::new(),
            ids: TabularSectionIds::default(),
        }
    }
}

/// Tuning for commands flagged `long_operation`.
#[derive(Clone, Debug)]
pub struct LongOperationSettings {
    pub show_progress: bool,
    pub allow_cancel: bool,
    pub progress_message: MultiLang,
    pub timeout_seconds: u32,
    pub wait_completion_initial: f64,
    pub use_additional_parameters: bool,
    pub output_messages: bool,
    pub output_progress: bool,
}

impl Default for LongOperationSettings {
    fn default() -> Self {
        Self {
            show_progress: true,
            allow_cancel: true,
            progress_message: MultiLang {
                ru: "Выполнение операции...".into(),
                uk: "Виконання операції...".into(),
                en: "Operation in progress...".into(),
            },
            timeout_seconds: 300,
            wait_completion_initial: 0.0,
            use_additional_parameters: false,
            output_messages: true,
            output_progress: false,
        }
    }
}

/// A form command: a named action with presentation and an optional
/// server-side or long-operation wiring.
#[derive(Clone, Debug)]
pub struct Command {
    pub name: String,
    pub title: MultiLang,
    pub tooltip: Option<MultiLang>,
    /// Handler name resolved against the split handler source.
    pub action: String,
    pub picture: Option<String>,
    pub shortcut: Option<String>,
    pub long_operation: bool,
    pub long_operation_settings: Option<LongOperationSettings>,
    /// Woven procedure text, filled by the injector.
    pub woven: Option<String>,
    pub id: StableId,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: MultiLang::uniform(&name),
            action: name.clone(),
            name,
            tooltip: None,
            picture: None,
            shortcut: None,
            long_operation: false,
            long_operation_settings: None,
            woven: None,
            id: StableId::generate(),
        }
    }

    /// Long-operation commands always carry settings.
    pub fn settings(&self) -> LongOperationSettings {
        self.long_operation_settings.clone().unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    HtmlDocument,
    SpreadsheetDocument,
}

impl TemplateKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "HTMLDocument" | "HtmlDocument" => Some(TemplateKind::HtmlDocument),
            "SpreadsheetDocument" | "SpreadSheetDocument" => Some(TemplateKind::SpreadsheetDocument),
            _ => None,
        }
    }

    pub fn descriptor_name(&self) -> &'static str {
        match self {
            TemplateKind::HtmlDocument => "HTMLDocument",
            TemplateKind::SpreadsheetDocument => "SpreadsheetDocument",
        }
    }
}

/// A placeholder substituted into HTML template content.
#[derive(Clone, Debug)]
pub struct TemplatePlaceholder {
    pub name: String,
    /// Expression evaluated by the generated refresh procedure.
    pub expression: Option<String>,
    /// Shorthand: bind straight to an attribute.
    pub attribute: Option<String>,
}

/// CSS/JS assets injected into HTML template content at load time.
#[derive(Clone, Debug, Default)]
pub struct TemplateAssets {
    pub styles: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
}

/// A named template artifact.
#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub kind: TemplateKind,
    pub path: Option<PathBuf>,
    pub content: Option<String>,
    pub content_binary: Option<Vec<u8>>,
    /// When set, a viewer field is synthesized on the target form.
    pub auto_field: bool,
    pub field_name: Option<String>,
    pub target_form: Option<String>,
    pub placeholders: Vec<TemplatePlaceholder>,
    pub assets: TemplateAssets,
    pub id: StableId,
}

impl Template {
    pub fn new(name: impl Into<String>, kind: TemplateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            path: None,
            content: None,
            content_binary: None,
            auto_field: false,
            field_name: None,
            target_form: None,
            placeholders: Vec::new(),
            assets: TemplateAssets::default(),
            id: StableId::generate(),
        }
    }

    /// Name of the synthesized viewer field.
    pub fn generated_field_name(&self) -> String {
        self.field_name
            .clone()
            .unwrap_or_else(|| format!("{}Field", self.name))
    }
}

/// Switches consumed when asking the platform driver to validate output.
#[derive(Clone, Debug)]
pub struct ValidationConfig {
    pub syntax_check: bool,
    pub check_thin_client: bool,
    pub check_server: bool,
    pub check_web_client: bool,
    pub check_external_connection: bool,
    pub check_thick_client: bool,
    pub semantic_check: bool,
    pub check_incorrect_references: bool,
    pub check_handlers_existence: bool,
    pub check_empty_handlers: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            syntax_check: true,
            check_thin_client: true,
            check_server: true,
            check_web_client: false,
            check_external_connection: false,
            check_thick_client: false,
            semantic_check: false,
            check_incorrect_references: true,
            check_handlers_existence: true,
            check_empty_handlers: true,
        }
    }
}
