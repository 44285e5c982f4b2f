//! Declarative source loading.
//!
//! Reads a UTF-8 YAML document against the published schema, expands
//! multilingual fields, resolves element-type aliases and file references,
//! and produces a [`Processor`]. Schema problems are accumulated and
//! reported in one shot so the author sees every issue at once.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ConfigError;
use super::aliases::{Resolved, resolve_form_attribute_type};
use super::elements::ElementParser;
use crate::model::{
    Attribute, Column, Command, DataType, DynamicListAttribute, DynamicListColumn,
    DynamicListParameter, ElementType, Form, FormAttribute, FormElement, FormParameter,
    LongOperationSettings, MultiLang, Processor, TabularSection, Template, TemplateKind,
    ValidationConfig, ValueTableAttribute, ValueTreeAttribute, default_languages,
};
use crate::suggest::closest_match;

/// Keys accepted at the top level of the declarative source.
const TOP_LEVEL_KEYS: &[&str] = &[
    "processor",
    "languages",
    "attributes",
    "tabular_sections",
    "forms",
    "templates",
    "object_module",
    "validation",
];

/// Keys accepted inside a `forms[]` entry.
const FORM_KEYS: &[&str] = &[
    "name",
    "default",
    "include",
    "handlers_dir",
    "handlers_file",
    "documentation_file",
    "documentation",
    "events",
    "elements",
    "commands",
    "form_attributes",
    "value_tables",
    "value_trees",
    "dynamic_lists",
    "parameters",
    "auto_command_bar",
    "properties",
];

/// A successfully loaded configuration plus non-fatal warnings.
#[derive(Debug)]
pub struct LoadedConfig {
    pub processor: Processor,
    pub warnings: Vec<String>,
}

/// Load a configuration file from disk.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    load_config_str(&text, base)
}

/// Load a configuration from text; file references resolve against `base_dir`.
pub fn load_config_str(text: &str, base_dir: &Path) -> Result<LoadedConfig, ConfigError> {
    let root: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })?;
    let mut loader = Loader {
        base_dir: base_dir.to_path_buf(),
        languages: default_languages(),
        issues: Vec::new(),
        warnings: Vec::new(),
    };
    let processor = loader.load(&root);
    if !loader.issues.is_empty() {
        return Err(ConfigError::Schema {
            issues: loader.issues,
        });
    }
    Ok(LoadedConfig {
        processor,
        warnings: loader.warnings,
    })
}

struct Loader {
    base_dir: PathBuf,
    languages: Vec<String>,
    issues: Vec<String>,
    warnings: Vec<String>,
}

impl Loader {
    fn load(&mut self, root: &Value) -> Processor {
        let map = match root.as_mapping() {
            Some(m) => m.clone(),
            None => {
                self.issues
                    .push("configuration root must be a mapping".into());
                return Processor::new("Invalid");
            }
        };

        for (key, _) in &map {
            let Some(key) = key.as_str() else { continue };
            if !TOP_LEVEL_KEYS.contains(&key) {
                let hint = closest_match(key, TOP_LEVEL_KEYS.iter().copied())
                    .map(|s| format!(" (did you mean {s:?}?)"))
                    .unwrap_or_default();
                self.issues.push(format!("unknown option {key:?}{hint}"));
            }
        }

        if let Some(langs) = map.get(&Value::from("languages")).and_then(Value::as_sequence) {
            let declared: Vec<String> = langs
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            if !declared.is_empty() {
                self.languages = declared;
            }
        }

        let mut processor = self.parse_processor_section(&map);
        processor.languages = self.languages.clone();

        if let Some(items) = map.get(&Value::from("attributes")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                if let Some(attr) = self.parse_attribute(item, &format!("attributes[{i}]")) {
                    processor.attributes.push(attr);
                }
            }
        }
        if let Some(items) = map
            .get(&Value::from("tabular_sections"))
            .and_then(Value::as_sequence)
        {
            for (i, item) in items.iter().enumerate() {
                if let Some(ts) =
                    self.parse_tabular_section(item, &format!("tabular_sections[{i}]"))
                {
                    processor.tabular_sections.push(ts);
                }
            }
        }
        if let Some(items) = map.get(&Value::from("forms")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                if let Some(form) = self.parse_form(item, &format!("forms[{i}]")) {
                    processor.forms.push(form);
                }
            }
        }
        if let Some(items) = map.get(&Value::from("templates")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                if let Some(t) = self.parse_template(item, &format!("templates[{i}]")) {
                    processor.templates.push(t);
                }
            }
        }
        if let Some(om) = map.get(&Value::from("object_module")).and_then(Value::as_mapping) {
            if let Some(file) = om.get(&Value::from("file")).and_then(Value::as_str) {
                processor.object_module = self.read_text_ref(file, "object_module.file");
            }
        }
        if let Some(v) = map.get(&Value::from("validation")).and_then(Value::as_mapping) {
            processor.validation = self.parse_validation(v);
        }

        self.expand_template_auto_fields(&mut processor);
        processor
    }

    fn parse_processor_section(&mut self, map: &Mapping) -> Processor {
        let Some(section) = map.get(&Value::from("processor")).and_then(Value::as_mapping) else {
            self.issues.push("missing 'processor' section".into());
            return Processor::new("Invalid");
        };
        let Some(name) = section.get(&Value::from("name")).and_then(Value::as_str) else {
            self.issues.push("processor.name is required".into());
            return Processor::new("Invalid");
        };
        let mut processor = Processor::new(name);
        if let Some(ml) = self.multilang_field(section, "synonym", "processor") {
            processor.synonym = ml.or_name(&processor.name.clone());
        }
        if let Some(v) = section
            .get(&Value::from("platform_version"))
            .and_then(Value::as_str)
        {
            processor.platform_version = v.to_string();
        }
        processor
    }

    /// Read a multilingual field authored either as `key` (any of the four
    /// forms) or flattened as `key_ru` / `key_uk` / `key_en`.
    fn multilang_field(&mut self, map: &Mapping, key: &str, context: &str) -> Option<MultiLang> {
        if let Some(value) = map.get(&Value::from(key)) {
            match MultiLang::from_value(value, &self.languages) {
                Ok(ml) => return Some(ml),
                Err(e) => {
                    self.issues.push(format!("{context}.{key}: {e}"));
                    return None;
                }
            }
        }
        let mut expanded = Mapping::new();
        for lang in ["ru", "uk", "en"] {
            if let Some(v) = map.get(&Value::from(format!("{key}_{lang}"))) {
                expanded.insert(Value::from(lang), v.clone());
            }
        }
        if expanded.is_empty() {
            return None;
        }
        MultiLang::from_value(&Value::Mapping(expanded), &self.languages).ok()
    }

    fn parse_data_type(&mut self, map: &Mapping, context: &str) -> Option<DataType> {
        let raw = map.get(&Value::from("type")).and_then(Value::as_str)?;
        match DataType::parse(raw) {
            Ok(t) => Some(t),
            Err(e) => {
                self.issues.push(format!("{context}.type: {e}"));
                None
            }
        }
    }

    fn qualifier(&self, map: &Mapping, key: &str) -> Option<u32> {
        map.get(&Value::from(key))
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    }

    fn parse_attribute(&mut self, value: &Value, context: &str) -> Option<Attribute> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let data_type = self.parse_data_type(&map, context).unwrap_or(DataType::String);
        let mut attr = Attribute::new(name, data_type);
        if let Some(ml) = self.multilang_field(&map, "synonym", context) {
            attr.synonym = ml.or_name(&attr.name.clone());
        }
        attr.length = self.qualifier(&map, "length");
        attr.digits = self.qualifier(&map, "digits");
        attr.fraction_digits = self.qualifier(&map, "fraction_digits");
        Some(attr)
    }

    fn parse_column(&mut self, value: &Value, context: &str) -> Option<Column> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let data_type = self.parse_data_type(&map, context).unwrap_or(DataType::String);
        let mut col = Column::new(name, data_type);
        if let Some(ml) = self.multilang_field(&map, "synonym", context) {
            col.synonym = ml.or_name(&col.name.clone());
        }
        col.length = self.qualifier(&map, "length");
        col.digits = self.qualifier(&map, "digits");
        col.fraction_digits = self.qualifier(&map, "fraction_digits");
        col.read_only = map
            .get(&Value::from("read_only"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(col)
    }

    fn parse_tabular_section(&mut self, value: &Value, context: &str) -> Option<TabularSection> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let mut ts = TabularSection::new(name);
        if let Some(ml) = self.multilang_field(&map, "synonym", context) {
            ts.synonym = ml.or_name(&ts.name.clone());
        }
        if let Some(cols) = map.get(&Value::from("columns")).and_then(Value::as_sequence) {
            for (i, col) in cols.iter().enumerate() {
                if let Some(c) = self.parse_column(col, &format!("{context}.columns[{i}]")) {
                    ts.columns.push(c);
                }
            }
        }
        Some(ts)
    }

    fn parse_form(&mut self, value: &Value, context: &str) -> Option<Form> {
        let mut map = self.require_mapping(value, context)?;

        // `include` merges an external fragment; outer fields win.
        if let Some(include) = map.get(&Value::from("include")).and_then(Value::as_str) {
            let include = include.to_string();
            match self.read_yaml_ref(&include, &format!("{context}.include")) {
                Some(Value::Mapping(included)) => {
                    debug!(file = %include, "merged form include");
                    for (k, v) in included {
                        if !map.contains_key(&k) {
                            map.insert(k, v);
                        }
                    }
                }
                Some(_) => self
                    .issues
                    .push(format!("{context}.include: {include:?} is not a mapping")),
                None => {}
            }
        }

        for (key, _) in &map {
            let Some(key) = key.as_str() else { continue };
            if !FORM_KEYS.contains(&key) {
                let hint = closest_match(key, FORM_KEYS.iter().copied())
                    .map(|s| format!(" (did you mean {s:?}?)"))
                    .unwrap_or_default();
                self.issues
                    .push(format!("{context}: unknown form option {key:?}{hint}"));
            }
        }

        let name = self.require_name(&map, context)?;
        let mut form = Form::new(name);
        form.is_default = map
            .get(&Value::from("default"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(f) = map.get(&Value::from("handlers_file")).and_then(Value::as_str) {
            let path = self.base_dir.join(f);
            if !path.exists() {
                self.issues
                    .push(format!("{context}.handlers_file: file not found: {f}"));
            }
            form.handlers_file = Some(path);
        }
        if let Some(d) = map.get(&Value::from("handlers_dir")).and_then(Value::as_str) {
            form.handlers_dir = Some(self.base_dir.join(d));
        }
        if let Some(f) = map
            .get(&Value::from("documentation_file"))
            .and_then(Value::as_str)
        {
            form.documentation = self.read_text_ref(f, &format!("{context}.documentation_file"));
        }
        if let Some(doc) = map.get(&Value::from("documentation")).and_then(Value::as_str) {
            form.documentation = Some(doc.to_string());
        }
        if let Some(events) = map.get(&Value::from("events")).and_then(Value::as_mapping) {
            for (k, v) in events {
                if let (Some(event), Some(handler)) = (k.as_str(), v.as_str()) {
                    form.events.insert(event.to_string(), handler.to_string());
                }
            }
        }
        if let Some(props) = map.get(&Value::from("properties")).and_then(Value::as_mapping) {
            for (k, v) in props {
                if let Some(key) = k.as_str() {
                    form.properties.insert(key.to_string(), v.clone());
                }
            }
        }

        let languages = self.languages.clone();
        let mut parser = ElementParser::new(&languages);
        if let Some(items) = map.get(&Value::from("elements")).and_then(Value::as_sequence) {
            form.elements = parser.parse_list(items, &format!("{context}.elements"));
        }
        if let Some(items) = map
            .get(&Value::from("auto_command_bar"))
            .and_then(Value::as_sequence)
        {
            form.auto_command_bar =
                parser.parse_list(items, &format!("{context}.auto_command_bar"));
        }
        self.issues.append(&mut parser.issues);
        self.warnings.append(&mut parser.warnings);

        if let Some(items) = map.get(&Value::from("commands")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                if let Some(cmd) = self.parse_command(item, &format!("{context}.commands[{i}]")) {
                    form.commands.push(cmd);
                }
            }
        }
        if let Some(items) = map.get(&Value::from("parameters")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}.parameters[{i}]");
                if let Some(map) = self.require_mapping(item, &ctx) {
                    if let Some(name) = self.require_name(&map, &ctx) {
                        let ty = self.parse_data_type(&map, &ctx).unwrap_or(DataType::String);
                        let mut param = FormParameter::new(name, ty);
                        if let Some(ml) = self.multilang_field(&map, "synonym", &ctx) {
                            param.synonym = ml.or_name(&param.name.clone());
                        }
                        param.key_parameter = map
                            .get(&Value::from("key_parameter"))
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        form.parameters.push(param);
                    }
                }
            }
        }
        if let Some(items) = map
            .get(&Value::from("form_attributes"))
            .and_then(Value::as_sequence)
        {
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}.form_attributes[{i}]");
                if let Some(fa) = self.parse_form_attribute(item, &ctx) {
                    form.form_attributes.push(fa);
                }
            }
        }
        if let Some(items) = map.get(&Value::from("value_tables")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}.value_tables[{i}]");
                if let Some(vt) = self.parse_value_table(item, &ctx) {
                    form.value_tables.push(vt);
                }
            }
        }
        if let Some(items) = map.get(&Value::from("value_trees")).and_then(Value::as_sequence) {
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}.value_trees[{i}]");
                if let Some(vt) = self.parse_value_table(item, &ctx) {
                    form.value_trees.push(ValueTreeAttribute {
                        name: vt.name,
                        title: vt.title,
                        columns: vt.columns,
                        id_num: vt.id_num,
                    });
                }
            }
        }
        if let Some(items) = map
            .get(&Value::from("dynamic_lists"))
            .and_then(Value::as_sequence)
        {
            for (i, item) in items.iter().enumerate() {
                let ctx = format!("{context}.dynamic_lists[{i}]");
                if let Some(dl) = self.parse_dynamic_list(item, &ctx) {
                    form.dynamic_lists.push(dl);
                }
            }
        }

        Some(form)
    }

    fn parse_command(&mut self, value: &Value, context: &str) -> Option<Command> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let mut cmd = Command::new(name);
        if let Some(ml) = self.multilang_field(&map, "title", context) {
            cmd.title = ml.or_name(&cmd.name.clone());
        }
        cmd.tooltip = self.multilang_field(&map, "tooltip", context);
        if let Some(action) = map.get(&Value::from("action")).and_then(Value::as_str) {
            cmd.action = action.to_string();
        }
        cmd.picture = map
            .get(&Value::from("picture"))
            .and_then(Value::as_str)
            .map(str::to_string);
        cmd.shortcut = map
            .get(&Value::from("shortcut"))
            .and_then(Value::as_str)
            .map(str::to_string);
        cmd.long_operation = map
            .get(&Value::from("long_operation"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(settings) = map
            .get(&Value::from("long_operation_settings"))
            .and_then(Value::as_mapping)
        {
            cmd.long_operation_settings =
                Some(self.parse_long_operation_settings(settings, context));
        } else if cmd.long_operation {
            cmd.long_operation_settings = Some(LongOperationSettings::default());
        }
        Some(cmd)
    }

    fn parse_long_operation_settings(
        &mut self,
        map: &Mapping,
        context: &str,
    ) -> LongOperationSettings {
        let mut s = LongOperationSettings::default();
        if let Some(v) = map.get(&Value::from("show_progress")).and_then(Value::as_bool) {
            s.show_progress = v;
        }
        if let Some(v) = map.get(&Value::from("allow_cancel")).and_then(Value::as_bool) {
            s.allow_cancel = v;
        }
        if let Some(ml) = self.multilang_field(map, "progress_message", context) {
            s.progress_message = ml;
        }
        if let Some(v) = map
            .get(&Value::from("timeout_seconds"))
            .and_then(Value::as_u64)
        {
            s.timeout_seconds = v as u32;
        }
        if let Some(v) = map
            .get(&Value::from("wait_completion_initial"))
            .and_then(Value::as_f64)
        {
            s.wait_completion_initial = v;
        }
        if let Some(v) = map
            .get(&Value::from("use_additional_parameters"))
            .and_then(Value::as_bool)
        {
            s.use_additional_parameters = v;
        }
        if let Some(v) = map.get(&Value::from("output_messages")).and_then(Value::as_bool) {
            s.output_messages = v;
        }
        if let Some(v) = map.get(&Value::from("output_progress")).and_then(Value::as_bool) {
            s.output_progress = v;
        }
        s
    }

    fn parse_form_attribute(&mut self, value: &Value, context: &str) -> Option<FormAttribute> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let raw_type = map
            .get(&Value::from("type"))
            .and_then(Value::as_str)
            .unwrap_or("string");
        let attr_type = match resolve_form_attribute_type(raw_type) {
            Resolved::Canonical(t) => t,
            Resolved::Unknown { suggestion } => {
                let hint = suggestion
                    .map(|s| format!(" (did you mean {s:?}?)"))
                    .unwrap_or_default();
                self.issues.push(format!(
                    "{context}.type: unknown form attribute type {raw_type:?}{hint}"
                ));
                return None;
            }
        };
        let mut fa = FormAttribute::new(name, attr_type);
        if let Some(ml) = self.multilang_field(&map, "synonym", context) {
            fa.synonym = ml.or_name(&fa.name.clone());
        }
        if let Some(ml) = self.multilang_field(&map, "title", context) {
            fa.title = ml.or_name(&fa.name.clone());
        }
        Some(fa)
    }

    fn parse_value_table(&mut self, value: &Value, context: &str) -> Option<ValueTableAttribute> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let mut vt = ValueTableAttribute::new(name);
        if let Some(ml) = self.multilang_field(&map, "title", context) {
            vt.title = ml.or_name(&vt.name.clone());
        }
        if let Some(cols) = map.get(&Value::from("columns")).and_then(Value::as_sequence) {
            for (i, col) in cols.iter().enumerate() {
                if let Some(c) = self.parse_column(col, &format!("{context}.columns[{i}]")) {
                    vt.columns.push(c);
                }
            }
        }
        Some(vt)
    }

    fn parse_dynamic_list(&mut self, value: &Value, context: &str) -> Option<DynamicListAttribute> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let mut dl = DynamicListAttribute::new(name);
        if let Some(ml) = self.multilang_field(&map, "title", context) {
            dl.title = ml.or_name(&dl.name.clone());
        }
        dl.manual_query = map
            .get(&Value::from("manual_query"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        dl.main_table = map
            .get(&Value::from("main_table"))
            .and_then(Value::as_str)
            .map(str::to_string);
        dl.query_text = map
            .get(&Value::from("query_text"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(fields) = map.get(&Value::from("key_fields")).and_then(Value::as_sequence) {
            dl.key_fields = fields
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        dl.main_attribute = map
            .get(&Value::from("main_attribute"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(params) = map.get(&Value::from("parameters")).and_then(Value::as_sequence) {
            for (i, p) in params.iter().enumerate() {
                let ctx = format!("{context}.parameters[{i}]");
                if let Some(pm) = self.require_mapping(p, &ctx) {
                    if let Some(pname) = self.require_name(&pm, &ctx) {
                        let ty = self.parse_data_type(&pm, &ctx).unwrap_or(DataType::String);
                        dl.parameters.push(DynamicListParameter {
                            name: pname,
                            param_type: ty,
                            default_value: pm.get(&Value::from("default_value")).cloned(),
                        });
                    }
                }
            }
        }
        if let Some(cols) = map.get(&Value::from("columns")).and_then(Value::as_sequence) {
            for (i, c) in cols.iter().enumerate() {
                let ctx = format!("{context}.columns[{i}]");
                if let Some(cm) = self.require_mapping(c, &ctx) {
                    let Some(field) = cm.get(&Value::from("field")).and_then(Value::as_str) else {
                        self.issues.push(format!("{ctx}: column has no field"));
                        continue;
                    };
                    let title = self
                        .multilang_field(&cm, "title", &ctx)
                        .unwrap_or_else(|| MultiLang::uniform(field));
                    dl.columns.push(DynamicListColumn {
                        field: field.to_string(),
                        title,
                        width: cm.get(&Value::from("width")).and_then(Value::as_u64).map(|w| w as u32),
                    });
                }
            }
        }
        if !dl.manual_query && dl.main_table.is_none() {
            self.issues.push(format!(
                "{context}: main_table is required unless manual_query is set"
            ));
        }
        Some(dl)
    }

    fn parse_template(&mut self, value: &Value, context: &str) -> Option<Template> {
        let map = self.require_mapping(value, context)?;
        let name = self.require_name(&map, context)?;
        let raw_kind = map
            .get(&Value::from("type"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let Some(kind) = TemplateKind::parse(raw_kind) else {
            self.issues.push(format!(
                "{context}.type: invalid template type {raw_kind:?} \
                 (expected HTMLDocument or SpreadsheetDocument)"
            ));
            return None;
        };
        let mut template = Template::new(name, kind);
        if let Some(file) = map.get(&Value::from("file")).and_then(Value::as_str) {
            let path = self.base_dir.join(file);
            if !path.exists() {
                self.issues
                    .push(format!("{context}.file: file not found: {file}"));
            } else {
                match kind {
                    TemplateKind::HtmlDocument => {
                        template.content = std::fs::read_to_string(&path).ok();
                    }
                    TemplateKind::SpreadsheetDocument => {
                        template.content_binary = std::fs::read(&path).ok();
                    }
                }
            }
            template.path = Some(path);
        }
        template.auto_field = map
            .get(&Value::from("auto_field"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        template.field_name = map
            .get(&Value::from("field_name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        template.target_form = map
            .get(&Value::from("target_form"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(items) = map.get(&Value::from("placeholders")).and_then(Value::as_sequence) {
            for item in items {
                if let Some(pm) = item.as_mapping() {
                    if let Some(pname) = pm.get(&Value::from("name")).and_then(Value::as_str) {
                        template.placeholders.push(crate::model::TemplatePlaceholder {
                            name: pname.to_string(),
                            expression: pm
                                .get(&Value::from("expression"))
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            attribute: pm
                                .get(&Value::from("attribute"))
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        });
                    }
                }
            }
        }
        if let Some(assets) = map.get(&Value::from("assets")).and_then(Value::as_mapping) {
            template.assets.styles = self.asset_paths(&assets, "styles", context);
            template.assets.scripts = self.asset_paths(&assets, "scripts", context);
        }
        if template.kind == TemplateKind::HtmlDocument {
            self.inject_assets(&mut template);
        }
        Some(template)
    }

    fn asset_paths(&mut self, assets: &Mapping, key: &str, context: &str) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Some(files) = assets.get(&Value::from(key)).and_then(Value::as_sequence) {
            for f in files.iter().filter_map(Value::as_str) {
                let path = self.base_dir.join(f);
                if !path.exists() {
                    self.issues
                        .push(format!("{context}.assets.{key}: file not found: {f}"));
                }
                out.push(path);
            }
        }
        out
    }

    /// Inline CSS/JS assets into HTML content so the emitted template is
    /// self-contained.
    fn inject_assets(&mut self, template: &mut Template) {
        let Some(content) = template.content.take() else {
            return;
        };
        let mut content = content;
        for style in &template.assets.styles {
            if let Ok(css) = std::fs::read_to_string(style) {
                let block = format!("<style>\n{css}\n</style>");
                content = inject_before(&content, "</head>", &block);
            }
        }
        for script in &template.assets.scripts {
            if let Ok(js) = std::fs::read_to_string(script) {
                let block = format!("<script>\n{js}\n</script>");
                content = inject_before(&content, "</body>", &block);
            }
        }
        template.content = Some(content);
    }

    /// Templates flagged `auto_field` synthesize a viewer element and a
    /// backing form attribute on the target form.
    fn expand_template_auto_fields(&mut self, processor: &mut Processor) {
        let mut additions: Vec<(usize, Template)> = Vec::new();
        for template in &processor.templates {
            if !template.auto_field {
                continue;
            }
            let form_idx = template
                .target_form
                .as_deref()
                .and_then(|n| processor.forms.iter().position(|f| f.name == n))
                .or_else(|| {
                    processor
                        .forms
                        .iter()
                        .position(|f| f.is_default)
                        .or(if processor.forms.is_empty() { None } else { Some(0) })
                });
            match form_idx {
                Some(idx) => additions.push((idx, template.clone())),
                None => self.warnings.push(format!(
                    "template {:?} requests auto_field but no form exists",
                    template.name
                )),
            }
        }
        for (idx, template) in additions {
            let field = template.generated_field_name();
            let (element_type, attr_type) = match template.kind {
                TemplateKind::HtmlDocument => (ElementType::HtmlDocumentField, "string"),
                TemplateKind::SpreadsheetDocument => {
                    (ElementType::SpreadSheetDocumentField, "spreadsheet_document")
                }
            };
            let form = &mut processor.forms[idx];
            if form.form_attributes.iter().any(|a| a.name == field) {
                continue;
            }
            form.form_attributes
                .push(FormAttribute::new(field.clone(), attr_type));
            let mut element = FormElement::new(element_type, field.clone());
            element.attribute = Some(field.clone());
            element
                .properties
                .insert("template_ref".into(), Value::from(template.name.clone()));
            form.elements.push(element);
            debug!(template = %template.name, field = %field, "expanded auto field");
        }
    }

    fn parse_validation(&mut self, map: &Mapping) -> ValidationConfig {
        let mut v = ValidationConfig::default();
        let mut set = |key: &str, field: &mut bool| {
            if let Some(b) = map.get(&Value::from(key)).and_then(Value::as_bool) {
                *field = b;
            }
        };
        set("syntax_check", &mut v.syntax_check);
        set("check_thin_client", &mut v.check_thin_client);
        set("check_server", &mut v.check_server);
        set("check_web_client", &mut v.check_web_client);
        set("check_external_connection", &mut v.check_external_connection);
        set("check_thick_client", &mut v.check_thick_client);
        set("semantic_check", &mut v.semantic_check);
        set("check_incorrect_references", &mut v.check_incorrect_references);
        set("check_handlers_existence", &mut v.check_handlers_existence);
        set("check_empty_handlers", &mut v.check_empty_handlers);
        v
    }

    fn require_mapping(&mut self, value: &Value, context: &str) -> Option<Mapping> {
        match value.as_mapping() {
            Some(m) => Some(m.clone()),
            None => {
                self.issues.push(format!("{context}: expected a mapping"));
                None
            }
        }
    }

    fn require_name(&mut self, map: &Mapping, context: &str) -> Option<String> {
        match map.get(&Value::from("name")).and_then(Value::as_str) {
            Some(n) => Some(n.to_string()),
            None => {
                self.issues.push(format!("{context}: name is required"));
                None
            }
        }
    }

    fn read_text_ref(&mut self, relative: &str, context: &str) -> Option<String> {
        let path = self.base_dir.join(relative);
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(strip_bom(&text).to_string()),
            Err(_) => {
                self.issues
                    .push(format!("{context}: file not found: {relative}"));
                None
            }
        }
    }

    fn read_yaml_ref(&mut self, relative: &str, context: &str) -> Option<Value> {
        let text = self.read_text_ref(relative, context)?;
        match serde_yaml::from_str(&text) {
            Ok(v) => Some(v),
            Err(e) => {
                self.issues.push(format!("{context}: {e}"));
                None
            }
        }
    }
}

fn inject_before(content: &str, anchor: &str, block: &str) -> String {
    match content.find(anchor) {
        Some(pos) => {
            let mut out = String::with_capacity(content.len() + block.len() + 1);
            out.push_str(&content[..pos]);
            out.push_str(block);
            out.push('\n');
            out.push_str(&content[pos..]);
            out
        }
        None => format!("{content}\n{block}"),
    }
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
processor:
  name: MyProc
  synonym: "Мой процессор|Мій процесор|My processor"
attributes:
  - {name: Note, type: string, length: 100}
forms:
  - name: F
    default: true
    elements:
      - {type: InputField, name: NoteField, attribute: Note}
"#;

    #[test]
    fn minimal_config_loads() {
        let loaded = load_config_str(MINIMAL, Path::new(".")).unwrap();
        let p = loaded.processor;
        assert_eq!(p.name, "MyProc");
        assert_eq!(p.synonym.en, "My processor");
        assert_eq!(p.attributes.len(), 1);
        assert_eq!(p.attributes[0].length, Some(100));
        assert!(p.forms[0].is_default);
        assert_eq!(p.forms[0].elements[0].attribute.as_deref(), Some("Note"));
    }

    #[test]
    fn unknown_top_level_key_is_rejected_with_suggestion() {
        let err = load_config_str("processor: {name: X}\nattrbutes: []", Path::new("."))
            .unwrap_err();
        match err {
            ConfigError::Schema { issues } => {
                assert!(issues[0].contains("attrbutes"));
                assert!(issues[0].contains("attributes"), "{issues:?}");
            }
            other => panic!("expected Schema error, got {other}"),
        }
    }

    #[test]
    fn all_schema_issues_are_reported_together() {
        let text = r#"
processor: {name: X}
forms:
  - name: F
    elements:
      - {type: Nope1, name: A}
      - {type: Nope2, name: B}
"#;
        let err = load_config_str(text, Path::new(".")).unwrap_err();
        match err {
            ConfigError::Schema { issues } => assert_eq!(issues.len(), 2, "{issues:?}"),
            other => panic!("expected Schema error, got {other}"),
        }
    }

    #[test]
    fn dynamic_list_requires_main_table() {
        let text = r#"
processor: {name: X}
forms:
  - name: F
    dynamic_lists:
      - {name: List}
"#;
        assert!(load_config_str(text, Path::new(".")).is_err());
    }

    #[test]
    fn missing_handler_file_is_a_config_error() {
        let text = r#"
processor: {name: X}
forms:
  - name: F
    handlers_file: does_not_exist.bsl
"#;
        assert!(load_config_str(text, Path::new(".")).is_err());
    }

    #[test]
    fn form_include_merges_with_outer_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base_form.yaml"),
            "default: true\nevents: {OnOpen: FormOnOpen}\n",
        )
        .unwrap();
        let text = r#"
processor: {name: X}
forms:
  - name: F
    include: base_form.yaml
    default: false
"#;
        let loaded = load_config_str(text, dir.path()).unwrap();
        let form = &loaded.processor.forms[0];
        // outer `default: false` wins; included events merge in
        assert!(!form.is_default);
        assert_eq!(form.events.get("OnOpen").map(String::as_str), Some("FormOnOpen"));
    }

    #[test]
    fn auto_field_template_synthesizes_viewer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dash.html"), "<html><body></body></html>").unwrap();
        let text = r#"
processor: {name: X}
forms:
  - {name: F, default: true}
templates:
  - {name: Dashboard, type: HTMLDocument, file: dash.html, auto_field: true}
"#;
        let loaded = load_config_str(text, dir.path()).unwrap();
        let form = &loaded.processor.forms[0];
        assert!(form.form_attributes.iter().any(|a| a.name == "DashboardField"));
        let el = form.elements.iter().find(|e| e.name == "DashboardField").unwrap();
        assert_eq!(el.element_type, Some(ElementType::HtmlDocumentField));
    }
}
