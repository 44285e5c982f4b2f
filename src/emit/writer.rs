//! Artifact writing.
//!
//! Emits the descriptor tree into the well-known directory layout, UTF-8
//! with byte-order mark throughout. Descriptor XML is rendered from string
//! templates and then normalized by the platform whitespace rule. Artifacts
//! are staged in a scratch directory and moved into place only when every
//! file has been written, so a failed run never leaves a partial tree.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::finalize::{IdentityFinalizer, ModuleFinalizer, ModuleKind};
use super::modules::{assemble_form_module, assemble_object_module};
use super::prepare::{EmitNode, PreparedForm, prepare_form};
use super::EmitError;
use crate::model::{
    Attribute, Column, DataType, Form, MultiLang, Processor, Template, TemplateKind,
};

/// Extension of emitted module files.
pub const MODULE_EXTENSION: &str = "bsl";

const BOM: &str = "\u{feff}";

/// Paths produced by a successful emit.
#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    pub root_dir: PathBuf,
    pub root_xml: PathBuf,
    /// `(form name, Form.xml path)` per form.
    pub form_xml: Vec<(String, PathBuf)>,
    pub modules: Vec<PathBuf>,
    /// Processor module plus every form module, for the snapshot store.
    pub modules_concat: String,
}

/// Writes the artifact tree for one processor.
pub struct ArtifactWriter<'a> {
    processor: &'a Processor,
    finalizer: &'a dyn ModuleFinalizer,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(processor: &'a Processor) -> Self {
        Self {
            processor,
            finalizer: &IdentityFinalizer,
        }
    }

    pub fn with_finalizer(processor: &'a Processor, finalizer: &'a dyn ModuleFinalizer) -> Self {
        Self {
            processor,
            finalizer,
        }
    }

    /// Emit the full artifact tree under `output_dir`.
    pub fn write(&self, output_dir: &Path) -> Result<WrittenArtifacts, EmitError> {
        let name = &self.processor.name;
        let staging = output_dir.join(format!(".staging-{name}"));
        let final_dir = output_dir.join(name);
        if staging.exists() {
            let _ = std::fs::remove_dir_all(&staging);
        }

        let result = self.write_into(&staging);
        match result {
            Ok(mut artifacts) => {
                if final_dir.exists() {
                    std::fs::remove_dir_all(&final_dir).map_err(|source| EmitError::Io {
                        path: final_dir.clone(),
                        source,
                    })?;
                }
                std::fs::rename(&staging, &final_dir).map_err(|source| EmitError::Io {
                    path: final_dir.clone(),
                    source,
                })?;
                artifacts.rebase(&staging, &final_dir);
                info!(processor = %name, dir = %final_dir.display(), "artifacts written");
                Ok(artifacts)
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    fn write_into(&self, root: &Path) -> Result<WrittenArtifacts, EmitError> {
        let p = self.processor;
        let name = &p.name;
        let inner = root.join(name);

        let root_xml_path = root.join(format!("{name}.xml"));
        write_text(&root_xml_path, &render_root_descriptor(p))?;

        let object_module = assemble_object_module(p);
        let object_module =
            self.finalizer
                .finalize(&object_module, name, 0, ModuleKind::ObjectModule);
        let object_module_path = inner
            .join("Ext")
            .join(format!("ObjectModule.{MODULE_EXTENSION}"));
        write_text(&object_module_path, &object_module)?;

        let mut form_xml = Vec::new();
        let mut modules = vec![object_module_path];
        let mut modules_concat = object_module.clone();

        for form in &p.forms {
            let prepared = prepare_form(p, form);
            let forms_dir = inner.join("Forms");

            write_text(
                &forms_dir.join(format!("{}.xml", form.name)),
                &render_form_metadata(p, form),
            )?;

            let form_xml_path = forms_dir.join(&form.name).join("Ext").join("Form.xml");
            write_text(&form_xml_path, &render_form_xml(p, form, &prepared))?;
            form_xml.push((form.name.clone(), form_xml_path));

            let module = assemble_form_module(p, form);
            let seed = format!("{name}.{}", form.name);
            let module =
                self.finalizer
                    .finalize(&module, &seed, prepared.next_id, ModuleKind::FormModule);
            let module_path = forms_dir
                .join(&form.name)
                .join("Ext")
                .join("Form")
                .join(format!("Module.{MODULE_EXTENSION}"));
            write_text(&module_path, &module)?;
            modules_concat.push_str("\n\n");
            modules_concat.push_str(&module);
            modules.push(module_path);
            debug!(form = %form.name, "form artifacts written");
        }

        for template in &p.templates {
            self.write_template(&inner, template)?;
        }

        Ok(WrittenArtifacts {
            root_dir: root.to_path_buf(),
            root_xml: root_xml_path,
            form_xml,
            modules,
            modules_concat,
        })
    }

    fn write_template(&self, inner: &Path, template: &Template) -> Result<(), EmitError> {
        let templates_dir = inner.join("Templates");
        write_text(
            &templates_dir.join(format!("{}.xml", template.name)),
            &render_template_descriptor(self.processor, template),
        )?;
        let ext_dir = templates_dir.join(&template.name).join("Ext");
        write_text(
            &ext_dir.join("Template.xml"),
            &render_template_content_descriptor(template),
        )?;
        let content_dir = ext_dir.join("Template");
        match template.kind {
            TemplateKind::HtmlDocument => {
                let content = template.content.clone().unwrap_or_default();
                write_text(&content_dir.join("ru.html"), &content)?;
            }
            TemplateKind::SpreadsheetDocument => {
                let path = content_dir.join("Template.mxl");
                ensure_parent(&path)?;
                std::fs::write(&path, template.content_binary.as_deref().unwrap_or_default())
                    .map_err(|source| EmitError::Io { path, source })?;
            }
        }
        Ok(())
    }
}

impl WrittenArtifacts {
    fn rebase(&mut self, from: &Path, to: &Path) {
        let swap = |p: &mut PathBuf| {
            if let Ok(rest) = p.strip_prefix(from) {
                *p = to.join(rest);
            }
        };
        swap(&mut self.root_dir);
        swap(&mut self.root_xml);
        for (_, p) in &mut self.form_xml {
            swap(p);
        }
        for p in &mut self.modules {
            swap(p);
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), EmitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EmitError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Write a text artifact: UTF-8 with BOM, `\n` line endings.
fn write_text(path: &Path, content: &str) -> Result<(), EmitError> {
    ensure_parent(path)?;
    let normalized = content.replace("\r\n", "\n");
    std::fs::write(path, format!("{BOM}{normalized}")).map_err(|source| EmitError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── XML rendering ───────────────────────────────────────────────────

pub(crate) fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// The platform-acceptable whitespace rule: every tag boundary gets its own
/// line, runs of three or more newlines collapse to one.
pub fn platform_whitespace(xml: &str) -> String {
    let with_breaks = xml.replace("><", ">\n<");
    let mut out = String::with_capacity(with_breaks.len());
    let mut run = 0usize;
    for c in with_breaks.chars() {
        if c == '\n' {
            run += 1;
            if run < 3 {
                out.push(c);
            } else if run == 3 {
                // collapse the whole run to a single newline
                while out.ends_with('\n') {
                    out.pop();
                }
                out.push('\n');
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}

fn multilang(tag: &str, value: &MultiLang) -> String {
    let mut out = format!("<{tag}>");
    for (lang, text) in [("ru", &value.ru), ("uk", &value.uk), ("en", &value.en)] {
        out.push_str(&format!(
            "<v8:item><v8:lang>{lang}</v8:lang><v8:content>{}</v8:content></v8:item>",
            xml_escape(text)
        ));
    }
    out.push_str(&format!("</{tag}>"));
    out
}

fn type_block(
    data_type: &DataType,
    length: Option<u32>,
    digits: Option<u32>,
    fraction_digits: Option<u32>,
) -> String {
    let mut out = String::from("<Type>");
    out.push_str(&format!("<v8:Type>{}</v8:Type>", data_type.xml_type()));
    match data_type {
        DataType::String => {
            let length = length.unwrap_or(0);
            out.push_str(&format!(
                "<v8:StringQualifiers><v8:Length>{length}</v8:Length>\
                 <v8:AllowedLength>Variable</v8:AllowedLength></v8:StringQualifiers>"
            ));
        }
        DataType::Number => {
            let digits = digits.unwrap_or(10);
            let fraction = fraction_digits.unwrap_or(0);
            out.push_str(&format!(
                "<v8:NumberQualifiers><v8:Digits>{digits}</v8:Digits>\
                 <v8:FractionDigits>{fraction}</v8:FractionDigits>\
                 <v8:AllowedSign>Any</v8:AllowedSign></v8:NumberQualifiers>"
            ));
        }
        DataType::Date => {
            out.push_str(
                "<v8:DateQualifiers><v8:DateFractions>DateTime</v8:DateFractions></v8:DateQualifiers>",
            );
        }
        _ => {}
    }
    out.push_str("</Type>");
    out
}

fn attribute_block(attr: &Attribute) -> String {
    format!(
        "<Attribute uuid=\"{}\"><Properties><Name>{}</Name>{}{}</Properties></Attribute>",
        attr.id,
        xml_escape(&attr.name),
        multilang("Synonym", &attr.synonym),
        type_block(&attr.data_type, attr.length, attr.digits, attr.fraction_digits),
    )
}

fn column_block(col: &Column) -> String {
    format!(
        "<Attribute uuid=\"{}\"><Properties><Name>{}</Name>{}{}</Properties></Attribute>",
        col.id,
        xml_escape(&col.name),
        multilang("Synonym", &col.synonym),
        type_block(&col.data_type, col.length, col.digits, col.fraction_digits),
    )
}

/// Root descriptor (`<name>.xml`).
pub fn render_root_descriptor(p: &Processor) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <MetaDataObject xmlns=\"http://v8.1c.ru/8.3/MDClasses\" \
         xmlns:v8=\"http://v8.1c.ru/8.1/data/core\" \
         xmlns:xr=\"http://v8.1c.ru/8.3/xcf/readable\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" version=\"",
    );
    xml.push_str(&p.platform_version);
    xml.push_str("\">");
    xml.push_str(&format!("<ExternalDataProcessor uuid=\"{}\">", p.ids.root));

    xml.push_str("<InternalInfo>");
    xml.push_str(&format!(
        "<xr:GeneratedType name=\"ExternalDataProcessorObject.{0}\" category=\"Object\">\
         <xr:TypeId>{1}</xr:TypeId><xr:ValueId>{2}</xr:ValueId></xr:GeneratedType>",
        xml_escape(&p.name),
        p.ids.type_id,
        p.ids.value,
    ));
    xml.push_str("</InternalInfo>");

    xml.push_str("<Properties>");
    xml.push_str(&format!("<Name>{}</Name>", xml_escape(&p.name)));
    xml.push_str(&multilang("Synonym", &p.synonym));
    xml.push_str("<Comment/>");
    if let Some(form) = p.default_form() {
        xml.push_str(&format!(
            "<DefaultObjectForm>ExternalDataProcessor.{}.Form.{}</DefaultObjectForm>",
            xml_escape(&p.name),
            xml_escape(&form.name)
        ));
    } else {
        xml.push_str("<DefaultObjectForm/>");
    }
    xml.push_str("</Properties>");

    xml.push_str("<ChildObjects>");
    for attr in &p.attributes {
        xml.push_str(&attribute_block(attr));
    }
    for ts in &p.tabular_sections {
        xml.push_str(&format!(
            "<TabularSection uuid=\"{}\"><InternalInfo>\
             <xr:GeneratedType name=\"ExternalDataProcessorTabularSection.{1}.{2}\" category=\"TabularSection\">\
             <xr:TypeId>{3}</xr:TypeId><xr:ValueId>{4}</xr:ValueId></xr:GeneratedType>\
             <xr:GeneratedType name=\"ExternalDataProcessorTabularSectionRow.{1}.{2}\" category=\"TabularSectionRow\">\
             <xr:TypeId>{5}</xr:TypeId><xr:ValueId>{6}</xr:ValueId></xr:GeneratedType>\
             </InternalInfo><Properties><Name>{2}</Name>{7}</Properties><ChildObjects>",
            ts.ids.own,
            xml_escape(&p.name),
            xml_escape(&ts.name),
            ts.ids.type_id,
            ts.ids.value,
            ts.ids.row_type,
            ts.ids.row_value,
            multilang("Synonym", &ts.synonym),
        ));
        for col in &ts.columns {
            xml.push_str(&column_block(col));
        }
        xml.push_str("</ChildObjects></TabularSection>");
    }
    for form in &p.forms {
        xml.push_str(&format!("<Form>{}</Form>", xml_escape(&form.name)));
    }
    for template in &p.templates {
        xml.push_str(&format!("<Template>{}</Template>", xml_escape(&template.name)));
    }
    xml.push_str("</ChildObjects>");
    xml.push_str("</ExternalDataProcessor></MetaDataObject>");
    platform_whitespace(&xml)
}

/// Per-form metadata (`Forms/<name>.xml`).
pub fn render_form_metadata(p: &Processor, form: &Form) -> String {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <MetaDataObject xmlns=\"http://v8.1c.ru/8.3/MDClasses\" \
         xmlns:v8=\"http://v8.1c.ru/8.1/data/core\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" version=\"{}\">\
         <Form uuid=\"{}\"><Properties><Name>{}</Name>{}\
         <FormType>Managed</FormType><IncludeHelpInContents>false</IncludeHelpInContents>\
         </Properties></Form></MetaDataObject>",
        p.platform_version,
        form.id,
        xml_escape(&form.name),
        multilang("Synonym", &MultiLang::uniform(&form.name)),
    );
    platform_whitespace(&xml)
}

/// Form element tree (`Forms/<name>/Ext/Form.xml`).
pub fn render_form_xml(p: &Processor, form: &Form, prepared: &PreparedForm) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Form xmlns=\"http://v8.1c.ru/8.3/xcf/logform\" \
         xmlns:v8=\"http://v8.1c.ru/8.1/data/core\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" version=\"{}\">",
        p.platform_version
    );

    if !form.events.is_empty() {
        xml.push_str("<Events>");
        for (event, handler) in &form.events {
            xml.push_str(&format!(
                "<Event name=\"{}\"><Action>{}</Action></Event>",
                xml_escape(event),
                xml_escape(handler)
            ));
        }
        xml.push_str("</Events>");
    }

    xml.push_str("<ChildItems>");
    for node in &prepared.roots {
        xml.push_str(&render_emit_node(node));
    }
    xml.push_str("</ChildItems>");

    if !prepared.auto_command_bar.is_empty() {
        xml.push_str("<AutoCommandBar name=\"FormCommandBar\" id=\"-1\"><ChildItems>");
        for node in &prepared.auto_command_bar {
            xml.push_str(&render_emit_node(node));
        }
        xml.push_str("</ChildItems></AutoCommandBar>");
    }

    // Commands, numbered after the element body.
    if !form.commands.is_empty() {
        xml.push_str("<Commands>");
        let mut command_id = prepared.next_id;
        for cmd in &form.commands {
            xml.push_str(&format!(
                "<Command name=\"{}\" id=\"{}\">{}<Action>{}</Action>",
                xml_escape(&cmd.name),
                command_id,
                multilang("Title", &cmd.title),
                xml_escape(&cmd.action),
            ));
            if let Some(tooltip) = &cmd.tooltip {
                xml.push_str(&multilang("ToolTip", tooltip));
            }
            if let Some(picture) = &cmd.picture {
                xml.push_str(&format!("<Picture>{}</Picture>", xml_escape(picture)));
            }
            if let Some(shortcut) = &cmd.shortcut {
                xml.push_str(&format!("<Shortcut>{}</Shortcut>", xml_escape(shortcut)));
            }
            xml.push_str("</Command>");
            command_id += 1;
        }
        xml.push_str("</Commands>");
    }

    // Form data: the main Object attribute, then form-local data.
    xml.push_str("<Attributes>");
    xml.push_str(&format!(
        "<Attribute name=\"Object\" id=\"0\">\
         <Type><v8:Type>cfg:ExternalDataProcessorObject.{}</v8:Type></Type>\
         <MainAttribute>true</MainAttribute></Attribute>",
        xml_escape(&p.name)
    ));
    let mut attr_id = 1u32;
    for fa in &form.form_attributes {
        xml.push_str(&format!(
            "<Attribute name=\"{}\" id=\"{}\"><Type><v8:Type>{}</v8:Type></Type>{}</Attribute>",
            xml_escape(&fa.name),
            attr_id,
            form_attribute_type(&fa.attr_type),
            multilang("Title", &fa.title),
        ));
        attr_id += 1;
    }
    for vt in &form.value_tables {
        xml.push_str(&render_value_table(&vt.name, &vt.title, &vt.columns, attr_id, "v8:ValueTable"));
        attr_id += 1;
    }
    for vt in &form.value_trees {
        xml.push_str(&render_value_table(&vt.name, &vt.title, &vt.columns, attr_id, "v8:ValueTree"));
        attr_id += 1;
    }
    for dl in &form.dynamic_lists {
        xml.push_str(&format!(
            "<Attribute name=\"{}\" id=\"{}\"><Type><v8:Type>DynamicList</v8:Type></Type>{}",
            xml_escape(&dl.name),
            attr_id,
            multilang("Title", &dl.title),
        ));
        if let Some(main_table) = &dl.main_table {
            xml.push_str(&format!("<MainTable>{}</MainTable>", xml_escape(main_table)));
        }
        if let Some(query) = &dl.query_text {
            xml.push_str(&format!("<QueryText>{}</QueryText>", xml_escape(query)));
        }
        xml.push_str("</Attribute>");
        attr_id += 1;
    }
    xml.push_str("</Attributes>");

    if !form.parameters.is_empty() {
        xml.push_str("<Parameters>");
        for param in &form.parameters {
            xml.push_str(&format!(
                "<Parameter name=\"{}\"><Type><v8:Type>{}</v8:Type></Type>",
                xml_escape(&param.name),
                param.param_type.xml_type()
            ));
            if param.key_parameter {
                xml.push_str("<KeyParameter>true</KeyParameter>");
            }
            xml.push_str("</Parameter>");
        }
        xml.push_str("</Parameters>");
    }

    xml.push_str("</Form>");
    platform_whitespace(&xml)
}

fn render_value_table(
    name: &str,
    title: &MultiLang,
    columns: &[Column],
    id: u32,
    type_name: &str,
) -> String {
    let mut xml = format!(
        "<Attribute name=\"{}\" id=\"{}\"><Type><v8:Type>{}</v8:Type></Type>{}<Columns>",
        xml_escape(name),
        id,
        type_name,
        multilang("Title", title),
    );
    for col in columns {
        xml.push_str(&format!(
            "<v8:Column><v8:Name>{}</v8:Name><v8:Type>{}</v8:Type></v8:Column>",
            xml_escape(&col.name),
            col.data_type.xml_type()
        ));
    }
    xml.push_str("</Columns></Attribute>");
    xml
}

fn form_attribute_type(canonical: &str) -> &'static str {
    match canonical {
        "string" => "xs:string",
        "number" => "xs:decimal",
        "boolean" => "xs:boolean",
        "date" => "xs:dateTime",
        "spreadsheet_document" => "v8:SpreadsheetDocument",
        "binary_data" => "v8:BinaryData",
        "planner" => "v8:Planner",
        _ => "xs:string",
    }
}

fn render_emit_node(node: &EmitNode) -> String {
    let tag = node.element_type.canonical();
    let mut xml = format!(
        "<{tag} name=\"{}\" id=\"{}\">",
        xml_escape(&node.name),
        node.id
    );
    if let Some(path) = &node.data_path {
        xml.push_str(&format!("<DataPath>{}</DataPath>", xml_escape(path)));
    }
    if let Some(command) = &node.command {
        xml.push_str(&format!(
            "<CommandName>Form.Command.{}</CommandName>",
            xml_escape(command)
        ));
    }

    // Title from the flattened multilingual properties.
    if node.properties.contains_key("title_ru") {
        let ml = MultiLang {
            ru: prop_text(node, "title_ru"),
            uk: prop_text(node, "title_uk"),
            en: prop_text(node, "title_en"),
        };
        xml.push_str(&multilang("Title", &ml));
    }

    for (key, value) in &node.properties {
        if key.starts_with("title_")
            || key.starts_with("tooltip_")
            || key.starts_with("input_hint_")
            || matches!(key.as_str(), "data_path" | "is_value_table" | "is_dynamic_list")
        {
            continue;
        }
        let tag_name = pascal_case(key);
        let text = match value {
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => xml_escape(s),
            _ => continue,
        };
        xml.push_str(&format!("<{tag_name}>{text}</{tag_name}>"));
    }

    if !node.events.is_empty() {
        xml.push_str("<Events>");
        for (event, handler) in &node.events {
            xml.push_str(&format!(
                "<Event name=\"{}\"><Action>{}</Action></Event>",
                xml_escape(event),
                xml_escape(handler)
            ));
        }
        xml.push_str("</Events>");
    }

    if !node.children.is_empty() {
        xml.push_str("<ChildItems>");
        for child in &node.children {
            xml.push_str(&render_emit_node(child));
        }
        xml.push_str("</ChildItems>");
    }
    xml.push_str(&format!("</{tag}>"));
    xml
}

fn prop_text(node: &EmitNode, key: &str) -> String {
    node.properties
        .get(key)
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `read_only` → `ReadOnly`, `group_direction` → `GroupDirection`.
fn pascal_case(key: &str) -> String {
    key.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn render_template_descriptor(p: &Processor, template: &Template) -> String {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <MetaDataObject xmlns=\"http://v8.1c.ru/8.3/MDClasses\" \
         xmlns:v8=\"http://v8.1c.ru/8.1/data/core\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" version=\"{}\">\
         <Template uuid=\"{}\"><Properties><Name>{}</Name>{}\
         <TemplateType>{}</TemplateType></Properties></Template></MetaDataObject>",
        p.platform_version,
        template.id,
        xml_escape(&template.name),
        multilang("Synonym", &MultiLang::uniform(&template.name)),
        template.kind.descriptor_name(),
    );
    platform_whitespace(&xml)
}

fn render_template_content_descriptor(template: &Template) -> String {
    let inner = match template.kind {
        TemplateKind::HtmlDocument => "<HTMLDocument><Content>ru.html</Content></HTMLDocument>",
        TemplateKind::SpreadsheetDocument => "<SpreadsheetDocument/>",
    };
    platform_whitespace(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Template>{inner}</Template>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementType, FormElement};

    fn sample() -> Processor {
        let mut p = Processor::new("MyProc");
        let mut attr = Attribute::new("Note", DataType::String);
        attr.length = Some(100);
        p.attributes.push(attr);
        let mut form = Form::new("F");
        form.is_default = true;
        let mut el = FormElement::new(ElementType::InputField, "NoteField");
        el.attribute = Some("Note".into());
        form.elements.push(el);
        p.forms.push(form);
        p
    }

    #[test]
    fn whitespace_rule_splits_tags_and_collapses_blanks() {
        let input = "<A><B>text</B></A>\n\n\n\n<C/>";
        let out = platform_whitespace(input);
        assert!(out.contains("<A>\n<B>"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn root_descriptor_carries_name_and_attribute() {
        let xml = render_root_descriptor(&sample());
        assert!(xml.contains("<Name>MyProc</Name>"));
        assert!(xml.contains("<Name>Note</Name>"));
        assert!(xml.contains("<v8:Length>100</v8:Length>"));
        assert!(xml.contains("DefaultObjectForm>ExternalDataProcessor.MyProc.Form.F<"));
    }

    #[test]
    fn form_xml_contains_prepared_element() {
        let p = sample();
        let form = &p.forms[0];
        let prepared = prepare_form(&p, form);
        let xml = render_form_xml(&p, form, &prepared);
        assert!(xml.contains("<InputField name=\"NoteField\" id=\"1\">"));
        assert!(xml.contains("<DataPath>Object.Note</DataPath>"));
    }

    #[test]
    fn writer_emits_full_tree_with_bom() {
        let p = sample();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactWriter::new(&p).write(dir.path()).unwrap();

        let root = dir.path().join("MyProc");
        assert!(root.join("MyProc.xml").exists());
        assert!(root.join("MyProc/Ext/ObjectModule.bsl").exists());
        assert!(root.join("MyProc/Forms/F.xml").exists());
        assert!(root.join("MyProc/Forms/F/Ext/Form.xml").exists());
        assert!(root.join("MyProc/Forms/F/Ext/Form/Module.bsl").exists());

        let bytes = std::fs::read(root.join("MyProc.xml")).unwrap();
        assert_eq!(&bytes[..3], [0xEF, 0xBB, 0xBF], "BOM expected");
        assert_eq!(artifacts.form_xml.len(), 1);
        assert!(artifacts.modules_concat.contains("#Region"));
    }

    #[test]
    fn repeated_emission_is_byte_identical() {
        let p = sample();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        ArtifactWriter::new(&p).write(dir_a.path()).unwrap();
        ArtifactWriter::new(&p).write(dir_b.path()).unwrap();

        for rel in [
            "MyProc/MyProc.xml",
            "MyProc/MyProc/Forms/F/Ext/Form.xml",
            "MyProc/MyProc/Forms/F/Ext/Form/Module.bsl",
        ] {
            let a = std::fs::read(dir_a.path().join(rel)).unwrap();
            let b = std::fs::read(dir_b.path().join(rel)).unwrap();
            assert_eq!(a, b, "{rel} differs between runs");
        }
    }

    #[test]
    fn pascal_case_conversion() {
        assert_eq!(pascal_case("read_only"), "ReadOnly");
        assert_eq!(pascal_case("width"), "Width");
        assert_eq!(pascal_case("group_direction"), "GroupDirection");
    }
}
