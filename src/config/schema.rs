//! The element schema table.
//!
//! Each element type maps to its accepted properties, whether it binds an
//! attribute/command/tabular section, and the key its children are parsed
//! from. Element parsing is entirely table-driven; adding a property means
//! adding a row here, not a new code path.

use crate::model::ElementType;

/// Default value applied when the author omits a property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Str(&'static str),
}

/// One accepted property of an element type.
#[derive(Clone, Copy, Debug)]
pub struct PropSpec {
    pub key: &'static str,
    /// Stored under this key when it differs from the authored one.
    pub target: Option<&'static str>,
    pub multilang: bool,
    pub default: Option<DefaultValue>,
}

impl PropSpec {
    const fn plain(key: &'static str) -> Self {
        Self {
            key,
            target: None,
            multilang: false,
            default: None,
        }
    }

    const fn multilang(key: &'static str) -> Self {
        Self {
            key,
            target: None,
            multilang: true,
            default: None,
        }
    }

    const fn with_default(key: &'static str, default: DefaultValue) -> Self {
        Self {
            key,
            target: None,
            multilang: false,
            default: Some(default),
        }
    }

    const fn renamed(key: &'static str, target: &'static str) -> Self {
        Self {
            key,
            target: Some(target),
            multilang: false,
            default: None,
        }
    }

    pub fn target_key(&self) -> &'static str {
        self.target.unwrap_or(self.key)
    }
}

/// Where an element's children are authored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildrenKey {
    None,
    Elements,
    Pages,
    ChildItems,
}

impl ChildrenKey {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ChildrenKey::None => None,
            ChildrenKey::Elements => Some("elements"),
            ChildrenKey::Pages => Some("pages"),
            ChildrenKey::ChildItems => Some("child_items"),
        }
    }
}

/// Parsing contract for one element type.
#[derive(Clone, Copy, Debug)]
pub struct ElementSchema {
    pub element_type: ElementType,
    pub props: &'static [PropSpec],
    pub has_attribute: bool,
    pub has_command: bool,
    pub has_tabular_section: bool,
    pub children_key: ChildrenKey,
}

const TITLE_TOOLTIP: [PropSpec; 2] = [PropSpec::multilang("title"), PropSpec::multilang("tooltip")];

const SIZE: [PropSpec; 4] = [
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("horizontal_stretch"),
    PropSpec::plain("vertical_stretch"),
];

const ALIGN: [PropSpec; 2] = [
    PropSpec::plain("horizontal_align"),
    PropSpec::plain("vertical_align"),
];

const INPUT_FIELD_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::multilang("input_hint"),
    SIZE[0],
    SIZE[1],
    SIZE[2],
    SIZE[3],
    ALIGN[0],
    ALIGN[1],
    PropSpec::plain("read_only"),
    PropSpec::renamed("multi_line", "multiline"),
    PropSpec::plain("multiline"),
    PropSpec::plain("password_mode"),
    PropSpec::plain("text_edit"),
    PropSpec::plain("title_location"),
    PropSpec::plain("choice_list"),
    PropSpec::plain("choice_mode"),
    PropSpec::plain("quick_choice"),
    PropSpec::plain("text_color"),
    PropSpec::plain("back_color"),
    PropSpec::plain("border_color"),
    PropSpec::plain("font"),
];

const LABEL_FIELD_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::plain("data_path"),
    PropSpec::plain("hyperlink"),
    ALIGN[0],
    ALIGN[1],
];

const LABEL_DECORATION_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::plain("formatted"),
    PropSpec::plain("hyperlink"),
    PropSpec::plain("font"),
    ALIGN[0],
    ALIGN[1],
];

const PICTURE_DECORATION_PROPS: &[PropSpec] = &[
    PropSpec::plain("picture"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("hyperlink"),
    PropSpec::with_default("picture_size", DefaultValue::Str("Proportionally")),
    PropSpec::plain("zoomable"),
];

const PICTURE_FIELD_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("picture_size"),
    PropSpec::plain("zoomable"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
];

const TABLE_PROPS: &[PropSpec] = &[
    PropSpec::plain("read_only"),
    PropSpec::plain("height"),
    PropSpec::plain("horizontal_stretch"),
    PropSpec::plain("representation"),
    PropSpec::plain("initial_tree_view"),
    PropSpec::plain("show_root"),
];

const BUTTON_PROPS: &[PropSpec] = &[
    PropSpec::plain("width"),
    PropSpec::plain("representation"),
    ALIGN[0],
    ALIGN[1],
];

const RADIO_PROPS: &[PropSpec] = &[
    PropSpec::plain("radio_button_type"),
    PropSpec::plain("choice_list"),
    PropSpec::plain("title_location"),
];

const CHECKBOX_PROPS: &[PropSpec] = &[
    PropSpec::plain("width"),
    PropSpec::plain("title_location"),
];

const SPREADSHEET_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("vertical_scrollbar"),
    PropSpec::plain("horizontal_scrollbar"),
    PropSpec::plain("show_grid"),
    PropSpec::plain("show_headers"),
    PropSpec::plain("edit"),
    PropSpec::plain("protection"),
];

const HTML_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("horizontal_stretch"),
    PropSpec::plain("vertical_stretch"),
    PropSpec::renamed("template", "template_ref"),
];

const CALENDAR_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("show_current_date"),
    PropSpec::plain("first_day_of_week"),
];

const CHART_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("chart_type"),
    PropSpec::plain("show_legend"),
];

const PLANNER_PROPS: &[PropSpec] = &[
    PropSpec::plain("title_location"),
    PropSpec::plain("width"),
    PropSpec::plain("height"),
    PropSpec::plain("enable_drag"),
    PropSpec::plain("show_weekends"),
    PropSpec::plain("period"),
    PropSpec::plain("representation"),
];

const USUAL_GROUP_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::with_default("show_title", DefaultValue::Bool(false)),
    PropSpec::with_default("group_direction", DefaultValue::Str("Vertical")),
    PropSpec::with_default("representation", DefaultValue::Str("None")),
    PropSpec::plain("behavior"),
    PropSpec::plain("read_only"),
];

const BUTTON_GROUP_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::with_default("group_direction", DefaultValue::Str("Horizontal")),
];

const COLUMN_GROUP_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::with_default("group_layout", DefaultValue::Str("Horizontal")),
    PropSpec::with_default("show_in_header", DefaultValue::Bool(true)),
    ALIGN[0],
    ALIGN[1],
];

const POPUP_PROPS: &[PropSpec] = &[
    TITLE_TOOLTIP[0],
    TITLE_TOOLTIP[1],
    PropSpec::plain("picture"),
    PropSpec::plain("representation"),
];

const PAGES_PROPS: &[PropSpec] = &[PropSpec::with_default(
    "pages_representation",
    DefaultValue::Str("TabsOnTop"),
)];

const PAGE_PROPS: &[PropSpec] = &[PropSpec::multilang("title")];

/// Children a `ColumnGroup` accepts; others are dropped with a warning.
pub const COLUMN_GROUP_ALLOWED_CHILDREN: &[ElementType] = &[
    ElementType::LabelField,
    ElementType::InputField,
    ElementType::CheckBoxField,
    ElementType::PictureField,
];

/// Look up the parsing contract for an element type.
pub fn schema_for(ty: ElementType) -> ElementSchema {
    let (props, has_attribute, has_command, has_tabular_section, children_key) = match ty {
        ElementType::InputField => (INPUT_FIELD_PROPS, true, false, false, ChildrenKey::None),
        ElementType::LabelField => (LABEL_FIELD_PROPS, true, false, false, ChildrenKey::None),
        ElementType::LabelDecoration => {
            (LABEL_DECORATION_PROPS, false, false, false, ChildrenKey::None)
        }
        ElementType::PictureDecoration => {
            (PICTURE_DECORATION_PROPS, false, false, false, ChildrenKey::None)
        }
        ElementType::PictureField => (PICTURE_FIELD_PROPS, true, false, false, ChildrenKey::None),
        ElementType::Table => (TABLE_PROPS, false, false, true, ChildrenKey::Elements),
        ElementType::Button => (BUTTON_PROPS, false, true, false, ChildrenKey::None),
        ElementType::ButtonGroup => (BUTTON_GROUP_PROPS, false, false, false, ChildrenKey::Elements),
        ElementType::ColumnGroup => (COLUMN_GROUP_PROPS, false, false, false, ChildrenKey::Elements),
        ElementType::UsualGroup => (USUAL_GROUP_PROPS, false, false, false, ChildrenKey::Elements),
        ElementType::Pages => (PAGES_PROPS, false, false, false, ChildrenKey::Pages),
        ElementType::Page => (PAGE_PROPS, false, false, false, ChildrenKey::Elements),
        ElementType::Popup => (POPUP_PROPS, false, false, false, ChildrenKey::ChildItems),
        ElementType::RadioButtonField => (RADIO_PROPS, true, false, false, ChildrenKey::None),
        ElementType::CheckBoxField => (CHECKBOX_PROPS, true, false, false, ChildrenKey::None),
        ElementType::CalendarField => (CALENDAR_PROPS, true, false, false, ChildrenKey::None),
        ElementType::ChartField => (CHART_PROPS, true, false, false, ChildrenKey::None),
        ElementType::PlannerField => (PLANNER_PROPS, true, false, false, ChildrenKey::None),
        ElementType::HtmlDocumentField => (HTML_PROPS, true, false, false, ChildrenKey::None),
        ElementType::SpreadSheetDocumentField => {
            (SPREADSHEET_PROPS, true, false, false, ChildrenKey::None)
        }
    };
    ElementSchema {
        element_type: ty,
        props,
        has_attribute,
        has_command,
        has_tabular_section,
        children_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_schema() {
        for ty in ElementType::ALL {
            let schema = schema_for(*ty);
            assert_eq!(schema.element_type, *ty);
        }
    }

    #[test]
    fn containers_declare_children_keys() {
        assert_eq!(
            schema_for(ElementType::Pages).children_key,
            ChildrenKey::Pages
        );
        assert_eq!(
            schema_for(ElementType::Popup).children_key,
            ChildrenKey::ChildItems
        );
        assert_eq!(
            schema_for(ElementType::InputField).children_key,
            ChildrenKey::None
        );
    }

    #[test]
    fn renamed_props_expose_targets() {
        let schema = schema_for(ElementType::InputField);
        let spec = schema
            .props
            .iter()
            .find(|p| p.key == "multi_line")
            .unwrap();
        assert_eq!(spec.target_key(), "multiline");
    }
}
