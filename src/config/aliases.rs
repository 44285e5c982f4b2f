//! Fuzzy alias tables for element and form-attribute types.
//!
//! Authors get to write `TextBox` or `Grid`; everything is mapped to a
//! canonical tag before the schema table is consulted. Unrecognized values
//! surface a schema error with a closest-match suggestion.

use crate::model::ElementType;
use crate::suggest::closest_match;

/// `alias → canonical` for element types. Exact canonical spellings resolve
/// without consulting this table.
const ELEMENT_TYPE_ALIASES: &[(&str, &str)] = &[
    ("SpreadsheetDocumentField", "SpreadSheetDocumentField"),
    ("SpreadsheetField", "SpreadSheetDocumentField"),
    ("SpreadSheet", "SpreadSheetDocumentField"),
    ("HtmlDocumentField", "HTMLDocumentField"),
    ("HTMLField", "HTMLDocumentField"),
    ("HtmlField", "HTMLDocumentField"),
    ("Input", "InputField"),
    ("TextBox", "InputField"),
    ("TextField", "InputField"),
    ("TextInput", "InputField"),
    ("Label", "LabelDecoration"),
    ("StaticText", "LabelDecoration"),
    ("Picture", "PictureDecoration"),
    ("Image", "PictureDecoration"),
    ("ImageDecoration", "PictureDecoration"),
    ("ImageField", "PictureField"),
    ("DataTable", "Table"),
    ("Grid", "Table"),
    ("DataGrid", "Table"),
    ("CommandButton", "Button"),
    ("Btn", "Button"),
    ("RadioButton", "RadioButtonField"),
    ("Radio", "RadioButtonField"),
    ("CheckBox", "CheckBoxField"),
    ("Checkbox", "CheckBoxField"),
    ("Calendar", "CalendarField"),
    ("DatePicker", "CalendarField"),
    ("Chart", "ChartField"),
    ("Diagram", "ChartField"),
    ("Scheduler", "PlannerField"),
    ("Kanban", "PlannerField"),
    ("Group", "UsualGroup"),
    ("FormGroup", "UsualGroup"),
    ("Panel", "UsualGroup"),
    ("PopupMenu", "Popup"),
    ("Menu", "Popup"),
    ("DropDown", "Popup"),
    ("TabControl", "Pages"),
    ("Tabs", "Pages"),
    ("TabPages", "Pages"),
    ("Tab", "Page"),
    ("TabPage", "Page"),
];

/// `alias → canonical` for form-attribute types (snake-case canon).
const FORM_ATTRIBUTE_TYPE_ALIASES: &[(&str, &str)] = &[
    ("SpreadsheetDocument", "spreadsheet_document"),
    ("SpreadSheetDocument", "spreadsheet_document"),
    ("Spreadsheet", "spreadsheet_document"),
    ("MXL", "spreadsheet_document"),
    ("BinaryData", "binary_data"),
    ("Binary", "binary_data"),
    ("Blob", "binary_data"),
    ("String", "string"),
    ("Text", "string"),
    ("Number", "number"),
    ("Numeric", "number"),
    ("Integer", "number"),
    ("Decimal", "number"),
    ("Date", "date"),
    ("DateTime", "date"),
    ("Boolean", "boolean"),
    ("Bool", "boolean"),
    ("Planner", "planner"),
];

/// Canonical form-attribute type tags.
pub const FORM_ATTRIBUTE_TYPES: &[&str] = &[
    "string",
    "number",
    "date",
    "boolean",
    "spreadsheet_document",
    "binary_data",
    "planner",
];

/// Result of alias resolution: either the canonical value or a rejection
/// carrying an optional suggestion.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved<T> {
    Canonical(T),
    Unknown { suggestion: Option<String> },
}

/// Resolve an element-type spelling to its canonical tag.
pub fn resolve_element_type(raw: &str) -> Resolved<ElementType> {
    if let Some(ty) = ElementType::from_canonical(raw) {
        return Resolved::Canonical(ty);
    }
    // Case-insensitive canonical spellings count as aliases too.
    let lowered = raw.to_lowercase();
    for ty in ElementType::ALL {
        if ty.canonical().to_lowercase() == lowered {
            return Resolved::Canonical(*ty);
        }
    }
    for (alias, canon) in ELEMENT_TYPE_ALIASES {
        if alias.to_lowercase() == lowered {
            return Resolved::Canonical(
                ElementType::from_canonical(canon).expect("alias table targets canonical names"),
            );
        }
    }
    let suggestion = closest_match(raw, ElementType::ALL.iter().map(|t| t.canonical()))
        .map(str::to_string);
    Resolved::Unknown { suggestion }
}

/// Resolve a form-attribute type spelling to its canonical snake form.
pub fn resolve_form_attribute_type(raw: &str) -> Resolved<String> {
    let lowered = raw.to_lowercase();
    if FORM_ATTRIBUTE_TYPES.contains(&lowered.as_str()) {
        return Resolved::Canonical(lowered);
    }
    for (alias, canon) in FORM_ATTRIBUTE_TYPE_ALIASES {
        if alias.to_lowercase() == lowered {
            return Resolved::Canonical((*canon).to_string());
        }
    }
    let suggestion =
        closest_match(raw, FORM_ATTRIBUTE_TYPES.iter().copied()).map(str::to_string);
    Resolved::Unknown { suggestion }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TextBox", ElementType::InputField)]
    #[case("inputfield", ElementType::InputField)]
    #[case("Grid", ElementType::Table)]
    #[case("Label", ElementType::LabelDecoration)]
    #[case("SpreadsheetDocumentField", ElementType::SpreadSheetDocumentField)]
    #[case("Tabs", ElementType::Pages)]
    #[case("Tab", ElementType::Page)]
    fn aliases_resolve(#[case] raw: &str, #[case] expected: ElementType) {
        assert_eq!(resolve_element_type(raw), Resolved::Canonical(expected));
    }

    #[test]
    fn every_alias_targets_a_canonical_type() {
        for (alias, _) in ELEMENT_TYPE_ALIASES {
            assert!(
                matches!(resolve_element_type(alias), Resolved::Canonical(_)),
                "alias {alias} did not resolve"
            );
        }
    }

    #[test]
    fn unknown_type_gets_a_suggestion() {
        match resolve_element_type("InputFeild") {
            Resolved::Unknown { suggestion } => {
                assert_eq!(suggestion.as_deref(), Some("InputField"));
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[rstest]
    #[case("MXL", "spreadsheet_document")]
    #[case("Bool", "boolean")]
    #[case("string", "string")]
    fn form_attribute_aliases_resolve(#[case] raw: &str, #[case] canon: &str) {
        assert_eq!(
            resolve_form_attribute_type(raw),
            Resolved::Canonical(canon.to_string())
        );
    }
}
