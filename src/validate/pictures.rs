//! Picture reference whitelist.
//!
//! Commands and decorations reference platform pictures as `Std.<Name>` or
//! `Common.<Name>`. Unknown names are rejected with a suggestion.

use crate::suggest::closest_match;

/// Standard platform picture names (the `Std.` namespace).
pub const STD_PICTURES: &[&str] = &[
    "Attach",
    "Attribute",
    "Back",
    "CancelSearch",
    "Catalog",
    "Change",
    "CheckAll",
    "ChooseValue",
    "ClearFilter",
    "CloneObject",
    "Close",
    "CollapseAll",
    "CreateFolder",
    "CreateListItem",
    "CustomizeForm",
    "CustomizeList",
    "Delete",
    "DeleteDirectly",
    "Document",
    "EndEdit",
    "ExecuteTask",
    "ExpandAll",
    "FilterByCurrentValue",
    "Find",
    "FindInList",
    "FindNext",
    "FindPrevious",
    "Form",
    "FormHelp",
    "Forward",
    "GenerateReport",
    "GetURL",
    "GoBack",
    "Information",
    "InputFieldCalendar",
    "InputFieldClear",
    "InputFieldOpen",
    "InputFieldSelect",
    "InputOnBasis",
    "ListSettings",
    "MarkToDelete",
    "MoveDown",
    "MoveItem",
    "MoveLeft",
    "MoveRight",
    "MoveUp",
    "Notifications",
    "OpenFile",
    "Picture",
    "Post",
    "Print",
    "PrintImmediately",
    "Properties",
    "ReadChanges",
    "Refresh",
    "Replace",
    "Report",
    "Reread",
    "RestoreValues",
    "SaveFile",
    "SaveValues",
    "SelectAll",
    "SetDateInterval",
    "SetTime",
    "ShowData",
    "ShowInList",
    "SortListAsc",
    "SortListDesc",
    "Stop",
    "SyncContents",
    "UncheckAll",
    "UndoPosting",
    "UnselectAll",
    "User",
    "Write",
    "WriteAndClose",
    "WriteChanges",
];

/// Library picture names (the `Common.` namespace) shipped with the
/// standard subsystems the generated forms rely on.
pub const COMMON_PICTURES: &[&str] = &[
    "AddToList",
    "Calculate",
    "Export",
    "Import",
    "LongOperation",
    "Magnifier",
    "PaintBucket",
    "Questionnaire",
    "ScheduledJob",
    "SendByEmail",
    "TimeConsumingOperation48",
];

/// Validation result for a picture reference.
#[derive(Debug, PartialEq, Eq)]
pub enum PictureCheck {
    Ok,
    UnknownName { suggestion: Option<String> },
    BadPrefix,
}

/// Check a `Std.Name` / `Common.Name` reference against the whitelist.
pub fn check_picture(reference: &str) -> PictureCheck {
    let (table, name) = if let Some(name) = reference
        .strip_prefix("Std.")
        .or_else(|| reference.strip_prefix("StdPicture."))
    {
        (STD_PICTURES, name)
    } else if let Some(name) = reference
        .strip_prefix("Common.")
        .or_else(|| reference.strip_prefix("CommonPicture."))
    {
        (COMMON_PICTURES, name)
    } else {
        return PictureCheck::BadPrefix;
    };
    if table.contains(&name) {
        PictureCheck::Ok
    } else {
        PictureCheck::UnknownName {
            suggestion: closest_match(name, table.iter().copied()).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pictures_pass() {
        assert_eq!(check_picture("Std.Refresh"), PictureCheck::Ok);
        assert_eq!(check_picture("StdPicture.Print"), PictureCheck::Ok);
        assert_eq!(check_picture("Common.Export"), PictureCheck::Ok);
    }

    #[test]
    fn unknown_name_suggests() {
        match check_picture("Std.Refersh") {
            PictureCheck::UnknownName { suggestion } => {
                assert_eq!(suggestion.as_deref(), Some("Refresh"));
            }
            other => panic!("expected UnknownName, got {other:?}"),
        }
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        assert_eq!(check_picture("Pictures.Whatever"), PictureCheck::BadPrefix);
    }
}
