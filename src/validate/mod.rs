//! Model validation: naming, reservation, identifier, qualifier,
//! cross-reference, and picture rules.

mod pictures;
mod reserved;
mod rules;

pub use pictures::{COMMON_PICTURES, PictureCheck, STD_PICTURES, check_picture};
pub use reserved::{
    FORM_BUILTIN_METHODS, METADATA_COLLECTIONS, RESERVED_KEYWORDS, is_builtin_form_method,
    is_metadata_collection, is_reserved_keyword,
};
pub use rules::{ModelError, is_valid_identifier, validate};
