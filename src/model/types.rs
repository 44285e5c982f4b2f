//! The data-type language for attributes, columns, and form parameters.
//!
//! A type tag is either a primitive (`string`, `number`, `boolean`, `date`)
//! or a typed reference `Catalog(Name)` / `Document(Name)`. Length and digit
//! qualifiers live on the owning entity; the validator enforces their ranges
//! against the kind declared here.

use std::fmt;

/// Upper bound on string lengths accepted by the platform.
pub const MAX_STRING_LENGTH: u32 = 1024;
/// Upper bound on numeric precision accepted by the platform.
pub const MAX_NUMBER_DIGITS: u32 = 38;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    String,
    Number,
    Boolean,
    Date,
    Catalog(String),
    Document(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown data type {0:?}")]
pub struct TypeParseError(pub String);

impl DataType {
    /// Parse a type tag. Reference forms accept both `Catalog(Name)` and
    /// `CatalogRef.Name` spellings (the latter is what decompiled descriptors
    /// carry).
    pub fn parse(tag: &str) -> Result<Self, TypeParseError> {
        let tag = tag.trim();
        match tag.to_ascii_lowercase().as_str() {
            "string" => return Ok(DataType::String),
            "number" => return Ok(DataType::Number),
            "boolean" => return Ok(DataType::Boolean),
            "date" => return Ok(DataType::Date),
            _ => {}
        }
        for (head, ctor) in [
            ("Catalog", DataType::Catalog as fn(String) -> DataType),
            ("Document", DataType::Document as fn(String) -> DataType),
        ] {
            if let Some(rest) = tag.strip_prefix(head) {
                if let Some(name) = rest
                    .strip_prefix('(')
                    .and_then(|r| r.strip_suffix(')'))
                    .or_else(|| rest.strip_prefix("Ref."))
                {
                    let name = name.trim();
                    if !name.is_empty() {
                        return Ok(ctor(name.to_string()));
                    }
                }
            }
        }
        Err(TypeParseError(tag.to_string()))
    }

    /// The wire type written into descriptor XML.
    pub fn xml_type(&self) -> String {
        match self {
            DataType::String => "xs:string".into(),
            DataType::Number => "xs:decimal".into(),
            DataType::Boolean => "xs:boolean".into(),
            DataType::Date => "xs:dateTime".into(),
            DataType::Catalog(name) => format!("cfg:CatalogRef.{name}"),
            DataType::Document(name) => format!("cfg:DocumentRef.{name}"),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, DataType::Catalog(_) | DataType::Document(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Number => write!(f, "number"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Date => write!(f, "date"),
            DataType::Catalog(n) => write!(f, "Catalog({n})"),
            DataType::Document(n) => write!(f, "Document({n})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("string", DataType::String)]
    #[case("Number", DataType::Number)]
    #[case("BOOLEAN", DataType::Boolean)]
    #[case("date", DataType::Date)]
    #[case("Catalog(Goods)", DataType::Catalog("Goods".into()))]
    #[case("Document(Invoice)", DataType::Document("Invoice".into()))]
    #[case("CatalogRef.Goods", DataType::Catalog("Goods".into()))]
    fn parses_valid_tags(#[case] tag: &str, #[case] expected: DataType) {
        assert_eq!(DataType::parse(tag).unwrap(), expected);
    }

    #[rstest]
    #[case("strings")]
    #[case("Catalog()")]
    #[case("Register(X)")]
    fn rejects_unknown_tags(#[case] tag: &str) {
        assert!(DataType::parse(tag).is_err());
    }

    #[test]
    fn display_round_trips() {
        for tag in ["string", "number", "Catalog(Goods)", "Document(Invoice)"] {
            let parsed = DataType::parse(tag).unwrap();
            assert_eq!(DataType::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }
}
