//! Multilingual scalar handling.
//!
//! The declarative source accepts four spellings for a translatable field:
//!
//! ```yaml
//! synonym: "Value"                # uniform across languages
//! synonym: [Ru, Uk, En]           # positional, in `languages` order
//! synonym: {ru: Ru, en: En}       # explicit map
//! synonym: "Ru|Uk|En"             # pipe-delimited, `\|` escapes a pipe
//! ```
//!
//! All four normalize to a `{ru, uk, en}` record before any downstream use.
//! Missing languages fill from the first declared language. Normalizing an
//! already-complete map is the identity.

use serde_yaml::Value;

/// The closed set of multilingual field names.
pub const MULTILANG_FIELDS: &[&str] = &["synonym", "title", "tooltip", "input_hint"];

/// Languages recognized by the platform descriptors.
pub const LANGUAGES: &[&str] = &["ru", "uk", "en"];

/// A fully expanded multilingual value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiLang {
    pub ru: String,
    pub uk: String,
    pub en: String,
}

/// Normalization failure; surfaced as a schema error by the loader.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MultiLangError {
    #[error("dangling escape at end of pipe-delimited value: {0:?}")]
    DanglingEscape(String),
    #[error("unknown language key {0:?} (expected one of ru, uk, en)")]
    UnknownLanguage(String),
    #[error("expected a string, list, or map, got {0}")]
    UnsupportedShape(&'static str),
}

impl MultiLang {
    /// All languages set to the same value.
    pub fn uniform(value: impl Into<String>) -> Self {
        let v = value.into();
        Self {
            ru: v.clone(),
            uk: v.clone(),
            en: v,
        }
    }

    pub fn get(&self, lang: &str) -> &str {
        match lang {
            "ru" => &self.ru,
            "uk" => &self.uk,
            _ => &self.en,
        }
    }

    fn set(&mut self, lang: &str, value: String) -> Result<(), MultiLangError> {
        match lang {
            "ru" => self.ru = value,
            "uk" => self.uk = value,
            "en" => self.en = value,
            other => return Err(MultiLangError::UnknownLanguage(other.to_string())),
        }
        Ok(())
    }

    fn is_set(&self, lang: &str) -> bool {
        !self.get(lang).is_empty()
    }

    /// Expand a YAML value into a complete record. `languages` gives the
    /// declared language order; its first entry is the fill source for any
    /// language the author omitted.
    pub fn from_value(value: &Value, languages: &[String]) -> Result<Self, MultiLangError> {
        let mut out = MultiLang::default();
        match value {
            Value::String(s) => {
                if contains_unescaped_pipe(s) {
                    let parts = split_pipes(s)?;
                    for (lang, part) in languages.iter().zip(parts) {
                        out.set(lang, part)?;
                    }
                } else {
                    return Ok(MultiLang::uniform(unescape_pipes(s)?));
                }
            }
            Value::Sequence(items) => {
                for (lang, item) in languages.iter().zip(items) {
                    out.set(lang, scalar_text(item))?;
                }
            }
            Value::Mapping(map) => {
                for (k, v) in map {
                    let lang = k.as_str().unwrap_or_default().to_string();
                    out.set(&lang, scalar_text(v))?;
                }
            }
            Value::Number(n) => return Ok(MultiLang::uniform(n.to_string())),
            Value::Bool(_) => return Err(MultiLangError::UnsupportedShape("boolean")),
            Value::Null => return Ok(MultiLang::default()),
            Value::Tagged(_) => return Err(MultiLangError::UnsupportedShape("tagged value")),
        }
        out.fill_missing(languages);
        Ok(out)
    }

    /// Fill unset languages from the first declared language.
    fn fill_missing(&mut self, languages: &[String]) {
        let primary = languages
            .iter()
            .map(String::as_str)
            .find(|l| self.is_set(l))
            .unwrap_or("ru");
        let fill = self.get(primary).to_string();
        for lang in LANGUAGES {
            if !self.is_set(lang) {
                // set() cannot fail for the fixed language set
                let _ = self.set(lang, fill.clone());
            }
        }
    }

    /// Entity fallback: every language defaults to the entity name.
    pub fn or_name(self, name: &str) -> Self {
        if self == MultiLang::default() {
            MultiLang::uniform(name)
        } else {
            self
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn contains_unescaped_pipe(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '|' if !escaped => return true,
            _ => escaped = false,
        }
    }
    false
}

fn split_pipes(s: &str) -> Result<Vec<String>, MultiLangError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('|') => current.push('|'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => return Err(MultiLangError::DanglingEscape(s.to_string())),
            },
            '|' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    Ok(parts)
}

fn unescape_pipes(s: &str) -> Result<String, MultiLangError> {
    // A value without unescaped pipes may still carry `\|` escapes.
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('|') => out.push('|'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(MultiLangError::DanglingEscape(s.to_string())),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Default language order when the config omits `languages`.
pub fn default_languages() -> Vec<String> {
    LANGUAGES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<String> {
        default_languages()
    }

    #[test]
    fn uniform_string_expands_to_all_languages() {
        let v = Value::String("Note".into());
        let ml = MultiLang::from_value(&v, &langs()).unwrap();
        assert_eq!(ml, MultiLang::uniform("Note"));
    }

    #[test]
    fn pipe_delimited_maps_positionally() {
        let v = Value::String("Заметка|Нотатка|Note".into());
        let ml = MultiLang::from_value(&v, &langs()).unwrap();
        assert_eq!(ml.ru, "Заметка");
        assert_eq!(ml.uk, "Нотатка");
        assert_eq!(ml.en, "Note");
    }

    #[test]
    fn escaped_pipe_is_literal() {
        let v = Value::String(r"A\|B|C".into());
        let ml = MultiLang::from_value(&v, &langs()).unwrap();
        assert_eq!(ml.ru, "A|B");
        assert_eq!(ml.uk, "C");
        // uk was the last declared part; en fills from ru
        assert_eq!(ml.en, "A|B");
    }

    #[test]
    fn dangling_escape_is_an_error() {
        let v = Value::String("A|B\\".into());
        assert!(matches!(
            MultiLang::from_value(&v, &langs()),
            Err(MultiLangError::DanglingEscape(_))
        ));
    }

    #[test]
    fn partial_map_fills_from_first_declared_language() {
        let v: Value = serde_yaml::from_str("{ru: Привет}").unwrap();
        let ml = MultiLang::from_value(&v, &langs()).unwrap();
        assert_eq!(ml.uk, "Привет");
        assert_eq!(ml.en, "Привет");
    }

    #[test]
    fn normalization_is_idempotent_on_full_maps() {
        let v: Value = serde_yaml::from_str("{ru: R, uk: U, en: E}").unwrap();
        let once = MultiLang::from_value(&v, &langs()).unwrap();
        let again: Value = serde_yaml::from_str(&format!(
            "{{ru: {}, uk: {}, en: {}}}",
            once.ru, once.uk, once.en
        ))
        .unwrap();
        assert_eq!(once, MultiLang::from_value(&again, &langs()).unwrap());
    }

    #[test]
    fn sequence_follows_declared_language_order() {
        let custom = vec!["en".to_string(), "ru".to_string()];
        let v: Value = serde_yaml::from_str("[Hello, Привет]").unwrap();
        let ml = MultiLang::from_value(&v, &custom).unwrap();
        assert_eq!(ml.en, "Hello");
        assert_eq!(ml.ru, "Привет");
        assert_eq!(ml.uk, "Hello");
    }
}
