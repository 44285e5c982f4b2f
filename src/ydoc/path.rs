//! Dotted-path addressing into a document.
//!
//! Paths look like `forms[0].elements[1].name`: `.key` segments descend
//! into mappings, `[index]` segments into sequences.

use super::node::YamlValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seg {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    pub segments: Vec<Seg>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid path {path:?}: {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

impl Path {
    pub fn parse(text: &str) -> Result<Path, PathError> {
        let mut segments = Vec::new();
        let err = |message: &str| PathError {
            path: text.to_string(),
            message: message.to_string(),
        };
        for part in text.split('.') {
            if part.is_empty() {
                return Err(err("empty segment"));
            }
            let mut rest = part;
            // key up to the first bracket
            let key_end = rest.find('[').unwrap_or(rest.len());
            if key_end > 0 {
                segments.push(Seg::Key(rest[..key_end].to_string()));
            }
            rest = &rest[key_end..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']').ok_or_else(|| err("unclosed bracket"))?;
                let index: usize = stripped[..close]
                    .parse()
                    .map_err(|_| err("index is not a number"))?;
                segments.push(Seg::Index(index));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return Err(err("trailing characters after bracket"));
            }
        }
        Ok(Path { segments })
    }

    /// Split off the final segment: `(parent, last)`.
    pub fn split_last(&self) -> Option<(Path, &Seg)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            Path {
                segments: parent.to_vec(),
            },
            last,
        ))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            match seg {
                Seg::Key(k) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{k}")?;
                }
                Seg::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

/// Navigate to the value at `path`.
pub fn resolve<'a>(root: &'a YamlValue, path: &Path) -> Option<&'a YamlValue> {
    let mut current = root;
    for seg in &path.segments {
        current = match seg {
            Seg::Key(key) => current.as_mapping()?.get(key)?,
            Seg::Index(index) => &current.as_sequence()?.items.get(*index)?.value,
        };
    }
    Some(current)
}

/// Navigate mutably to the value at `path`.
pub fn resolve_mut<'a>(root: &'a mut YamlValue, path: &Path) -> Option<&'a mut YamlValue> {
    let mut current = root;
    for seg in &path.segments {
        current = match seg {
            Seg::Key(key) => current.as_mapping_mut()?.get_mut(key)?,
            Seg::Index(index) => &mut current.as_sequence_mut()?.items.get_mut(*index)?.value,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ydoc::parse::parse;

    #[test]
    fn parses_mixed_segments() {
        let path = Path::parse("forms[0].elements[1].name").unwrap();
        assert_eq!(
            path.segments,
            vec![
                Seg::Key("forms".into()),
                Seg::Index(0),
                Seg::Key("elements".into()),
                Seg::Index(1),
                Seg::Key("name".into()),
            ]
        );
        assert_eq!(path.to_string(), "forms[0].elements[1].name");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(Path::parse("forms[x]").is_err());
        assert!(Path::parse("forms[0").is_err());
        assert!(Path::parse("a..b").is_err());
    }

    #[test]
    fn resolves_into_parsed_document() {
        let doc = parse(
            "forms:\n- name: F\n  elements:\n  - name: A\n  - name: B\n",
        )
        .unwrap();
        let path = Path::parse("forms[0].elements[1].name").unwrap();
        assert_eq!(resolve(&doc.body, &path).unwrap().as_str(), Some("B"));
        assert!(resolve(&doc.body, &Path::parse("forms[3]").unwrap()).is_none());
    }
}
