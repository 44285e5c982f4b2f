//! Indentation parser for the comment-preserving document.
//!
//! Hand-written and line-oriented: each line is classified once, comments
//! and blank lines accumulate in a pending buffer, and whichever entry is
//! parsed next consumes them as its leading block. This is what makes
//! structural edits keep comment anchors — the anchor *is* the entry.

use super::node::{
    Document, MapEntry, Mapping, Scalar, ScalarStyle, SeqItem, Sequence, YamlValue,
};

#[derive(Debug, thiserror::Error)]
#[error("YAML document error at line {line}: {message}")]
pub struct YdocError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug)]
struct Line {
    indent: usize,
    /// Content after indentation (may be a comment line).
    content: String,
}

enum LineKind<'a> {
    Blank,
    Comment(&'a str),
    Content(&'a str),
}

impl Line {
    fn kind(&self) -> LineKind<'_> {
        let trimmed = self.content.trim_end();
        if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with('#') {
            LineKind::Comment(trimmed)
        } else {
            LineKind::Content(trimmed)
        }
    }
}

/// Parse a document from text.
pub fn parse(text: &str) -> Result<Document, YdocError> {
    let text = crate::config::strip_bom(text);
    let lines: Vec<Line> = text
        .lines()
        .map(|raw| {
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            Line {
                indent,
                content: raw[indent..].to_string(),
            }
        })
        .collect();
    let mut parser = Parser {
        lines,
        pos: 0,
        pending: Vec::new(),
    };

    parser.collect_pending();
    let leading = std::mem::take(&mut parser.pending);
    let body = if parser.peek().is_some() {
        parser.parse_block(0)?
    } else {
        YamlValue::empty_mapping()
    };
    parser.collect_pending();
    let trailing = std::mem::take(&mut parser.pending);

    Ok(Document {
        leading,
        body,
        trailing,
    })
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
    pending: Vec<String>,
}

impl Parser {
    /// Absorb blank and comment lines into the pending buffer.
    fn collect_pending(&mut self) {
        while let Some(line) = self.lines.get(self.pos) {
            match line.kind() {
                LineKind::Blank => self.pending.push(String::new()),
                LineKind::Comment(text) => self.pending.push(text.to_string()),
                LineKind::Content(_) => break,
            }
            self.pos += 1;
        }
    }

    /// Current content line (pending already collected).
    fn peek(&self) -> Option<(usize, &str)> {
        let line = self.lines.get(self.pos)?;
        match line.kind() {
            LineKind::Content(text) => Some((line.indent, text)),
            _ => None,
        }
    }

    /// Indent and first character of the next content line, without
    /// consuming anything.
    fn peek_ahead(&self) -> Option<(usize, char)> {
        for line in &self.lines[self.pos..] {
            if let LineKind::Content(text) = line.kind() {
                return Some((line.indent, text.chars().next().unwrap_or(' ')));
            }
        }
        None
    }

    fn parse_block(&mut self, min_indent: usize) -> Result<YamlValue, YdocError> {
        self.collect_pending();
        let Some((indent, text)) = self.peek() else {
            return Ok(YamlValue::plain(""));
        };
        if indent < min_indent {
            return Ok(YamlValue::plain(""));
        }
        if is_dash_item(text) {
            self.parse_sequence(indent)
        } else {
            self.parse_mapping(indent)
        }
    }

    fn parse_mapping(&mut self, base: usize) -> Result<YamlValue, YdocError> {
        let mut entries = Vec::new();
        loop {
            self.collect_pending();
            let Some((indent, text)) = self.peek() else {
                break;
            };
            if indent != base || is_dash_item(text) {
                break;
            }
            let line_no = self.pos + 1;
            let text = text.to_string();
            self.pos += 1;
            let leading = std::mem::take(&mut self.pending);

            let Some((key, rest)) = split_key(&text) else {
                return Err(YdocError {
                    line: line_no,
                    message: format!("expected `key: value`, got {text:?}"),
                });
            };
            let (value, inline) = self.parse_value_after_colon(rest.as_deref(), base)?;
            entries.push(MapEntry {
                leading,
                key,
                value,
                inline,
            });
        }
        Ok(YamlValue::Mapping(Mapping {
            entries,
            flow: false,
        }))
    }

    fn parse_sequence(&mut self, base: usize) -> Result<YamlValue, YdocError> {
        let mut items = Vec::new();
        loop {
            self.collect_pending();
            let Some((indent, text)) = self.peek() else {
                break;
            };
            if indent != base || !is_dash_item(text) {
                break;
            }
            let text = text.to_string();
            self.pos += 1;
            let leading = std::mem::take(&mut self.pending);

            let rest = text[1..].trim_start();
            let entry_indent = base + 2;
            let (value, inline) = if rest.is_empty() {
                let value = self.parse_block(base + 1)?;
                (value, None)
            } else if let Some((key, key_rest)) = split_key_if_mapping(rest) {
                // `- key: ...` opens an inline mapping continued at the
                // entry indent.
                let (first_value, first_inline) =
                    self.parse_value_after_colon(key_rest.as_deref(), entry_indent)?;
                let mut first = MapEntry::new(key, first_value);
                first.inline = first_inline;
                let mut mapping = match self.continue_mapping(entry_indent)? {
                    YamlValue::Mapping(m) => m,
                    _ => unreachable!("continue_mapping always yields a mapping"),
                };
                mapping.entries.insert(0, first);
                (YamlValue::Mapping(mapping), None)
            } else {
                let (value_text, inline) = split_inline_comment(rest);
                (parse_flow_or_scalar(value_text.trim()), inline)
            };
            items.push(SeqItem {
                leading,
                value,
                inline,
            });
        }
        Ok(YamlValue::Sequence(Sequence { items, flow: false }))
    }

    /// Continue a mapping whose first entry came from a dash line.
    fn continue_mapping(&mut self, base: usize) -> Result<YamlValue, YdocError> {
        // Only continue when the next content line is a key at exactly the
        // entry indent; otherwise the mapping had a single inline entry.
        match self.peek_ahead() {
            Some((indent, c)) if indent == base && c != '-' => self.parse_mapping(base),
            _ => Ok(YamlValue::Mapping(Mapping {
                entries: Vec::new(),
                flow: false,
            })),
        }
    }

    fn parse_value_after_colon(
        &mut self,
        rest: Option<&str>,
        base: usize,
    ) -> Result<(YamlValue, Option<String>), YdocError> {
        let Some(rest) = rest else {
            // `key:` with the value in the following block, a sequence at
            // the same indent, or nothing at all.
            return Ok((self.parse_nested_block(base)?, None));
        };
        let (value_text, inline) = split_inline_comment(rest);
        let value_text = value_text.trim();
        if value_text.is_empty() {
            return Ok((self.parse_nested_block(base)?, inline));
        }
        if value_text == "|" || value_text == "|-" {
            return Ok((self.parse_literal_block(base)?, inline));
        }
        Ok((parse_flow_or_scalar(value_text), inline))
    }

    fn parse_nested_block(&mut self, base: usize) -> Result<YamlValue, YdocError> {
        match self.peek_ahead() {
            Some((indent, _)) if indent > base => self.parse_block(base + 1),
            // A block sequence may sit at the owner key's own indent.
            Some((indent, '-')) if indent == base => self.parse_sequence(base),
            _ => Ok(YamlValue::plain("")),
        }
    }

    fn parse_literal_block(&mut self, base: usize) -> Result<YamlValue, YdocError> {
        // Raw consumption: blank lines inside the block are content, not
        // pending comments.
        let mut collected: Vec<(usize, String)> = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            let trimmed = line.content.trim_end();
            if trimmed.is_empty() {
                collected.push((usize::MAX, String::new()));
                self.pos += 1;
                continue;
            }
            if line.indent <= base {
                break;
            }
            collected.push((line.indent, trimmed.to_string()));
            self.pos += 1;
        }
        // Trailing blanks belong to whatever follows the block.
        while matches!(collected.last(), Some((_, text)) if text.is_empty()) {
            collected.pop();
            self.pos -= 1;
        }
        let block_indent = collected
            .iter()
            .filter(|(i, _)| *i != usize::MAX)
            .map(|(i, _)| *i)
            .min()
            .unwrap_or(base + 2);
        let text = collected
            .iter()
            .map(|(indent, line)| {
                if *indent == usize::MAX {
                    String::new()
                } else {
                    " ".repeat(indent - block_indent) + line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(YamlValue::Scalar(Scalar {
            value: text,
            style: ScalarStyle::Literal,
        }))
    }
}

fn is_dash_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

/// Split `key: rest`; `rest` is `None` when the line is just `key:`.
fn split_key(text: &str) -> Option<(String, Option<String>)> {
    let colon = find_key_colon(text)?;
    let key = unquote_key(text[..colon].trim());
    let rest = text[colon + 1..].trim_start();
    if rest.is_empty() {
        Some((key, None))
    } else {
        Some((key, Some(rest.to_string())))
    }
}

/// Like [`split_key`], but only when the text genuinely opens a mapping —
/// a plain scalar containing a colon (e.g. a URL) stays a scalar.
fn split_key_if_mapping(text: &str) -> Option<(String, Option<String>)> {
    let colon = find_key_colon(text)?;
    let key = text[..colon].trim();
    if key.is_empty() || key.contains(' ') && !key.starts_with('"') && !key.starts_with('\'') {
        return None;
    }
    split_key(text)
}

/// Position of the key-separating colon: outside quotes, followed by
/// whitespace or end of line.
fn find_key_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b':' if !in_single && !in_double => {
                if i + 1 == bytes.len() || bytes[i + 1] == b' ' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unquote_key(key: &str) -> String {
    let k = key.trim();
    if (k.starts_with('"') && k.ends_with('"') && k.len() >= 2)
        || (k.starts_with('\'') && k.ends_with('\'') && k.len() >= 2)
    {
        k[1..k.len() - 1].to_string()
    } else {
        k.to_string()
    }
}

/// Split off a trailing ` # comment`, respecting quotes and flow brackets.
fn split_inline_comment(text: &str) -> (String, Option<String>) {
    let bytes = text.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'[' | b'{' if !in_single && !in_double => depth += 1,
            b']' | b'}' if !in_single && !in_double => depth = depth.saturating_sub(1),
            b'#' if !in_single && !in_double && depth == 0 => {
                if i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' {
                    return (
                        text[..i].trim_end().to_string(),
                        Some(text[i..].trim_end().to_string()),
                    );
                }
            }
            _ => {}
        }
    }
    (text.trim_end().to_string(), None)
}

fn parse_flow_or_scalar(text: &str) -> YamlValue {
    if text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let items = split_flow_items(inner)
            .into_iter()
            .map(|item| SeqItem::new(parse_flow_or_scalar(item.trim())))
            .collect();
        return YamlValue::Sequence(Sequence { items, flow: true });
    }
    if text.starts_with('{') && text.ends_with('}') {
        let inner = &text[1..text.len() - 1];
        let entries = split_flow_items(inner)
            .into_iter()
            .filter_map(|item| {
                let (key, rest) = split_key(item.trim())?;
                Some(MapEntry::new(
                    key,
                    parse_flow_or_scalar(rest.as_deref().unwrap_or("").trim()),
                ))
            })
            .collect();
        return YamlValue::Mapping(Mapping {
            entries,
            flow: true,
        });
    }
    YamlValue::Scalar(parse_scalar_text(text))
}

fn split_flow_items(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut items = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'[' | b'{' if !in_single && !in_double => depth += 1,
            b']' | b'}' if !in_single && !in_double => depth = depth.saturating_sub(1),
            b',' if depth == 0 && !in_single && !in_double => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !inner[start..].trim().is_empty() {
        items.push(&inner[start..]);
    }
    items
}

fn parse_scalar_text(text: &str) -> Scalar {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        let inner = &text[1..text.len() - 1];
        return Scalar {
            value: inner.replace("\\\"", "\"").replace("\\\\", "\\"),
            style: ScalarStyle::DoubleQuoted,
        };
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let inner = &text[1..text.len() - 1];
        return Scalar {
            value: inner.replace("''", "'"),
            style: ScalarStyle::SingleQuoted,
        };
    }
    Scalar::plain(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Processor description
processor:
  name: MyProc # the artifact name
  synonym: \"Мой|Мій|My\"

# Data
attributes:
- name: Note
  type: string
  length: 100

forms:
- name: F
  default: true
  elements:
  - type: InputField
    name: NoteField
    attribute: Note
";

    #[test]
    fn parses_nested_structure() {
        let doc = parse(SAMPLE).unwrap();
        let root = doc.body.as_mapping().unwrap();
        let processor = root.get("processor").unwrap().as_mapping().unwrap();
        assert_eq!(processor.get("name").unwrap().as_str(), Some("MyProc"));

        let attrs = root.get("attributes").unwrap().as_sequence().unwrap();
        assert_eq!(attrs.items.len(), 1);
        assert_eq!(attrs.items[0].value.name(), Some("Note"));

        let forms = root.get("forms").unwrap().as_sequence().unwrap();
        let form = forms.items[0].value.as_mapping().unwrap();
        let elements = form.get("elements").unwrap().as_sequence().unwrap();
        assert_eq!(elements.items[0].value.name(), Some("NoteField"));
    }

    #[test]
    fn comments_attach_to_entries() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!(doc.leading, ["# Processor description"]);

        let root = doc.body.as_mapping().unwrap();
        let attrs_entry = root
            .entries
            .iter()
            .find(|e| e.key == "attributes")
            .unwrap();
        assert!(attrs_entry.leading.contains(&"# Data".to_string()));

        let processor = root.get("processor").unwrap().as_mapping().unwrap();
        let name_entry = processor.entries.iter().find(|e| e.key == "name").unwrap();
        assert_eq!(name_entry.inline.as_deref(), Some("# the artifact name"));
    }

    #[test]
    fn quote_styles_are_recorded() {
        let doc = parse(SAMPLE).unwrap();
        let root = doc.body.as_mapping().unwrap();
        let processor = root.get("processor").unwrap().as_mapping().unwrap();
        let synonym = processor.get("synonym").unwrap().as_scalar().unwrap();
        assert_eq!(synonym.style, ScalarStyle::DoubleQuoted);
        assert_eq!(synonym.value, "Мой|Мій|My");
    }

    #[test]
    fn flow_collections_parse() {
        let doc = parse("languages: [ru, uk, en]\nopts: {a: 1, b: two}\n").unwrap();
        let root = doc.body.as_mapping().unwrap();
        let langs = root.get("languages").unwrap().as_sequence().unwrap();
        assert!(langs.flow);
        assert_eq!(langs.items.len(), 3);
        assert_eq!(langs.items[1].value.as_str(), Some("uk"));
        let opts = root.get("opts").unwrap().as_mapping().unwrap();
        assert!(opts.flow);
        assert_eq!(opts.get("b").unwrap().as_str(), Some("two"));
    }

    #[test]
    fn literal_block_preserves_lines() {
        let text = "\
query_text: |
  SELECT
    Ref,
    Description
  FROM Catalog.Goods
next: 1
";
        let doc = parse(text).unwrap();
        let root = doc.body.as_mapping().unwrap();
        let query = root.get("query_text").unwrap().as_scalar().unwrap();
        assert_eq!(query.style, ScalarStyle::Literal);
        assert_eq!(
            query.value,
            "SELECT\n  Ref,\n  Description\nFROM Catalog.Goods"
        );
        assert_eq!(root.get("next").unwrap().as_str(), Some("1"));
    }

    #[test]
    fn plain_scalar_with_colon_in_url_stays_scalar() {
        let doc = parse("links:\n- https://example.org/x\n").unwrap();
        let root = doc.body.as_mapping().unwrap();
        let links = root.get("links").unwrap().as_sequence().unwrap();
        assert_eq!(links.items[0].value.as_str(), Some("https://example.org/x"));
    }

    #[test]
    fn empty_key_parses_as_empty_scalar() {
        let doc = parse("documentation:\nname: X\n").unwrap();
        let root = doc.body.as_mapping().unwrap();
        assert_eq!(root.get("documentation").unwrap().as_str(), Some(""));
        assert_eq!(root.get("name").unwrap().as_str(), Some("X"));
    }
}
