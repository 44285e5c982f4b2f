//! Re-emission of a comment-preserving document.
//!
//! Two-space indentation, sequence dashes at the owning key's indent,
//! comment lines re-anchored at their entry's indent, scalar quoting style
//! preserved.

use super::node::{Document, Mapping, Scalar, ScalarStyle, Sequence, YamlValue};

/// Render the document back to text.
pub fn emit(doc: &Document) -> String {
    let mut out = String::new();
    emit_comment_block(&mut out, &doc.leading, 0);
    match &doc.body {
        YamlValue::Mapping(map) => emit_mapping(&mut out, map, 0),
        YamlValue::Sequence(seq) => emit_sequence(&mut out, seq, 0),
        YamlValue::Scalar(s) => {
            out.push_str(&render_scalar_inline(s));
            out.push('\n');
        }
    }
    emit_comment_block(&mut out, &doc.trailing, 0);
    out
}

fn indent_str(indent: usize) -> String {
    " ".repeat(indent)
}

fn emit_comment_block(out: &mut String, lines: &[String], indent: usize) {
    for line in lines {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&indent_str(indent));
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn emit_mapping(out: &mut String, map: &Mapping, indent: usize) {
    for entry in &map.entries {
        emit_comment_block(out, &entry.leading, indent);
        out.push_str(&indent_str(indent));
        out.push_str(&render_key(&entry.key));
        out.push(':');
        emit_value_after_key(out, &entry.value, entry.inline.as_deref(), indent);
    }
}

fn emit_sequence(out: &mut String, seq: &Sequence, indent: usize) {
    for item in &seq.items {
        emit_comment_block(out, &item.leading, indent);
        out.push_str(&indent_str(indent));
        out.push('-');
        match &item.value {
            YamlValue::Mapping(map) if !map.flow && !map.entries.is_empty() => {
                // First entry rides the dash line.
                let first = &map.entries[0];
                out.push(' ');
                out.push_str(&render_key(&first.key));
                out.push(':');
                emit_value_after_key(out, &first.value, first.inline.as_deref(), indent + 2);
                let rest = Mapping {
                    entries: map.entries[1..].to_vec(),
                    flow: false,
                };
                emit_mapping(out, &rest, indent + 2);
            }
            YamlValue::Sequence(inner) if !inner.flow => {
                push_inline_comment(out, item.inline.as_deref());
                out.push('\n');
                emit_sequence(out, inner, indent + 2);
            }
            value => {
                out.push(' ');
                out.push_str(&render_value_inline(value));
                push_inline_comment(out, item.inline.as_deref());
                out.push('\n');
            }
        }
    }
}

fn emit_value_after_key(out: &mut String, value: &YamlValue, inline: Option<&str>, indent: usize) {
    match value {
        YamlValue::Scalar(s) if s.style == ScalarStyle::Literal => {
            out.push_str(" |");
            push_inline_comment(out, inline);
            out.push('\n');
            for line in s.value.lines() {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str(&indent_str(indent + 2));
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        YamlValue::Scalar(s) => {
            if !s.value.is_empty() || s.style != ScalarStyle::Plain {
                out.push(' ');
                out.push_str(&render_scalar_inline(s));
            }
            push_inline_comment(out, inline);
            out.push('\n');
        }
        YamlValue::Sequence(seq) if seq.flow => {
            out.push(' ');
            out.push_str(&render_value_inline(value));
            push_inline_comment(out, inline);
            out.push('\n');
        }
        YamlValue::Mapping(map) if map.flow => {
            out.push(' ');
            out.push_str(&render_value_inline(value));
            push_inline_comment(out, inline);
            out.push('\n');
        }
        YamlValue::Sequence(seq) => {
            push_inline_comment(out, inline);
            out.push('\n');
            // Dash offset 0: items sit at the key's own indent.
            emit_sequence(out, seq, indent);
        }
        YamlValue::Mapping(map) => {
            push_inline_comment(out, inline);
            out.push('\n');
            emit_mapping(out, map, indent + 2);
        }
    }
}

fn push_inline_comment(out: &mut String, inline: Option<&str>) {
    if let Some(comment) = inline {
        out.push(' ');
        out.push_str(comment);
    }
}

fn render_key(key: &str) -> String {
    if key.is_empty() || key.contains(':') || key.contains('#') || key.starts_with(['\'', '"']) {
        format!("\"{}\"", key.replace('"', "\\\""))
    } else {
        key.to_string()
    }
}

fn render_value_inline(value: &YamlValue) -> String {
    match value {
        YamlValue::Scalar(s) => render_scalar_inline(s),
        YamlValue::Sequence(seq) => {
            let items: Vec<String> = seq
                .items
                .iter()
                .map(|i| render_value_inline(&i.value))
                .collect();
            format!("[{}]", items.join(", "))
        }
        YamlValue::Mapping(map) => {
            let entries: Vec<String> = map
                .entries
                .iter()
                .map(|e| format!("{}: {}", render_key(&e.key), render_value_inline(&e.value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn render_scalar_inline(s: &Scalar) -> String {
    match s.style {
        ScalarStyle::DoubleQuoted => {
            format!("\"{}\"", s.value.replace('\\', "\\\\").replace('"', "\\\""))
        }
        ScalarStyle::SingleQuoted => format!("'{}'", s.value.replace('\'', "''")),
        ScalarStyle::Literal | ScalarStyle::Plain => {
            if needs_quoting(&s.value) {
                format!("\"{}\"", s.value.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                s.value.clone()
            }
        }
    }
}

/// Whether a plain rendition would be re-parsed as something else.
fn needs_quoting(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if value.starts_with([' ', '#', '-', '[', ']', '{', '}', '\'', '"', '&', '*', '!', '|', '>'])
        || value.ends_with(' ')
    {
        return true;
    }
    value.contains(": ") || value.ends_with(':') || value.contains(" #")
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse;
    use super::*;

    const SAMPLE: &str = "\
# Top comment
processor:
  name: MyProc # inline note
  synonym: \"А|Б|C\"

# attributes below
attributes:
- name: Note
  type: string

forms:
- name: F
  elements:
  - type: InputField
    name: NoteField
";

    #[test]
    fn round_trip_is_stable() {
        let doc = parse(SAMPLE).unwrap();
        let emitted = emit(&doc);
        let doc2 = parse(&emitted).unwrap();
        assert_eq!(doc, doc2, "second parse must equal first");
        // and the emission itself is a fixed point
        assert_eq!(emitted, emit(&doc2));
    }

    #[test]
    fn comments_survive_round_trip() {
        let doc = parse(SAMPLE).unwrap();
        let emitted = emit(&doc);
        assert!(emitted.contains("# Top comment"));
        assert!(emitted.contains("# inline note"));
        assert!(emitted.contains("# attributes below"));
    }

    #[test]
    fn quoting_style_is_preserved() {
        let doc = parse(SAMPLE).unwrap();
        let emitted = emit(&doc);
        assert!(emitted.contains("synonym: \"А|Б|C\""));
    }

    #[test]
    fn literal_blocks_round_trip() {
        let text = "query: |\n  SELECT X\n  FROM Y\n";
        let doc = parse(text).unwrap();
        assert_eq!(emit(&doc), text);
    }

    #[test]
    fn plain_scalars_needing_quotes_get_them() {
        let s = Scalar::plain("a: b");
        assert_eq!(render_scalar_inline(&s), "\"a: b\"");
        let ok = Scalar::plain("https://x/y");
        assert_eq!(render_scalar_inline(&ok), "https://x/y");
    }

    #[test]
    fn flow_collections_stay_inline() {
        let text = "languages: [ru, uk, en]\n";
        let doc = parse(text).unwrap();
        assert_eq!(emit(&doc), text);
    }
}
