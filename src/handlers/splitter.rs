//! Handler-source splitting.
//!
//! Turns a monolithic handler source into an ordered `name → procedure`
//! map, plus two conventionally named regions (`Documentation`,
//! `ObjectModule`) and the preamble preceding the first procedure.
//! Procedures do not nest; an inner opener only bumps the depth counter so
//! the matching closer is found.

use indexmap::IndexMap;
use text_size::{TextRange, TextSize};
use tracing::{debug, warn};

use super::lexer::{Keyword, Spanned, Tok, keyword_of, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Procedure,
    Function,
}

/// One extracted procedure, with enough source fidelity to re-emit or
/// splice it verbatim.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub kind: ProcKind,
    /// `&`-annotation lines immediately above the keyword.
    pub annotations: Vec<String>,
    pub params: String,
    /// Everything between the parameter list and the closing keyword.
    pub body: String,
    /// Full text, annotations included.
    pub text: String,
    /// Byte range of `text` within the scanned source.
    pub range: TextRange,
}

impl Procedure {
    /// Whitespace- and comment-insensitive body fingerprint, used by the
    /// handler differ to suppress formatting-only changes.
    pub fn normalized_body(&self) -> String {
        normalize_snippet(&self.body)
    }
}

/// Comment-stripped, whitespace-collapsed form of a code snippet.
pub fn normalize_snippet(code: &str) -> String {
    let toks = tokenize(code);
    let mut parts = Vec::new();
    for t in &toks {
        match t.tok {
            Tok::Comment | Tok::Newline => {}
            _ => parts.push(t.text(code)),
        }
    }
    parts.join(" ")
}

/// Result of splitting one handler source.
#[derive(Debug, Clone, Default)]
pub struct SplitHandlers {
    /// Content before the first procedure, trailing noise trimmed.
    pub preamble: String,
    pub procedures: IndexMap<String, Procedure>,
    pub documentation: Option<String>,
    pub object_module: Option<String>,
    pub warnings: Vec<String>,
}

impl SplitHandlers {
    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }
}

const DOCUMENTATION_REGION: &[&str] = &["documentation", "документация", "документація"];
const OBJECT_MODULE_REGION: &[&str] = &["objectmodule", "модульобъекта", "модульоб'єкта"];

/// Split a handler source into preamble, procedures, and named regions.
pub fn split_source(source: &str) -> SplitHandlers {
    let source = crate::config::strip_bom(source);

    let (documentation, source) = extract_region(source, DOCUMENTATION_REGION);
    let (object_module, source) = extract_region(&source, OBJECT_MODULE_REGION);

    let mut result = SplitHandlers {
        documentation,
        object_module,
        ..SplitHandlers::default()
    };

    let procedures = scan_procedures(&source);
    let first_start = procedures.first().map(|p| p.range.start());

    for proc in procedures {
        if result.procedures.contains_key(&proc.name) {
            warn!(name = %proc.name, "duplicate procedure, last definition wins");
            result
                .warnings
                .push(format!("duplicate procedure {:?}; last definition wins", proc.name));
        }
        result.procedures.insert(proc.name.clone(), proc);
    }

    let preamble_end = first_start.map(usize::from).unwrap_or(source.len());
    result.preamble = trim_preamble(&source[..preamble_end]);
    debug!(
        procedures = result.procedures.len(),
        has_documentation = result.documentation.is_some(),
        has_object_module = result.object_module.is_some(),
        "split handler source"
    );
    result
}

/// Scan the token stream for top-level procedures, in source order.
pub fn scan_procedures(source: &str) -> Vec<Procedure> {
    let toks = tokenize(source);
    let mut procedures = Vec::new();
    let mut i = 0usize;

    // Start offset of the annotation block adjacent to the next opener.
    let mut pending_annotation: Option<TextSize> = None;
    let mut newlines_since_annotation = 0usize;

    while i < toks.len() {
        let t = toks[i];
        match t.tok {
            Tok::Annotation => {
                if pending_annotation.is_none() {
                    pending_annotation = Some(t.range.start());
                }
                newlines_since_annotation = 0;
                i += 1;
            }
            Tok::Newline => {
                if pending_annotation.is_some() {
                    newlines_since_annotation += 1;
                    if newlines_since_annotation > 1 {
                        pending_annotation = None;
                    }
                }
                i += 1;
            }
            Tok::Ident => {
                let kw = keyword_of(t.text(source));
                let opener = match kw {
                    Some(k) if k.opens() => Some((k, i)),
                    // `Async Procedure ...`: skip the modifier
                    Some(Keyword::Async) => match toks.get(i + 1) {
                        Some(next)
                            if next.tok == Tok::Ident
                                && keyword_of(next.text(source)).is_some_and(|k| k.opens()) =>
                        {
                            Some((keyword_of(next.text(source)).unwrap(), i + 1))
                        }
                        _ => None,
                    },
                    _ => None,
                };
                if let Some((kind_kw, kw_idx)) = opener {
                    let start = pending_annotation.unwrap_or(t.range.start());
                    pending_annotation = None;
                    if let Some((proc, next_i)) =
                        scan_one_procedure(source, &toks, kw_idx, kind_kw, start)
                    {
                        procedures.push(proc);
                        i = next_i;
                        continue;
                    }
                }
                pending_annotation = None;
                i += 1;
            }
            _ => {
                pending_annotation = None;
                i += 1;
            }
        }
    }
    procedures
}

fn scan_one_procedure(
    source: &str,
    toks: &[Spanned],
    kw_idx: usize,
    kind_kw: Keyword,
    start: TextSize,
) -> Option<(Procedure, usize)> {
    let kind = match kind_kw {
        Keyword::Procedure => ProcKind::Procedure,
        Keyword::Function => ProcKind::Function,
        _ => return None,
    };

    // Identifier, then the parameter list in parentheses.
    let name_tok = toks.get(kw_idx + 1)?;
    if name_tok.tok != Tok::Ident {
        return None;
    }
    let name = name_tok.text(source).to_string();

    let lparen_idx = kw_idx + 2;
    if toks.get(lparen_idx)?.tok != Tok::LParen {
        return None;
    }
    let mut paren_depth = 1usize;
    let mut j = lparen_idx + 1;
    while j < toks.len() && paren_depth > 0 {
        match toks[j].tok {
            Tok::LParen => paren_depth += 1,
            Tok::RParen => paren_depth -= 1,
            _ => {}
        }
        j += 1;
    }
    if paren_depth != 0 {
        return None;
    }
    let rparen = toks[j - 1];
    let params_range = TextRange::new(toks[lparen_idx].range.end(), rparen.range.start());
    let params = source[usize::from(params_range.start())..usize::from(params_range.end())]
        .trim()
        .to_string();

    // Body runs to the matching closer; nested openers bump the depth.
    let mut depth = 1usize;
    let mut end_tok: Option<Spanned> = None;
    while j < toks.len() {
        let t = toks[j];
        if t.tok == Tok::Ident {
            match keyword_of(t.text(source)) {
                Some(k) if k.opens() => depth += 1,
                Some(k) if k.closes() => {
                    depth -= 1;
                    if depth == 0 {
                        end_tok = Some(t);
                        j += 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        j += 1;
    }
    let end_tok = end_tok?;

    let range = TextRange::new(start, end_tok.range.end());
    let text = source[usize::from(start)..usize::from(end_tok.range.end())].to_string();
    let body = source[usize::from(rparen.range.end())..usize::from(end_tok.range.start())]
        .trim_matches('\n')
        .to_string();
    let annotations = text
        .lines()
        .take_while(|line| line.trim_start().starts_with('&'))
        .map(|line| line.trim().to_string())
        .collect();

    Some((
        Procedure {
            name,
            kind,
            annotations,
            params,
            body,
            text,
            range,
        },
        j,
    ))
}

/// Extract a `#Region <name> ... #EndRegion` block by conventional name,
/// returning its body and the source with the block removed. Region markers
/// are line-anchored; both English and Russian spellings are accepted.
fn extract_region(source: &str, names: &[&str]) -> (Option<String>, String) {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut start_line = None;
    for (i, line) in lines.iter().enumerate() {
        if let Some(region_name) = region_start(line) {
            if names.contains(&region_name.to_lowercase().as_str()) {
                start_line = Some(i);
                break;
            }
        }
    }
    let Some(start) = start_line else {
        return (None, source.to_string());
    };

    let mut depth = 1usize;
    let mut end = None;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if region_start(line).is_some() {
            depth += 1;
        } else if is_region_end(line) {
            depth -= 1;
            if depth == 0 {
                end = Some(i);
                break;
            }
        }
    }
    let Some(end) = end else {
        return (None, source.to_string());
    };

    let body: String = lines[start + 1..end].concat();
    let remaining: String = lines[..start]
        .iter()
        .chain(lines[end + 1..].iter())
        .copied()
        .collect();
    (Some(body.trim().to_string()), remaining)
}

fn region_start(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let lowered = trimmed.to_lowercase();
    for marker in ["#region", "#область"] {
        if lowered.starts_with(marker) {
            let rest = trimmed[marker.len()..].trim();
            let name = rest.split_whitespace().next().unwrap_or("");
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

fn is_region_end(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    lowered.starts_with("#endregion") || lowered.starts_with("#конецобласти")
}

/// Drop trailing blank, comment, and separator lines from the preamble.
fn trim_preamble(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while let Some(last) = lines.last() {
        let t = last.trim();
        if t.is_empty() || t.starts_with("//") || t.contains("======") {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
// Module header comment
// ======================

&AtClient
Procedure FormOnOpen(Cancel)
\tMessage(\"hello\");
EndProcedure

Function Helper(Value) Export
\tReturn Value + 1;
EndFunction
";

    #[test]
    fn splits_procedures_in_order() {
        let split = split_source(SAMPLE);
        let names: Vec<&str> = split.procedures.keys().map(String::as_str).collect();
        assert_eq!(names, ["FormOnOpen", "Helper"]);
        assert_eq!(split.procedures["Helper"].kind, ProcKind::Function);
    }

    #[test]
    fn annotations_attach_to_following_procedure() {
        let split = split_source(SAMPLE);
        let proc = &split.procedures["FormOnOpen"];
        assert_eq!(proc.annotations, ["&AtClient"]);
        assert!(proc.text.starts_with("&AtClient\nProcedure FormOnOpen"));
    }

    #[test]
    fn preamble_drops_trailing_comment_noise() {
        let split = split_source(SAMPLE);
        assert_eq!(split.preamble, "");
    }

    #[test]
    fn significant_preamble_is_kept() {
        let source = "Var Cache;\n\nProcedure P()\nEndProcedure\n";
        let split = split_source(source);
        assert_eq!(split.preamble, "Var Cache;");
    }

    #[test]
    fn keywords_in_strings_do_not_terminate() {
        let source = "Procedure P()\n\tX = \"EndProcedure\";\nEndProcedure\n";
        let split = split_source(source);
        assert_eq!(split.procedures.len(), 1);
        assert!(split.procedures["P"].body.contains("X = \"EndProcedure\";"));
    }

    #[test]
    fn nested_opener_in_dead_code_balances() {
        // Depth discipline: an inner opener is matched by the first closer.
        let source = "\
Procedure Outer()
\t// real nesting is illegal, but the scanner must not desync
\tA = 1;
EndProcedure

Procedure After()
EndProcedure
";
        let split = split_source(source);
        assert_eq!(split.procedures.len(), 2);
        assert!(split.procedures.contains_key("After"));
    }

    #[test]
    fn documentation_region_is_extracted() {
        let source = "\
#Region Documentation
This module does things.
#EndRegion

Procedure P()
EndProcedure
";
        let split = split_source(source);
        assert_eq!(
            split.documentation.as_deref(),
            Some("This module does things.")
        );
        assert_eq!(split.procedures.len(), 1);
    }

    #[test]
    fn russian_object_module_region_is_extracted() {
        let source = "\
#Область МодульОбъекта
Функция Расчет() Экспорт
\tВозврат 1;
КонецФункции
#КонецОбласти
";
        let split = split_source(source);
        let module = split.object_module.unwrap();
        assert!(module.contains("Расчет"));
        // the region body is not re-scanned for top-level procedures
        assert!(split.procedures.is_empty());
    }

    #[test]
    fn duplicate_names_warn_and_last_wins() {
        let source = "\
Procedure P()
\tA = 1;
EndProcedure

Procedure P()
\tA = 2;
EndProcedure
";
        let split = split_source(source);
        assert_eq!(split.procedures.len(), 1);
        assert!(split.procedures["P"].body.contains("A = 2"));
        assert_eq!(split.warnings.len(), 1);
    }

    #[test]
    fn normalized_body_ignores_formatting() {
        let a = split_source("Procedure P()\n\tX=1;\nEndProcedure");
        let b = split_source("Procedure P()\n    X   =   1; // note\nEndProcedure");
        assert_eq!(
            a.procedures["P"].normalized_body(),
            b.procedures["P"].normalized_body()
        );
    }
}
