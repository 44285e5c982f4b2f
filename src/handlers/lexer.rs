//! Token stream over handler source.
//!
//! The splitter never inspects raw characters: comments and string literals
//! become single tokens here, so a `Procedure` keyword inside either can
//! never confuse depth tracking. Keywords are classified after lexing with a
//! case-insensitive compare, since the host language is bilingual.

use logos::Logos;
use text_size::{TextRange, TextSize};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
pub enum Tok {
    #[regex(r"//[^\n]*")]
    Comment,

    /// String literal; `""` is the embedded-quote escape.
    #[regex(r#""([^"\n]|"")*""#)]
    Str,

    /// Compiler directive line marker (`&AtClient`, `&НаСервере`, ...).
    #[regex(r"&[_\p{L}][_\p{L}\p{N}]*")]
    Annotation,

    /// Preprocessor word (`#Region`, `#EndRegion`, `#Область`, ...).
    #[regex(r"#[_\p{L}][_\p{L}\p{N}]*")]
    HashWord,

    #[regex(r"[_\p{L}][_\p{L}\p{N}]*", priority = 3)]
    Ident,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("\n")]
    Newline,

    #[regex(r"[^ \t\r\n]", priority = 1)]
    Other,
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned {
    pub tok: Tok,
    pub range: TextRange,
}

impl Spanned {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[usize::from(self.range.start())..usize::from(self.range.end())]
    }
}

/// Tokenize the whole source. Characters the lexer cannot classify are
/// dropped; they can only occur in malformed input and never affect
/// procedure boundaries.
pub fn tokenize(source: &str) -> Vec<Spanned> {
    let mut out = Vec::new();
    let mut lexer = Tok::lexer(source);
    while let Some(item) = lexer.next() {
        let span = lexer.span();
        let range = TextRange::new(
            TextSize::from(span.start as u32),
            TextSize::from(span.end as u32),
        );
        if let Ok(tok) = item {
            out.push(Spanned { tok, range });
        }
    }
    out
}

/// Keyword classes relevant to the procedure grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Procedure,
    Function,
    EndProcedure,
    EndFunction,
    Async,
}

/// Classify an identifier as a grammar keyword, bilingually and
/// case-insensitively.
pub fn keyword_of(text: &str) -> Option<Keyword> {
    let lowered = text.to_lowercase();
    match lowered.as_str() {
        "procedure" | "процедура" => Some(Keyword::Procedure),
        "function" | "функция" => Some(Keyword::Function),
        "endprocedure" | "конецпроцедуры" => Some(Keyword::EndProcedure),
        "endfunction" | "конецфункции" => Some(Keyword::EndFunction),
        "async" | "асинх" => Some(Keyword::Async),
        _ => None,
    }
}

impl Keyword {
    pub fn opens(&self) -> bool {
        matches!(self, Keyword::Procedure | Keyword::Function)
    }

    pub fn closes(&self) -> bool {
        matches!(self, Keyword::EndProcedure | Keyword::EndFunction)
    }
}

/// Whether a snippet already carries its own procedure signature (an
/// annotation or an opening keyword); such bodies are emitted verbatim.
pub fn has_signature(code: &str) -> bool {
    let trimmed = code.trim_start();
    if trimmed.starts_with('&') {
        return true;
    }
    let first_word: String = trimmed
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    matches!(
        keyword_of(&first_word),
        Some(Keyword::Procedure | Keyword::Function | Keyword::Async)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_swallow_keywords() {
        let source = "Message(\"EndProcedure inside\")";
        let toks = tokenize(source);
        assert!(toks.iter().any(|t| t.tok == Tok::Str));
        let kw_count = toks
            .iter()
            .filter(|t| t.tok == Tok::Ident && keyword_of(t.text(source)).is_some())
            .count();
        assert_eq!(kw_count, 0);
    }

    #[test]
    fn comments_swallow_keywords() {
        let source = "// Procedure Fake()\nX = 1";
        let toks = tokenize(source);
        assert_eq!(toks[0].tok, Tok::Comment);
        assert!(
            toks.iter()
                .all(|t| t.tok != Tok::Ident || keyword_of(t.text(source)).is_none())
        );
    }

    #[test]
    fn cyrillic_keywords_classify() {
        assert_eq!(keyword_of("Процедура"), Some(Keyword::Procedure));
        assert_eq!(keyword_of("конецфункции"), Some(Keyword::EndFunction));
        assert_eq!(keyword_of("EndProcedure"), Some(Keyword::EndProcedure));
        assert_eq!(keyword_of("Identifier"), None);
    }

    #[test]
    fn annotations_and_directives_lex_as_units() {
        let source = "&AtServer\n#Region Helpers\n";
        let toks = tokenize(source);
        assert_eq!(toks[0].tok, Tok::Annotation);
        assert_eq!(toks[0].text(source), "&AtServer");
        assert_eq!(toks[2].tok, Tok::HashWord);
        assert_eq!(toks[2].text(source), "#Region");
    }

    #[test]
    fn signature_detection() {
        assert!(has_signature("&AtClient\nProcedure X()\nEndProcedure"));
        assert!(has_signature("Процедура X()\nКонецПроцедуры"));
        assert!(has_signature("Async Function F()\nEndFunction"));
        assert!(!has_signature("Value = 1;"));
    }
}
