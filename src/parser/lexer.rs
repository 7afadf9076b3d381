//! Lexer for the Python teaching subset
//!
//! logos produces the raw tokens; [`Lexer::tokenize`] then turns line
//! structure into `Newline`, `Indent` and `Dedent` tokens.

use crate::diagnostics::{error_codes::syntax, Diagnostic, Span};
use crate::parser::span::SourceFile;
use logos::Logos;

/// Token types
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\f]+|#[^\n]*|\\\r?\n)")]
pub enum TokenKind {
    // Keywords
    #[token("and")]
    And,
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("break")]
    Break,
    #[token("class")]
    Class,
    #[token("continue")]
    Continue,
    #[token("def")]
    Def,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("False")]
    False,
    #[token("for")]
    For,
    #[token("from")]
    From,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("in")]
    In,
    #[token("is")]
    Is,
    #[token("lambda")]
    Lambda,
    #[token("None")]
    NoneLit,
    #[token("not")]
    Not,
    #[token("or")]
    Or,
    #[token("pass")]
    Pass,
    #[token("return")]
    Return,
    #[token("True")]
    True,
    #[token("while")]
    While,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLit(i64),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLit(f64),

    #[regex(r#"[fFrRuU]?[fFrR]?"([^"\\\n]|\\.)*""#, quoted)]
    #[regex(r#"[fFrRuU]?[fFrR]?'([^'\\\n]|\\.)*'"#, quoted)]
    #[regex(r#"[fFrRuU]?[fFrR]?""""#, triple_quoted)]
    #[regex(r#"[fFrRuU]?[fFrR]?'''"#, triple_quoted)]
    StrLit(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,

    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("//=")]
    SlashSlashEq,
    #[token("%=")]
    PercentEq,
    #[token("**=")]
    StarStarEq,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,

    #[token("\n")]
    Newline,

    // Layout, synthesized by `tokenize`
    Indent,
    Dedent,

    // End of file
    Eof,
}

fn string_prefix(slice: &str) -> (usize, bool) {
    let prefix_len = slice.find(['"', '\'']).unwrap_or(0);
    let raw = slice[..prefix_len].chars().any(|c| c == 'r' || c == 'R');
    (prefix_len, raw)
}

fn quoted(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let (prefix_len, raw) = string_prefix(slice);
    let body = &slice[prefix_len + 1..slice.len() - 1];
    if raw {
        body.to_string()
    } else {
        unescape(body)
    }
}

fn triple_quoted(lex: &mut logos::Lexer<TokenKind>) -> Option<String> {
    let slice = lex.slice();
    let (_, raw) = string_prefix(slice);
    let delimiter = &slice[slice.len() - 3..];
    let rest = lex.remainder();
    let end = rest.find(delimiter)?;
    let body = &rest[..end];
    let value = if raw { body.to_string() } else { unescape(body) };
    lex.bump(end + 3);
    Some(value)
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// A token with its span
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Lexer over one source file
pub struct Lexer<'a> {
    source: &'a SourceFile,
    logos_lexer: logos::Lexer<'a, TokenKind>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source file
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            logos_lexer: TokenKind::lexer(source.content()),
        }
    }

    /// Produce the full token stream, ending with `Eof`.
    ///
    /// Newlines inside brackets and on blank lines are dropped. The column
    /// of the first token on each logical line drives `Indent`/`Dedent`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        let mut indents = vec![0usize];
        let mut depth = 0usize;
        let mut at_line_start = true;

        while let Some(result) = self.logos_lexer.next() {
            let range = self.logos_lexer.span();
            let span = self.source.span(range.start, range.end);
            let kind = match result {
                Ok(kind) => kind,
                Err(()) => return Err(self.lex_error(span)),
            };

            if kind == TokenKind::Newline {
                if depth == 0 && !at_line_start {
                    tokens.push(Token::new(TokenKind::Newline, span));
                    at_line_start = true;
                }
                continue;
            }

            if at_line_start && depth == 0 {
                let column = span.start_col - 1;
                let current = indents.last().copied().unwrap_or(0);
                if column > current {
                    indents.push(column);
                    tokens.push(Token::new(TokenKind::Indent, span.clone()));
                } else {
                    while column < indents.last().copied().unwrap_or(0) {
                        indents.pop();
                        tokens.push(Token::new(TokenKind::Dedent, span.clone()));
                    }
                    if column != indents.last().copied().unwrap_or(0) {
                        return Err(Diagnostic::error(syntax::INCONSISTENT_INDENT)
                            .message("Unindent does not match any outer indentation level")
                            .span(span)
                            .build());
                    }
                }
                at_line_start = false;
            }

            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            tokens.push(Token::new(kind, span));
        }

        let end = self.source.content().len();
        let eof_span = self.source.span(end, end);
        if !at_line_start {
            tokens.push(Token::new(TokenKind::Newline, eof_span.clone()));
        }
        while indents.len() > 1 {
            indents.pop();
            tokens.push(Token::new(TokenKind::Dedent, eof_span.clone()));
        }
        tokens.push(Token::new(TokenKind::Eof, eof_span));
        Ok(tokens)
    }

    fn lex_error(&self, span: Span) -> Diagnostic {
        let slice = self.logos_lexer.slice();
        let stripped = slice.trim_start_matches(['f', 'F', 'r', 'R', 'u', 'U']);
        if stripped.starts_with(['"', '\'']) {
            Diagnostic::error(syntax::UNTERMINATED_STRING)
                .message("Unterminated string literal")
                .span(span)
                .build()
        } else if slice.starts_with(|c: char| c.is_ascii_digit()) {
            Diagnostic::error(syntax::INVALID_NUMBER)
                .message(format!("Invalid numeric literal: {}", slice))
                .span(span)
                .build()
        } else {
            Diagnostic::error(syntax::UNEXPECTED_TOKEN)
                .message(format!("Unexpected character: {:?}", slice))
                .span(span)
                .build()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn lex(source: &str) -> Vec<TokenKind> {
        let source_file = SourceFile::new(PathBuf::from("test.py"), source.to_string());
        Lexer::new(&source_file)
            .tokenize()
            .map(|tokens| tokens.into_iter().map(|t| t.kind).collect())
            .unwrap_or_default()
    }

    fn lex_err(source: &str) -> Diagnostic {
        let source_file = SourceFile::new(PathBuf::from("test.py"), source.to_string());
        Lexer::new(&source_file).tokenize().unwrap_err()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(lex("def return lambda None"), vec![
            TokenKind::Def,
            TokenKind::Return,
            TokenKind::Lambda,
            TokenKind::NoneLit,
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_literals() {
        assert_eq!(lex("42 1.5 .5 2e3 True 'a\\n' \"b\" r'\\n'"), vec![
            TokenKind::IntLit(42),
            TokenKind::FloatLit(1.5),
            TokenKind::FloatLit(0.5),
            TokenKind::FloatLit(2000.0),
            TokenKind::True,
            TokenKind::StrLit("a\n".to_string()),
            TokenKind::StrLit("b".to_string()),
            TokenKind::StrLit("\\n".to_string()),
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_triple_quoted_string() {
        assert_eq!(lex("x = \"\"\"one\ntwo\"\"\"\n"), vec![
            TokenKind::Ident("x".to_string()),
            TokenKind::Eq,
            TokenKind::StrLit("one\ntwo".to_string()),
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(lex("a ** b // c += d -> e"), vec![
            TokenKind::Ident("a".to_string()),
            TokenKind::StarStar,
            TokenKind::Ident("b".to_string()),
            TokenKind::SlashSlash,
            TokenKind::Ident("c".to_string()),
            TokenKind::PlusEq,
            TokenKind::Ident("d".to_string()),
            TokenKind::Arrow,
            TokenKind::Ident("e".to_string()),
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_indentation() {
        let source = "def f():\n    # comment\n\n    return 1\nx = 2\n";
        assert_eq!(lex(source), vec![
            TokenKind::Def,
            TokenKind::Ident("f".to_string()),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Return,
            TokenKind::IntLit(1),
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Ident("x".to_string()),
            TokenKind::Eq,
            TokenKind::IntLit(2),
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_brackets_join_lines() {
        assert_eq!(lex("f(1,\n  2)"), vec![
            TokenKind::Ident("f".to_string()),
            TokenKind::LParen,
            TokenKind::IntLit(1),
            TokenKind::Comma,
            TokenKind::IntLit(2),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_dedent_at_eof() {
        let kinds = lex("if x:\n    if y:\n        pass");
        assert_eq!(&kinds[kinds.len() - 4..], &[
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Dedent,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(lex_err("if x:\n    a\n  b\n").code, syntax::INCONSISTENT_INDENT);
        assert_eq!(lex_err("x = 'open").code, syntax::UNTERMINATED_STRING);
        assert_eq!(lex_err("x = $").code, syntax::UNEXPECTED_TOKEN);
        assert_eq!(lex_err("99999999999999999999").code, syntax::INVALID_NUMBER);
    }
}
