//! Tokenizer for the Structured Text subset
//!
//! Single pass over the UTF-8 source producing spanned tokens. Keywords
//! are not distinguished from identifiers here; the parser matches them
//! case-insensitively, so `end_if` and `END_IF` tokenize identically.
//! Comments are discarded from the token stream but collected with their
//! spans so the parser can attach trailing comments to declarations.
//!
//! Lexical errors (unterminated strings or block comments, stray
//! characters) are reported as `PARSE` diagnostics and skipped; the
//! lexer always produces a usable token stream.

use crate::ast::Span;
use crate::diagnostics::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (parser folds case)
    Ident,
    IntLit,
    RealLit,
    StringLit,
    /// `T#...` / `TIME#...` literal, raw text preserved
    TimeLit,
    /// `:=`
    Assign,
    Semicolon,
    Colon,
    Comma,
    Dot,
    /// `..` in CASE ranges
    DotDot,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Equal,
    /// `<>`
    NotEqual,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Case-insensitive keyword test; only meaningful for `Ident` tokens
    pub fn is_kw(&self, kw: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(kw)
    }
}

/// A comment stripped from the stream, with its span
#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn tokenize(source: &str) -> LexOutput {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    out: LexOutput,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            out: LexOutput::default(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).map(|&(_, c)| c)
    }

    /// Byte offset of the current character (source length at EOF)
    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let end = self.offset();
        self.out.tokens.push(Token {
            kind,
            text: self.source[start..end].to_string(),
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, message: String, span: Span) {
        self.out
            .diagnostics
            .push(Diagnostic::at_span(DiagnosticKind::Parse, message, span, self.source));
    }

    fn run(mut self) -> LexOutput {
        while let Some(c) = self.peek() {
            let start = self.offset();
            match c {
                _ if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek2() == Some('/') => self.line_comment(start),
                '(' if self.peek2() == Some('*') => self.block_comment(start),
                _ if c.is_ascii_alphabetic() || c == '_' => self.ident_or_time(start),
                _ if c.is_ascii_digit() => self.number(start),
                '\'' => self.string_literal(start),
                _ => self.punct(start, c),
            }
        }
        self.out
    }

    fn line_comment(&mut self, start: usize) {
        self.bump();
        self.bump();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let end = self.offset();
        self.out.comments.push(Comment {
            text: self.source[start + 2..end].trim().to_string(),
            span: Span::new(start, end),
        });
    }

    fn block_comment(&mut self, start: usize) {
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                Some('*') if self.peek2() == Some(')') => {
                    self.bump();
                    self.bump();
                    let end = self.offset();
                    let inner = &self.source[start + 2..end - 2];
                    self.out.comments.push(Comment {
                        text: inner.trim().to_string(),
                        span: Span::new(start, end),
                    });
                    return;
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    let span = Span::new(start, self.source.len());
                    self.error("unterminated block comment, expected '*)'".to_string(), span);
                    return;
                }
            }
        }
    }

    fn ident_or_time(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.offset()];

        // TIME literal: `T#...` / `TIME#...`
        if self.peek() == Some('#')
            && (word.eq_ignore_ascii_case("T") || word.eq_ignore_ascii_case("TIME"))
        {
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() {
                    self.bump();
                } else {
                    break;
                }
            }
            self.push(TokenKind::TimeLit, start);
            return;
        }

        self.push(TokenKind::Ident, start);
    }

    fn number(&mut self, start: usize) {
        let mut kind = TokenKind::IntLit;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        // Fraction, but `1..5` is an integer followed by a range operator
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            kind = TokenKind::RealLit;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        // Exponent
        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            let mut lookahead = self.pos + 1;
            if self.chars.get(lookahead).is_some_and(|&(_, c)| c == '+' || c == '-') {
                lookahead += 1;
            }
            if self.chars.get(lookahead).is_some_and(|&(_, c)| c.is_ascii_digit()) {
                kind = TokenKind::RealLit;
                while self.pos < lookahead {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        self.push(kind, start);
    }

    fn string_literal(&mut self, start: usize) {
        self.bump();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.bump();
                    self.push(TokenKind::StringLit, start);
                    return;
                }
                Some('\n') | None => {
                    let span = Span::new(start, self.offset());
                    self.error("unterminated string literal, expected closing '".to_string(), span);
                    // Emit what we have so the parser can keep going
                    self.push(TokenKind::StringLit, start);
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn punct(&mut self, start: usize, c: char) {
        self.bump();
        let kind = match c {
            ':' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Assign
            }
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' if self.peek() == Some('.') => {
                self.bump();
                TokenKind::DotDot
            }
            '.' => TokenKind::Dot,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::LessEq
            }
            '<' if self.peek() == Some('>') => {
                self.bump();
                TokenKind::NotEqual
            }
            '<' => TokenKind::Less,
            '>' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::GreaterEq
            }
            '>' => TokenKind::Greater,
            '=' => TokenKind::Equal,
            other => {
                let span = Span::new(start, self.offset());
                self.error(format!("unexpected character '{}'", other), span);
                return;
            }
        };
        self.push(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_assignment() {
        let out = tokenize("Motor := A AND NOT B;");
        let texts: Vec<&str> = out.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Motor", ":=", "A", "AND", "NOT", "B", ";"]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_token_spans_are_byte_ranges() {
        let out = tokenize("A := 10;");
        assert_eq!(out.tokens[0].span, Span::new(0, 1));
        assert_eq!(out.tokens[1].span, Span::new(2, 4));
        assert_eq!(out.tokens[2].span, Span::new(5, 7));
        assert_eq!(out.tokens[3].span, Span::new(7, 8));
    }

    #[test]
    fn test_time_literals() {
        let out = tokenize("Delay(IN := X, PT := T#500ms); Y := TIME#1h30m;");
        let times: Vec<&str> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::TimeLit)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(times, vec!["T#500ms", "TIME#1h30m"]);
    }

    #[test]
    fn test_ident_named_t_is_not_a_time_literal() {
        let out = tokenize("T := 1;");
        assert_eq!(out.tokens[0].kind, TokenKind::Ident);
    }

    #[test]
    fn test_numbers_and_ranges() {
        assert_eq!(
            kinds("1 2.5 1..5 3.0e2"),
            vec![
                TokenKind::IntLit,
                TokenKind::RealLit,
                TokenKind::IntLit,
                TokenKind::DotDot,
                TokenKind::IntLit,
                TokenKind::RealLit,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("< <= > >= = <>"),
            vec![
                TokenKind::Less,
                TokenKind::LessEq,
                TokenKind::Greater,
                TokenKind::GreaterEq,
                TokenKind::Equal,
                TokenKind::NotEqual,
            ]
        );
    }

    #[test]
    fn test_comments_are_stripped_and_collected() {
        let out = tokenize("A := 1; // set A\n(* block\ncomment *) B := 2;");
        let texts: Vec<&str> = out.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["A", ":=", "1", ";", "B", ":=", "2", ";"]);
        assert_eq!(out.comments.len(), 2);
        assert_eq!(out.comments[0].text, "set A");
        assert_eq!(out.comments[1].text, "block\ncomment");
    }

    #[test]
    fn test_unterminated_block_comment_is_diagnosed() {
        let out = tokenize("A := 1; (* never closed");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.contains("unterminated block comment"));
    }

    #[test]
    fn test_unterminated_string_is_diagnosed() {
        let out = tokenize("S := 'oops;\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.contains("unterminated string"));
        // Token still emitted for recovery
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::StringLit));
    }

    #[test]
    fn test_stray_character_is_skipped() {
        let out = tokenize("A := 1 @ 2;");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.contains("unexpected character '@'"));
        // Remaining tokens survive
        assert!(out.tokens.iter().any(|t| t.text == "2"));
    }

    #[test]
    fn test_keywords_case_insensitive_via_is_kw() {
        let out = tokenize("end_if END_IF End_If");
        assert!(out.tokens.iter().all(|t| t.is_kw("END_IF")));
    }
}
