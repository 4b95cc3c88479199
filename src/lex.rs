use std::fmt::Display;

use log::{debug, trace};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    diagnostics::{self, DiagnosticKind},
    span::{Position, Span},
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum LexicalError {
    #[error("Unexpected character '{character}'")]
    #[diagnostic(
        code(lexical::unexpected_character),
        help("remove or correct the character: `{character}`")
    )]
    UnexpectedCharacter {
        character: char,
        position: Position,
        #[label("this character")]
        span: SourceSpan,
    },

    #[error("unterminated double quote string")]
    #[diagnostic(
        code(lexical::unterminated_string),
        help("string literals end on the line they start; add the missing `\"`")
    )]
    UnterminatedString {
        position: Position,
        #[label("missing trailing `\"` to terminate the string literal")]
        span: SourceSpan,
    },

    #[error("numeric literal `{literal}` is too large")]
    #[diagnostic(
        code(lexical::number_out_of_range),
        help("numbers are double precision and must stay below 1.8e308")
    )]
    NumberOutOfRange {
        literal: String,
        position: Position,
        #[label("this numeric literal")]
        span: SourceSpan,
    },
}

impl LexicalError {
    pub fn position(&self) -> Position {
        match self {
            LexicalError::UnexpectedCharacter { position, .. }
            | LexicalError::UnterminatedString { position, .. }
            | LexicalError::NumberOutOfRange { position, .. } => *position,
        }
    }

    pub fn line(&self) -> usize {
        self.position().line
    }
}

impl From<LexicalError> for diagnostics::Diagnostic {
    fn from(error: LexicalError) -> Self {
        Self::from_error(DiagnosticKind::Lexical, error.position(), &error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Colon,
    Semicolon,
    Minus,
    Plus,
    Star,
    Slash,
    Equal,
    String,
    Ident,
    Number(f64),
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    Class,
    Interface,
    True,
    False,
    Eof,
}

impl TokenKind {
    /// Keywords that open a statement. Recovery stops in front of them.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Class
                | TokenKind::Interface
        )
    }

    fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "class" => TokenKind::Class,
            "interface" => TokenKind::Interface,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        })
    }
}

impl Token<'_> {
    /// Human readable form used in syntax error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Ident => format!("identifier `{}`", self.literal),
            TokenKind::Number(_) => format!("number `{}`", self.literal),
            TokenKind::String => format!("string \"{}\"", self.literal),
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("`{}`", self.literal),
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::LeftBrace => write!(f, "LEFT_BRACE {lit} null"),
            TokenKind::RightBrace => write!(f, "RIGHT_BRACE {lit} null"),
            TokenKind::Colon => write!(f, "COLON {lit} null"),
            TokenKind::Semicolon => write!(f, "SEMICOLON {lit} null"),
            TokenKind::Minus => write!(f, "MINUS {lit} null"),
            TokenKind::Plus => write!(f, "PLUS {lit} null"),
            TokenKind::Star => write!(f, "STAR {lit} null"),
            TokenKind::Slash => write!(f, "SLASH {lit} null"),
            TokenKind::Equal => write!(f, "EQUAL {lit} null"),
            TokenKind::String => write!(f, "STRING \"{lit}\" {lit}"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Number(n) => {
                if n == n.trunc() {
                    write!(f, "NUMBER {lit} {n}.0")
                } else {
                    write!(f, "NUMBER {lit} {n}")
                }
            }
            TokenKind::Let => write!(f, "LET {lit} null"),
            TokenKind::Const => write!(f, "CONST {lit} null"),
            TokenKind::Function => write!(f, "FUNCTION {lit} null"),
            TokenKind::Return => write!(f, "RETURN {lit} null"),
            TokenKind::If => write!(f, "IF {lit} null"),
            TokenKind::Else => write!(f, "ELSE {lit} null"),
            TokenKind::While => write!(f, "WHILE {lit} null"),
            TokenKind::Class => write!(f, "CLASS {lit} null"),
            TokenKind::Interface => write!(f, "INTERFACE {lit} null"),
            TokenKind::True => write!(f, "TRUE {lit} null"),
            TokenKind::False => write!(f, "FALSE {lit} null"),
            TokenKind::Eof => write!(f, "EOF {lit} null"),
        }
    }
}

/// Tokenizes the whole input, stopping at the first lexical error.
/// On success the last token is always [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexicalError> {
    Lexer::new(input).collect()
}

/// Single forward pass over the source. After an unexpected character
/// scanning resumes right behind it. An unterminated string drops the rest
/// of its line and scanning resumes on the next one.
pub struct Lexer<'de> {
    rest: &'de str,
    byte: usize,
    line: usize,
    column: usize,
    peeked: Option<Result<Token<'de>, LexicalError>>,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            rest: input,
            byte: 0,
            line: 1,
            column: 1,
            peeked: None,
            finished: false,
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'de>, LexicalError>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }
        self.peeked = self.next();
        self.peeked.as_ref()
    }

    /// The end-of-input token for the current position.
    pub fn eof(&self) -> Token<'de> {
        Token {
            kind: TokenKind::Eof,
            literal: "",
            span: Span::new(self.current_position(), 0),
        }
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.byte)
    }

    /// Moves `len` bytes forward within the current line.
    fn advance(&mut self, len: usize) {
        let (skipped, rest) = self.rest.split_at(len);
        self.column += skipped.chars().count();
        self.byte += len;
        self.rest = rest;
    }

    fn skip_line(&mut self) {
        let line_end = self.rest.find('\n').unwrap_or(self.rest.len());
        self.advance(line_end);
    }

    fn scan(&mut self) -> Option<Result<Token<'de>, LexicalError>> {
        loop {
            let start = self.byte;
            let at = self.current_position();
            let cur = self.rest;
            let mut chars = cur.chars();
            let Some(c) = chars.next() else {
                self.finished = true;
                return Some(Ok(self.eof()));
            };
            let literal = &cur[..c.len_utf8()];

            if c == '\n' {
                self.rest = chars.as_str();
                self.byte += 1;
                self.line += 1;
                self.column = 1;
                continue;
            }
            self.advance(c.len_utf8());

            enum Start {
                String,
                Slash,
                Ident,
                Number,
            }

            let process = |kind: TokenKind| {
                Some(Ok(Token {
                    kind,
                    literal,
                    span: Span::new(at, literal.len()),
                }))
            };

            let started = match c {
                '(' => return process(TokenKind::LeftParen),
                ')' => return process(TokenKind::RightParen),
                '{' => return process(TokenKind::LeftBrace),
                '}' => return process(TokenKind::RightBrace),
                ':' => return process(TokenKind::Colon),
                ';' => return process(TokenKind::Semicolon),
                '-' => return process(TokenKind::Minus),
                '+' => return process(TokenKind::Plus),
                '*' => return process(TokenKind::Star),
                '=' => return process(TokenKind::Equal),
                '/' => Start::Slash,
                'a'..='z' | 'A'..='Z' | '_' => Start::Ident,
                '0'..='9' => Start::Number,
                '"' => Start::String,
                ' ' | '\r' | '\t' => continue,
                c => {
                    return Some(Err(LexicalError::UnexpectedCharacter {
                        character: c,
                        position: at,
                        span: SourceSpan::from(start..self.byte),
                    }));
                }
            };

            match started {
                Start::String => {
                    let body = &cur[c.len_utf8()..];
                    let line_end = body.find('\n').unwrap_or(body.len());
                    let line = body[..line_end].trim_end_matches('\r');
                    if let Some(end) = line.find('"') {
                        let literal = &body[..end];
                        self.advance(end + 1);
                        return Some(Ok(Token {
                            kind: TokenKind::String,
                            literal,
                            span: Span::new(at, end + 2),
                        }));
                    } else {
                        let end = start + 1 + line.len();
                        self.skip_line();
                        return Some(Err(LexicalError::UnterminatedString {
                            position: at,
                            span: SourceSpan::from(start..end),
                        }));
                    }
                }
                Start::Slash => {
                    if self.rest.starts_with('/') {
                        self.skip_line();
                        continue; // Skip single-line comment
                    } else {
                        return process(TokenKind::Slash);
                    }
                }
                Start::Ident => {
                    let first_non_ident = cur
                        .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_'))
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_ident];
                    self.advance(literal.len() - c.len_utf8());

                    let kind = TokenKind::keyword(literal).unwrap_or(TokenKind::Ident);

                    return Some(Ok(Token {
                        kind,
                        literal,
                        span: Span::new(at, literal.len()),
                    }));
                }
                Start::Number => {
                    let digits = |s: &str| s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

                    let mut end = digits(cur);
                    if cur[end..].starts_with('.') {
                        end += 1;
                        end += digits(&cur[end..]);
                    }
                    let literal = &cur[..end];
                    self.advance(literal.len() - c.len_utf8());

                    let n = match literal.parse::<f64>() {
                        Ok(n) if n.is_finite() => n,
                        _ => {
                            return Some(Err(LexicalError::NumberOutOfRange {
                                literal: literal.to_string(),
                                position: at,
                                span: SourceSpan::from(start..self.byte),
                            }));
                        }
                    };

                    return Some(Ok(Token {
                        kind: TokenKind::Number(n),
                        literal,
                        span: Span::new(at, literal.len()),
                    }));
                }
            }
        }
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        if self.finished {
            return None;
        }
        let item = self.scan()?;
        match &item {
            Ok(token) => trace!("{} {token}", token.span.start),
            Err(e) => debug!("lexical error at {}: {e}", e.position()),
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("input should lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn trailing_dot_belongs_to_the_number() {
        assert_eq!(kinds("1."), vec![TokenKind::Number(1.0), TokenKind::Eof]);
    }

    #[test]
    fn comment_at_end_of_input_has_no_newline() {
        assert_eq!(kinds("1 // done"), vec![TokenKind::Number(1.0), TokenKind::Eof]);
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let tokens = tokenize("\"é\" x").expect("input should lex");
        assert_eq!(tokens[1].span.start, Position::new(1, 5, 5));
    }

    #[test]
    fn lexer_resumes_right_after_an_unexpected_character() {
        let items: Vec<_> = Lexer::new("let a = 1 @ 2;\nb").collect();
        let kinds: Vec<_> = items
            .iter()
            .map(|item| item.as_ref().map(|token| token.kind).map_err(LexicalError::line))
            .collect();
        assert_eq!(
            kinds,
            vec![
                Ok(TokenKind::Let),
                Ok(TokenKind::Ident),
                Ok(TokenKind::Equal),
                Ok(TokenKind::Number(1.0)),
                Err(1),
                Ok(TokenKind::Number(2.0)),
                Ok(TokenKind::Semicolon),
                Ok(TokenKind::Ident),
                Ok(TokenKind::Eof),
            ]
        );
    }

    #[test]
    fn oversized_number_is_rejected() {
        let literal = "9".repeat(400);
        let error = tokenize(&literal).expect_err("literal does not fit a double");
        assert!(
            matches!(&error, LexicalError::NumberOutOfRange { literal: l, .. } if *l == literal),
            "unexpected error {error:?}"
        );
        assert_eq!(error.position(), Position::new(1, 1, 0));
    }

    #[test]
    fn columns_advance_across_lines() {
        let tokens = tokenize("ab\n  // note\n\"é\" x;").expect("input should lex");
        let starts: Vec<_> = tokens.iter().map(|token| token.span.start).collect();
        assert_eq!(
            starts,
            vec![
                Position::new(1, 1, 0),
                Position::new(3, 1, 13),
                Position::new(3, 5, 18),
                Position::new(3, 6, 19),
                Position::new(3, 7, 20),
            ]
        );
    }

    #[test]
    fn token_display_matches_fixture_format() {
        let tokens = tokenize("let pi = 3.5; \"hi\"").expect("input should lex");
        let lines: Vec<String> = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "LET let null",
                "IDENTIFIER pi null",
                "EQUAL = null",
                "NUMBER 3.5 3.5",
                "SEMICOLON ; null",
                "STRING \"hi\" hi",
                "EOF  null",
            ]
        );
    }
}
