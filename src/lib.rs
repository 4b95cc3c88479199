//! Front end for a small TypeScript-flavoured scripting language: a lexer,
//! a Pratt parser producing an owned syntax tree, and a tree-walking
//! evaluator over parent-linked scopes.
//!
//! Every stage reports problems as [`Diagnostic`]s carrying a source
//! position; nothing here prints or exits.

pub mod ast;
pub mod diagnostics;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod span;

pub use ast::Program;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use eval::{Environment, Interpreter, Outcome, RuntimeError, Value};
pub use lex::{Lexer, LexicalError, Token, TokenKind, tokenize};
pub use parse::{ParseError, Parser, SyntaxError};
pub use span::{Position, Span};

/// Parses `source` into a program plus every lexical and syntax diagnostic.
pub fn parse(source: &str) -> (Program, Diagnostics) {
    Parser::new(source).parse()
}

/// Parses and evaluates `source` in a fresh global scope.
pub fn run(source: &str) -> Outcome {
    Interpreter::new().run(source)
}
