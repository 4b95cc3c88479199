use log::debug;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    ast::{
        BinaryOperator, Expression, ExpressionKind, Program, Statement, StatementKind,
        TypeAnnotation, UnaryOperator, VariableDeclaration,
    },
    diagnostics::{self, DiagnosticKind, Diagnostics},
    lex::{LexicalError, Lexer, Token, TokenKind},
    span::Position,
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(syntax::unexpected_token), help("use {expected} here instead"))]
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("expected {expected}, found end of input")]
    #[diagnostic(
        code(syntax::unexpected_eof),
        help("the input ended early, possibly due to a missing `;` or closing delimiter")
    )]
    UnexpectedEof {
        expected: String,
        position: Position,
        #[label("input ends here")]
        span: SourceSpan,
    },

    #[error("`{keyword}` is not supported yet")]
    #[diagnostic(
        code(syntax::unsupported),
        help("only `let` declarations, blocks and expression statements are available")
    )]
    Unsupported {
        keyword: String,
        position: Position,
        #[label("reserved keyword")]
        span: SourceSpan,
    },

    #[error("expression nested too deeply, the limit is {limit} levels")]
    #[diagnostic(
        code(syntax::nested_too_deeply),
        help("split the expression with intermediate `let` bindings")
    )]
    NestedTooDeeply {
        limit: usize,
        position: Position,
        #[label("nesting limit reached here")]
        span: SourceSpan,
    },
}

impl SyntaxError {
    fn unexpected(token: &Token<'_>, expected: &str) -> Self {
        if token.kind == TokenKind::Eof {
            SyntaxError::UnexpectedEof {
                expected: expected.to_string(),
                position: token.span.start,
                span: token.span.into(),
            }
        } else {
            SyntaxError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.describe(),
                position: token.span.start,
                span: token.span.into(),
            }
        }
    }

    pub fn position(&self) -> Position {
        match self {
            SyntaxError::UnexpectedToken { position, .. }
            | SyntaxError::UnexpectedEof { position, .. }
            | SyntaxError::Unsupported { position, .. }
            | SyntaxError::NestedTooDeeply { position, .. } => *position,
        }
    }
}

/// Anything that aborts a single statement.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lexical(#[from] LexicalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Lexical(e) => e.position(),
            ParseError::Syntax(e) => e.position(),
        }
    }
}

impl From<SyntaxError> for diagnostics::Diagnostic {
    fn from(error: SyntaxError) -> Self {
        Self::from_error(DiagnosticKind::Syntax, error.position(), &error)
    }
}

impl From<ParseError> for diagnostics::Diagnostic {
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::Lexical(e) => e.into(),
            ParseError::Syntax(e) => e.into(),
        }
    }
}

/// Bound on syntax tree height: parenthesized, prefixed and chained binary
/// expressions plus nested blocks all count one level each.
const MAX_NESTING: usize = 200;

pub struct Parser<'de> {
    lexer: Lexer<'de>,
    diagnostics: Diagnostics,
    depth: usize,
}

impl<'de> Parser<'de> {
    pub fn new(whole: &'de str) -> Self {
        Self::from_lexer(Lexer::new(whole))
    }

    pub fn from_lexer(lexer: Lexer<'de>) -> Self {
        Parser {
            lexer,
            diagnostics: Diagnostics::new(),
            depth: 0,
        }
    }

    /// Parses every statement, recovering at statement boundaries so one
    /// mistake does not hide the ones after it.
    pub fn parse(mut self) -> (Program, Diagnostics) {
        let statements = self.parse_statements(TokenKind::Eof);
        (Program { statements }, self.diagnostics)
    }

    pub fn is_eof(&mut self) -> bool {
        matches!(
            self.lexer.peek(),
            None | Some(Ok(Token {
                kind: TokenKind::Eof,
                ..
            }))
        )
    }

    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Let => self.parse_variable_declaration(),
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Const
            | TokenKind::Function
            | TokenKind::Return
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::While
            | TokenKind::Class
            | TokenKind::Interface => {
                self.bump();
                Err(SyntaxError::Unsupported {
                    keyword: token.literal.to_string(),
                    position: token.span.start,
                    span: token.span.into(),
                }
                .into())
            }
            _ => {
                let expression = self.parse_expression()?;
                let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Statement {
                    span: expression.span.to(semicolon.span),
                    kind: StatementKind::Expression(expression),
                })
            }
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_expression_within(0)
    }

    fn parse_statements(&mut self, terminator: TokenKind) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            match self.lexer.peek() {
                None => break,
                Some(Ok(token)) if token.kind == terminator || token.kind == TokenKind::Eof => {
                    break;
                }
                _ => {}
            }
            let start = self.peek_offset();
            match self.parse_statement() {
                Ok(statement) => {
                    debug!("parsed statement at {}", statement.span.start);
                    statements.push(statement);
                }
                Err(e) => self.recover(e, start),
            }
        }
        statements
    }

    fn parse_variable_declaration(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.expect(TokenKind::Let, "`let`")?;
        let name = self.expect(TokenKind::Ident, "identifier")?;

        let type_annotation = if self.peek()?.kind == TokenKind::Colon {
            self.bump();
            let ty = self.expect(TokenKind::Ident, "type name")?;
            Some(TypeAnnotation {
                name: ty.literal.to_string(),
                span: ty.span,
            })
        } else {
            None
        };

        let initializer = if self.peek()?.kind == TokenKind::Equal {
            self.bump();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;

        Ok(Statement {
            kind: StatementKind::VariableDeclaration(VariableDeclaration {
                name: name.literal.to_string(),
                type_annotation,
                initializer,
            }),
            span: keyword.span.to(semicolon.span),
        })
    }

    fn parse_block(&mut self) -> Result<Statement, ParseError> {
        let open = self.expect(TokenKind::LeftBrace, "`{`")?;
        self.descend(&open)?;
        let statements = self.parse_statements(TokenKind::RightBrace);
        self.depth -= 1;
        let close = self.expect(TokenKind::RightBrace, "`}`")?;
        Ok(Statement {
            kind: StatementKind::Block(statements),
            span: open.span.to(close.span),
        })
    }

    fn parse_expression_within(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let depth = self.depth;
        let expression = self.parse_operand_and_operators(min_bp);
        self.depth = depth;
        expression
    }

    /// Every call and every operator folded into `lhs` takes one nesting
    /// level. The caller restores the depth.
    fn parse_operand_and_operators(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let token = self.peek()?;
        self.descend(&token)?;
        let mut lhs = match token.kind {
            TokenKind::Number(n) => {
                self.bump();
                Expression::new(ExpressionKind::Number(n), token.span)
            }
            TokenKind::String => {
                self.bump();
                Expression::new(ExpressionKind::String(token.literal.to_string()), token.span)
            }
            TokenKind::True | TokenKind::False => {
                self.bump();
                Expression::new(
                    ExpressionKind::Boolean(token.kind == TokenKind::True),
                    token.span,
                )
            }
            TokenKind::Ident => {
                self.bump();
                Expression::new(
                    ExpressionKind::Identifier(token.literal.to_string()),
                    token.span,
                )
            }
            TokenKind::LeftParen => {
                self.bump();
                let mut inner = self.parse_expression_within(0)?;
                let close = self.expect(TokenKind::RightParen, "`)`")?;
                inner.span = token.span.to(close.span);
                inner
            }
            TokenKind::Minus => {
                self.bump();
                let operator = UnaryOperator::Negate;
                let ((), r_bp) = prefix_binding_power(operator);
                let operand = self.parse_expression_within(r_bp)?;
                let span = token.span.to(operand.span);
                Expression::new(
                    ExpressionKind::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                    span,
                )
            }
            _ => return Err(SyntaxError::unexpected(&token, "expression").into()),
        };

        loop {
            let token = self.peek()?;
            let operator = match token.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };

            let (l_bp, r_bp) = infix_binding_power(operator);
            if l_bp < min_bp {
                break;
            }
            self.descend(&token)?;
            self.bump();

            let rhs = self.parse_expression_within(r_bp)?;
            lhs = Expression::binary(operator, lhs, rhs);
        }

        Ok(lhs)
    }

    fn descend(&mut self, token: &Token<'de>) -> Result<(), SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::NestedTooDeeply {
                limit: MAX_NESTING,
                position: token.span.start,
                span: token.span.into(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Peeks the next token. A lexical error in that position is taken out
    /// of the stream and returned instead.
    fn peek(&mut self) -> Result<Token<'de>, LexicalError> {
        match self.lexer.peek() {
            Some(Ok(token)) => return Ok(*token),
            None => return Ok(self.lexer.eof()),
            Some(Err(_)) => {}
        }
        match self.lexer.next() {
            Some(Err(e)) => Err(e),
            Some(Ok(token)) => Ok(token),
            None => Ok(self.lexer.eof()),
        }
    }

    fn peek_offset(&mut self) -> Option<usize> {
        match self.lexer.peek() {
            Some(Ok(token)) => Some(token.span.start.offset),
            _ => None,
        }
    }

    fn bump(&mut self) {
        self.lexer.next();
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token<'de>, ParseError> {
        let token = self.peek()?;
        if token.kind == kind {
            self.bump();
            Ok(token)
        } else {
            Err(SyntaxError::unexpected(&token, expected).into())
        }
    }

    fn recover(&mut self, error: ParseError, start: Option<usize>) {
        debug!("recovering from error at {}: {error}", error.position());
        self.diagnostics.push(error);
        self.synchronize();
        if start.is_some() && self.peek_offset() == start {
            self.bump();
        }
    }

    /// Skips to the next statement boundary: just past a `;`, or in front of
    /// a statement keyword, a `}` or the end of input.
    fn synchronize(&mut self) {
        loop {
            let token = match self.peek() {
                Ok(token) => token,
                Err(e) => {
                    self.diagnostics.push(e);
                    continue;
                }
            };
            match token.kind {
                TokenKind::Eof | TokenKind::RightBrace => return,
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                kind if kind.starts_statement() => return,
                _ => self.bump(),
            }
        }
    }
}

fn prefix_binding_power(op: UnaryOperator) -> ((), u8) {
    match op {
        UnaryOperator::Negate => ((), 5),
    }
}

fn infix_binding_power(op: BinaryOperator) -> (u8, u8) {
    match op {
        BinaryOperator::Add | BinaryOperator::Subtract => (1, 2),
        BinaryOperator::Multiply | BinaryOperator::Divide => (3, 4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expression(input: &str) -> String {
        Parser::new(input)
            .parse_expression()
            .expect("expression should parse")
            .to_string()
    }

    #[test]
    fn binding_powers_layer_the_tiers() {
        assert_eq!(expression("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(expression("-2 * 3"), "((-2) * 3)");
        assert_eq!(expression("--2"), "(-(-2))");
    }

    #[test]
    fn nesting_limit_stops_runaway_recursion() {
        let deep = format!("{}1{};", "(".repeat(1000), ")".repeat(1000));
        let (program, diagnostics) = Parser::new(&deep).parse();
        assert!(program.statements.is_empty());
        let [diagnostic] = diagnostics.all() else {
            panic!("expected one diagnostic, got {:?}", diagnostics.all());
        };
        assert_eq!(
            diagnostic.message,
            "expression nested too deeply, the limit is 200 levels"
        );

        let chain = format!("1{};", " + 1".repeat(10_000));
        let (_, diagnostics) = Parser::new(&chain).parse();
        assert_eq!(diagnostics.len(), 1);

        let negations = format!("{}1;", "-".repeat(10_000));
        let (_, diagnostics) = Parser::new(&negations).parse();
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn nesting_below_the_limit_parses() {
        let nested = format!("{}1{};", "(".repeat(150), ")".repeat(150));
        let chain = format!("1{};", " + 1".repeat(150));
        let blocks = format!("{}{}", "{".repeat(100), "}".repeat(100));
        for source in [nested, chain, blocks] {
            let (program, diagnostics) = Parser::new(&source).parse();
            assert!(diagnostics.is_empty(), "{:?}", diagnostics.all());
            assert_eq!(program.statements.len(), 1);
        }
    }

    #[test]
    fn stray_closing_brace_does_not_stall_recovery() {
        let (program, diagnostics) = Parser::new("} let a = 1;").parse();
        assert_eq!(program.statements.len(), 1);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn recovery_inside_a_block_keeps_the_block() {
        let (program, diagnostics) = Parser::new("{ let = 1; let b = 2; }").parse();
        assert_eq!(diagnostics.len(), 1);
        let [statement] = program.statements.as_slice() else {
            panic!("expected one statement, got {:?}", program.statements);
        };
        match &statement.kind {
            StatementKind::Block(inner) => assert_eq!(inner.len(), 1),
            other => panic!("expected a block, got {other:?}"),
        }
    }
}
