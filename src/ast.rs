//! Syntax tree shared by the parser and the evaluator.
//!
//! Statements and expressions are closed enums. A new construct is a new
//! variant plus a production in the parser; nothing else has to move.
//!
//! `Display` prints source text that parses back to the same tree. Binary and
//! unary expressions are always parenthesized so the printed form does not
//! depend on precedence.

use std::fmt::{self, Display};

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    VariableDeclaration(VariableDeclaration),
    Expression(Expression),
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Expression { kind, span }
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        let span = left.span.to(right.span);
        Expression {
            kind: ExpressionKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            // the lexer never produces these, so print an equivalent expression
            ExpressionKind::Number(n) if n.is_nan() => write!(f, "(0 / 0)"),
            ExpressionKind::Number(n) if n.is_infinite() => {
                write!(f, "({}1 / 0)", if *n < 0.0 { "-" } else { "" })
            }
            ExpressionKind::Number(n) => write!(f, "{n}"),
            ExpressionKind::String(s) => write!(f, "\"{s}\""),
            ExpressionKind::Boolean(b) => write!(f, "{b}"),
            ExpressionKind::Identifier(name) => write!(f, "{name}"),
            ExpressionKind::Unary { operator, operand } => write!(f, "({operator}{operand})"),
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => write!(f, "({left} {operator} {right})"),
        }
    }
}

impl Statement {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        match &self.kind {
            StatementKind::VariableDeclaration(declaration) => {
                write!(f, "{indent}let {}", declaration.name)?;
                if let Some(annotation) = &declaration.type_annotation {
                    write!(f, ": {}", annotation.name)?;
                }
                if let Some(initializer) = &declaration.initializer {
                    write!(f, " = {initializer}")?;
                }
                write!(f, ";")
            }
            StatementKind::Expression(expression) => write!(f, "{indent}{expression};"),
            StatementKind::Block(statements) => {
                writeln!(f, "{indent}{{")?;
                for statement in statements {
                    statement.write_indented(f, depth + 1)?;
                    writeln!(f)?;
                }
                write!(f, "{indent}}}")
            }
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    fn number(n: f64) -> Expression {
        Expression::new(ExpressionKind::Number(n), Span::new(Position::new(1, 1, 0), 1))
    }

    #[test]
    fn non_finite_numbers_print_as_source() {
        assert_eq!(number(f64::INFINITY).to_string(), "(1 / 0)");
        assert_eq!(number(f64::NEG_INFINITY).to_string(), "(-1 / 0)");
        assert_eq!(number(f64::NAN).to_string(), "(0 / 0)");
        assert_eq!(number(1e21).to_string(), "1000000000000000000000");
    }
}
