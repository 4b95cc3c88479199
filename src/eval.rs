use std::{collections::HashMap, fmt::Display};

use log::debug;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    Parser,
    ast::{
        BinaryOperator, Expression, ExpressionKind, Program, Statement, StatementKind,
        TypeAnnotation, UnaryOperator, VariableDeclaration,
    },
    diagnostics::{self, DiagnosticKind, Diagnostics},
    span::{Position, Span},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Undefined,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Undefined => "undefined",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
            }
            Value::Number(n) if *n == 0.0 => write!(f, "0"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    TypeError,
    ReferenceError,
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("operator `{operator}` cannot be applied to types '{left}' and '{right}'")]
    #[diagnostic(
        code(runtime::type_error),
        help("both operands of `{operator}` must be numbers")
    )]
    InvalidOperands {
        operator: BinaryOperator,
        left: &'static str,
        right: &'static str,
        position: Position,
        #[label("in this expression")]
        span: SourceSpan,
    },

    #[error("operator `{operator}` cannot be applied to type '{operand}'")]
    #[diagnostic(code(runtime::type_error), help("the operand of `{operator}` must be a number"))]
    InvalidOperand {
        operator: UnaryOperator,
        operand: &'static str,
        position: Position,
        #[label("in this expression")]
        span: SourceSpan,
    },

    #[error("cannot find name '{name}'")]
    #[diagnostic(
        code(runtime::reference_error),
        help("declare it first with `let {name} = ...;`")
    )]
    UndeclaredIdentifier {
        name: String,
        position: Position,
        #[label("not declared in this scope")]
        span: SourceSpan,
    },

    #[error("type '{found}' is not assignable to type '{expected}'")]
    #[diagnostic(code(runtime::type_error))]
    NotAssignable {
        expected: String,
        found: &'static str,
        position: Position,
        #[label("declared type")]
        span: SourceSpan,
    },

    #[error("cannot find type '{name}'")]
    #[diagnostic(
        code(runtime::type_error),
        help("known types are number, string, boolean, undefined, any and unknown")
    )]
    UnknownType {
        name: String,
        position: Position,
        #[label("unknown type")]
        span: SourceSpan,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::UndeclaredIdentifier { .. } => RuntimeErrorKind::ReferenceError,
            RuntimeError::InvalidOperands { .. }
            | RuntimeError::InvalidOperand { .. }
            | RuntimeError::NotAssignable { .. }
            | RuntimeError::UnknownType { .. } => RuntimeErrorKind::TypeError,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            RuntimeError::InvalidOperands { position, .. }
            | RuntimeError::InvalidOperand { position, .. }
            | RuntimeError::UndeclaredIdentifier { position, .. }
            | RuntimeError::NotAssignable { position, .. }
            | RuntimeError::UnknownType { position, .. } => *position,
        }
    }
}

impl From<RuntimeError> for diagnostics::Diagnostic {
    fn from(error: RuntimeError) -> Self {
        Self::from_error(DiagnosticKind::Runtime, error.position(), &error)
    }
}

/// One lexical scope. A child only reads through its parent and never
/// writes to it.
#[derive(Debug, Default)]
pub struct Environment<'p> {
    bindings: HashMap<String, Value>,
    parent: Option<&'p Environment<'p>>,
}

impl Environment<'static> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'p> Environment<'p> {
    pub fn child(&self) -> Environment<'_> {
        Environment {
            bindings: HashMap::new(),
            parent: Some(self),
        }
    }

    /// Binds `name` in this scope, returning the value it replaced.
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.bindings.insert(name.into(), value)
    }

    /// Looks `name` up here, then outward through the parents.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.get(name)),
        }
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bindings of this scope only.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Runs `program` in `environment` and returns the completion value of the
/// last statement, or `Undefined` for an empty program.
pub fn evaluate(program: &Program, environment: &mut Environment<'_>) -> Result<Value, RuntimeError> {
    let mut last = Value::Undefined;
    for statement in &program.statements {
        last = execute(statement, environment)?;
    }
    Ok(last)
}

pub fn execute(statement: &Statement, environment: &mut Environment<'_>) -> Result<Value, RuntimeError> {
    match &statement.kind {
        StatementKind::VariableDeclaration(VariableDeclaration {
            name,
            type_annotation,
            initializer,
        }) => {
            let value = match initializer {
                Some(expression) => evaluate_expression(expression, environment)?,
                None => Value::Undefined,
            };
            if let Some(annotation) = type_annotation {
                check_annotation(annotation, &value)?;
            }
            debug!("binding `{name}` = {value}");
            // redeclaration in the same scope overwrites
            if let Some(previous) = environment.define(name.as_str(), value.clone()) {
                debug!("`{name}` redeclared, previous value {previous}");
            }
            Ok(value)
        }
        StatementKind::Expression(expression) => evaluate_expression(expression, environment),
        StatementKind::Block(statements) => {
            let mut scope = environment.child();
            let mut last = Value::Undefined;
            for statement in statements {
                last = execute(statement, &mut scope)?;
            }
            Ok(last)
        }
    }
}

pub fn evaluate_expression(
    expression: &Expression,
    environment: &Environment<'_>,
) -> Result<Value, RuntimeError> {
    Ok(match &expression.kind {
        ExpressionKind::Number(n) => Value::Number(*n),
        ExpressionKind::String(s) => Value::String(s.clone()),
        ExpressionKind::Boolean(b) => Value::Boolean(*b),
        ExpressionKind::Identifier(name) => match environment.get(name) {
            Some(value) => value.clone(),
            None => {
                return Err(RuntimeError::UndeclaredIdentifier {
                    name: name.clone(),
                    position: expression.span.start,
                    span: expression.span.into(),
                });
            }
        },
        ExpressionKind::Unary { operator, operand } => {
            let value = evaluate_expression(operand, environment)?;
            match (operator, value) {
                (UnaryOperator::Negate, Value::Number(n)) => Value::Number(-n),
                (operator, value) => {
                    return Err(RuntimeError::InvalidOperand {
                        operator: *operator,
                        operand: value.type_name(),
                        position: expression.span.start,
                        span: expression.span.into(),
                    });
                }
            }
        }
        ExpressionKind::Binary {
            operator,
            left,
            right,
        } => {
            let lhs = evaluate_expression(left, environment)?;
            let rhs = evaluate_expression(right, environment)?;
            apply_binary(*operator, &lhs, &rhs, expression.span)?
        }
    })
}

fn apply_binary(
    operator: BinaryOperator,
    lhs: &Value,
    rhs: &Value,
    span: Span,
) -> Result<Value, RuntimeError> {
    let (Value::Number(lhs), Value::Number(rhs)) = (lhs, rhs) else {
        return Err(RuntimeError::InvalidOperands {
            operator,
            left: lhs.type_name(),
            right: rhs.type_name(),
            position: span.start,
            span: span.into(),
        });
    };
    Ok(Value::Number(match operator {
        BinaryOperator::Add => lhs + rhs,
        BinaryOperator::Subtract => lhs - rhs,
        BinaryOperator::Multiply => lhs * rhs,
        // IEEE-754: x / 0 is ±Infinity, 0 / 0 is NaN
        BinaryOperator::Divide => lhs / rhs,
    }))
}

fn check_annotation(annotation: &TypeAnnotation, value: &Value) -> Result<(), RuntimeError> {
    let accepts = match annotation.name.as_str() {
        "any" | "unknown" => true,
        "number" => matches!(value, Value::Number(_) | Value::Undefined),
        "string" => matches!(value, Value::String(_) | Value::Undefined),
        "boolean" => matches!(value, Value::Boolean(_) | Value::Undefined),
        "undefined" => matches!(value, Value::Undefined),
        _ => {
            return Err(RuntimeError::UnknownType {
                name: annotation.name.clone(),
                position: annotation.span.start,
                span: annotation.span.into(),
            });
        }
    };
    if accepts {
        Ok(())
    } else {
        Err(RuntimeError::NotAssignable {
            expected: annotation.name.clone(),
            found: value.type_name(),
            position: annotation.span.start,
            span: annotation.span.into(),
        })
    }
}

/// Result of running a source unit: the completion value when everything
/// succeeded, and every diagnostic collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Owns the global scope and keeps it across calls, so several source units
/// (or REPL lines) can build on each other.
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: Environment<'static>,
    last_value: Option<Value>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eval(&mut self, statement: &Statement) -> Result<Value, RuntimeError> {
        let value = execute(statement, &mut self.globals)?;
        self.last_value = Some(value.clone());
        Ok(value)
    }

    /// Stops at the first runtime error. Bindings made before it remain.
    pub fn evaluate(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let mut last = Value::Undefined;
        for statement in &program.statements {
            last = self.eval(statement)?;
        }
        Ok(last)
    }

    /// Parses and evaluates `source`. Nothing is evaluated when parsing
    /// reported any diagnostic.
    pub fn run(&mut self, source: &str) -> Outcome {
        let (program, mut diagnostics) = Parser::new(source).parse();
        if diagnostics.has_errors() {
            debug!("skipping evaluation, {} parse diagnostics", diagnostics.len());
            return Outcome {
                value: None,
                diagnostics,
            };
        }
        match self.evaluate(&program) {
            Ok(value) => Outcome {
                value: Some(value),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(e);
                Outcome {
                    value: None,
                    diagnostics,
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.globals.bindings()
    }

    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }
}
