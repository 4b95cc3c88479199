use std::fmt::{self, Display};

use miette::{LabeledSpan, NamedSource, Report, SourceSpan};

use crate::span::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Lexical,
    Syntax,
    Runtime,
}

impl DiagnosticKind {
    fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Lexical => "lexical",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Runtime => "runtime",
        }
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Lexical => write!(f, "LexicalError"),
            DiagnosticKind::Syntax => write!(f, "SyntaxError"),
            DiagnosticKind::Runtime => write!(f, "RuntimeError"),
        }
    }
}

/// One recorded error, detached from the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Position,
    span: SourceSpan,
    label: Option<String>,
    help: Option<String>,
    code: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            position,
            span: SourceSpan::from(position.offset..position.offset),
            label: None,
            help: None,
            code: None,
        }
    }

    /// Copies message, first label, help and code out of a `miette` error.
    pub fn from_error<E: miette::Diagnostic>(
        kind: DiagnosticKind,
        position: Position,
        error: &E,
    ) -> Self {
        let mut diagnostic = Diagnostic::new(kind, error.to_string(), position);
        if let Some(label) = error.labels().and_then(|mut labels| labels.next()) {
            diagnostic.span = *label.inner();
            diagnostic.label = label.label().map(str::to_owned);
        }
        diagnostic.help = error.help().map(|help| help.to_string());
        diagnostic.code = error.code().map(|code| code.to_string());
        diagnostic
    }

    pub fn line(&self) -> usize {
        self.position.line
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match &self.code {
            Some(code) => Some(Box::new(code) as Box<dyn Display + 'a>),
            None => Some(Box::new(self.kind.code()) as Box<dyn Display + 'a>),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(self.label.clone(), self.span);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Accumulates diagnostics in source order. Recording never fails; callers
/// decide what to do with the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>, position: Position) {
        self.push(Diagnostic::new(kind, message, position));
    }

    pub fn push(&mut self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        // entries at the same offset keep insertion order
        let index = self
            .entries
            .partition_point(|entry| entry.position.offset <= diagnostic.position.offset);
        self.entries.insert(index, diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn has_kind(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reports with the source attached, ready for graphical rendering.
    pub fn reports(&self, name: &str, source: &str) -> Vec<Report> {
        self.entries
            .iter()
            .map(|diagnostic| {
                Report::new(diagnostic.clone())
                    .with_source_code(NamedSource::new(name, source.to_string()))
            })
            .collect()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_stay_in_source_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(DiagnosticKind::Syntax, "second", Position::new(2, 1, 12));
        diagnostics.record(DiagnosticKind::Lexical, "first", Position::new(1, 3, 2));
        diagnostics.record(DiagnosticKind::Runtime, "also second", Position::new(2, 1, 12));

        let messages: Vec<_> = diagnostics.all().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "also second"]);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_kind(DiagnosticKind::Runtime));
    }

    #[test]
    fn empty_collection_has_no_errors() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.all().is_empty());
    }

    #[test]
    fn reports_carry_the_source() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(DiagnosticKind::Syntax, "expected `;`", Position::new(1, 10, 9));
        diagnostics.record(DiagnosticKind::Runtime, "boom", Position::new(1, 1, 0));

        let reports = diagnostics.reports("input.ts", "let x = 1");
        let messages: Vec<_> = reports.iter().map(ToString::to_string).collect();
        assert_eq!(messages, vec!["RuntimeError: boom", "SyntaxError: expected `;`"]);
        assert!(reports.iter().all(|report| report.source_code().is_some()));
        assert_eq!(
            reports[1].code().map(|code| code.to_string()),
            Some("syntax".to_string())
        );
    }

    #[test]
    fn display_names_the_kind() {
        let diagnostic = Diagnostic::new(DiagnosticKind::Runtime, "boom", Position::new(1, 1, 0));
        assert_eq!(diagnostic.to_string(), "RuntimeError: boom");
    }
}
