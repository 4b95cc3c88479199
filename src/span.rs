use std::fmt::Display;

use miette::SourceSpan;

/// A location in the source text. `line` and `column` are 1-based, `offset`
/// is the byte offset from the start of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Position {
            line,
            column,
            offset,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Position,
    pub len: usize,
}

impl Span {
    pub fn new(start: Position, len: usize) -> Self {
        Span { start, len }
    }

    pub fn end(&self) -> usize {
        self.start.offset + self.len
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let (first, last) = if self.start.offset <= other.start.offset {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: first.start,
            len: first.end().max(last.end()) - first.start.offset,
        }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::from(span.start.offset..span.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_merge_in_either_order() {
        let a = Span::new(Position::new(1, 1, 0), 1);
        let b = Span::new(Position::new(1, 5, 4), 3);
        assert_eq!(a.to(b), Span::new(Position::new(1, 1, 0), 7));
        assert_eq!(b.to(a), Span::new(Position::new(1, 1, 0), 7));
    }
}
