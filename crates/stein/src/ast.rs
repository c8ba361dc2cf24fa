use std::{fmt, ops::Range, sync::Arc};

/// Byte range of a token or expression in its source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// A resolved location inside a source text. Lines and columns start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (index, c) in source.char_indices() {
            if index >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Position {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    ListOpen,
    ListClose,
    Symbol,
    String,
    Number,
    Comment,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::ListOpen => "'('",
            TokenKind::ListClose => "')'",
            TokenKind::Symbol => "symbol",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Comment => "comment",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.span.start..self.span.end]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// `(<expr>*)`
    List(Arc<[Expr]>),
    Symbol(Arc<str>),
    Str(Arc<str>),
    Int(i64),
    Float(f64),
    Nil,
}

/// A node of the expression tree. Cloning is cheap, equality is structural and
/// ignores source spans.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::List(items.into()), Span::default())
    }

    pub fn symbol(name: &str) -> Self {
        Self::new(ExprKind::Symbol(name.into()), Span::default())
    }

    pub fn string(text: &str) -> Self {
        Self::new(ExprKind::Str(text.into()), Span::default())
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value), Span::default())
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Float(value), Span::default())
    }

    pub fn nil() -> Self {
        Self::new(ExprKind::Nil, Span::default())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Keyword symbols (`ifTrue:`) name message parts and never variables.
    pub fn is_keyword(&self) -> bool {
        matches!(self.as_symbol(), Some(name) if is_keyword(name))
    }
}

pub fn is_keyword(name: &str) -> bool {
    name.len() > 1 && name.ends_with(':')
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::List(items) => {
                f.write_str("(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            ExprKind::Symbol(name) => f.write_str(name),
            ExprKind::Str(text) => write_escaped(f, text),
            ExprKind::Int(value) => write!(f, "{}", value),
            // `{:?}` keeps the decimal point so the literal reads back as a float.
            ExprKind::Float(value) => write!(f, "{:?}", value),
            ExprKind::Nil => f.write_str("nil"),
        }
    }
}
