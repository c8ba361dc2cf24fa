//! Source text to expression trees.
//!
//! [`parse`] holds no shared state: independent inputs can be parsed from
//! independent threads and produce independent trees.

use std::{
    iter::Peekable,
    str::CharIndices,
    sync::Arc,
};

use crate::{
    ast::{Expr, ExprKind, Position, Span, Token, TokenKind},
    error::{SyntaxError, SyntaxErrorKind},
};

/// Deepest list nesting accepted. Trees are dropped, printed and evaluated
/// recursively, so the limit keeps all of those within the native stack.
pub const MAX_NESTING: usize = 256;

pub type ParseResult<T> = Result<T, SyntaxError>;

type LexResult = Result<Token, (SyntaxErrorKind, Span)>;

/// Parse `source` into its top-level expressions. `label` names the source in
/// errors (usually a file path).
pub fn parse(source: &str, label: &str) -> ParseResult<Vec<Expr>> {
    Parser::new(source, label).parse()
}

pub struct Lexer<'input> {
    input: &'input str,
    chars: Peekable<CharIndices<'input>>,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}

fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
            _ => false,
        },
        Some('.') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(index, _)| *index)
            .unwrap_or(self.input.len())
    }

    fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !predicate(c) {
                break;
            }
            self.chars.next();
        }
    }

    fn string(&mut self, start: usize) -> LexResult {
        let end_of_input = Span::new(self.input.len(), self.input.len());
        loop {
            match self.chars.next() {
                None => return Err((SyntaxErrorKind::UnterminatedString, end_of_input)),
                Some((_, '\\')) => {
                    if self.chars.next().is_none() {
                        return Err((SyntaxErrorKind::UnterminatedString, end_of_input));
                    }
                }
                Some((index, '"')) => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        span: Span::new(start, index + 1),
                    })
                }
                Some(_) => (),
            }
        }
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = LexResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.eat_while(char::is_whitespace);
        let (start, c) = self.chars.next()?;
        let token = |kind, end| Token {
            kind,
            span: Span::new(start, end),
        };
        Some(match c {
            '(' => Ok(token(TokenKind::ListOpen, start + 1)),
            ')' => Ok(token(TokenKind::ListClose, start + 1)),
            ';' => {
                self.eat_while(|c| c != '\n');
                let end = self.offset();
                Ok(token(TokenKind::Comment, end))
            }
            '"' => self.string(start),
            _ => {
                self.eat_while(|c| !is_delimiter(c));
                let end = self.offset();
                let kind = if looks_numeric(&self.input[start..end]) {
                    TokenKind::Number
                } else {
                    TokenKind::Symbol
                };
                Ok(token(kind, end))
            }
        })
    }
}

/// The parser and all associated state
pub struct Parser<'input> {
    pub input: &'input str,
    label: Arc<str>,
    lexer: Lexer<'input>,
}

impl<'input> Parser<'input> {
    pub fn new(input: &'input str, label: &str) -> Self {
        Self {
            input,
            label: label.into(),
            lexer: Lexer::new(input),
        }
    }

    fn error(&self, kind: SyntaxErrorKind, span: Span) -> SyntaxError {
        SyntaxError {
            label: self.label.clone(),
            position: Position::locate(self.input, span.start),
            span,
            kind,
        }
    }

    /// Return the next significant token, skipping comments.
    fn next(&mut self) -> ParseResult<Option<Token>> {
        loop {
            match self.lexer.next() {
                None => return Ok(None),
                Some(Ok(token)) if token.kind == TokenKind::Comment => continue,
                Some(Ok(token)) => return Ok(Some(token)),
                Some(Err((kind, span))) => return Err(self.error(kind, span)),
            }
        }
    }

    /// Obtain source text behind given token
    fn text(&self, token: Token) -> &'input str {
        token.text(self.input)
    }

    pub fn parse(mut self) -> ParseResult<Vec<Expr>> {
        // Lists are built on an explicit stack so deeply nested input cannot
        // exhaust the native one.
        let mut open: Vec<(Span, Vec<Expr>)> = vec![];
        let mut program = vec![];

        while let Some(token) = self.next()? {
            let expr = match token.kind {
                TokenKind::ListOpen => {
                    if open.len() >= MAX_NESTING {
                        let kind = SyntaxErrorKind::NestingTooDeep(MAX_NESTING);
                        return Err(self.error(kind, token.span));
                    }
                    open.push((token.span, vec![]));
                    continue;
                }
                TokenKind::ListClose => {
                    let (start, items) = open.pop().ok_or_else(|| {
                        self.error(SyntaxErrorKind::UnexpectedListClose, token.span)
                    })?;
                    Expr::new(ExprKind::List(items.into()), start.to(token.span))
                }
                TokenKind::Symbol => self.symbol(token),
                TokenKind::String => self.string(token)?,
                TokenKind::Number => self.number(token)?,
                TokenKind::Comment => continue,
            };
            match open.last_mut() {
                Some((_, items)) => items.push(expr),
                None => program.push(expr),
            }
        }

        if !open.is_empty() {
            let len = self.input.len();
            return Err(self.error(SyntaxErrorKind::UnterminatedList, Span::new(len, len)));
        }
        Ok(program)
    }

    fn symbol(&self, token: Token) -> Expr {
        let kind = match self.text(token) {
            "nil" => ExprKind::Nil,
            name => ExprKind::Symbol(name.into()),
        };
        Expr::new(kind, token.span)
    }

    fn string(&self, token: Token) -> ParseResult<Expr> {
        let text = self.text(token);
        let body = &text[1..text.len() - 1];
        let mut decoded = String::with_capacity(body.len());
        let mut chars = body.char_indices();
        while let Some((index, c)) = chars.next() {
            if c != '\\' {
                decoded.push(c);
                continue;
            }
            // The lexer guarantees a character follows every backslash.
            let escaped = chars.next().map(|(_, c)| c).unwrap_or('\\');
            decoded.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                '\\' => '\\',
                '"' => '"',
                other => {
                    let start = token.span.start + 1 + index;
                    let span = Span::new(start, start + 1 + other.len_utf8());
                    return Err(self.error(SyntaxErrorKind::InvalidEscape(other), span));
                }
            });
        }
        Ok(Expr::new(ExprKind::Str(decoded.into()), token.span))
    }

    fn number(&self, token: Token) -> ParseResult<Expr> {
        let text = self.text(token);
        let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
        let kind = if digits.bytes().all(|b| b.is_ascii_digit()) {
            text.parse::<i64>().ok().map(ExprKind::Int)
        } else {
            text.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(ExprKind::Float)
        };
        kind.map(|kind| Expr::new(kind, token.span))
            .ok_or_else(|| self.error(SyntaxErrorKind::InvalidNumber(text.into()), token.span))
    }
}
