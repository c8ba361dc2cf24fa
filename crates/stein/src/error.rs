use std::{any::Any, fmt, sync::Arc};

use thiserror::Error;

use crate::ast::{Position, Span};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnexpectedListClose,
    UnterminatedList,
    UnterminatedString,
    InvalidEscape(char),
    InvalidNumber(Box<str>),
    NestingTooDeep(usize),
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::UnexpectedListClose => f.write_str("unexpected ')'"),
            SyntaxErrorKind::UnterminatedList => f.write_str("unexpected end of input, ')' expected"),
            SyntaxErrorKind::UnterminatedString => f.write_str("unterminated string literal"),
            SyntaxErrorKind::InvalidEscape(c) => write!(f, "invalid escape sequence '\\{}'", c),
            SyntaxErrorKind::InvalidNumber(text) => write!(f, "invalid numeric literal '{}'", text),
            SyntaxErrorKind::NestingTooDeep(limit) => {
                write!(f, "lists nested deeper than {} levels", limit)
            }
        }
    }
}

/// A parse failure. Parsing stops at the first one, so there is never a partial tree.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{label}:{position}: {kind}")]
pub struct SyntaxError {
    pub label: Arc<str>,
    pub position: Position,
    pub span: Span,
    pub kind: SyntaxErrorKind,
}

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("unbound symbol '{0}'")]
    UnboundSymbol(Box<str>),
    #[error("{function} expects {expected} argument(s) but {got} were given")]
    ArityMismatch {
        function: Box<str>,
        expected: usize,
        got: usize,
    },
    #[error("cannot convert {found} to {expected}")]
    TypeCoercion { expected: Box<str>, found: Box<str> },
    #[error("unsupported native type '{ty}' in signature: {reason}")]
    UnsupportedSignatureType { ty: Box<str>, reason: Box<str> },
    #[error("{receiver} does not respond to '{selector}'")]
    DispatchFailure { receiver: Box<str>, selector: Box<str> },
    #[error("{class} has no field named '{field}'")]
    NoSuchField { class: Box<str>, field: Box<str> },
    #[error("malformed {form}: {reason}")]
    InvalidForm { form: Box<str>, reason: Box<str> },
    #[error("{0}")]
    Exception(Box<str>),
    #[error("maximum application depth of {0} exceeded")]
    StackExhausted(usize),
    #[error("the evaluator this function belongs to is gone")]
    SessionClosed,
    #[error("native code panicked: {0}")]
    NativePanic(Box<str>),
}

impl Error {
    pub fn coercion(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Error::TypeCoercion {
            expected: expected.to_string().into(),
            found: found.to_string().into(),
        }
    }

    pub fn invalid_form(form: &str, reason: impl fmt::Display) -> Self {
        Error::InvalidForm {
            form: form.into(),
            reason: reason.to_string().into(),
        }
    }
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Box<str> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).into()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str().into()
    } else {
        "unknown panic".into()
    }
}

/// An error that escaped a top-level evaluation, with the innermost
/// expression it was raised from.
#[derive(Clone, Debug, Error)]
#[error("{label}:{}: {error}", .position.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()))]
pub struct Fault {
    pub error: Error,
    pub label: Arc<str>,
    pub expression: Option<String>,
    pub span: Option<Span>,
    pub position: Option<Position>,
}

impl From<SyntaxError> for Fault {
    fn from(error: SyntaxError) -> Self {
        Fault {
            label: error.label.clone(),
            span: Some(error.span),
            position: Some(error.position),
            expression: None,
            error: Error::Syntax(error),
        }
    }
}
