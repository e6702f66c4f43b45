// Error taxonomy. Compilation fails with a ParseError carrying the source
// offset of the failure; evaluation fails fast with a typed EvalError and
// unwinds any scopes pushed along the way.

use thiserror::Error;

/// Errors raised while tokenizing or parsing source text.
///
/// Offsets are character positions into the source string.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unmatched '{open}' at offset {offset}")]
    UnmatchedGroup { open: char, offset: usize },

    #[error("invalid character '{ch}' at offset {offset}")]
    InvalidChar { ch: char, offset: usize },

    #[error("invalid numeric literal at offset {offset}")]
    InvalidNumber { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expected {expected}, found {found} at offset {offset}")]
    Expected {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("invalid assignment target at offset {offset}")]
    InvalidTarget { offset: usize },

    #[error("'{name}' is a reserved name at offset {offset}")]
    ReservedName { name: String, offset: usize },

    #[error("expression nesting exceeds {max} levels")]
    TooDeep { max: usize },
}

/// Errors raised during evaluation of a compiled expression.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("reference error: {0}")]
    Reference(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("range error: {0}")]
    Range(String),

    #[error("evaluation depth exceeds {0} levels")]
    TooDeep(usize),
}

/// Umbrella error for the fused compile-and-run entry point.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
