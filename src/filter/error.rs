use thiserror::Error;

/// Errors that can occur when parsing filter expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("Empty filter expression")]
    Empty,

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("Unexpected token '{found}' at position {pos}, expected {expected}")]
    UnexpectedToken {
        pos: usize,
        found: String,
        expected: &'static str,
    },

    #[error("Unexpected end of filter expression, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("Empty segment in field path '{0}'")]
    EmptySegment(String),

    #[error("Field '{0}' must be compared to a value inside an expression")]
    BareField(String),
}

/// Errors returned when building a [`Filter`](super::Filter) or [`Member`](super::Member)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid filter expression: {0}")]
    Parse(#[from] FilterParseError),

    #[error("Not an expression: {0}")]
    NotAnExpression(String),

    #[error("Not a field: {0}")]
    NotAField(String),
}
