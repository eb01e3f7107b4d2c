use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradeStatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Spec error: {0}")]
    Spec(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Format error: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, GradeStatError>;

/// Why a single row could not be decoded into a `Record`.
///
/// Row errors never abort a run; the engine counts them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected at least {expected} fields, found {found}")]
    Schema { expected: usize, found: usize },

    #[error("field `{field}` has non-integer value {value:?}: {reason}")]
    Type {
        field: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    Schema,
    Type,
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Schema { .. } => DecodeErrorKind::Schema,
            DecodeError::Type { .. } => DecodeErrorKind::Type,
        }
    }
}
