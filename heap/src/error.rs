use std::io;

use object::{ObjectKind, ObjectRef, Value, ValueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("expected a heap object, found {0}")]
    NotAnObject(Value),
    #[error("expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: ObjectKind,
    },
    #[error("index {index} is out of bounds [0, {len})")]
    IndexOutOfBounds { index: i32, len: usize },
    #[error("dangling object handle {0:?}")]
    Dangling(ObjectRef),
    #[error("character {0:?} is not allowed in a constructor tag")]
    BadTagChar(char),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("cannot read an integer from {0:?}")]
    InvalidInput(String),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Unrecoverable failure of a `match` expression. Never resumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("match failure at {line}:{column}, value '{value}'")]
pub struct MatchFailure {
    pub value: String,
    pub line: u32,
    pub column: u32,
}
