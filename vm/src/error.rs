use std::io;
use std::path::PathBuf;

use bytecode::DecodeError;
use heap::{MatchFailure, ObjectError};
use object::{Value, ValueError, VarRef};
use thiserror::Error;

/// Structural problems found while loading a program image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image of {len} bytes is too small to contain the header")]
    TooSmall { len: usize },
    #[error("{field} is negative ({value})")]
    NegativeSize { field: &'static str, value: i32 },
    #[error("global area size {count} is too large (at most {max} words)")]
    GlobalAreaTooLarge { count: usize, max: usize },
    #[error("image is too small to hold a public symbol table of {needed} bytes ({available} available)")]
    SymbolTableTooLarge { needed: usize, available: usize },
    #[error("image is too small to hold a string table of {needed} bytes ({available} available)")]
    StringTableTooLarge { needed: usize, available: usize },
}

/// Failures raised while executing a single instruction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    MatchFailure(#[from] MatchFailure),

    #[error("code offset {offset:#x} is out of bounds (code is {len} bytes)")]
    CodeOutOfBounds { offset: u32, len: usize },
    #[error("string offset {offset:#x} is out of bounds (string table is {len} bytes)")]
    StringOutOfBounds { offset: u32, len: usize },
    #[error("string at offset {offset:#x} has no terminator")]
    UnterminatedString { offset: u32 },

    #[error("global {index} is out of bounds ({count} globals)")]
    GlobalOutOfBounds { index: i32, count: usize },
    #[error("local {index} is out of bounds ({count} locals)")]
    LocalOutOfBounds { index: i32, count: usize },
    #[error("argument {index} is out of bounds ({count} arguments)")]
    ArgOutOfBounds { index: i32, count: usize },
    #[error("captured variable access outside of a closure")]
    NotInClosure,
    #[error("reference {0:?} points outside the live stack")]
    DanglingReference(VarRef),
    #[error("expected a reference, found {0}")]
    NotAReference(Value),

    #[error("operand stack is empty")]
    EmptyOperandStack,
    #[error("expected {expected} operands, but found operand stack of size {found}")]
    NotEnoughOperands { expected: usize, found: usize },
    #[error("attempt to end function with operand stack size {found}, expected 1")]
    ReturnOperands { found: usize },
    #[error("no function to end")]
    NoFunctionToEnd,
    #[error("function prologue reached without a call")]
    BeginWithoutCall,
    #[error("stack overflow ({capacity} words)")]
    StackOverflow { capacity: usize },

    #[error("division by zero")]
    DivisionByZero,
}

/// Top-level error of a VM run.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("invalid program image: {0}")]
    Load(#[from] LoadError),
    /// `offset` is the code offset of the instruction that failed.
    #[error("at {offset:#06x}: {error}")]
    Execution { offset: u32, error: RuntimeError },
}

impl VmError {
    /// The runtime error, if the run got as far as executing code.
    pub fn runtime(&self) -> Option<&RuntimeError> {
        match self {
            VmError::Load(_) => None,
            VmError::Execution { error, .. } => Some(error),
        }
    }

    pub fn offset(&self) -> Option<u32> {
        match self {
            VmError::Load(_) => None,
            VmError::Execution { offset, .. } => Some(*offset),
        }
    }
}
