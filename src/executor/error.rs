//! Executor error types.

use std::fmt;

use crate::btree::BtreeError;
use crate::heap::HeapError;
use crate::value::{SerializationError, TypeError, ValueKind};

/// Errors from expression evaluation and operator execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// A typed operation received incompatible operands.
    Type(TypeError),
    /// Function name not known to the evaluator.
    UnknownFunction(String),
    /// Integer modulo by zero.
    DivisionByZero,
    /// Integer arithmetic overflowed.
    NumericOverflow,
    /// A WHERE/HAVING predicate evaluated to a non-boolean value.
    PredicateNotBoolean(ValueKind),
    /// Heap access failed.
    Heap(HeapError),
    /// Index access failed.
    Btree(BtreeError),
    /// Value (de)serialization failed.
    Serialization(SerializationError),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Type(e) => write!(f, "{}", e),
            ExecutorError::UnknownFunction(name) => {
                write!(f, "function {}() does not exist", name)
            }
            ExecutorError::DivisionByZero => write!(f, "division by zero"),
            ExecutorError::NumericOverflow => write!(f, "numeric value out of range"),
            ExecutorError::PredicateNotBoolean(kind) => write!(
                f,
                "argument of WHERE must be boolean, not {}",
                kind.sql_name()
            ),
            ExecutorError::Heap(e) => write!(f, "{}", e),
            ExecutorError::Btree(e) => write!(f, "{}", e),
            ExecutorError::Serialization(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<TypeError> for ExecutorError {
    fn from(e: TypeError) -> Self {
        ExecutorError::Type(e)
    }
}

impl From<HeapError> for ExecutorError {
    fn from(e: HeapError) -> Self {
        ExecutorError::Heap(e)
    }
}

impl From<BtreeError> for ExecutorError {
    fn from(e: BtreeError) -> Self {
        ExecutorError::Btree(e)
    }
}

impl From<SerializationError> for ExecutorError {
    fn from(e: SerializationError) -> Self {
        ExecutorError::Serialization(e)
    }
}
