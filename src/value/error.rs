//! Error types for value serialization and coercion.

use std::fmt;

use super::ValueKind;

/// Errors from encoding or decoding values and tuples.
#[derive(Debug)]
pub enum SerializationError {
    /// Buffer is too small for the data.
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Malformed data (bad tag, bad UTF-8, unparsable decimal/json).
    InvalidFormat(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::BufferTooSmall {
                required,
                available,
            } => write!(
                f,
                "buffer too small: need {} bytes, have {}",
                required, available
            ),
            SerializationError::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for SerializationError {}

/// Errors from type coercion and typed operations.
#[derive(Debug)]
pub enum TypeError {
    /// A value of one kind cannot become the target kind.
    Incompatible {
        /// Source kind.
        from: ValueKind,
        /// Target kind.
        to: ValueKind,
    },
    /// Operands of an operator have incompatible kinds.
    InvalidOperands {
        /// Operator spelling.
        op: &'static str,
        /// Left operand kind.
        left: ValueKind,
        /// Right operand kind.
        right: ValueKind,
    },
    /// A string exceeds the column's declared maximum length.
    ValueTooLong {
        /// Declared maximum.
        max_length: u32,
        /// Actual length.
        actual: usize,
    },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Incompatible { from, to } => {
                write!(f, "cannot convert {} to {}", from.sql_name(), to.sql_name())
            }
            TypeError::InvalidOperands { op, left, right } => write!(
                f,
                "operator {} is not defined for {} and {}",
                op,
                left.sql_name(),
                right.sql_name()
            ),
            TypeError::ValueTooLong { max_length, actual } => write!(
                f,
                "value too long: {} characters exceed the limit of {}",
                actual, max_length
            ),
        }
    }
}

impl std::error::Error for TypeError {}
