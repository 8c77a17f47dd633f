//! Error types for the heap module.

use std::fmt;

use crate::storage::StorageError;
use crate::value::SerializationError;

/// Errors from heap operations.
#[derive(Debug)]
pub enum HeapError {
    /// Page cannot hold the tuple and its line pointer.
    PageFull {
        /// Bytes required (tuple + line pointer).
        required: usize,
        /// Bytes available in free space.
        available: usize,
    },
    /// Tuple exceeds the largest size a single page can hold.
    TupleTooLarge {
        /// Serialized tuple size, header included.
        size: usize,
        /// The per-page maximum.
        max: usize,
    },
    /// Slot does not exist or is a tombstone.
    SlotNotFound(u16),
    /// In-place overwrite attempted with a different length.
    TupleSizeChanged {
        /// Stored length.
        expected: usize,
        /// New length.
        actual: usize,
    },
    /// Tuple body failed to decode.
    Serialization(SerializationError),
    /// Underlying page I/O failed.
    Storage(StorageError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::PageFull {
                required,
                available,
            } => write!(
                f,
                "page full: need {} bytes, have {} available",
                required, available
            ),
            HeapError::TupleTooLarge { size, max } => {
                write!(f, "tuple of {} bytes exceeds page capacity {}", size, max)
            }
            HeapError::SlotNotFound(slot) => write!(f, "slot {} not found or deleted", slot),
            HeapError::TupleSizeChanged { expected, actual } => write!(
                f,
                "in-place overwrite size mismatch: stored {}, got {}",
                expected, actual
            ),
            HeapError::Serialization(e) => write!(f, "tuple serialization: {}", e),
            HeapError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HeapError {}

impl From<SerializationError> for HeapError {
    fn from(e: SerializationError) -> Self {
        HeapError::Serialization(e)
    }
}

impl From<StorageError> for HeapError {
    fn from(e: StorageError) -> Self {
        HeapError::Storage(e)
    }
}
