//! Storage layer errors.

use std::fmt;

/// Storage layer errors.
#[derive(Debug)]
pub enum StorageError {
    /// Invalid buffer size provided to read_page or write_page.
    ///
    /// Buffers must be exactly one page.
    InvalidBufferSize {
        /// Expected buffer size (the manager's page size).
        expected: usize,
        /// Actual buffer size provided.
        actual: usize,
    },

    /// I/O error from the underlying file system.
    Io(std::io::Error),

    /// Data corruption detected (bad magic, impossible offsets).
    Corrupted(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(
                    f,
                    "invalid buffer size: expected {}, got {}",
                    expected, actual
                )
            }
            StorageError::Io(e) => write!(f, "io error: {}", e),
            StorageError::Corrupted(msg) => write!(f, "data corruption: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
