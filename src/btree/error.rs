//! Error types for the B-tree module.

use std::fmt;

use crate::storage::StorageError;
use crate::value::SerializationError;

use super::key::IndexKey;

/// Errors from B-tree operations.
#[derive(Debug)]
pub enum BtreeError {
    /// Unique index rejected a duplicate key.
    DuplicateKey(IndexKey),
    /// Key too large to ever fit in a page with its payload.
    KeyTooLarge {
        /// Encoded key size.
        size: usize,
        /// The per-page limit.
        max: usize,
    },
    /// Structural problem found while reading or verifying the tree.
    Corrupted(String),
    /// Entry (de)serialization failed.
    Serialization(SerializationError),
    /// Underlying page I/O failed.
    Storage(StorageError),
}

impl fmt::Display for BtreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BtreeError::DuplicateKey(key) => write!(f, "duplicate key {key}"),
            BtreeError::KeyTooLarge { size, max } => {
                write!(f, "key of {} bytes exceeds the limit of {}", size, max)
            }
            BtreeError::Corrupted(msg) => write!(f, "btree corrupted: {}", msg),
            BtreeError::Serialization(e) => write!(f, "btree entry serialization: {}", e),
            BtreeError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BtreeError {}

impl From<SerializationError> for BtreeError {
    fn from(e: SerializationError) -> Self {
        BtreeError::Serialization(e)
    }
}

impl From<StorageError> for BtreeError {
    fn from(e: StorageError) -> Self {
        BtreeError::Storage(e)
    }
}
