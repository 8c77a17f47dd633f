//! Engine-wide error taxonomy.
//!
//! Every user-visible failure maps to one of the kinds here. Module-local
//! error types convert upward via `From` so `?` composes across layers.

use std::fmt;

use crate::btree::BtreeError;
use crate::catalog::CatalogError;
use crate::executor::ExecutorError;
use crate::heap::HeapError;
use crate::sql::SyntaxError;
use crate::storage::StorageError;
use crate::tx::{LockError, TxError};
use crate::value::{SerializationError, TypeError};

/// The engine's top-level error.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed SQL; carries the offending token and position.
    Parse(SyntaxError),
    /// Unknown table/column, duplicate object name.
    Catalog(CatalogError),
    /// Incompatible types or invalid values in arithmetic or comparison.
    Type(String),
    /// NOT NULL, UNIQUE, or PRIMARY KEY violation.
    Constraint(String),
    /// Page read/write failure, file open failure.
    Io(std::io::Error),
    /// Lock timeout / deadlock.
    Lock(LockError),
    /// Operation invalid in the current transaction state.
    Transaction(TxError),
    /// Invariant violation; must not escape without a diagnostic.
    Internal(String),
}

impl EngineError {
    /// A short stable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Parse(_) => "parse",
            EngineError::Catalog(_) => "catalog",
            EngineError::Type(_) => "type",
            EngineError::Constraint(_) => "constraint",
            EngineError::Io(_) => "io",
            EngineError::Lock(_) => "lock",
            EngineError::Transaction(_) => "transaction",
            EngineError::Internal(_) => "internal",
        }
    }

    /// The SQLSTATE code reported on the wire for this error.
    pub fn sql_state(&self) -> &'static str {
        match self {
            EngineError::Parse(_) => "42601",
            EngineError::Catalog(CatalogError::TableNotFound(_)) => "42P01",
            EngineError::Catalog(CatalogError::ColumnNotFound { .. }) => "42703",
            EngineError::Catalog(_) => "42P07",
            EngineError::Type(_) => "42804",
            EngineError::Constraint(_) => "23505",
            EngineError::Io(_) => "58030",
            EngineError::Lock(_) => "40P01",
            EngineError::Transaction(_) => "25000",
            EngineError::Internal(_) => "XX000",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Parse(e) => write!(f, "syntax error: {}", e),
            EngineError::Catalog(e) => write!(f, "{}", e),
            EngineError::Type(e) => write!(f, "type error: {}", e),
            EngineError::Constraint(msg) => write!(f, "constraint violation: {}", msg),
            EngineError::Io(e) => write!(f, "io error: {}", e),
            EngineError::Lock(e) => write!(f, "{}", e),
            EngineError::Transaction(e) => write!(f, "{}", e),
            EngineError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SyntaxError> for EngineError {
    fn from(e: SyntaxError) -> Self {
        EngineError::Parse(e)
    }
}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Io(e) => EngineError::Io(e),
            other => EngineError::Catalog(other),
        }
    }
}

impl From<TypeError> for EngineError {
    fn from(e: TypeError) -> Self {
        EngineError::Type(e.to_string())
    }
}

impl From<ExecutorError> for EngineError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Type(t) => EngineError::Type(t.to_string()),
            ExecutorError::UnknownFunction(name) => EngineError::Catalog(
                CatalogError::Unsupported(format!("function {name}() does not exist")),
            ),
            other @ (ExecutorError::DivisionByZero
            | ExecutorError::NumericOverflow
            | ExecutorError::PredicateNotBoolean(_)) => EngineError::Type(other.to_string()),
            ExecutorError::Heap(e) => e.into(),
            ExecutorError::Btree(e) => e.into(),
            ExecutorError::Serialization(e) => e.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(e) => EngineError::Io(e),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<HeapError> for EngineError {
    fn from(e: HeapError) -> Self {
        match e {
            HeapError::Storage(StorageError::Io(e)) => EngineError::Io(e),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<BtreeError> for EngineError {
    fn from(e: BtreeError) -> Self {
        match e {
            BtreeError::DuplicateKey(key) => {
                EngineError::Constraint(format!("duplicate key value {key}"))
            }
            BtreeError::Storage(StorageError::Io(e)) => EngineError::Io(e),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<LockError> for EngineError {
    fn from(e: LockError) -> Self {
        EngineError::Lock(e)
    }
}

impl From<TxError> for EngineError {
    fn from(e: TxError) -> Self {
        EngineError::Transaction(e)
    }
}

impl From<SerializationError> for EngineError {
    fn from(e: SerializationError) -> Self {
        EngineError::Internal(e.to_string())
    }
}
