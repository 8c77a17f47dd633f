//! Catalog error types.

use std::fmt;

use super::Oid;

/// Errors from catalog operations.
#[derive(Debug)]
pub enum CatalogError {
    /// No table with this name (or oid, rendered as text).
    TableNotFound(String),
    /// No index with this name.
    IndexNotFound(String),
    /// A table with this name already exists.
    DuplicateTable(String),
    /// An index with this name already exists.
    DuplicateIndex(String),
    /// No such column in the table.
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The feature is recognized but not supported (e.g. a HASH index).
    Unsupported(String),
    /// The catalog file is unreadable: bad magic, version, or structure.
    InvalidFormat(String),
    /// Reading or writing the catalog file failed.
    Io(std::io::Error),
}

impl CatalogError {
    /// Renders an oid-based lookup failure.
    pub fn table_oid_not_found(oid: Oid) -> Self {
        CatalogError::TableNotFound(format!("oid {oid}"))
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableNotFound(name) => write!(f, "table {} does not exist", name),
            CatalogError::IndexNotFound(name) => write!(f, "index {} does not exist", name),
            CatalogError::DuplicateTable(name) => write!(f, "table {} already exists", name),
            CatalogError::DuplicateIndex(name) => write!(f, "index {} already exists", name),
            CatalogError::ColumnNotFound { table, column } => {
                write!(f, "column {} of table {} does not exist", column, table)
            }
            CatalogError::Unsupported(msg) => write!(f, "{}", msg),
            CatalogError::InvalidFormat(msg) => write!(f, "catalog file invalid: {}", msg),
            CatalogError::Io(e) => write!(f, "catalog io: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e)
    }
}
