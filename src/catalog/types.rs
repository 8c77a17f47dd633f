//! Catalog entity types.

use crate::value::{Column, Schema};

/// An object identifier. Unique across tables and indexes; allocated
/// monotonically by the catalog starting at 1 (0 is never a valid oid).
pub type Oid = u32;

/// Access-method kind of an index.
///
/// Every variant carries a distinct code. Only BTree is executable in this
/// revision; the others are accepted and stored as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexType {
    BTree = 0,
    Hash = 1,
    GiST = 2,
    SpGist = 3,
    Gin = 4,
    Brin = 5,
}

impl IndexType {
    /// Decodes a stored code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => IndexType::BTree,
            1 => IndexType::Hash,
            2 => IndexType::GiST,
            3 => IndexType::SpGist,
            4 => IndexType::Gin,
            5 => IndexType::Brin,
            _ => return None,
        })
    }
}

/// Metadata for one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    /// The table this index belongs to.
    pub table_id: Oid,
    /// 0-based column positions the index covers.
    pub column_positions: Vec<u16>,
    pub index_type: IndexType,
    pub is_unique: bool,
    /// True for the implicit primary-key index.
    pub is_primary: bool,
}

impl IndexInfo {
    /// The index file name, `<table>_<index>.idx`.
    pub fn filename(&self, table_name: &str) -> String {
        format!("{}_{}.idx", table_name, self.name)
    }
}

/// Metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub oid: Oid,
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexInfo>,
    /// Row-count statistic, refreshed by `update_table_stats`.
    pub num_rows: u64,
    /// The heap file name, `<table>.heap`.
    pub filename: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub modified_at: u64,
}

impl TableInfo {
    /// Builds the table's schema with every column tagged by source table.
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| {
                    let mut column = c.clone();
                    column.source = Some(self.name.clone());
                    column
                })
                .collect(),
        )
    }

    /// Finds a column position by name.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Metadata for the database itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub oid: Oid,
    pub name: String,
    /// Character encoding id (0 = UTF-8, the only supported encoding).
    pub encoding: u32,
    pub collation: String,
    /// Oids of the tables in this database.
    pub table_ids: Vec<Oid>,
    /// Unix seconds.
    pub created_at: u64,
}
