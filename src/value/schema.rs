//! Column and schema definitions.

use super::{Value, ValueKind};

/// A column in a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Value kind stored in this column.
    pub kind: ValueKind,
    /// Whether NULL is permitted.
    pub nullable: bool,
    /// Whether this column is part of the primary key.
    pub is_primary_key: bool,
    /// Default value applied when an INSERT omits the column.
    pub default: Option<Value>,
    /// Maximum length for CHAR/VARCHAR columns (0 = unlimited).
    pub max_length: u32,
    /// Table (or alias) this column came from, for qualified resolution
    /// in join outputs. `None` for computed columns.
    pub source: Option<String>,
}

impl Column {
    /// Creates a plain nullable column.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            is_primary_key: false,
            default: None,
            max_length: 0,
            source: None,
        }
    }

    /// Sets the source table name.
    pub fn with_source(mut self, table: impl Into<String>) -> Self {
        self.source = Some(table.into());
        self
    }
}

/// An ordered sequence of columns.
///
/// Column positions are 0-based and stable for the lifetime of the schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// Columns in order.
    pub columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Finds a column position by name. Returns `None` if absent.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Finds a column position by name, restricted to columns whose source
    /// table (or alias) matches `table`.
    pub fn find_qualified(&self, table: &str, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name && c.source.as_deref() == Some(table))
    }

    /// Concatenates two schemas (left columns first), for join outputs.
    pub fn concat(&self, right: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Schema::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            Column::new("id", ValueKind::Int64),
            Column::new("name", ValueKind::Text),
        ])
    }

    #[test]
    fn test_find_column() {
        let schema = sample();
        assert_eq!(schema.find_column("id"), Some(0));
        assert_eq!(schema.find_column("name"), Some(1));
        assert_eq!(schema.find_column("missing"), None);
    }

    #[test]
    fn test_find_qualified() {
        let schema = Schema::new(vec![
            Column::new("id", ValueKind::Int64).with_source("a"),
            Column::new("id", ValueKind::Int64).with_source("b"),
        ]);
        assert_eq!(schema.find_qualified("a", "id"), Some(0));
        assert_eq!(schema.find_qualified("b", "id"), Some(1));
        assert_eq!(schema.find_qualified("c", "id"), None);
    }

    #[test]
    fn test_concat() {
        let left = sample();
        let right = Schema::new(vec![Column::new("age", ValueKind::Int32)]);
        let joined = left.concat(&right);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.find_column("age"), Some(2));
    }
}
