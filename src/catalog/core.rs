//! The catalog proper: in-memory state plus `catalog.dat` persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::value::{Column, Value, ValueKind};

use super::error::CatalogError;
use super::types::{DatabaseInfo, IndexInfo, IndexType, Oid, TableInfo};
use super::{CATALOG_MAGIC, CATALOG_VERSION};

struct CatalogState {
    next_oid: Oid,
    database: DatabaseInfo,
    tables: HashMap<Oid, TableInfo>,
}

/// The system catalog.
///
/// Single writer at a time, any number of readers. Every mutation saves
/// the whole catalog to disk before returning; the file is small and the
/// simplicity beats incremental updates at this scale.
pub struct Catalog {
    path: PathBuf,
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Opens the catalog at `path`, bootstrapping a fresh database record
    /// when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let state = if path.exists() {
            load(&path)?
        } else {
            let state = CatalogState {
                next_oid: 2,
                database: DatabaseInfo {
                    oid: 1,
                    name: "rookdb".to_string(),
                    encoding: 0,
                    collation: "C".to_string(),
                    table_ids: Vec::new(),
                    created_at: now(),
                },
                tables: HashMap::new(),
            };
            save(&path, &state)?;
            state
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Returns the database record.
    pub fn database(&self) -> DatabaseInfo {
        self.state.read().database.clone()
    }

    /// Creates a table and returns its oid.
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> Result<Oid, CatalogError> {
        let mut state = self.state.write();
        if state.tables.values().any(|t| t.name == name) {
            return Err(CatalogError::DuplicateTable(name.to_string()));
        }
        let oid = state.next_oid;
        state.next_oid += 1;
        let timestamp = now();
        state.tables.insert(
            oid,
            TableInfo {
                oid,
                name: name.to_string(),
                columns,
                indexes: Vec::new(),
                num_rows: 0,
                filename: format!("{name}.heap"),
                created_at: timestamp,
                modified_at: timestamp,
            },
        );
        state.database.table_ids.push(oid);
        save(&self.path, &state)?;
        Ok(oid)
    }

    /// Drops a table, returning its metadata so the caller can delete the
    /// backing files.
    pub fn drop_table(&self, oid: Oid) -> Result<TableInfo, CatalogError> {
        let mut state = self.state.write();
        let table = state
            .tables
            .remove(&oid)
            .ok_or_else(|| CatalogError::table_oid_not_found(oid))?;
        state.database.table_ids.retain(|&id| id != oid);
        save(&self.path, &state)?;
        Ok(table)
    }

    /// Creates an index on a table and returns its oid.
    pub fn create_index(
        &self,
        name: &str,
        table_id: Oid,
        column_positions: Vec<u16>,
        index_type: IndexType,
        is_unique: bool,
        is_primary: bool,
    ) -> Result<Oid, CatalogError> {
        let mut state = self.state.write();
        if state
            .tables
            .values()
            .flat_map(|t| &t.indexes)
            .any(|i| i.name == name)
        {
            return Err(CatalogError::DuplicateIndex(name.to_string()));
        }
        // Allocate before the table lookup; a failed lookup leaves a gap in
        // the oid sequence, which is harmless (only uniqueness matters).
        let oid = state.next_oid;
        state.next_oid += 1;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| CatalogError::table_oid_not_found(table_id))?;
        table.indexes.push(IndexInfo {
            oid,
            name: name.to_string(),
            table_id,
            column_positions,
            index_type,
            is_unique,
            is_primary,
        });
        table.modified_at = now();
        save(&self.path, &state)?;
        Ok(oid)
    }

    /// Drops an index by name, returning the owning table's name and the
    /// index metadata.
    pub fn drop_index(&self, name: &str) -> Result<(String, IndexInfo), CatalogError> {
        let mut state = self.state.write();
        let owner = state.tables.iter().find_map(|(oid, table)| {
            table
                .indexes
                .iter()
                .position(|i| i.name == name)
                .map(|pos| (*oid, pos))
        });
        let Some((table_oid, pos)) = owner else {
            return Err(CatalogError::IndexNotFound(name.to_string()));
        };
        let table = state
            .tables
            .get_mut(&table_oid)
            .ok_or_else(|| CatalogError::table_oid_not_found(table_oid))?;
        let index = table.indexes.remove(pos);
        let table_name = table.name.clone();
        table.modified_at = now();
        save(&self.path, &state)?;
        Ok((table_name, index))
    }

    /// Refreshes a table's row-count statistic.
    pub fn update_table_stats(&self, oid: Oid, num_rows: u64) -> Result<(), CatalogError> {
        let mut state = self.state.write();
        let table = state
            .tables
            .get_mut(&oid)
            .ok_or_else(|| CatalogError::table_oid_not_found(oid))?;
        table.num_rows = num_rows;
        table.modified_at = now();
        save(&self.path, &state)?;
        Ok(())
    }

    /// Looks a table up by oid.
    pub fn get_table(&self, oid: Oid) -> Option<TableInfo> {
        self.state.read().tables.get(&oid).cloned()
    }

    /// Looks a table up by name.
    pub fn get_table_by_name(&self, name: &str) -> Option<TableInfo> {
        self.state
            .read()
            .tables
            .values()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Returns every table, in no particular order.
    pub fn get_all_tables(&self) -> Vec<TableInfo> {
        self.state.read().tables.values().cloned().collect()
    }

    /// Returns a table's indexes.
    pub fn get_table_indexes(&self, oid: Oid) -> Vec<IndexInfo> {
        self.state
            .read()
            .tables
            .get(&oid)
            .map(|t| t.indexes.clone())
            .unwrap_or_default()
    }

    /// Finds an index by name, with its owning table's name.
    pub fn get_index_by_name(&self, name: &str) -> Option<(String, IndexInfo)> {
        let state = self.state.read();
        for table in state.tables.values() {
            if let Some(index) = table.indexes.iter().find(|i| i.name == name) {
                return Some((table.name.clone(), index.clone()));
            }
        }
        None
    }

    /// Returns true if a table with this name exists.
    pub fn table_exists_by_name(&self, name: &str) -> bool {
        self.state.read().tables.values().any(|t| t.name == name)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Persistence. Little-endian fixed-width integers; strings are u16
// length-prefixed UTF-8. The writer emits the whole catalog; the reader
// rejects unknown magic or version before touching anything else.
// ---------------------------------------------------------------------------

fn save(path: &Path, state: &CatalogState) -> Result<(), CatalogError> {
    let mut out = Vec::new();
    out.extend_from_slice(&CATALOG_MAGIC);
    out.extend_from_slice(&CATALOG_VERSION.to_le_bytes());
    out.extend_from_slice(&state.next_oid.to_le_bytes());

    write_database(&mut out, &state.database);

    let mut tables: Vec<_> = state.tables.values().collect();
    tables.sort_by_key(|t| t.oid);
    out.extend_from_slice(&(tables.len() as u32).to_le_bytes());
    for table in tables {
        write_table(&mut out, table);
    }

    // Write-then-rename keeps a crash from truncating the live catalog.
    let tmp = path.with_extension("dat.tmp");
    std::fs::write(&tmp, &out)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn write_database(out: &mut Vec<u8>, db: &DatabaseInfo) {
    out.extend_from_slice(&db.oid.to_le_bytes());
    write_string(out, &db.name);
    out.extend_from_slice(&db.encoding.to_le_bytes());
    write_string(out, &db.collation);
    out.extend_from_slice(&db.created_at.to_le_bytes());
    out.extend_from_slice(&(db.table_ids.len() as u32).to_le_bytes());
    for id in &db.table_ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
}

fn write_table(out: &mut Vec<u8>, table: &TableInfo) {
    out.extend_from_slice(&table.oid.to_le_bytes());
    write_string(out, &table.name);
    write_string(out, &table.filename);
    out.extend_from_slice(&table.num_rows.to_le_bytes());
    out.extend_from_slice(&table.created_at.to_le_bytes());
    out.extend_from_slice(&table.modified_at.to_le_bytes());

    out.extend_from_slice(&(table.columns.len() as u16).to_le_bytes());
    for column in &table.columns {
        write_string(out, &column.name);
        out.push(column.kind.code());
        out.push(column.nullable as u8);
        out.push(column.is_primary_key as u8);
        match &column.default {
            Some(value) => {
                out.push(1);
                value.encode(out);
            }
            None => out.push(0),
        }
        out.extend_from_slice(&column.max_length.to_le_bytes());
    }

    out.extend_from_slice(&(table.indexes.len() as u16).to_le_bytes());
    for index in &table.indexes {
        out.extend_from_slice(&index.oid.to_le_bytes());
        write_string(out, &index.name);
        out.extend_from_slice(&index.table_id.to_le_bytes());
        out.extend_from_slice(&(index.column_positions.len() as u16).to_le_bytes());
        for pos in &index.column_positions {
            out.extend_from_slice(&pos.to_le_bytes());
        }
        out.push(index.index_type as u8);
        out.push(index.is_unique as u8);
        out.push(index.is_primary as u8);
    }
}

fn load(path: &Path) -> Result<CatalogState, CatalogError> {
    let bytes = std::fs::read(path)?;
    let mut reader = Reader::new(&bytes);

    let magic = reader.bytes(4)?;
    if magic != CATALOG_MAGIC {
        return Err(CatalogError::InvalidFormat(format!(
            "bad magic {magic:02x?}"
        )));
    }
    let version = reader.u32()?;
    if version != CATALOG_VERSION {
        return Err(CatalogError::InvalidFormat(format!(
            "unsupported version {version}"
        )));
    }
    let next_oid = reader.u32()?;
    let database = read_database(&mut reader)?;

    let table_count = reader.u32()?;
    let mut tables = HashMap::with_capacity(table_count as usize);
    for _ in 0..table_count {
        let table = read_table(&mut reader)?;
        tables.insert(table.oid, table);
    }

    Ok(CatalogState {
        next_oid,
        database,
        tables,
    })
}

fn read_database(reader: &mut Reader<'_>) -> Result<DatabaseInfo, CatalogError> {
    let oid = reader.u32()?;
    let name = reader.string()?;
    let encoding = reader.u32()?;
    let collation = reader.string()?;
    let created_at = reader.u64()?;
    let id_count = reader.u32()?;
    let mut table_ids = Vec::with_capacity(id_count as usize);
    for _ in 0..id_count {
        table_ids.push(reader.u32()?);
    }
    Ok(DatabaseInfo {
        oid,
        name,
        encoding,
        collation,
        table_ids,
        created_at,
    })
}

fn read_table(reader: &mut Reader<'_>) -> Result<TableInfo, CatalogError> {
    let oid = reader.u32()?;
    let name = reader.string()?;
    let filename = reader.string()?;
    let num_rows = reader.u64()?;
    let created_at = reader.u64()?;
    let modified_at = reader.u64()?;

    let column_count = reader.u16()?;
    let mut columns = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let name = reader.string()?;
        let kind_code = reader.u8()?;
        let kind = ValueKind::from_code(kind_code).ok_or_else(|| {
            CatalogError::InvalidFormat(format!("bad column kind {kind_code}"))
        })?;
        let nullable = reader.u8()? != 0;
        let is_primary_key = reader.u8()? != 0;
        let default = if reader.u8()? != 0 {
            let (value, consumed) = Value::decode(reader.rest())
                .map_err(|e| CatalogError::InvalidFormat(e.to_string()))?;
            reader.skip(consumed)?;
            Some(value)
        } else {
            None
        };
        let max_length = reader.u32()?;
        columns.push(Column {
            name,
            kind,
            nullable,
            is_primary_key,
            default,
            max_length,
            source: None,
        });
    }

    let index_count = reader.u16()?;
    let mut indexes = Vec::with_capacity(index_count as usize);
    for _ in 0..index_count {
        let oid = reader.u32()?;
        let name = reader.string()?;
        let table_id = reader.u32()?;
        let pos_count = reader.u16()?;
        let mut column_positions = Vec::with_capacity(pos_count as usize);
        for _ in 0..pos_count {
            column_positions.push(reader.u16()?);
        }
        let type_code = reader.u8()?;
        let index_type = IndexType::from_code(type_code).ok_or_else(|| {
            CatalogError::InvalidFormat(format!("bad index type {type_code}"))
        })?;
        let is_unique = reader.u8()? != 0;
        let is_primary = reader.u8()? != 0;
        indexes.push(IndexInfo {
            oid,
            name,
            table_id,
            column_positions,
            index_type,
            is_unique,
            is_primary,
        });
    }

    Ok(TableInfo {
        oid,
        name,
        columns,
        indexes,
        num_rows,
        filename,
        created_at,
        modified_at,
    })
}

/// A bounds-checked cursor over the catalog file bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], CatalogError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| CatalogError::InvalidFormat("truncated file".into()))?;
        self.pos += n;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn skip(&mut self, n: usize) -> Result<(), CatalogError> {
        self.bytes(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, CatalogError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CatalogError> {
        Ok(u16::from_le_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, CatalogError> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, CatalogError> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, CatalogError> {
        let len = self.u16()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CatalogError::InvalidFormat(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn columns() -> Vec<Column> {
        vec![
            Column {
                name: "id".into(),
                kind: ValueKind::Int64,
                nullable: false,
                is_primary_key: true,
                default: None,
                max_length: 0,
                source: None,
            },
            Column {
                name: "name".into(),
                kind: ValueKind::Varchar,
                nullable: true,
                is_primary_key: false,
                default: Some(Value::Varchar("unknown".into())),
                max_length: 64,
                source: None,
            },
        ]
    }

    #[test]
    fn test_bootstrap_creates_database() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let db = catalog.database();
        assert_eq!(db.oid, 1);
        assert_eq!(db.name, "rookdb");
        assert!(db.table_ids.is_empty());
        assert!(dir.path().join("catalog.dat").exists());
    }

    #[test]
    fn test_create_and_query_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let oid = catalog.create_table("users", columns()).unwrap();
        assert!(oid >= 2);

        let table = catalog.get_table(oid).unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(table.filename, "users.heap");
        assert_eq!(table.columns.len(), 2);

        assert_eq!(catalog.get_table_by_name("users").unwrap().oid, oid);
        assert!(catalog.table_exists_by_name("users"));
        assert!(!catalog.table_exists_by_name("ghosts"));
        assert_eq!(catalog.get_all_tables().len(), 1);
        assert_eq!(catalog.database().table_ids, vec![oid]);
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        catalog.create_table("users", columns()).unwrap();
        assert!(matches!(
            catalog.create_table("users", columns()),
            Err(CatalogError::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_oids_unique_across_tables_and_indexes() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let t1 = catalog.create_table("a", columns()).unwrap();
        let i1 = catalog
            .create_index("a_idx", t1, vec![0], IndexType::BTree, false, false)
            .unwrap();
        let t2 = catalog.create_table("b", columns()).unwrap();
        let mut oids = vec![t1, i1, t2];
        oids.sort_unstable();
        oids.dedup();
        assert_eq!(oids.len(), 3);
    }

    #[test]
    fn test_index_lifecycle() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let table_id = catalog.create_table("users", columns()).unwrap();
        let index_id = catalog
            .create_index("users_name_key", table_id, vec![1], IndexType::BTree, true, false)
            .unwrap();

        let indexes = catalog.get_table_indexes(table_id);
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].oid, index_id);
        assert!(indexes[0].is_unique);

        let (owner, index) = catalog.get_index_by_name("users_name_key").unwrap();
        assert_eq!(owner, "users");
        assert_eq!(index.column_positions, vec![1]);

        assert!(matches!(
            catalog.create_index("users_name_key", table_id, vec![0], IndexType::BTree, false, false),
            Err(CatalogError::DuplicateIndex(_))
        ));

        catalog.drop_index("users_name_key").unwrap();
        assert!(catalog.get_table_indexes(table_id).is_empty());
        assert!(matches!(
            catalog.drop_index("users_name_key"),
            Err(CatalogError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_update_table_stats() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let oid = catalog.create_table("users", columns()).unwrap();
        catalog.update_table_stats(oid, 42).unwrap();
        assert_eq!(catalog.get_table(oid).unwrap().num_rows, 42);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.dat");
        let (table_id, index_id);
        {
            let catalog = Catalog::open(&path).unwrap();
            table_id = catalog.create_table("users", columns()).unwrap();
            index_id = catalog
                .create_index("users_pkey", table_id, vec![0], IndexType::BTree, true, true)
                .unwrap();
            catalog.update_table_stats(table_id, 7).unwrap();
        }

        let catalog = Catalog::open(&path).unwrap();
        let table = catalog.get_table(table_id).unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(table.num_rows, 7);
        assert_eq!(table.columns, columns());
        assert_eq!(table.indexes.len(), 1);
        assert_eq!(table.indexes[0].oid, index_id);
        assert!(table.indexes[0].is_primary);

        // New oids keep growing past everything allocated before reopen.
        let next = catalog.create_table("more", columns()).unwrap();
        assert!(next > index_id);
    }

    #[test]
    fn test_drop_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
        let oid = catalog.create_table("users", columns()).unwrap();
        let dropped = catalog.drop_table(oid).unwrap();
        assert_eq!(dropped.name, "users");
        assert!(catalog.get_table(oid).is_none());
        assert!(catalog.database().table_ids.is_empty());
        assert!(matches!(
            catalog.drop_table(oid),
            Err(CatalogError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_reject_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.dat");
        std::fs::write(&path, b"NOPE....").unwrap();
        assert!(matches!(
            Catalog::open(&path),
            Err(CatalogError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_reject_bad_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.dat");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CATALOG_MAGIC);
        bytes.extend_from_slice(&999u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            Catalog::open(&path),
            Err(CatalogError::InvalidFormat(_))
        ));
    }
}
