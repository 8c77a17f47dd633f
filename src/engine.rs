//! The database engine: statement dispatch over the storage stack.
//!
//! The [`Engine`] owns the long-lived services (page manager, catalog,
//! transaction and lock managers, open heaps and indexes) and executes
//! parsed statements against them. Each connection holds a [`Session`]
//! carrying its transaction state; statements outside BEGIN/COMMIT run in
//! their own implicit transaction (auto-commit). DDL always runs in its
//! own transaction, never grouped into an explicit block.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::btree::{BtreeIndex, IndexKey};
use crate::catalog::{Catalog, CatalogError, IndexInfo, IndexType, Oid, TableInfo};
use crate::config::Config;
use crate::error::EngineError;
use crate::executor::{eval, eval_predicate, plan_select, Operator, TableBinding};
use crate::heap::HeapTable;
use crate::storage::PageManager;
use crate::sql::{
    parse, CreateIndexStmt, CreateTableStmt, DeleteStmt, Expr, InsertStmt, SelectItem,
    SelectStmt, Statement, UpdateStmt,
};
use crate::tx::{
    LockKey, LockManager, Snapshot, SnapshotView, TransactionManager, TxError, TxId, UndoRecord,
};
use crate::value::{Column, Schema, Tuple, TupleId, TypeError, Value, ValueKind};

/// Result of executing one statement.
#[derive(Debug)]
pub enum StatementResult {
    /// Empty query (whitespace/comments only).
    Empty,
    /// A SELECT's output.
    Rows {
        columns: Vec<Column>,
        rows: Vec<Tuple>,
    },
    Inserted(usize),
    Updated(usize),
    Deleted(usize),
    CreatedTable,
    DroppedTable,
    CreatedIndex,
    DroppedIndex,
    Begun,
    Committed,
    RolledBack,
}

impl StatementResult {
    /// The wire-protocol command tag.
    pub fn command_tag(&self) -> String {
        match self {
            StatementResult::Empty => String::new(),
            StatementResult::Rows { rows, .. } => format!("SELECT {}", rows.len()),
            StatementResult::Inserted(n) => format!("INSERT 0 {n}"),
            StatementResult::Updated(n) => format!("UPDATE {n}"),
            StatementResult::Deleted(n) => format!("DELETE {n}"),
            StatementResult::CreatedTable => "CREATE TABLE".into(),
            StatementResult::DroppedTable => "DROP TABLE".into(),
            StatementResult::CreatedIndex => "CREATE INDEX".into(),
            StatementResult::DroppedIndex => "DROP INDEX".into(),
            StatementResult::Begun => "BEGIN".into(),
            StatementResult::Committed => "COMMIT".into(),
            StatementResult::RolledBack => "ROLLBACK".into(),
        }
    }
}

/// Per-connection transaction state.
#[derive(Default)]
pub struct Session {
    tx: Option<SessionTx>,
}

struct SessionTx {
    id: TxId,
    /// Command counter; bumps after every successful statement so later
    /// commands see earlier writes.
    cid: u32,
    /// Snapshot captured at BEGIN; every read in the transaction uses it,
    /// so concurrent commits never appear mid-transaction.
    snapshot: Snapshot,
    /// Set when a statement failed; everything except ROLLBACK (and
    /// COMMIT, which then rolls back) fails fast until the block ends.
    failed: bool,
}

impl Session {
    /// Creates a session with no transaction in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true inside an explicit transaction block.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Returns true when the current block has failed.
    pub fn failed(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.failed)
    }
}

/// The engine.
pub struct Engine {
    pager: Arc<PageManager>,
    catalog: Arc<Catalog>,
    txns: Arc<TransactionManager>,
    locks: Arc<LockManager>,
    tables: RwLock<HashMap<Oid, Arc<HeapTable>>>,
    indexes: RwLock<HashMap<Oid, Arc<BtreeIndex>>>,
}

impl Engine {
    /// Opens (or creates) a database under the configured data directory.
    ///
    /// Row locks fail fast by default; [`Engine::open_with_lock_timeout`]
    /// configures a bounded wait.
    pub fn open(config: &Config) -> Result<Self, EngineError> {
        Self::open_with_lock_timeout(config, Duration::ZERO)
    }

    /// Opens the engine with a specific lock-acquisition timeout.
    pub fn open_with_lock_timeout(
        config: &Config,
        lock_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let pager = Arc::new(PageManager::new(&config.data_dir, config.page_size)?);
        let catalog = Arc::new(Catalog::open(
            pager.data_dir().join("catalog.dat"),
        )?);

        // Transaction state is volatile, but the ids stamped into tuple
        // headers are not. Recover the high-water mark so fresh ids never
        // collide with stamps from a previous run.
        let mut high_txid = 1;
        for info in catalog.get_all_tables() {
            let heap = HeapTable::open(Arc::clone(&pager), &info.name)?;
            let mut scan = heap.scan();
            while let Some((_, header, _)) = scan.next_raw()? {
                high_txid = high_txid.max(header.xmin).max(header.xmax);
            }
        }

        Ok(Self {
            pager,
            catalog,
            txns: Arc::new(TransactionManager::with_next(high_txid + 1)),
            locks: Arc::new(LockManager::new(lock_timeout)),
            tables: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
        })
    }

    /// The system catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parses and executes one statement within `session`.
    pub fn execute(
        &self,
        sql: &str,
        session: &mut Session,
    ) -> Result<StatementResult, EngineError> {
        let Some(stmt) = parse(sql)? else {
            return Ok(StatementResult::Empty);
        };
        debug!(statement = %stmt, "executing");

        // Transaction control first; it is valid even in a failed block.
        match &stmt {
            Statement::Begin => {
                if session.tx.is_some() {
                    return Err(EngineError::Transaction(TxError::InvalidTransition {
                        txid: session.tx.as_ref().map(|t| t.id).unwrap_or(0),
                        current: crate::tx::TxState::Active,
                        attempted: crate::tx::TxState::Active,
                    }));
                }
                let id = self.txns.begin();
                let snapshot = self.txns.snapshot(id, 0);
                session.tx = Some(SessionTx {
                    id,
                    cid: 0,
                    snapshot,
                    failed: false,
                });
                return Ok(StatementResult::Begun);
            }
            Statement::Commit => {
                let Some(tx) = session.tx.take() else {
                    return Err(EngineError::Transaction(TxError::NoActiveTransaction));
                };
                if tx.failed {
                    // COMMIT of a failed block rolls back.
                    self.rollback_tx(tx.id)?;
                    return Ok(StatementResult::RolledBack);
                }
                self.txns.commit(tx.id)?;
                self.locks.release_all(tx.id);
                return Ok(StatementResult::Committed);
            }
            Statement::Rollback => {
                let Some(tx) = session.tx.take() else {
                    return Err(EngineError::Transaction(TxError::NoActiveTransaction));
                };
                self.rollback_tx(tx.id)?;
                return Ok(StatementResult::RolledBack);
            }
            _ => {}
        }

        if session.failed() {
            return Err(EngineError::Transaction(TxError::TransactionAborted));
        }

        // DDL is never grouped into an external transaction.
        match &stmt {
            Statement::CreateTable(create) => return self.create_table(create),
            Statement::DropTable(drop) => {
                return self.drop_table(&drop.name, drop.if_exists);
            }
            Statement::CreateIndex(create) => return self.create_index(create),
            Statement::DropIndex(drop) => {
                return self.drop_index(&drop.name, drop.if_exists);
            }
            _ => {}
        }

        // DML and SELECT run under the session transaction, or an
        // implicit one (auto-commit). The transaction's begin-time
        // snapshot is reused with the current command id.
        let (txid, snapshot, implicit) = match &session.tx {
            Some(tx) => {
                let mut snapshot = tx.snapshot.clone();
                snapshot.current_cid = tx.cid;
                (tx.id, snapshot, false)
            }
            None => {
                let txid = self.txns.begin();
                (txid, self.txns.snapshot(txid, 0), true)
            }
        };

        let result = self.dispatch(&stmt, txid, &snapshot);

        match (&result, implicit) {
            (Ok(_), true) => {
                self.txns.commit(txid)?;
                self.locks.release_all(txid);
            }
            (Ok(_), false) => {
                if let Some(tx) = session.tx.as_mut() {
                    tx.cid += 1;
                }
            }
            (Err(_), true) => {
                // Any error aborts the implicit transaction.
                self.rollback_tx(txid)?;
            }
            (Err(_), false) => {
                if let Some(tx) = session.tx.as_mut() {
                    tx.failed = true;
                }
            }
        }
        result
    }

    fn dispatch(
        &self,
        stmt: &Statement,
        txid: TxId,
        snapshot: &Snapshot,
    ) -> Result<StatementResult, EngineError> {
        match stmt {
            Statement::Select(select) => self.execute_select(select, snapshot),
            Statement::Insert(insert) => self.execute_insert(insert, txid, snapshot.current_cid),
            Statement::Update(update) => self.execute_update(update, txid, snapshot),
            Statement::Delete(delete) => self.execute_delete(delete, txid, snapshot),
            _ => Err(EngineError::Internal(
                "statement dispatched to the wrong path".into(),
            )),
        }
    }

    // -- SELECT ------------------------------------------------------------

    fn execute_select(
        &self,
        stmt: &SelectStmt,
        snapshot: &Snapshot,
    ) -> Result<StatementResult, EngineError> {
        if stmt.from.is_none() {
            return self.select_without_from(stmt);
        }

        let mut op = plan_select(
            stmt,
            &|name| self.table_binding(name),
            &self.txns,
            snapshot,
        )?;

        let columns = op.output_schema().columns.clone();
        let result = Self::drain_operator(&mut op);
        // close() runs on success and on error alike.
        op.close();
        let rows = result?;

        Ok(StatementResult::Rows { columns, rows })
    }

    fn drain_operator(op: &mut Operator) -> Result<Vec<Tuple>, EngineError> {
        op.open()?;
        let mut rows = Vec::new();
        while let Some(tuple) = op.next()? {
            rows.push(tuple);
        }
        Ok(rows)
    }

    /// `SELECT <exprs>` with no FROM: one row of evaluated expressions.
    fn select_without_from(&self, stmt: &SelectStmt) -> Result<StatementResult, EngineError> {
        let empty_tuple = Tuple::default();
        let empty_schema = Schema::default();

        if let Some(predicate) = &stmt.where_clause {
            if !eval_predicate(predicate, &empty_tuple, &empty_schema)? {
                let columns = stmt
                    .columns
                    .iter()
                    .map(|item| self.no_from_column(item))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(StatementResult::Rows {
                    columns,
                    rows: vec![],
                });
            }
        }

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for item in &stmt.columns {
            let SelectItem::Expr { expr, alias } = item else {
                return Err(EngineError::Catalog(CatalogError::Unsupported(
                    "SELECT * requires a FROM clause".into(),
                )));
            };
            let value = eval(expr, &empty_tuple, &empty_schema)?;
            let name = alias
                .clone()
                .unwrap_or_else(|| default_column_name(expr));
            columns.push(Column::new(name, value.kind()));
            values.push(value);
        }
        Ok(StatementResult::Rows {
            columns,
            rows: vec![Tuple::new(values)],
        })
    }

    fn no_from_column(&self, item: &SelectItem) -> Result<Column, EngineError> {
        let SelectItem::Expr { expr, alias } = item else {
            return Err(EngineError::Catalog(CatalogError::Unsupported(
                "SELECT * requires a FROM clause".into(),
            )));
        };
        Ok(Column::new(
            alias.clone().unwrap_or_else(|| default_column_name(expr)),
            ValueKind::Null,
        ))
    }

    // -- INSERT ------------------------------------------------------------

    fn execute_insert(
        &self,
        stmt: &InsertStmt,
        txid: TxId,
        cid: u32,
    ) -> Result<StatementResult, EngineError> {
        let info = self.table_info(&stmt.table)?;
        let heap = self.heap(&info)?;

        // Map the explicit column list (or the full schema) to positions.
        let positions: Vec<usize> = if stmt.columns.is_empty() {
            (0..info.columns.len()).collect()
        } else {
            stmt.columns
                .iter()
                .map(|name| {
                    info.find_column(name)
                        .ok_or_else(|| CatalogError::ColumnNotFound {
                            table: info.name.clone(),
                            column: name.clone(),
                        })
                })
                .collect::<Result<_, _>>()?
        };

        let empty_tuple = Tuple::default();
        let empty_schema = Schema::default();
        let mut inserted = 0usize;

        for row in &stmt.values {
            if row.len() != positions.len() {
                return Err(EngineError::Type(format!(
                    "INSERT expects {} values, got {}",
                    positions.len(),
                    row.len()
                )));
            }

            // Start from defaults, then place the provided values.
            let mut values: Vec<Value> = info
                .columns
                .iter()
                .map(|column| column.default.clone().unwrap_or(Value::Null))
                .collect();
            for (expr, &position) in row.iter().zip(positions.iter()) {
                values[position] = eval(expr, &empty_tuple, &empty_schema)?;
            }

            let tuple = self.check_row(&info, values)?;

            let tid = heap.insert(&tuple, txid, cid)?;
            self.locks.acquire(LockKey::new(info.oid, tid), txid)?;
            self.txns.push_undo(
                txid,
                UndoRecord::Insert {
                    table: info.oid,
                    tid,
                    tuple: tuple.clone(),
                },
            )?;
            self.maintain_indexes_insert(&info, &tuple, tid)?;
            inserted += 1;
        }

        self.refresh_stats(&info, &heap);
        Ok(StatementResult::Inserted(inserted))
    }

    /// Coerces a row to the table's column kinds and enforces NOT NULL and
    /// declared lengths.
    fn check_row(&self, info: &TableInfo, values: Vec<Value>) -> Result<Tuple, EngineError> {
        let mut checked = Vec::with_capacity(info.columns.len());
        for (column, value) in info.columns.iter().zip(values.into_iter()) {
            let value = value.coerce_to(column.kind)?;
            if value.is_null() && (!column.nullable || column.is_primary_key) {
                return Err(EngineError::Constraint(format!(
                    "null value in column {} violates not-null constraint",
                    column.name
                )));
            }
            if column.max_length > 0 {
                if let Some(s) = value.as_str() {
                    if s.chars().count() > column.max_length as usize {
                        return Err(TypeError::ValueTooLong {
                            max_length: column.max_length,
                            actual: s.chars().count(),
                        }
                        .into());
                    }
                }
            }
            checked.push(value);
        }
        Ok(Tuple::new(checked))
    }

    // -- UPDATE ------------------------------------------------------------

    fn execute_update(
        &self,
        stmt: &UpdateStmt,
        txid: TxId,
        snapshot: &Snapshot,
    ) -> Result<StatementResult, EngineError> {
        let cid = snapshot.current_cid;
        let info = self.table_info(&stmt.table)?;
        let heap = self.heap(&info)?;
        let schema = info.schema();

        let assignments: Vec<(usize, &Expr)> = stmt
            .assignments
            .iter()
            .map(|(name, expr)| {
                info.find_column(name)
                    .map(|position| (position, expr))
                    .ok_or_else(|| CatalogError::ColumnNotFound {
                        table: info.name.clone(),
                        column: name.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        // Phase one: collect targets. Mutating during the driving scan
        // would revisit our own writes (the Halloween problem).
        let targets =
            self.collect_targets(&heap, &schema, stmt.where_clause.as_ref(), snapshot)?;

        // Phase two: apply.
        let mut updated = 0usize;
        for (tid, old_tuple) in targets {
            self.locks.acquire(LockKey::new(info.oid, tid), txid)?;

            let mut values = old_tuple.values.clone();
            for (position, expr) in &assignments {
                values[*position] = eval(expr, &old_tuple, &schema)?;
            }
            let new_tuple = self.check_row(&info, values)?;

            let new_tid = heap.update(tid, &new_tuple, txid, txid, cid)?;
            self.locks.acquire(LockKey::new(info.oid, new_tid), txid)?;
            self.txns.push_undo(
                txid,
                UndoRecord::Update {
                    table: info.oid,
                    old_tid: tid,
                    new_tid,
                    old_tuple: old_tuple.clone(),
                    new_tuple: new_tuple.clone(),
                },
            )?;

            self.maintain_indexes_delete(&info, &old_tuple, tid)?;
            self.maintain_indexes_insert(&info, &new_tuple, new_tid)?;
            updated += 1;
        }

        self.refresh_stats(&info, &heap);
        Ok(StatementResult::Updated(updated))
    }

    // -- DELETE ------------------------------------------------------------

    fn execute_delete(
        &self,
        stmt: &DeleteStmt,
        txid: TxId,
        snapshot: &Snapshot,
    ) -> Result<StatementResult, EngineError> {
        let info = self.table_info(&stmt.table)?;
        let heap = self.heap(&info)?;
        let schema = info.schema();

        let targets =
            self.collect_targets(&heap, &schema, stmt.where_clause.as_ref(), snapshot)?;

        let mut deleted = 0usize;
        for (tid, old_tuple) in targets {
            self.locks.acquire(LockKey::new(info.oid, tid), txid)?;
            if !heap.remove(tid, txid)? {
                continue;
            }
            self.txns.push_undo(
                txid,
                UndoRecord::Delete {
                    table: info.oid,
                    tid,
                    tuple: old_tuple.clone(),
                },
            )?;
            self.maintain_indexes_delete(&info, &old_tuple, tid)?;
            deleted += 1;
        }

        self.refresh_stats(&info, &heap);
        Ok(StatementResult::Deleted(deleted))
    }

    /// Phase one of UPDATE/DELETE: the visible tuples matching WHERE.
    fn collect_targets(
        &self,
        heap: &HeapTable,
        schema: &Schema,
        predicate: Option<&Expr>,
        snapshot: &Snapshot,
    ) -> Result<Vec<(TupleId, Tuple)>, EngineError> {
        let view = SnapshotView::new(snapshot, &self.txns);
        let mut targets = Vec::new();
        let mut scan = heap.scan();
        while let Some((tid, tuple)) = scan.next_visible(&view)? {
            let matches = match predicate {
                Some(predicate) => eval_predicate(predicate, &tuple, schema)?,
                None => true,
            };
            if matches {
                targets.push((tid, tuple));
            }
        }
        Ok(targets)
    }

    // -- DDL ---------------------------------------------------------------

    fn create_table(&self, stmt: &CreateTableStmt) -> Result<StatementResult, EngineError> {
        if self.catalog.table_exists_by_name(&stmt.name) {
            if stmt.if_not_exists {
                return Ok(StatementResult::CreatedTable);
            }
            return Err(CatalogError::DuplicateTable(stmt.name.clone()).into());
        }

        let primary_keys: Vec<&str> = stmt
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        if primary_keys.len() > 1 {
            return Err(CatalogError::Unsupported(
                "multi-column primary keys are not supported".into(),
            )
            .into());
        }

        let empty_tuple = Tuple::default();
        let empty_schema = Schema::default();
        let mut columns = Vec::with_capacity(stmt.columns.len());
        for def in &stmt.columns {
            let default = def
                .default
                .as_ref()
                .map(|expr| {
                    eval(expr, &empty_tuple, &empty_schema)
                        .map_err(EngineError::from)
                        .and_then(|v| v.coerce_to(def.kind).map_err(EngineError::from))
                })
                .transpose()?;
            columns.push(Column {
                name: def.name.clone(),
                kind: def.kind,
                nullable: !def.not_null && !def.primary_key,
                is_primary_key: def.primary_key,
                default,
                max_length: def.max_length,
                source: None,
            });
        }

        let table_id = self.catalog.create_table(&stmt.name, columns)?;
        // Materialize the heap file so the table survives an empty restart.
        let heap = Arc::new(HeapTable::open(Arc::clone(&self.pager), &stmt.name)?);
        self.tables.write().insert(table_id, heap);

        // Implicit indexes: the primary key and each UNIQUE column.
        for def in &stmt.columns {
            let position = stmt
                .columns
                .iter()
                .position(|c| c.name == def.name)
                .unwrap_or(0) as u16;
            if def.primary_key {
                let name = format!("{}_pkey", stmt.name);
                self.create_index_entry(&stmt.name, table_id, &name, position, true, true)?;
            } else if def.unique {
                let name = format!("{}_{}_key", stmt.name, def.name);
                self.create_index_entry(&stmt.name, table_id, &name, position, true, false)?;
            }
        }

        debug!(table = %stmt.name, oid = table_id, "created table");
        Ok(StatementResult::CreatedTable)
    }

    fn create_index_entry(
        &self,
        table_name: &str,
        table_id: Oid,
        index_name: &str,
        position: u16,
        unique: bool,
        primary: bool,
    ) -> Result<(), EngineError> {
        let index_id = self.catalog.create_index(
            index_name,
            table_id,
            vec![position],
            IndexType::BTree,
            unique,
            primary,
        )?;
        let btree = Arc::new(BtreeIndex::open(
            Arc::clone(&self.pager),
            table_name,
            index_name,
            unique,
        )?);
        self.indexes.write().insert(index_id, btree);
        Ok(())
    }

    fn drop_table(&self, name: &str, if_exists: bool) -> Result<StatementResult, EngineError> {
        let Some(info) = self.catalog.get_table_by_name(name) else {
            if if_exists {
                return Ok(StatementResult::DroppedTable);
            }
            return Err(CatalogError::TableNotFound(name.to_string()).into());
        };

        let info = self.catalog.drop_table(info.oid)?;
        self.tables.write().remove(&info.oid);
        self.pager.remove(&info.filename)?;
        for index in &info.indexes {
            self.indexes.write().remove(&index.oid);
            self.pager.remove(&index.filename(&info.name))?;
        }
        debug!(table = %info.name, "dropped table");
        Ok(StatementResult::DroppedTable)
    }

    fn create_index(&self, stmt: &CreateIndexStmt) -> Result<StatementResult, EngineError> {
        let info = self.table_info(&stmt.table)?;
        if stmt.columns.len() != 1 {
            return Err(CatalogError::Unsupported(
                "multi-column indexes are not supported".into(),
            )
            .into());
        }
        let position = info.find_column(&stmt.columns[0]).ok_or_else(|| {
            CatalogError::ColumnNotFound {
                table: info.name.clone(),
                column: stmt.columns[0].clone(),
            }
        })? as u16;

        self.create_index_entry(
            &info.name,
            info.oid,
            &stmt.name,
            position,
            stmt.unique,
            false,
        )?;

        // Backfill from the committed table contents.
        let backfill = (|| -> Result<(), EngineError> {
            let heap = self.heap(&info)?;
            let index = {
                let (_, index_info) = self
                    .catalog
                    .get_index_by_name(&stmt.name)
                    .ok_or_else(|| CatalogError::IndexNotFound(stmt.name.clone()))?;
                self.index(&info.name, &index_info)?
            };
            let reader = self.txns.begin();
            let snapshot = self.txns.snapshot(reader, 0);
            let result = (|| -> Result<(), EngineError> {
                let view = SnapshotView::new(&snapshot, &self.txns);
                let mut scan = heap.scan();
                while let Some((tid, tuple)) = scan.next_visible(&view)? {
                    if let Some(key) = IndexKey::from_value(tuple.get(position as usize)) {
                        index.insert(key, tid)?;
                    }
                }
                Ok(())
            })();
            self.txns.commit(reader)?;
            result
        })();

        if let Err(e) = backfill {
            // Unwind the half-created index before reporting the failure.
            if let Ok((_, dropped)) = self.catalog.drop_index(&stmt.name) {
                self.indexes.write().remove(&dropped.oid);
            }
            let _ = self
                .pager
                .remove(&format!("{}_{}.idx", info.name, stmt.name));
            return Err(e);
        }

        debug!(index = %stmt.name, table = %info.name, "created index");
        Ok(StatementResult::CreatedIndex)
    }

    fn drop_index(&self, name: &str, if_exists: bool) -> Result<StatementResult, EngineError> {
        match self.catalog.drop_index(name) {
            Ok((table_name, index)) => {
                self.indexes.write().remove(&index.oid);
                self.pager.remove(&index.filename(&table_name))?;
                Ok(StatementResult::DroppedIndex)
            }
            Err(CatalogError::IndexNotFound(_)) if if_exists => {
                Ok(StatementResult::DroppedIndex)
            }
            Err(e) => Err(e.into()),
        }
    }

    // -- services ----------------------------------------------------------

    fn table_info(&self, name: &str) -> Result<TableInfo, EngineError> {
        self.catalog
            .get_table_by_name(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()).into())
    }

    fn heap(&self, info: &TableInfo) -> Result<Arc<HeapTable>, EngineError> {
        if let Some(heap) = self.tables.read().get(&info.oid) {
            return Ok(Arc::clone(heap));
        }
        let heap = Arc::new(HeapTable::open(Arc::clone(&self.pager), &info.name)?);
        self.tables.write().insert(info.oid, Arc::clone(&heap));
        Ok(heap)
    }

    fn index(&self, table_name: &str, info: &IndexInfo) -> Result<Arc<BtreeIndex>, EngineError> {
        if let Some(index) = self.indexes.read().get(&info.oid) {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(BtreeIndex::open(
            Arc::clone(&self.pager),
            table_name,
            &info.name,
            info.is_unique,
        )?);
        self.indexes.write().insert(info.oid, Arc::clone(&index));
        Ok(index)
    }

    fn table_binding(&self, name: &str) -> Result<TableBinding, EngineError> {
        let info = self.table_info(name)?;
        let heap = self.heap(&info)?;
        let mut indexes = Vec::with_capacity(info.indexes.len());
        for index_info in &info.indexes {
            if index_info.index_type == IndexType::BTree {
                indexes.push((index_info.clone(), self.index(&info.name, index_info)?));
            }
        }
        Ok(TableBinding {
            info,
            heap,
            indexes,
        })
    }

    /// Inserts index entries for every executable index of the table.
    fn maintain_indexes_insert(
        &self,
        info: &TableInfo,
        tuple: &Tuple,
        tid: TupleId,
    ) -> Result<(), EngineError> {
        for index_info in &info.indexes {
            if index_info.index_type != IndexType::BTree {
                continue;
            }
            let Some(&position) = index_info.column_positions.first() else {
                continue;
            };
            if let Some(key) = IndexKey::from_value(tuple.get(position as usize)) {
                let index = self.index(&info.name, index_info)?;
                index.insert(key, tid)?;
            }
        }
        Ok(())
    }

    /// Removes index entries for every executable index of the table.
    fn maintain_indexes_delete(
        &self,
        info: &TableInfo,
        tuple: &Tuple,
        tid: TupleId,
    ) -> Result<(), EngineError> {
        for index_info in &info.indexes {
            if index_info.index_type != IndexType::BTree {
                continue;
            }
            let Some(&position) = index_info.column_positions.first() else {
                continue;
            };
            if let Some(key) = IndexKey::from_value(tuple.get(position as usize)) {
                let index = self.index(&info.name, index_info)?;
                index.delete(&key, tid)?;
            }
        }
        Ok(())
    }

    fn refresh_stats(&self, info: &TableInfo, heap: &HeapTable) {
        // Statistics are advisory; failures must not fail the statement.
        if let Ok(count) = heap.tuple_count() {
            let _ = self.catalog.update_table_stats(info.oid, count);
        }
    }

    /// Aborts a transaction: replays the undo log in reverse, then
    /// releases its locks.
    fn rollback_tx(&self, txid: TxId) -> Result<(), EngineError> {
        let undo = self.txns.abort(txid)?;
        for record in undo.iter().rev() {
            match record {
                UndoRecord::Insert { table, tid, tuple } => {
                    if let Some(info) = self.catalog.get_table(*table) {
                        self.maintain_indexes_delete(&info, tuple, *tid)?;
                        let heap = self.heap(&info)?;
                        heap.erase(*tid)?;
                    }
                }
                UndoRecord::Delete { table, tid, tuple } => {
                    if let Some(info) = self.catalog.get_table(*table) {
                        let heap = self.heap(&info)?;
                        heap.clear_xmax(*tid)?;
                        self.maintain_indexes_insert(&info, tuple, *tid)?;
                    }
                }
                UndoRecord::Update {
                    table,
                    old_tid,
                    new_tid,
                    old_tuple,
                    new_tuple,
                } => {
                    if let Some(info) = self.catalog.get_table(*table) {
                        let heap = self.heap(&info)?;
                        // Unhook the new version.
                        self.maintain_indexes_delete(&info, new_tuple, *new_tid)?;
                        heap.erase(*new_tid)?;
                        // Resurrect the old chain terminal.
                        heap.clear_xmax(*old_tid)?;
                        heap.reset_ctid(*old_tid)?;
                        self.maintain_indexes_insert(&info, old_tuple, *old_tid)?;
                    }
                }
            }
        }
        self.locks.release_all(txid);
        debug!(txid, undo_records = undo.len(), "rolled back");
        Ok(())
    }
}

/// Column name for an expression-only SELECT item.
fn default_column_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { name, .. } => name.clone(),
        other => other.to_string(),
    }
}
