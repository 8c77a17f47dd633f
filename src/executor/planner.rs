//! SELECT planning: AST to operator tree.
//!
//! The pipeline is fixed and bottom-up: base scan (SeqScan, or IndexScan
//! when the WHERE clause pins the leading key of a B-tree index with an
//! equality against a literal), Filter for WHERE, Aggregate when GROUP BY
//! is present or the projection/HAVING mention an aggregate, Filter for
//! HAVING, Sort for ORDER BY, Project for the SELECT list (after
//! aggregation, so projections may reference aggregate outputs), and
//! Limit for LIMIT/OFFSET.

use std::sync::Arc;

use crate::btree::{BtreeIndex, IndexKey};
use crate::catalog::{IndexInfo, IndexType, TableInfo};
use crate::error::EngineError;
use crate::heap::HeapTable;
use crate::sql::{
    is_aggregate_name, BinaryOperator, Expr, OrderByItem, SelectItem, SelectStmt, TableRef,
};
use crate::tx::{Snapshot, TransactionManager};
use crate::value::{Column, Schema, Tuple, Value, ValueKind};

use super::eval::eval;
use super::node::{
    AggFunc, AggSpec, AggregateOp, FilterOp, HashJoinOp, IndexLookup, IndexScan, LimitOp,
    Operator, ProjectOp, SeqScan, SortOp,
};

/// Everything the planner needs to know about one resolved table.
pub struct TableBinding {
    pub info: TableInfo,
    pub heap: Arc<HeapTable>,
    /// The table's indexes with their open B-trees.
    pub indexes: Vec<(IndexInfo, Arc<BtreeIndex>)>,
}

/// Resolves a table name to its binding.
pub type TableResolver<'a> = dyn Fn(&str) -> Result<TableBinding, EngineError> + 'a;

/// Plans a SELECT statement into an operator tree.
///
/// The statement must have a FROM clause; expression-only selects are
/// evaluated directly by the engine without an operator tree.
pub fn plan_select(
    stmt: &SelectStmt,
    resolve: &TableResolver<'_>,
    txns: &Arc<TransactionManager>,
    snapshot: &Snapshot,
) -> Result<Operator, EngineError> {
    let from = stmt
        .from
        .as_ref()
        .ok_or_else(|| EngineError::Internal("planner requires a FROM clause".into()))?;

    // 1. Base access path (plus join when FROM is a join).
    let mut op = plan_from(from, stmt.where_clause.as_ref(), resolve, txns, snapshot)?;

    // 2. WHERE.
    if let Some(predicate) = &stmt.where_clause {
        op = Operator::Filter(FilterOp::new(op, predicate.clone()));
    }

    // 3. Aggregate, with projection/HAVING/ORDER BY rewritten to reference
    //    the aggregate output by name.
    let needs_aggregate = !stmt.group_by.is_empty()
        || stmt.columns.iter().any(|item| match item {
            SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
            SelectItem::Wildcard => false,
        })
        || stmt.having.as_ref().is_some_and(Expr::contains_aggregate);

    let mut select_items: Vec<SelectItem> = stmt.columns.clone();
    let mut order_by: Vec<OrderByItem> = stmt.order_by.clone();
    let mut having = stmt.having.clone();

    if needs_aggregate {
        let input_schema = op.output_schema().clone();

        let mut aggs: Vec<AggSpec> = Vec::new();
        for item in &select_items {
            if let SelectItem::Expr { expr, .. } = item {
                collect_aggregates(expr, &mut aggs);
            }
        }
        if let Some(having_expr) = &having {
            collect_aggregates(having_expr, &mut aggs);
        }

        // Output schema: group columns first, aggregates after, in
        // declared order.
        let mut columns = Vec::new();
        for group_expr in &stmt.group_by {
            columns.push(Column::new(
                expr_name(group_expr),
                infer_kind(group_expr, &input_schema),
            ));
        }
        for spec in &aggs {
            let kind = match spec.func {
                AggFunc::Count => ValueKind::Int64,
                AggFunc::Avg => ValueKind::Float64,
                _ => spec
                    .arg
                    .as_ref()
                    .map(|arg| infer_kind(arg, &input_schema))
                    .unwrap_or(ValueKind::Null),
            };
            columns.push(Column::new(spec.name.clone(), kind));
        }
        let agg_schema = Schema::new(columns);

        for item in &mut select_items {
            if let SelectItem::Expr { expr, .. } = item {
                *expr = rewrite_agg_refs(expr, &stmt.group_by);
            }
        }
        for item in &mut order_by {
            item.expr = rewrite_agg_refs(&item.expr, &stmt.group_by);
        }
        if let Some(having_expr) = having.take() {
            having = Some(rewrite_agg_refs(&having_expr, &stmt.group_by));
        }

        op = Operator::Aggregate(AggregateOp::new(
            op,
            stmt.group_by.clone(),
            aggs,
            agg_schema,
        ));

        if let Some(having_expr) = having {
            op = Operator::Filter(FilterOp::new(op, having_expr));
        }
    }

    // 4. ORDER BY.
    if !order_by.is_empty() {
        let keys = order_by
            .iter()
            .map(|item| (item.expr.clone(), item.desc))
            .collect();
        op = Operator::Sort(SortOp::new(op, keys));
    }

    // 5. Projection (after aggregation and sort).
    let input_schema = op.output_schema().clone();
    let mut exprs = Vec::new();
    let mut columns = Vec::new();
    for item in &select_items {
        match item {
            SelectItem::Wildcard => {
                for column in &input_schema.columns {
                    exprs.push(Expr::Column {
                        table: column.source.clone(),
                        name: column.name.clone(),
                    });
                    columns.push(column.clone());
                }
            }
            SelectItem::Expr { expr, alias } => {
                let name = alias.clone().unwrap_or_else(|| expr_name(expr));
                let mut column = Column::new(name, infer_kind(expr, &input_schema));
                column.source = None;
                columns.push(column);
                exprs.push(expr.clone());
            }
        }
    }
    op = Operator::Project(ProjectOp::new(
        op,
        exprs,
        Schema::new(columns),
        stmt.distinct,
    ));

    // 6. LIMIT / OFFSET.
    if stmt.limit.is_some() || stmt.offset.is_some() {
        let limit = stmt
            .limit
            .as_ref()
            .map(|expr| const_nonnegative(expr, "LIMIT"))
            .transpose()?;
        let offset = stmt
            .offset
            .as_ref()
            .map(|expr| const_nonnegative(expr, "OFFSET"))
            .transpose()?
            .unwrap_or(0);
        op = Operator::Limit(LimitOp::new(op, limit, offset));
    }

    Ok(op)
}

/// Plans the FROM clause: a single scan, or a hash equijoin of two.
fn plan_from(
    from: &TableRef,
    where_clause: Option<&Expr>,
    resolve: &TableResolver<'_>,
    txns: &Arc<TransactionManager>,
    snapshot: &Snapshot,
) -> Result<Operator, EngineError> {
    match from {
        TableRef::Table { name, alias } => {
            let binding = resolve(name)?;
            let schema = binding_schema(&binding.info, alias.as_deref());

            // Prefer an index scan when a WHERE conjunct pins the leading
            // key of a B-tree index with `column = literal`.
            if let Some(predicate) = where_clause {
                if let Some((index, key)) = find_index_equality(predicate, &binding, &schema) {
                    return Ok(Operator::IndexScan(IndexScan::new(
                        index,
                        binding.heap,
                        schema,
                        IndexLookup::Eq(key),
                        snapshot.clone(),
                        Arc::clone(txns),
                    )));
                }
            }

            Ok(Operator::SeqScan(SeqScan::new(
                binding.heap,
                schema,
                snapshot.clone(),
                Arc::clone(txns),
            )))
        }
        TableRef::Join { left, right, on } => {
            let (TableRef::Table { name: ln, alias: la }, TableRef::Table { name: rn, alias: ra }) =
                (left.as_ref(), right.as_ref())
            else {
                return Err(EngineError::Internal(
                    "nested joins are not supported".into(),
                ));
            };
            let left_binding = resolve(ln)?;
            let right_binding = resolve(rn)?;
            let left_schema = binding_schema(&left_binding.info, la.as_deref());
            let right_schema = binding_schema(&right_binding.info, ra.as_deref());

            let (left_key, right_key) = split_join_keys(on, &left_schema, &right_schema)?;

            let left_op = Operator::SeqScan(SeqScan::new(
                left_binding.heap,
                left_schema.clone(),
                snapshot.clone(),
                Arc::clone(txns),
            ));
            let right_op = Operator::SeqScan(SeqScan::new(
                right_binding.heap,
                right_schema.clone(),
                snapshot.clone(),
                Arc::clone(txns),
            ));

            Ok(Operator::HashJoin(HashJoinOp::new(
                left_op,
                right_op,
                left_key,
                right_key,
                left_schema.concat(&right_schema),
            )))
        }
    }
}

/// The table's schema with every column tagged by its binding name
/// (the alias when present).
fn binding_schema(info: &TableInfo, alias: Option<&str>) -> Schema {
    let source = alias.unwrap_or(&info.name).to_string();
    Schema::new(
        info.columns
            .iter()
            .map(|c| {
                let mut column = c.clone();
                column.source = Some(source.clone());
                column
            })
            .collect(),
    )
}

/// Splits a join condition `a = b` into (left key, right key) by resolving
/// each side against the input schemas.
fn split_join_keys(
    on: &Expr,
    left_schema: &Schema,
    right_schema: &Schema,
) -> Result<(Expr, Expr), EngineError> {
    let Expr::BinaryOp {
        left,
        op: BinaryOperator::Eq,
        right,
    } = on
    else {
        return Err(EngineError::Internal(
            "join condition must be an equality".into(),
        ));
    };

    let belongs = |expr: &Expr, schema: &Schema| -> bool {
        match expr {
            Expr::Column { table: Some(t), name } => schema.find_qualified(t, name).is_some(),
            Expr::Column { table: None, name } => schema.find_column(name).is_some(),
            _ => false,
        }
    };

    if belongs(left, left_schema) && belongs(right, right_schema) {
        Ok(((**left).clone(), (**right).clone()))
    } else if belongs(right, left_schema) && belongs(left, right_schema) {
        Ok(((**right).clone(), (**left).clone()))
    } else {
        Err(EngineError::Internal(
            "join condition must reference one column from each side".into(),
        ))
    }
}

/// Finds a top-level-AND conjunct `column = literal` whose column is the
/// leading key of an executable (B-tree) index.
fn find_index_equality(
    predicate: &Expr,
    binding: &TableBinding,
    schema: &Schema,
) -> Option<(Arc<BtreeIndex>, IndexKey)> {
    let mut conjuncts = Vec::new();
    split_conjuncts(predicate, &mut conjuncts);

    for conjunct in conjuncts {
        let Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } = conjunct
        else {
            continue;
        };
        let (column_expr, literal) = match (literal_value(left), literal_value(right)) {
            (None, Some(value)) => (left.as_ref(), value),
            (Some(value), None) => (right.as_ref(), value),
            _ => continue,
        };
        let Expr::Column { table, name } = column_expr else {
            continue;
        };
        let position = match table {
            Some(t) => schema.find_qualified(t, name),
            None => schema.find_column(name),
        };
        let Some(position) = position else {
            continue;
        };
        let Some(key) = IndexKey::from_value(&literal) else {
            continue;
        };

        for (info, index) in &binding.indexes {
            if info.index_type == IndexType::BTree
                && info.column_positions.first() == Some(&(position as u16))
            {
                return Some((Arc::clone(index), key));
            }
        }
    }
    None
}

/// Collects top-level AND conjuncts.
fn split_conjuncts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if let Expr::BinaryOp {
        left,
        op: BinaryOperator::And,
        right,
    } = expr
    {
        split_conjuncts(left, out);
        split_conjuncts(right, out);
    } else {
        out.push(expr);
    }
}

/// Evaluates a literal-only expression to a value, or `None` if it
/// references anything.
fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Integer(_) | Expr::Float(_) | Expr::String(_) | Expr::Boolean(_) => {
            eval(expr, &Tuple::default(), &Schema::default()).ok()
        }
        _ => None,
    }
}

/// Collects aggregate calls, deduplicated by display name.
fn collect_aggregates(expr: &Expr, out: &mut Vec<AggSpec>) {
    match expr {
        Expr::Function {
            name,
            args,
            distinct,
            star,
        } if is_aggregate_name(name) => {
            let display = expr.to_string();
            if out.iter().any(|spec| spec.name == display) {
                return;
            }
            let func = AggFunc::from_name(name).expect("aggregate name checked");
            out.push(AggSpec {
                func,
                arg: if *star { None } else { args.first().cloned() },
                distinct: *distinct,
                name: display,
            });
        }
        Expr::Function { args, .. } => {
            for arg in args {
                collect_aggregates(arg, out);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_aggregates(left, out);
            collect_aggregates(right, out);
        }
        Expr::UnaryOp { operand, .. } => collect_aggregates(operand, out),
        Expr::IsNull { expr, .. } => collect_aggregates(expr, out),
        Expr::InList { expr, list, .. } => {
            collect_aggregates(expr, out);
            for item in list {
                collect_aggregates(item, out);
            }
        }
        _ => {}
    }
}

/// Rewrites an expression to run above the Aggregate operator: subtrees
/// matching a GROUP BY expression or an aggregate call become column
/// references into the aggregate's output schema.
fn rewrite_agg_refs(expr: &Expr, group_by: &[Expr]) -> Expr {
    for group_expr in group_by {
        if expr == group_expr {
            return Expr::Column {
                table: None,
                name: expr_name(group_expr),
            };
        }
    }
    match expr {
        Expr::Function { name, .. } if is_aggregate_name(name) => Expr::Column {
            table: None,
            name: expr.to_string(),
        },
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(rewrite_agg_refs(left, group_by)),
            op: *op,
            right: Box::new(rewrite_agg_refs(right, group_by)),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op: *op,
            operand: Box::new(rewrite_agg_refs(operand, group_by)),
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(rewrite_agg_refs(expr, group_by)),
            negated: *negated,
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(rewrite_agg_refs(expr, group_by)),
            list: list.iter().map(|e| rewrite_agg_refs(e, group_by)).collect(),
            negated: *negated,
        },
        Expr::Function {
            name,
            args,
            distinct,
            star,
        } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|e| rewrite_agg_refs(e, group_by)).collect(),
            distinct: *distinct,
            star: *star,
        },
        other => other.clone(),
    }
}

/// The output column name for an expression: bare column names stay
/// themselves, everything else uses the canonical display form.
fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { table: None, name } => name.clone(),
        Expr::Column {
            table: Some(table),
            name,
        } => format!("{table}.{name}"),
        other => other.to_string(),
    }
}

/// Best-effort output kind of an expression against a schema. Unknown
/// shapes report `Null`, which the wire layer renders as text.
fn infer_kind(expr: &Expr, schema: &Schema) -> ValueKind {
    match expr {
        Expr::Integer(_) => ValueKind::Int64,
        Expr::Float(_) => ValueKind::Float64,
        Expr::String(_) => ValueKind::Text,
        Expr::Boolean(_) => ValueKind::Bool,
        Expr::Column { table, name } => {
            let position = match table {
                Some(t) => schema.find_qualified(t, name),
                None => schema.find_column(name),
            };
            position
                .map(|i| schema.columns[i].kind)
                .unwrap_or(ValueKind::Null)
        }
        Expr::Function { name, .. } if name == "COUNT" => ValueKind::Int64,
        Expr::IsNull { .. } => ValueKind::Bool,
        _ => ValueKind::Null,
    }
}

/// Const-evaluates a LIMIT/OFFSET expression to a non-negative integer.
fn const_nonnegative(expr: &Expr, clause: &str) -> Result<u64, EngineError> {
    let value = eval(expr, &Tuple::default(), &Schema::default())?;
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n as u64),
        _ => Err(EngineError::Type(format!(
            "{clause} must be a non-negative integer"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::sql::{parse, Statement};
    use crate::storage::PageManager;
    use tempfile::tempdir;

    struct Env {
        _dir: tempfile::TempDir,
        pager: Arc<PageManager>,
        catalog: Catalog,
        txns: Arc<TransactionManager>,
    }

    impl Env {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let pager = Arc::new(PageManager::new(dir.path(), 4096).unwrap());
            let catalog = Catalog::open(dir.path().join("catalog.dat")).unwrap();
            Self {
                _dir: dir,
                pager,
                catalog,
                txns: Arc::new(TransactionManager::new()),
            }
        }

        fn create_table(&self, name: &str, columns: Vec<Column>) -> TableBinding {
            self.catalog.create_table(name, columns).unwrap();
            self.binding(name)
        }

        fn binding(&self, name: &str) -> TableBinding {
            let info = self.catalog.get_table_by_name(name).unwrap();
            let heap = Arc::new(HeapTable::open(Arc::clone(&self.pager), name).unwrap());
            let indexes = info
                .indexes
                .iter()
                .map(|index_info| {
                    let btree = Arc::new(
                        BtreeIndex::open(
                            Arc::clone(&self.pager),
                            name,
                            &index_info.name,
                            index_info.is_unique,
                        )
                        .unwrap(),
                    );
                    (index_info.clone(), btree)
                })
                .collect();
            TableBinding {
                info,
                heap,
                indexes,
            }
        }

        fn plan(&self, sql: &str) -> Result<Operator, EngineError> {
            let Some(Statement::Select(select)) = parse(sql).unwrap() else {
                panic!("expected SELECT");
            };
            let tx = self.txns.begin();
            let snapshot = self.txns.snapshot(tx, 1);
            plan_select(
                &select,
                &|name| Ok(self.binding(name)),
                &self.txns,
                &snapshot,
            )
        }

        fn run(&self, sql: &str) -> Vec<Tuple> {
            let mut op = self.plan(sql).unwrap();
            op.open().unwrap();
            let mut rows = Vec::new();
            while let Some(tuple) = op.next().unwrap() {
                rows.push(tuple);
            }
            op.close();
            rows
        }
    }

    fn users_columns() -> Vec<Column> {
        vec![
            Column::new("id", ValueKind::Int64),
            Column::new("age", ValueKind::Int64),
        ]
    }

    fn seed_users(env: &Env, binding: &TableBinding) {
        let writer = env.txns.begin();
        for (id, age) in [(1, 20), (2, 30), (3, 40)] {
            binding
                .heap
                .insert(
                    &Tuple::new(vec![Value::Int64(id), Value::Int64(age)]),
                    writer,
                    0,
                )
                .unwrap();
        }
        env.txns.commit(writer).unwrap();
    }

    #[test]
    fn test_filter_pipeline() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        seed_users(&env, &binding);

        let rows = env.run("SELECT id FROM users WHERE age > 25");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Tuple::new(vec![Value::Int64(2)]));
        assert_eq!(rows[1], Tuple::new(vec![Value::Int64(3)]));
    }

    #[test]
    fn test_wildcard_projection() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        seed_users(&env, &binding);

        let rows = env.run("SELECT * FROM users");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_order_by_pre_projection_column() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        seed_users(&env, &binding);

        // ORDER BY references a column the projection drops: legal, since
        // Sort runs below Project.
        let rows = env.run("SELECT id FROM users ORDER BY age DESC");
        assert_eq!(
            rows,
            vec![
                Tuple::new(vec![Value::Int64(3)]),
                Tuple::new(vec![Value::Int64(2)]),
                Tuple::new(vec![Value::Int64(1)]),
            ]
        );
    }

    #[test]
    fn test_aggregate_rewrite() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        seed_users(&env, &binding);

        let rows = env.run("SELECT COUNT(*), SUM(age) FROM users");
        assert_eq!(
            rows,
            vec![Tuple::new(vec![Value::Int64(3), Value::Int64(90)])]
        );

        // Projection arithmetic over an aggregate output.
        let rows = env.run("SELECT COUNT(*) + 1 FROM users");
        assert_eq!(rows, vec![Tuple::new(vec![Value::Int64(4)])]);
    }

    #[test]
    fn test_group_by_having() {
        let env = Env::new();
        let binding = env.create_table(
            "agg_test",
            vec![
                Column::new("cat", ValueKind::Text),
                Column::new("val", ValueKind::Int64),
            ],
        );
        let writer = env.txns.begin();
        for (cat, val) in [("A", 10), ("A", 20), ("B", 5)] {
            binding
                .heap
                .insert(
                    &Tuple::new(vec![Value::Text(cat.into()), Value::Int64(val)]),
                    writer,
                    0,
                )
                .unwrap();
        }
        env.txns.commit(writer).unwrap();

        let mut rows = env.run("SELECT cat, COUNT(val), SUM(val) FROM agg_test GROUP BY cat");
        rows.sort_by_key(|t| t.values[0].to_string());
        assert_eq!(
            rows,
            vec![
                Tuple::new(vec![
                    Value::Text("A".into()),
                    Value::Int64(2),
                    Value::Int64(30)
                ]),
                Tuple::new(vec![
                    Value::Text("B".into()),
                    Value::Int64(1),
                    Value::Int64(5)
                ]),
            ]
        );

        let rows = env.run("SELECT cat FROM agg_test GROUP BY cat HAVING SUM(val) > 10");
        assert_eq!(rows, vec![Tuple::new(vec![Value::Text("A".into())])]);
    }

    #[test]
    fn test_limit_offset() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        seed_users(&env, &binding);

        let rows = env.run("SELECT id FROM users ORDER BY id LIMIT 1 OFFSET 1");
        assert_eq!(rows, vec![Tuple::new(vec![Value::Int64(2)])]);

        assert!(matches!(
            env.plan("SELECT id FROM users LIMIT -1"),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn test_index_equality_selects_index_scan() {
        let env = Env::new();
        env.catalog.create_table("users", users_columns()).unwrap();
        let info = env.catalog.get_table_by_name("users").unwrap();
        env.catalog
            .create_index("users_id_idx", info.oid, vec![0], IndexType::BTree, false, false)
            .unwrap();

        let binding = env.binding("users");
        let writer = env.txns.begin();
        for (id, age) in [(1i64, 20i64), (2, 30), (3, 40)] {
            let tid = binding
                .heap
                .insert(
                    &Tuple::new(vec![Value::Int64(id), Value::Int64(age)]),
                    writer,
                    0,
                )
                .unwrap();
            binding.indexes[0].1.insert(IndexKey::Int(id), tid).unwrap();
        }
        env.txns.commit(writer).unwrap();

        let plan = env.plan("SELECT age FROM users WHERE id = 2").unwrap();
        fn base_is_index_scan(op: &Operator) -> bool {
            match op {
                Operator::IndexScan(_) => true,
                Operator::Filter(f) => base_is_index_scan(&f.child),
                Operator::Project(p) => base_is_index_scan(&p.child),
                _ => false,
            }
        }
        assert!(base_is_index_scan(&plan));

        let rows = env.run("SELECT age FROM users WHERE id = 2");
        assert_eq!(rows, vec![Tuple::new(vec![Value::Int64(30)])]);

        // Non-equality predicates keep the sequential scan.
        let plan = env.plan("SELECT age FROM users WHERE id > 1").unwrap();
        assert!(!base_is_index_scan(&plan));
    }

    #[test]
    fn test_join_plan() {
        let env = Env::new();
        let users = env.create_table("users", users_columns());
        let orders = env.create_table(
            "orders",
            vec![
                Column::new("user_id", ValueKind::Int64),
                Column::new("item", ValueKind::Text),
            ],
        );

        let writer = env.txns.begin();
        seed_users(&env, &users);
        for (user_id, item) in [(1i64, "book"), (3, "pen"), (3, "ink")] {
            orders
                .heap
                .insert(
                    &Tuple::new(vec![Value::Int64(user_id), Value::Text(item.into())]),
                    writer,
                    0,
                )
                .unwrap();
        }
        env.txns.commit(writer).unwrap();

        let rows = env.run(
            "SELECT u.id, o.item FROM users u JOIN orders o ON u.id = o.user_id ORDER BY u.id",
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values[1], Value::Text("book".into()));
        assert_eq!(rows[1].values[0], Value::Int64(3));
        assert_eq!(rows[2].values[0], Value::Int64(3));
    }

    #[test]
    fn test_distinct() {
        let env = Env::new();
        let binding = env.create_table("users", users_columns());
        let writer = env.txns.begin();
        for (id, age) in [(1, 20), (2, 20), (3, 40)] {
            binding
                .heap
                .insert(
                    &Tuple::new(vec![Value::Int64(id), Value::Int64(age)]),
                    writer,
                    0,
                )
                .unwrap();
        }
        env.txns.commit(writer).unwrap();

        let rows = env.run("SELECT DISTINCT age FROM users ORDER BY age");
        assert_eq!(
            rows,
            vec![
                Tuple::new(vec![Value::Int64(20)]),
                Tuple::new(vec![Value::Int64(40)]),
            ]
        );
    }
}
