//! Volcano operators.
//!
//! [`Operator`] is a closed enum over the eight physical operators. Every
//! variant follows the open/next/close contract:
//!
//! - `open` performs heavy setup (build-side hash tables, sort buffering,
//!   offset pre-consumption) and opens children first;
//! - `next` returns the next tuple in the operator's output order;
//! - `close` releases state, cascades to children, and is idempotent, so
//!   early termination and error paths may always call it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::btree::{BtreeIndex, IndexKey, RangeBound};
use crate::heap::{HeapScan, HeapTable};
use crate::sql::Expr;
use crate::tx::{Snapshot, SnapshotView, TransactionManager};
use crate::value::{Schema, Tuple, Value};

use super::error::ExecutorError;
use super::eval::{accumulate_sum, eval, eval_predicate, finish_avg};

/// A physical query operator.
pub enum Operator {
    SeqScan(SeqScan),
    IndexScan(IndexScan),
    Filter(FilterOp),
    Project(ProjectOp),
    Sort(SortOp),
    Aggregate(AggregateOp),
    HashJoin(HashJoinOp),
    Limit(LimitOp),
}

impl Operator {
    /// Opens the operator (children first, then own setup).
    pub fn open(&mut self) -> Result<(), ExecutorError> {
        match self {
            Operator::SeqScan(op) => op.open(),
            Operator::IndexScan(op) => op.open(),
            Operator::Filter(op) => op.open(),
            Operator::Project(op) => op.open(),
            Operator::Sort(op) => op.open(),
            Operator::Aggregate(op) => op.open(),
            Operator::HashJoin(op) => op.open(),
            Operator::Limit(op) => op.open(),
        }
    }

    /// Returns the next output tuple, or `None` when exhausted.
    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        match self {
            Operator::SeqScan(op) => op.next(),
            Operator::IndexScan(op) => op.next(),
            Operator::Filter(op) => op.next(),
            Operator::Project(op) => op.next(),
            Operator::Sort(op) => op.next(),
            Operator::Aggregate(op) => op.next(),
            Operator::HashJoin(op) => op.next(),
            Operator::Limit(op) => op.next(),
        }
    }

    /// Releases operator state. Idempotent; cascades to children.
    pub fn close(&mut self) {
        match self {
            Operator::SeqScan(op) => op.close(),
            Operator::IndexScan(op) => op.close(),
            Operator::Filter(op) => op.close(),
            Operator::Project(op) => op.close(),
            Operator::Sort(op) => op.close(),
            Operator::Aggregate(op) => op.close(),
            Operator::HashJoin(op) => op.close(),
            Operator::Limit(op) => op.close(),
        }
    }

    /// The schema of this operator's output tuples.
    pub fn output_schema(&self) -> &Schema {
        match self {
            Operator::SeqScan(op) => &op.schema,
            Operator::IndexScan(op) => &op.schema,
            Operator::Filter(op) => op.child.output_schema(),
            Operator::Project(op) => &op.schema,
            Operator::Sort(op) => op.child.output_schema(),
            Operator::Aggregate(op) => &op.schema,
            Operator::HashJoin(op) => &op.schema,
            Operator::Limit(op) => op.child.output_schema(),
        }
    }
}

// ---------------------------------------------------------------------------
// SeqScan
// ---------------------------------------------------------------------------

/// Full-table scan in heap order, filtered by the statement's snapshot.
pub struct SeqScan {
    pub(crate) table: Arc<HeapTable>,
    pub(crate) txns: Arc<TransactionManager>,
    pub(crate) snapshot: Snapshot,
    pub(crate) schema: Schema,
    scan: Option<HeapScan<Arc<HeapTable>>>,
}

impl SeqScan {
    /// Creates a scan bound to the caller's transaction snapshot.
    pub fn new(
        table: Arc<HeapTable>,
        schema: Schema,
        snapshot: Snapshot,
        txns: Arc<TransactionManager>,
    ) -> Self {
        Self {
            table,
            txns,
            snapshot,
            schema,
            scan: None,
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.scan = Some(HeapScan::new(Arc::clone(&self.table)));
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let Some(scan) = self.scan.as_mut() else {
            return Ok(None);
        };
        let view = SnapshotView::new(&self.snapshot, &self.txns);
        Ok(scan.next_visible(&view)?.map(|(_, tuple)| tuple))
    }

    fn close(&mut self) {
        self.scan = None;
    }
}

// ---------------------------------------------------------------------------
// IndexScan
// ---------------------------------------------------------------------------

/// How an index scan probes its index.
pub enum IndexLookup {
    /// Point lookup; returns every duplicate.
    Eq(IndexKey),
    /// Range lookup; each bound is `(key, inclusive)`, `None` = unbounded.
    Range {
        min: Option<(IndexKey, bool)>,
        max: Option<(IndexKey, bool)>,
    },
}

/// Index probe followed by heap fetches.
///
/// `open` runs the index search and stashes the TupleId list; `next`
/// fetches tuples from the heap, silently skipping ids whose tuple is not
/// visible to the snapshot (aborted inserts leave dangling entries until
/// a future vacuum).
pub struct IndexScan {
    pub(crate) index: Arc<BtreeIndex>,
    pub(crate) table: Arc<HeapTable>,
    pub(crate) txns: Arc<TransactionManager>,
    pub(crate) snapshot: Snapshot,
    pub(crate) schema: Schema,
    pub(crate) lookup: IndexLookup,
    tids: std::vec::IntoIter<crate::value::TupleId>,
}

impl IndexScan {
    /// Creates an index scan.
    pub fn new(
        index: Arc<BtreeIndex>,
        table: Arc<HeapTable>,
        schema: Schema,
        lookup: IndexLookup,
        snapshot: Snapshot,
        txns: Arc<TransactionManager>,
    ) -> Self {
        Self {
            index,
            table,
            txns,
            snapshot,
            schema,
            lookup,
            tids: Vec::new().into_iter(),
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        let tids = match &self.lookup {
            IndexLookup::Eq(key) => self.index.search(key)?,
            IndexLookup::Range { min, max } => {
                let lower = match min {
                    None => RangeBound::Unbounded,
                    Some((key, true)) => RangeBound::Inclusive(key),
                    Some((key, false)) => RangeBound::Exclusive(key),
                };
                let upper = match max {
                    None => RangeBound::Unbounded,
                    Some((key, true)) => RangeBound::Inclusive(key),
                    Some((key, false)) => RangeBound::Exclusive(key),
                };
                self.index.range_scan(lower, upper)?
            }
        };
        self.tids = tids.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let view = SnapshotView::new(&self.snapshot, &self.txns);
        for tid in self.tids.by_ref() {
            if let Some(tuple) = self.table.get(tid, &view)? {
                return Ok(Some(tuple));
            }
            // Missed visibility: skip to the next candidate.
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.tids = Vec::new().into_iter();
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Emits child tuples whose predicate evaluates to true (NULL filters out).
pub struct FilterOp {
    pub(crate) child: Box<Operator>,
    pub(crate) predicate: Expr,
}

impl FilterOp {
    /// Creates a filter over `child`.
    pub fn new(child: Operator, predicate: Expr) -> Self {
        Self {
            child: Box::new(child),
            predicate,
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            let Some(tuple) = self.child.next()? else {
                return Ok(None);
            };
            if eval_predicate(&self.predicate, &tuple, self.child.output_schema())? {
                return Ok(Some(tuple));
            }
        }
    }

    fn close(&mut self) {
        self.child.close();
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Evaluates the projection list against each child tuple.
///
/// When `distinct` is set the operator deduplicates output rows by their
/// serialized form, preserving first-seen order.
pub struct ProjectOp {
    pub(crate) child: Box<Operator>,
    pub(crate) exprs: Vec<Expr>,
    pub(crate) schema: Schema,
    distinct: bool,
    seen: HashSet<Vec<u8>>,
}

impl ProjectOp {
    /// Creates a projection.
    pub fn new(child: Operator, exprs: Vec<Expr>, schema: Schema, distinct: bool) -> Self {
        Self {
            child: Box::new(child),
            exprs,
            schema,
            distinct,
            seen: HashSet::new(),
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.seen.clear();
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            let Some(input) = self.child.next()? else {
                return Ok(None);
            };
            let input_schema = self.child.output_schema();
            let mut values = Vec::with_capacity(self.exprs.len());
            for expr in &self.exprs {
                values.push(eval(expr, &input, input_schema)?);
            }
            let output = Tuple::new(values);

            if self.distinct {
                let mut key = Vec::new();
                output.encode(&mut key);
                if !self.seen.insert(key) {
                    continue;
                }
            }
            return Ok(Some(output));
        }
    }

    fn close(&mut self) {
        self.seen.clear();
        self.child.close();
    }
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

/// Buffers the child and emits it stably sorted by the key expressions.
///
/// NULLs order last ascending and first descending. Key values that do
/// not compare (mixed families) tie, which the stable sort leaves in
/// arrival order.
pub struct SortOp {
    pub(crate) child: Box<Operator>,
    /// `(key expression, descending)` in priority order.
    pub(crate) keys: Vec<(Expr, bool)>,
    buffer: std::vec::IntoIter<Tuple>,
}

impl SortOp {
    /// Creates a sort over `child`.
    pub fn new(child: Operator, keys: Vec<(Expr, bool)>) -> Self {
        Self {
            child: Box::new(child),
            keys,
            buffer: Vec::new().into_iter(),
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;

        // Drain the child, computing each tuple's key vector up front so
        // the comparator itself cannot fail.
        let mut rows: Vec<(Vec<Value>, Tuple)> = Vec::new();
        while let Some(tuple) = self.child.next()? {
            let schema = self.child.output_schema();
            let mut key = Vec::with_capacity(self.keys.len());
            for (expr, _) in &self.keys {
                key.push(eval(expr, &tuple, schema)?);
            }
            rows.push((key, tuple));
        }

        let directions: Vec<bool> = self.keys.iter().map(|(_, desc)| *desc).collect();
        rows.sort_by(|(a, _), (b, _)| {
            for (i, desc) in directions.iter().enumerate() {
                let ordering = compare_sort_values(&a[i], &b[i]);
                let ordering = if *desc { ordering.reverse() } else { ordering };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });

        self.buffer = rows
            .into_iter()
            .map(|(_, tuple)| tuple)
            .collect::<Vec<_>>()
            .into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        Ok(self.buffer.next())
    }

    fn close(&mut self) {
        self.buffer = Vec::new().into_iter();
        self.child.close();
    }
}

/// Total order for sort keys: NULLs sort after every value, incomparable
/// pairs tie.
fn compare_sort_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// An aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    /// Maps an upper-cased function name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "COUNT" => AggFunc::Count,
            "SUM" => AggFunc::Sum,
            "AVG" => AggFunc::Avg,
            "MIN" => AggFunc::Min,
            "MAX" => AggFunc::Max,
            _ => return None,
        })
    }
}

/// One aggregate to compute per group.
pub struct AggSpec {
    pub func: AggFunc,
    /// Argument expression; `None` for `COUNT(*)`.
    pub arg: Option<Expr>,
    pub distinct: bool,
    /// Display name of the originating call, e.g. `COUNT(val)`; the
    /// planner rewrites projections to reference it.
    pub name: String,
}

/// Per-group accumulator state.
struct AggState {
    count: i64,
    sum: Option<Value>,
    min: Option<Value>,
    max: Option<Value>,
    /// Serialized values already counted, for DISTINCT aggregates.
    seen: HashSet<Vec<u8>>,
}

impl AggState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: None,
            min: None,
            max: None,
            seen: HashSet::new(),
        }
    }
}

struct Group {
    values: Vec<Value>,
    states: Vec<AggState>,
}

/// Hash aggregation keyed by the serialized group-by values.
///
/// With an empty GROUP BY the whole input forms a single group, which is
/// emitted even when the input is empty (`SELECT COUNT(*) FROM empty`
/// yields one row of 0).
pub struct AggregateOp {
    pub(crate) child: Box<Operator>,
    pub(crate) group_exprs: Vec<Expr>,
    pub(crate) aggs: Vec<AggSpec>,
    pub(crate) schema: Schema,
    output: std::vec::IntoIter<Tuple>,
}

impl AggregateOp {
    /// Creates an aggregation over `child`.
    pub fn new(
        child: Operator,
        group_exprs: Vec<Expr>,
        aggs: Vec<AggSpec>,
        schema: Schema,
    ) -> Self {
        Self {
            child: Box::new(child),
            group_exprs,
            aggs,
            schema,
            output: Vec::new().into_iter(),
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;

        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        while let Some(tuple) = self.child.next()? {
            let schema = self.child.output_schema();

            let mut group_values = Vec::with_capacity(self.group_exprs.len());
            for expr in &self.group_exprs {
                group_values.push(eval(expr, &tuple, schema)?);
            }
            let mut key = Vec::new();
            for value in &group_values {
                value.encode(&mut key);
            }

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    index.insert(key, groups.len());
                    groups.push(Group {
                        values: group_values,
                        states: self.aggs.iter().map(|_| AggState::new()).collect(),
                    });
                    groups.len() - 1
                }
            };

            for (spec, state) in self.aggs.iter().zip(groups[slot].states.iter_mut()) {
                accumulate(spec, state, &tuple, schema)?;
            }
        }

        // An empty GROUP BY always produces exactly one group.
        if self.group_exprs.is_empty() && groups.is_empty() {
            groups.push(Group {
                values: Vec::new(),
                states: self.aggs.iter().map(|_| AggState::new()).collect(),
            });
        }

        let rows: Vec<Tuple> = groups
            .into_iter()
            .map(|group| {
                let mut values = group.values;
                for (spec, state) in self.aggs.iter().zip(group.states.iter()) {
                    values.push(finish(spec, state));
                }
                Tuple::new(values)
            })
            .collect();
        self.output = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        Ok(self.output.next())
    }

    fn close(&mut self) {
        self.output = Vec::new().into_iter();
        self.child.close();
    }
}

fn accumulate(
    spec: &AggSpec,
    state: &mut AggState,
    tuple: &Tuple,
    schema: &Schema,
) -> Result<(), ExecutorError> {
    let value = match &spec.arg {
        None => {
            // COUNT(*): every row counts.
            state.count += 1;
            return Ok(());
        }
        Some(arg) => eval(arg, tuple, schema)?,
    };
    if value.is_null() {
        return Ok(());
    }
    if spec.distinct {
        let mut key = Vec::new();
        value.encode(&mut key);
        if !state.seen.insert(key) {
            return Ok(());
        }
    }

    state.count += 1;
    match spec.func {
        AggFunc::Count => {}
        AggFunc::Sum | AggFunc::Avg => {
            state.sum = accumulate_sum(state.sum.take(), &value)?;
        }
        AggFunc::Min => {
            let replace = match &state.min {
                None => true,
                Some(current) => {
                    value.compare(current) == Some(std::cmp::Ordering::Less)
                }
            };
            if replace {
                state.min = Some(value);
            }
        }
        AggFunc::Max => {
            let replace = match &state.max {
                None => true,
                Some(current) => {
                    value.compare(current) == Some(std::cmp::Ordering::Greater)
                }
            };
            if replace {
                state.max = Some(value);
            }
        }
    }
    Ok(())
}

fn finish(spec: &AggSpec, state: &AggState) -> Value {
    match spec.func {
        AggFunc::Count => Value::Int64(state.count),
        AggFunc::Sum => state.sum.clone().unwrap_or(Value::Null),
        AggFunc::Avg => finish_avg(&state.sum, state.count),
        AggFunc::Min => state.min.clone().unwrap_or(Value::Null),
        AggFunc::Max => state.max.clone().unwrap_or(Value::Null),
    }
}

// ---------------------------------------------------------------------------
// HashJoin
// ---------------------------------------------------------------------------

/// Inner hash equijoin.
///
/// `open` drains the right (build) side into a multimap keyed by the
/// serialized join key; `next` probes with each left tuple and emits the
/// concatenation `left ++ right` for every match. NULL keys never join.
pub struct HashJoinOp {
    pub(crate) left: Box<Operator>,
    pub(crate) right: Box<Operator>,
    pub(crate) left_key: Expr,
    pub(crate) right_key: Expr,
    pub(crate) schema: Schema,
    build: HashMap<Vec<u8>, Vec<Tuple>>,
    current: Option<(Tuple, std::vec::IntoIter<Tuple>)>,
}

impl HashJoinOp {
    /// Creates a hash join; `schema` is left ++ right.
    pub fn new(
        left: Operator,
        right: Operator,
        left_key: Expr,
        right_key: Expr,
        schema: Schema,
    ) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            left_key,
            right_key,
            schema,
            build: HashMap::new(),
            current: None,
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.left.open()?;
        self.right.open()?;

        self.build.clear();
        while let Some(tuple) = self.right.next()? {
            let schema = self.right.output_schema();
            let key_value = eval(&self.right_key, &tuple, schema)?;
            if key_value.is_null() {
                continue;
            }
            let mut key = Vec::new();
            key_value.encode(&mut key);
            self.build.entry(key).or_default().push(tuple);
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            if let Some((left_tuple, matches)) = &mut self.current {
                if let Some(right_tuple) = matches.next() {
                    let mut values = left_tuple.values.clone();
                    values.extend(right_tuple.values);
                    return Ok(Some(Tuple::new(values)));
                }
            }
            self.current = None;

            let Some(left_tuple) = self.left.next()? else {
                return Ok(None);
            };
            let key_value = eval(&self.left_key, &left_tuple, self.left.output_schema())?;
            if key_value.is_null() {
                continue;
            }
            let mut key = Vec::new();
            key_value.encode(&mut key);
            let matches = self.build.get(&key).cloned().unwrap_or_default();
            self.current = Some((left_tuple, matches.into_iter()));
        }
    }

    fn close(&mut self) {
        self.build.clear();
        self.current = None;
        self.left.close();
        self.right.close();
    }
}

// ---------------------------------------------------------------------------
// Limit
// ---------------------------------------------------------------------------

/// OFFSET/LIMIT: `open` pre-consumes `offset` tuples, `next` emits at most
/// `limit`.
pub struct LimitOp {
    pub(crate) child: Box<Operator>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: u64,
    emitted: u64,
}

impl LimitOp {
    /// Creates a limit over `child`.
    pub fn new(child: Operator, limit: Option<u64>, offset: u64) -> Self {
        Self {
            child: Box::new(child),
            limit,
            offset,
            emitted: 0,
        }
    }

    fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;
        self.emitted = 0;
        for _ in 0..self.offset {
            if self.child.next()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(None);
            }
        }
        match self.child.next()? {
            Some(tuple) => {
                self.emitted += 1;
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.child.close();
    }
}
