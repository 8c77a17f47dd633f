//! Expression evaluation.
//!
//! [`eval`] is a pure function of `(expression, tuple, schema)`. Column
//! references resolve by name against the schema; a name that resolves to
//! nothing evaluates to NULL rather than failing, so projections over
//! heterogeneous operator outputs stay forgiving. Comparisons and AND/OR
//! follow SQL three-valued logic; only [`eval_predicate`] collapses NULL
//! to false, and only for filtering.

use rust_decimal::Decimal;

use crate::sql::{is_aggregate_name, BinaryOperator, Expr, UnaryOperator};
use crate::value::{Schema, Tuple, TypeError, Value};

use super::error::ExecutorError;

/// Evaluates an expression against a tuple and its schema.
pub fn eval(expr: &Expr, tuple: &Tuple, schema: &Schema) -> Result<Value, ExecutorError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Boolean(b) => Ok(Value::Bool(*b)),
        Expr::Integer(n) => Ok(Value::Int64(*n)),
        Expr::Float(n) => Ok(Value::Float64(*n)),
        Expr::String(s) => Ok(Value::Text(s.clone())),

        Expr::Column { table, name } => {
            let position = match table {
                Some(table) => schema.find_qualified(table, name),
                None => schema.find_column(name),
            };
            // Unresolved names evaluate to NULL.
            Ok(position
                .map(|i| tuple.get(i).clone())
                .unwrap_or(Value::Null))
        }

        Expr::BinaryOp { left, op, right } => eval_binary(left, *op, right, tuple, schema),

        Expr::UnaryOp { op, operand } => {
            let value = eval(operand, tuple, schema)?;
            eval_unary(*op, &value)
        }

        Expr::IsNull { expr, negated } => {
            let value = eval(expr, tuple, schema)?;
            let is_null = value.is_null();
            Ok(Value::Bool(if *negated { !is_null } else { is_null }))
        }

        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval(expr, tuple, schema)?;
            if needle.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item, tuple, schema)?;
                if candidate.is_null() {
                    saw_null = true;
                    continue;
                }
                if needle.compare(&candidate) == Some(std::cmp::Ordering::Equal) {
                    // Short-circuit on the first hit.
                    return Ok(Value::Bool(!negated));
                }
            }
            if saw_null {
                // No hit but a NULL in the list: the answer is unknown.
                Ok(Value::Null)
            } else {
                Ok(Value::Bool(*negated))
            }
        }

        Expr::Function {
            name,
            args,
            star,
            ..
        } => {
            // Aggregates reaching the evaluator are outside an Aggregate
            // operator and act as per-row identities.
            if is_aggregate_name(name) {
                if *star {
                    return Ok(Value::Int64(1));
                }
                return match args.first() {
                    Some(arg) => eval(arg, tuple, schema),
                    None => Ok(Value::Null),
                };
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, tuple, schema)?);
            }
            eval_function(name, &values)
        }
    }
}

/// Evaluates a predicate for Filter/HAVING: NULL filters as false.
pub fn eval_predicate(expr: &Expr, tuple: &Tuple, schema: &Schema) -> Result<bool, ExecutorError> {
    match eval(expr, tuple, schema)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        other => Err(ExecutorError::PredicateNotBoolean(other.kind())),
    }
}

fn eval_binary(
    left: &Expr,
    op: BinaryOperator,
    right: &Expr,
    tuple: &Tuple,
    schema: &Schema,
) -> Result<Value, ExecutorError> {
    // AND/OR short-circuit under three-valued logic: a decided left side
    // skips the right side entirely.
    match op {
        BinaryOperator::And => {
            let l = eval(left, tuple, schema)?;
            if l == Value::Bool(false) {
                return Ok(Value::Bool(false));
            }
            let r = eval(right, tuple, schema)?;
            return tri_and(&l, &r);
        }
        BinaryOperator::Or => {
            let l = eval(left, tuple, schema)?;
            if l == Value::Bool(true) {
                return Ok(Value::Bool(true));
            }
            let r = eval(right, tuple, schema)?;
            return tri_or(&l, &r);
        }
        _ => {}
    }

    let l = eval(left, tuple, schema)?;
    let r = eval(right, tuple, schema)?;

    if op == BinaryOperator::Concat {
        return concat_values(&l, &r);
    }

    // Everything else propagates NULL.
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    use std::cmp::Ordering;
    let comparison = |wanted: fn(Ordering) -> bool| -> Result<Value, ExecutorError> {
        match l.compare(&r) {
            Some(ordering) => Ok(Value::Bool(wanted(ordering))),
            None => Err(TypeError::InvalidOperands {
                op: op.as_str(),
                left: l.kind(),
                right: r.kind(),
            }
            .into()),
        }
    };

    match op {
        BinaryOperator::Eq => comparison(|o| o == Ordering::Equal),
        BinaryOperator::Neq => comparison(|o| o != Ordering::Equal),
        BinaryOperator::Lt => comparison(|o| o == Ordering::Less),
        BinaryOperator::LtEq => comparison(|o| o != Ordering::Greater),
        BinaryOperator::Gt => comparison(|o| o == Ordering::Greater),
        BinaryOperator::GtEq => comparison(|o| o != Ordering::Less),
        BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul => {
            arithmetic(&l, op, &r)
        }
        BinaryOperator::Div => divide(&l, &r),
        BinaryOperator::Mod => modulo(&l, &r),
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Concat => {
            unreachable!("handled above")
        }
    }
}

fn tri_and(l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    match (bool_or_null(l)?, bool_or_null(r)?) {
        (Some(false), _) | (_, Some(false)) => Ok(Value::Bool(false)),
        (Some(true), Some(true)) => Ok(Value::Bool(true)),
        _ => Ok(Value::Null),
    }
}

fn tri_or(l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    match (bool_or_null(l)?, bool_or_null(r)?) {
        (Some(true), _) | (_, Some(true)) => Ok(Value::Bool(true)),
        (Some(false), Some(false)) => Ok(Value::Bool(false)),
        _ => Ok(Value::Null),
    }
}

fn bool_or_null(value: &Value) -> Result<Option<bool>, ExecutorError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(TypeError::InvalidOperands {
            op: "AND",
            left: other.kind(),
            right: other.kind(),
        }
        .into()),
    }
}

fn concat_values(l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    match (l.as_str(), r.as_str()) {
        (Some(a), Some(b)) => Ok(Value::Text(format!("{a}{b}"))),
        _ => Err(TypeError::InvalidOperands {
            op: "||",
            left: l.kind(),
            right: r.kind(),
        }
        .into()),
    }
}

/// Add/Sub/Mul with numeric promotion: decimal dominates, then float,
/// then 64-bit integer.
pub(crate) fn arithmetic(l: &Value, op: BinaryOperator, r: &Value) -> Result<Value, ExecutorError> {
    let bad = || -> ExecutorError {
        TypeError::InvalidOperands {
            op: op.as_str(),
            left: l.kind(),
            right: r.kind(),
        }
        .into()
    };
    if !l.kind().is_numeric() || !r.kind().is_numeric() {
        return Err(bad());
    }

    if matches!(l, Value::Decimal(_)) || matches!(r, Value::Decimal(_)) {
        let a = l.as_decimal().ok_or_else(bad)?;
        let b = r.as_decimal().ok_or_else(bad)?;
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            _ => return Err(bad()),
        };
        return result
            .map(Value::Decimal)
            .ok_or(ExecutorError::NumericOverflow);
    }

    let float_side = matches!(l, Value::Float32(_) | Value::Float64(_))
        || matches!(r, Value::Float32(_) | Value::Float64(_));
    if float_side {
        let a = l.as_f64().ok_or_else(bad)?;
        let b = r.as_f64().ok_or_else(bad)?;
        let result = match op {
            BinaryOperator::Add => a + b,
            BinaryOperator::Sub => a - b,
            BinaryOperator::Mul => a * b,
            _ => return Err(bad()),
        };
        return Ok(Value::Float64(result));
    }

    let a = l.as_i64().ok_or_else(bad)?;
    let b = r.as_i64().ok_or_else(bad)?;
    let result = match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Sub => a.checked_sub(b),
        BinaryOperator::Mul => a.checked_mul(b),
        _ => return Err(bad()),
    };
    result
        .map(Value::Int64)
        .ok_or(ExecutorError::NumericOverflow)
}

/// Division always yields a float, whatever the operand kinds.
fn divide(l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    let bad = || -> ExecutorError {
        TypeError::InvalidOperands {
            op: "/",
            left: l.kind(),
            right: r.kind(),
        }
        .into()
    };
    let a = l.as_f64().ok_or_else(bad)?;
    let b = r.as_f64().ok_or_else(bad)?;
    if b == 0.0 {
        return Err(ExecutorError::DivisionByZero);
    }
    Ok(Value::Float64(a / b))
}

/// Modulo requires two integers.
fn modulo(l: &Value, r: &Value) -> Result<Value, ExecutorError> {
    if !l.kind().is_integer() || !r.kind().is_integer() {
        return Err(TypeError::InvalidOperands {
            op: "%",
            left: l.kind(),
            right: r.kind(),
        }
        .into());
    }
    let a = l.as_i64().unwrap_or(0);
    let b = r.as_i64().unwrap_or(0);
    if b == 0 {
        return Err(ExecutorError::DivisionByZero);
    }
    Ok(Value::Int64(a.wrapping_rem(b)))
}

fn eval_unary(op: UnaryOperator, value: &Value) -> Result<Value, ExecutorError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match op {
        UnaryOperator::Not => match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(TypeError::InvalidOperands {
                op: "NOT",
                left: other.kind(),
                right: other.kind(),
            }
            .into()),
        },
        UnaryOperator::Minus => match value {
            Value::Int8(n) => Ok(Value::Int8(-n)),
            Value::Int16(n) => Ok(Value::Int16(-n)),
            Value::Int32(n) => Ok(Value::Int32(-n)),
            Value::Int64(n) => Ok(Value::Int64(-n)),
            Value::Float32(n) => Ok(Value::Float32(-n)),
            Value::Float64(n) => Ok(Value::Float64(-n)),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            other => Err(TypeError::InvalidOperands {
                op: "-",
                left: other.kind(),
                right: other.kind(),
            }
            .into()),
        },
        UnaryOperator::Plus => {
            if value.kind().is_numeric() {
                Ok(value.clone())
            } else {
                Err(TypeError::InvalidOperands {
                    op: "+",
                    left: value.kind(),
                    right: value.kind(),
                }
                .into())
            }
        }
    }
}

fn eval_function(name: &str, args: &[Value]) -> Result<Value, ExecutorError> {
    match name {
        "ABS" => {
            let value = args.first().unwrap_or(&Value::Null);
            if value.is_null() {
                return Ok(Value::Null);
            }
            match value {
                Value::Int8(n) => Ok(Value::Int8(n.abs())),
                Value::Int16(n) => Ok(Value::Int16(n.abs())),
                Value::Int32(n) => Ok(Value::Int32(n.abs())),
                Value::Int64(n) => Ok(Value::Int64(n.abs())),
                Value::Float32(n) => Ok(Value::Float32(n.abs())),
                Value::Float64(n) => Ok(Value::Float64(n.abs())),
                Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
                other => Err(TypeError::InvalidOperands {
                    op: "ABS",
                    left: other.kind(),
                    right: other.kind(),
                }
                .into()),
            }
        }
        "UPPER" | "LOWER" => {
            let value = args.first().unwrap_or(&Value::Null);
            if value.is_null() {
                return Ok(Value::Null);
            }
            match value.as_str() {
                Some(s) => Ok(Value::Text(if name == "UPPER" {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                })),
                None => Err(TypeError::InvalidOperands {
                    op: if name == "UPPER" { "UPPER" } else { "LOWER" },
                    left: value.kind(),
                    right: value.kind(),
                }
                .into()),
            }
        }
        other => Err(ExecutorError::UnknownFunction(other.to_string())),
    }
}

/// Accumulating addition for SUM: integers sum to Int64, floats to
/// Float64, decimals to Decimal.
pub(crate) fn accumulate_sum(acc: Option<Value>, value: &Value) -> Result<Option<Value>, ExecutorError> {
    if value.is_null() {
        return Ok(acc);
    }
    match acc {
        None => Ok(Some(widen_for_sum(value)?)),
        Some(current) => {
            let sum = arithmetic(&current, BinaryOperator::Add, value)?;
            Ok(Some(sum))
        }
    }
}

fn widen_for_sum(value: &Value) -> Result<Value, ExecutorError> {
    match value {
        v if v.kind().is_integer() => Ok(Value::Int64(v.as_i64().unwrap_or(0))),
        Value::Float32(n) => Ok(Value::Float64(*n as f64)),
        Value::Float64(n) => Ok(Value::Float64(*n)),
        Value::Decimal(d) => Ok(Value::Decimal(*d)),
        other => Err(TypeError::InvalidOperands {
            op: "SUM",
            left: other.kind(),
            right: other.kind(),
        }
        .into()),
    }
}

/// Final AVG value from an accumulated sum and count.
pub(crate) fn finish_avg(sum: &Option<Value>, count: i64) -> Value {
    let Some(sum) = sum else {
        return Value::Null;
    };
    if count == 0 {
        return Value::Null;
    }
    if let Value::Decimal(d) = sum {
        return Value::Decimal(*d / Decimal::from(count));
    }
    match sum.as_f64() {
        Some(total) => Value::Float64(total / count as f64),
        None => Value::Null,
    }
}
