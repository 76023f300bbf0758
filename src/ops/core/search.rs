use std::cmp::Ordering;

use super::keep_rows;
use crate::data::collection::{ColumnCollection, Row};
use crate::data::value::{insert_path, Scalar, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// Comparison accepted by `search_by_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    pub fn parse(op: &str) -> Result<Self> {
        Ok(match op {
            ">" => Comparison::Gt,
            "<" => Comparison::Lt,
            ">=" => Comparison::Ge,
            "<=" => Comparison::Le,
            "==" => Comparison::Eq,
            "!=" => Comparison::Ne,
            other => {
                return Err(TascError::invalid(format!(
                    "unknown comparison '{other}', expected one of > < >= <= == !="
                )))
            }
        })
    }

    /// Numbers compare by value, text lexically, booleans with booleans.
    /// Values of different types only satisfy `!=`.
    pub fn matches(self, cell: &Scalar, target: &Scalar) -> bool {
        let ordering = match (cell, target) {
            (a, b) if a.is_number() && b.is_number() => {
                a.as_f64().and_then(|a| b.as_f64().and_then(|b| a.partial_cmp(&b)))
            }
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match ordering {
            Some(o) => match self {
                Comparison::Gt => o == Ordering::Greater,
                Comparison::Lt => o == Ordering::Less,
                Comparison::Ge => o != Ordering::Less,
                Comparison::Le => o != Ordering::Greater,
                Comparison::Eq => o == Ordering::Equal,
                Comparison::Ne => o != Ordering::Equal,
            },
            None => self == Comparison::Ne,
        }
    }
}

/// `search_by_value(column, op, value)`. Missing cells never match.
pub fn search_by_value(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let op = Comparison::parse(args.str(1, "op")?)?;
    let target = match args.required(2, "value")?.to_cell() {
        Some(Some(s)) => s,
        _ => return Err(TascError::invalid("'value' must be a scalar")),
    };
    let values = column.values();
    Ok(keep_rows(c, |i| values[i].as_ref().is_some_and(|v| op.matches(v, &target)))?.into())
}

/// `search_by_range(column, min, max, inclusive = true)`.
pub fn search_by_range(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let min = args.f64(1, "min")?;
    let max = args.f64(2, "max")?;
    let inclusive = args.bool_or(3, "inclusive", true)?;
    let values = column.values();
    let out = keep_rows(c, |i| {
        values[i]
            .as_ref()
            .and_then(Scalar::as_f64)
            .is_some_and(|v| within(v, min, max, inclusive))
    })?;
    Ok(out.into())
}

/// `search_by_step_range(min, max, inclusive = true, by_step_value = true)`.
/// With `by_step_value = false` the bounds are row positions.
pub fn search_by_step_range(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let min = args.f64(0, "min")?;
    let max = args.f64(1, "max")?;
    let inclusive = args.bool_or(2, "inclusive", true)?;
    let by_step_value = args.bool_or(3, "by_step_value", true)?;

    let step = c.step();
    let mut out = if by_step_value {
        keep_rows(c, |i| within(step[i], min, max, inclusive))?
    } else {
        keep_rows(c, |i| within(i as f64, min, max, inclusive))?
    };
    insert_path(
        out.metadata_mut(),
        "search.step_range",
        Value::Map(
            [
                ("min".to_string(), Value::from(min)),
                ("max".to_string(), Value::from(max)),
                ("inclusive".to_string(), Value::from(inclusive)),
                ("by_step_value".to_string(), Value::from(by_step_value)),
            ]
            .into_iter()
            .collect(),
        ),
    );
    Ok(out.into())
}

fn within(v: f64, min: f64, max: f64, inclusive: bool) -> bool {
    if inclusive {
        v >= min && v <= max
    } else {
        v > min && v < max
    }
}

/// Rows for which `condition` holds, given each row's step and cells.
pub fn search_by_condition<P>(c: &ColumnCollection, condition: P) -> Result<ColumnCollection>
where
    P: Fn(&Row) -> bool,
{
    let mut indices = Vec::new();
    for i in 0..c.len() {
        if condition(&c.row(i)?) {
            indices.push(i);
        }
    }
    c.take_rows(&indices)
}

/// `search_missing_values(columns?)`: rows with a missing cell in any of
/// the given columns (all columns by default).
pub fn search_missing_values(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let names = match args.str_list(0, "columns")? {
        Some(names) => names,
        None => c.column_names().into_iter().map(str::to_string).collect(),
    };
    let columns = names
        .iter()
        .map(|n| c.column(n))
        .collect::<Result<Vec<_>>>()?;
    let out = keep_rows(c, |i| columns.iter().any(|col| col.values()[i].is_none()))?;
    Ok(out.into())
}

/// `search_top_n(column, n, descending = true)`: the `n` extreme rows,
/// kept in their original order.
pub fn search_top_n(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let n = args.usize(1, "n")?;
    let descending = args.bool_or(2, "descending", true)?;

    let mut ranked: Vec<(usize, f64)> = column
        .values()
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_ref().and_then(Scalar::as_f64).map(|v| (i, v)))
        .collect();
    ranked.sort_by(|a, b| {
        let o = a.1.total_cmp(&b.1);
        if descending {
            o.reverse()
        } else {
            o
        }
    });
    let mut indices: Vec<usize> = ranked.into_iter().take(n).map(|(i, _)| i).collect();
    indices.sort_unstable();
    Ok(c.take_rows(&indices)?.into())
}
