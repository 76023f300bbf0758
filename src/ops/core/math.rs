use super::{numeric, store, to_cells};
use crate::data::collection::ColumnCollection;
use crate::data::column::{Column, ColumnKind};
use crate::data::value::Value;
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// Right-hand side of a binary operation: another column or a constant.
enum Operand<'a> {
    Column(&'a Column),
    Constant(f64),
}

/// What `divide` does with a zero divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDivision {
    /// Missing result.
    None,
    /// Fail the operation.
    Error,
    /// Signed infinity; `0 / 0` is NaN.
    Inf,
}

impl ZeroDivision {
    fn parse(mode: &str) -> Result<Self> {
        match mode {
            "none" => Ok(ZeroDivision::None),
            "error" => Ok(ZeroDivision::Error),
            "inf" => Ok(ZeroDivision::Inf),
            other => Err(TascError::invalid(format!(
                "handle_zero_division must be none, error or inf, got '{other}'"
            ))),
        }
    }
}

pub fn add(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    binary(c, args, '+', |a, b| Ok(Some(a + b)))
}

pub fn subtract(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    binary(c, args, '-', |a, b| Ok(Some(a - b)))
}

pub fn multiply(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    binary(c, args, '*', |a, b| Ok(Some(a * b)))
}

/// `divide(column1, column2_or_value, result_column?, handle_zero_division = "none")`.
pub fn divide(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let mode = ZeroDivision::parse(args.str_or(3, "handle_zero_division", "none")?)?;
    binary(c, args, '/', |a, b| {
        if b != 0.0 {
            return Ok(Some(a / b));
        }
        match mode {
            ZeroDivision::None => Ok(None),
            ZeroDivision::Error => Err(TascError::invalid("division by zero")),
            ZeroDivision::Inf if a == 0.0 => Ok(Some(f64::NAN)),
            ZeroDivision::Inf => Ok(Some(f64::INFINITY.copysign(a))),
        }
    })
}

/// Shared body of the four arithmetic operations: `column1` (slot 0),
/// `column2_or_value` (slot 1), `result_column` (slot 2). A missing cell on
/// either side gives a missing result.
fn binary<F>(c: &ColumnCollection, args: &OpArgs, symbol: char, apply: F) -> Result<OpOutput>
where
    F: Fn(f64, f64) -> Result<Option<f64>>,
{
    let left = c.column(args.str(0, "column1")?)?;
    let rhs = args.required(1, "column2_or_value")?;
    let operand = match rhs {
        Value::Str(name) => Operand::Column(c.column(name)?),
        other => Operand::Constant(other.as_f64().ok_or_else(|| {
            TascError::invalid(format!("'column2_or_value' must be a column name or a number, got {other}"))
        })?),
    };
    let default_name = format!("{}{symbol}{rhs}", left.name());
    let name = args.str_or(2, "result_column", &default_name)?.to_string();

    let lhs = numeric(left)?;
    let rhs_values = match operand {
        Operand::Column(column) => numeric(column)?,
        Operand::Constant(v) => vec![Some(v); lhs.len()],
    };
    let values = lhs
        .into_iter()
        .zip(rhs_values)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => apply(a, b),
            _ => Ok(None),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = c.clone();
    store(&mut out, Some(left), &name, to_cells(values))?;
    Ok(out.into())
}

/// Row-wise combination of several columns; all numeric columns when
/// `columns` is absent.
fn combine<F>(c: &ColumnCollection, args: &OpArgs, label: &str, reduce: F) -> Result<OpOutput>
where
    F: Fn(&[f64]) -> f64,
{
    let names = match args.str_list(0, "columns")? {
        Some(names) => names,
        None => c
            .columns()
            .iter()
            .filter(|col| col.kind() == ColumnKind::Number)
            .map(|col| col.name().to_string())
            .collect(),
    };
    if names.is_empty() {
        return Err(TascError::invalid(format!("{label} needs at least one column")));
    }
    let columns = names
        .iter()
        .map(|n| c.column(n))
        .collect::<Result<Vec<_>>>()?;
    let series = columns
        .iter()
        .map(|col| numeric(col))
        .collect::<Result<Vec<_>>>()?;

    let default_name = format!("{label}({})", names.join("_"));
    let name = args.str_or(1, "result_column", &default_name)?.to_string();

    let mut row = Vec::with_capacity(series.len());
    let values = (0..c.len())
        .map(|i| {
            row.clear();
            for s in &series {
                row.push(s[i]?);
            }
            Some(reduce(&row))
        })
        .collect();

    let mut out = c.clone();
    store(&mut out, columns.first().copied(), &name, to_cells(values))?;
    Ok(out.into())
}

/// `sum_columns(columns?, result_column?)`.
pub fn sum_columns(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    combine(c, args, "sum", |row| row.iter().sum())
}

/// `average_columns(columns?, result_column?)`.
pub fn average_columns(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    combine(c, args, "average", |row| row.iter().sum::<f64>() / row.len() as f64)
}
