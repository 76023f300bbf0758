use std::f64::consts::E;

use super::{numeric, store, to_cells};
use crate::data::collection::ColumnCollection;
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// Apply `f` to every present value of `column` (slot 0) and store the
/// result under `result_column` (at `result_slot`) or `default_name`.
/// `f` returning `None` marks a value outside the function's domain.
fn unary<F>(
    c: &ColumnCollection,
    args: &OpArgs,
    result_slot: usize,
    default_name: impl FnOnce(&str) -> String,
    f: F,
) -> Result<OpOutput>
where
    F: Fn(f64) -> Option<f64>,
{
    let column = c.column(args.str(0, "column")?)?;
    let default_name = default_name(column.name());
    let name = args.str_or(result_slot, "result_column", &default_name)?.to_string();
    let values = numeric(column)?
        .into_iter()
        .map(|v| v.and_then(&f))
        .collect();
    let mut out = c.clone();
    store(&mut out, Some(column), &name, to_cells(values))?;
    Ok(out.into())
}

fn radians(args: &OpArgs) -> Result<impl Fn(f64) -> f64> {
    let degrees = args.bool_or(2, "degrees", false)?;
    Ok(move |v: f64| if degrees { v.to_radians() } else { v })
}

/// `sin(column, result_column?, degrees = false)`.
pub fn sin(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let to_rad = radians(args)?;
    unary(c, args, 1, |n| format!("sin({n})"), |v| Some(to_rad(v).sin()))
}

pub fn cos(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let to_rad = radians(args)?;
    unary(c, args, 1, |n| format!("cos({n})"), |v| Some(to_rad(v).cos()))
}

pub fn tan(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let to_rad = radians(args)?;
    unary(c, args, 1, |n| format!("tan({n})"), |v| Some(to_rad(v).tan()))
}

pub fn exp(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    unary(c, args, 1, |n| format!("exp({n})"), |v| Some(v.exp()))
}

/// `log(column, base = e, result_column?)`. Non-positive input is missing.
pub fn log(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let base = args.f64_or(1, "base", E)?;
    if base <= 0.0 || base == 1.0 {
        return Err(TascError::invalid(format!("log base must be positive and not 1, got {base}")));
    }
    let name = move |n: &str| {
        if base == E {
            format!("log({n})")
        } else if base == 10.0 {
            format!("log10({n})")
        } else {
            format!("log{base}({n})")
        }
    };
    let log = move |v: f64| {
        if base == E {
            v.ln()
        } else if base == 10.0 {
            v.log10()
        } else if base == 2.0 {
            v.log2()
        } else {
            v.log(base)
        }
    };
    unary(c, args, 2, name, |v| (v > 0.0).then(|| log(v)))
}

/// `sqrt(column, result_column?)`. Negative input is missing.
pub fn sqrt(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    unary(c, args, 1, |n| format!("sqrt({n})"), |v| (v >= 0.0).then(|| v.sqrt()))
}

/// `pow(column, exponent, result_column?)`.
pub fn pow(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let exponent = args.f64(1, "exponent")?;
    unary(c, args, 2, |n| format!("{n}^{exponent}"), |v| {
        let r = v.powf(exponent);
        r.is_finite().then_some(r)
    })
}

pub fn abs_values(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    unary(c, args, 1, |n| format!("abs({n})"), |v| Some(v.abs()))
}

/// `round_values(column, decimals = 0, result_column?)`.
pub fn round_values(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let decimals = args.opt_f64(1, "decimals")?.unwrap_or(0.0);
    if decimals.fract() != 0.0 {
        return Err(TascError::invalid("'decimals' must be an integer"));
    }
    let scale = 10f64.powi(decimals as i32);
    unary(
        c,
        args,
        2,
        |n| format!("round({n}, {decimals})"),
        |v| Some((v * scale).round() / scale),
    )
}

/// `normalize(column, method = "minmax", result_column?)`.
///
/// `minmax` maps onto [0, 1], `zscore` onto zero mean and unit (population)
/// deviation. Flat data maps to 0.5 and 0.0 respectively.
pub fn normalize(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let method = args.str_or(1, "method", "minmax")?;
    let column = c.column(args.str(0, "column")?)?;
    let present: Vec<f64> = numeric(column)?.into_iter().flatten().collect();
    if present.is_empty() {
        return Err(TascError::EmptyData(column.name().to_string()));
    }
    match method {
        "minmax" => {
            let min = present.iter().copied().fold(f64::INFINITY, f64::min);
            let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            unary(c, args, 2, |n| format!("norm_minmax({n})"), move |v| {
                Some(if range == 0.0 { 0.5 } else { (v - min) / range })
            })
        }
        "zscore" => {
            let mean = column.mean()?;
            let std = column.std()?;
            unary(c, args, 2, |n| format!("norm_zscore({n})"), move |v| {
                Some(if std == 0.0 { 0.0 } else { (v - mean) / std })
            })
        }
        other => Err(TascError::invalid(format!(
            "normalize method must be minmax or zscore, got '{other}'"
        ))),
    }
}
