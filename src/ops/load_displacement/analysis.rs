use std::collections::BTreeMap;

use super::{load_and_displacement, valid_pairs};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{insert_path, Metadata, Value};
use crate::error::{Result, TascError};
use crate::ops::core::{numeric, to_cells};
use crate::ops::{recover_failure, OpArgs, OpOutput};

/// Least-squares line through `(xs, ys)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return Err(TascError::invalid(format!(
            "a linear fit needs at least two paired points, got {}",
            xs.len().min(ys.len())
        )));
    }
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    if sxx == 0.0 {
        return Err(TascError::invalid("a linear fit needs at least two distinct x values"));
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_total: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_residual: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_total != 0.0 { 1.0 - ss_residual / ss_total } else { 0.0 };
    Ok(LinearFit { slope, intercept, r_squared })
}

/// Derivative of `f` along a non-uniform `x`: second-order central
/// differences inside, one-sided first-order differences at the ends.
pub fn gradient(f: &[f64], x: &[f64]) -> Vec<f64> {
    let n = f.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            if i == 0 {
                (f[1] - f[0]) / (x[1] - x[0])
            } else if i == n - 1 {
                (f[n - 1] - f[n - 2]) / (x[n - 1] - x[n - 2])
            } else {
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                (h0 * h0 * f[i + 1] - h1 * h1 * f[i - 1] + (h1 * h1 - h0 * h0) * f[i])
                    / (h0 * h1 * (h0 + h1))
            }
        })
        .collect()
}

/// Points whose load lies within `[max * start, max * end]`.
fn load_window(disp: &[f64], load: &[f64], start: f64, end: f64) -> (Vec<f64>, Vec<f64>) {
    let max = load.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = (max * start, max * end);
    disp.iter()
        .zip(load)
        .filter(|(_, &l)| l >= lo && l <= hi)
        .map(|(&d, &l)| (d, l))
        .unzip()
}

/// `calculate_slopes(x_column?, y_column?, result_column?)`.
///
/// Point-to-point slope `Δy/Δx`, displacement against load by default. The
/// first row, rows next to a gap and rows with `Δx = 0` get `None`.
pub fn calculate_slopes(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    recover_failure(c, args, "calculate_slopes", slopes(c, args))
}

fn slopes(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (load, disp) = load_and_displacement(c)?;
    let x_column = match args.opt_str(0, "x_column")? {
        Some(name) => c.column(name)?,
        None => disp,
    };
    let y_column = match args.opt_str(1, "y_column")? {
        Some(name) => c.column(name)?,
        None => load,
    };
    if c.len() < 2 {
        return Err(TascError::invalid("slopes need at least two rows"));
    }
    let x = numeric(x_column)?;
    let y = numeric(y_column)?;

    let mut values = Vec::with_capacity(c.len());
    values.push(None);
    for i in 1..c.len() {
        values.push(match (x[i - 1], x[i], y[i - 1], y[i]) {
            (Some(x0), Some(x1), Some(y0), Some(y1)) if x1 != x0 => Some((y1 - y0) / (x1 - x0)),
            _ => None,
        });
    }

    let name = args
        .opt_str(2, "result_column")?
        .map(str::to_string)
        .unwrap_or_else(|| format!("slope_{}_{}", y_column.name(), x_column.name()));
    let mut meta = Metadata::new();
    meta.insert(
        "description".to_string(),
        Value::from(format!("Slope between {} and {}", y_column.name(), x_column.name())),
    );
    let mut column = Column::detect(name, to_cells(values)).with_metadata(meta);
    if let (Some(y_unit), Some(x_unit)) = (y_column.unit(), x_column.unit()) {
        column = column.with_unit(format!("{y_unit}/{x_unit}"));
    }

    let mut out = c.clone();
    out.upsert_column(column)?;
    Ok(out.into())
}

/// `calculate_stiffness(range_start = 0.2, range_end = 0.8, method =
/// "linear_regression")` → number.
///
/// Fits the points whose load lies between `range_start` and `range_end`
/// of the peak load; `secant` joins the first and last of those points.
pub fn calculate_stiffness(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let range_start = args.f64_or(0, "range_start", 0.2)?;
    let range_end = args.f64_or(1, "range_end", 0.8)?;
    let method = args.str_or(2, "method", "linear_regression")?;

    let (disp, load) = valid_pairs(c)?;
    if load.len() < 2 {
        return Err(TascError::invalid("not enough data to compute stiffness"));
    }
    let (xs, ys) = load_window(&disp, &load, range_start, range_end);
    if ys.len() < 2 {
        return Err(TascError::invalid(format!(
            "not enough points between {}% and {}% of the peak load",
            range_start * 100.0,
            range_end * 100.0
        )));
    }

    let stiffness = match method {
        "linear_regression" => linear_fit(&xs, &ys)?.slope,
        "secant" => {
            let last = xs.len() - 1;
            (ys[last] - ys[0]) / (xs[last] - xs[0])
        }
        other => {
            return Err(TascError::invalid(format!(
                "stiffness method must be linear_regression or secant, got '{other}'"
            )))
        }
    };
    log::debug!("calculate_stiffness: {method} over {} points = {stiffness}", xs.len());
    Ok(Value::from(stiffness).into())
}

/// How the yield point is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMethod {
    /// Intersection with the initial-slope line shifted by an offset strain.
    Offset,
    /// First point whose tangent slope drops to `factor` of the initial one.
    General,
}

impl YieldMethod {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "offset" => Ok(YieldMethod::Offset),
            "general" => Ok(YieldMethod::General),
            other => Err(TascError::invalid(format!(
                "yield method must be offset or general, got '{other}'"
            ))),
        }
    }

    fn name(self) -> &'static str {
        match self {
            YieldMethod::Offset => "offset",
            YieldMethod::General => "general",
        }
    }
}

/// `find_yield_point(method = "offset", offset_value = 0.002, range_start
/// = 0.1, range_end = 0.3, factor = 0.33)`.
///
/// The result is written to `analysis.yield_point`. Accepts
/// `fail_silently`.
pub fn find_yield_point(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    recover_failure(c, args, "find_yield_point", yield_point(c, args))
}

fn yield_point(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let method = YieldMethod::parse(args.str_or(0, "method", "offset")?)?;
    let offset_value = args.f64_or(1, "offset_value", 0.002)?;
    let range_start = args.f64_or(2, "range_start", 0.1)?;
    let range_end = args.f64_or(3, "range_end", 0.3)?;
    let factor = args.f64_or(4, "factor", 0.33)?;

    let (disp, load) = valid_pairs(c)?;
    if load.len() < 3 {
        return Err(TascError::invalid("not enough data to locate a yield point"));
    }

    let (xs, ys) = load_window(&disp, &load, range_start, range_end);
    if ys.len() < 2 {
        return Err(TascError::invalid(format!(
            "not enough points between {}% and {}% of the peak load",
            range_start * 100.0,
            range_end * 100.0
        )));
    }
    let fit = linear_fit(&xs, &ys)?;
    let mut initial_slope = fit.slope;

    if fit.r_squared < 0.95 {
        log::warn!(
            "find_yield_point: initial slope fit is poor (R² = {:.3})",
            fit.r_squared
        );
        let narrower = range_end.min(0.2);
        if narrower > range_start {
            let (nx, ny) = load_window(&disp, &load, range_start, narrower);
            if ny.len() >= 2 {
                let narrow = linear_fit(&nx, &ny)?;
                if (narrow.slope - initial_slope).abs() / initial_slope > 0.1 {
                    log::info!(
                        "find_yield_point: using slope {:.3} from 0-{}% of peak load",
                        narrow.slope,
                        narrower * 100.0
                    );
                    initial_slope = narrow.slope;
                }
            }
        }
    }

    let (yield_disp, yield_load) = match method {
        YieldMethod::Offset => {
            let diff: Vec<f64> = disp
                .iter()
                .zip(&load)
                .map(|(d, l)| l - (initial_slope * d - initial_slope * offset_value))
                .collect();
            let i = (1..diff.len())
                .find(|&i| diff[i - 1] * diff[i] <= 0.0)
                .ok_or_else(|| {
                    TascError::invalid("the offset line never crosses the load-displacement curve")
                })?;
            let (d0, d1) = (diff[i - 1].abs(), diff[i].abs());
            let ratio = if d0 + d1 == 0.0 { 0.0 } else { d0 / (d0 + d1) };
            (
                disp[i - 1] + ratio * (disp[i] - disp[i - 1]),
                load[i - 1] + ratio * (load[i] - load[i - 1]),
            )
        }
        YieldMethod::General => {
            let threshold = initial_slope * factor;
            let i = gradient(&load, &disp)
                .iter()
                .position(|&s| s <= threshold)
                .ok_or_else(|| {
                    TascError::invalid(format!(
                        "no point drops to {}% of the initial slope",
                        factor * 100.0
                    ))
                })?;
            (disp[i], load[i])
        }
    };
    log::debug!(
        "find_yield_point: {} method, yield at ({yield_disp}, {yield_load})",
        method.name()
    );

    let mut parameters = BTreeMap::new();
    parameters.insert("offset_value".to_string(), Value::from(offset_value));
    parameters.insert("range_start".to_string(), Value::from(range_start));
    parameters.insert("range_end".to_string(), Value::from(range_end));
    parameters.insert("factor".to_string(), Value::from(factor));

    let mut result = BTreeMap::new();
    result.insert("method".to_string(), Value::from(method.name()));
    result.insert("displacement".to_string(), Value::from(yield_disp));
    result.insert("load".to_string(), Value::from(yield_load));
    result.insert("initial_slope".to_string(), Value::from(initial_slope));
    result.insert("r_squared".to_string(), Value::from(fit.r_squared));
    result.insert("parameters".to_string(), Value::Map(parameters));

    let mut out = c.clone();
    insert_path(out.metadata_mut(), "analysis.yield_point", Value::Map(result));
    Ok(out.into())
}
