use super::{numeric, store, to_cells};
use crate::data::collection::ColumnCollection;
use crate::data::value::{cells, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// How the averaging window behaves near the ends of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeHandling {
    /// The window is cut at the boundary, so edge windows are lopsided.
    Asymmetric,
    /// The window shrinks to the same radius on both sides.
    Symmetric,
}

impl EdgeHandling {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "asymmetric" => Ok(EdgeHandling::Asymmetric),
            "symmetric" => Ok(EdgeHandling::Symmetric),
            other => Err(TascError::invalid(format!(
                "edge_handling must be symmetric or asymmetric, got '{other}'"
            ))),
        }
    }
}

/// Centered moving average. Missing inputs stay missing; missing
/// neighbours are left out of the window.
pub fn rolling_mean(data: &[Option<f64>], window: usize, edges: EdgeHandling) -> Vec<Option<f64>> {
    let n = data.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            data[i]?;
            let radius = match edges {
                EdgeHandling::Asymmetric => half,
                EdgeHandling::Symmetric => half.min(i).min(n - 1 - i),
            };
            let start = i.saturating_sub(radius);
            let end = (i + radius + 1).min(n);
            let present: Vec<f64> = data[start..end].iter().flatten().copied().collect();
            Some(present.iter().sum::<f64>() / present.len() as f64)
        })
        .collect()
}

fn window_args(c: &ColumnCollection, args: &OpArgs, window_slot: usize, edge_slot: usize) -> Result<(usize, EdgeHandling)> {
    let window = args.usize_or(window_slot, "window_size", 3)?;
    if window == 0 {
        return Err(TascError::invalid("window_size must be at least 1"));
    }
    if window > c.len() {
        return Err(TascError::invalid(format!(
            "window_size {window} exceeds the {} rows of the collection",
            c.len()
        )));
    }
    let edges = EdgeHandling::parse(args.str_or(edge_slot, "edge_handling", "asymmetric")?)?;
    Ok((window, edges))
}

/// `moving_average(column, window_size = 3, result_column?, edge_handling = "asymmetric")`.
pub fn moving_average(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let (window, edges) = window_args(c, args, 1, 3)?;
    let default_name = format!("ma{window}({})", column.name());
    let name = args.str_or(2, "result_column", &default_name)?.to_string();

    let averaged = rolling_mean(&numeric(column)?, window, edges);
    let mut out = c.clone();
    store(&mut out, Some(column), &name, to_cells(averaged))?;
    Ok(out.into())
}

/// `detect_outliers(column, window_size = 3, threshold = 0.5,
/// edge_handling = "asymmetric", min_abs_value = 1e-10, scale_factor = 1.0,
/// result_column?)`.
///
/// A value is flagged (1) when its distance to the moving average, relative
/// to `max(|average|, std * scale_factor, min_abs_value)`, exceeds
/// `threshold` and the distance itself exceeds `min_abs_value`.
pub fn detect_outliers(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let (window, edges) = window_args(c, args, 1, 3)?;
    let threshold = args.f64_or(2, "threshold", 0.5)?;
    let min_abs = args.f64_or(4, "min_abs_value", 1e-10)?;
    let scale = args.f64_or(5, "scale_factor", 1.0)?;
    let default_name = format!("outlier({})", column.name());
    let name = args.str_or(6, "result_column", &default_name)?.to_string();

    let data = numeric(column)?;
    let reference = (column.std()? * scale).max(min_abs);
    let averaged = rolling_mean(&data, window, edges);

    let flags: Vec<i64> = data
        .iter()
        .zip(&averaged)
        .map(|(v, avg)| match (v, avg) {
            (Some(v), Some(avg)) => {
                let diff = (v - avg).abs();
                let flagged = diff / avg.abs().max(reference) > threshold && diff > min_abs;
                i64::from(flagged)
            }
            _ => 0,
        })
        .collect();
    log::debug!(
        "detect_outliers: {} of {} rows flagged in '{}'",
        flags.iter().filter(|&&f| f == 1).count(),
        flags.len(),
        column.name()
    );

    let mut out = c.clone();
    store(&mut out, None, &name, cells(flags))?;
    Ok(out.into())
}

/// `describe()` → per-column summary map; ends the chain.
pub fn describe(c: &ColumnCollection, _args: &OpArgs) -> Result<OpOutput> {
    Ok(c.describe().into())
}

/// `aggregate(column, stat, q?)` → one number; ends the chain.
///
/// `stat` is one of `mean`, `sum`, `min`, `max`, `median`, `std`,
/// `variance`, `count` or `quantile` (which needs `q` in [0, 1]).
pub fn aggregate(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let stat = args.str_or(1, "stat", "mean")?;
    let value = match stat {
        "mean" => Value::from(column.mean()?),
        "sum" => Value::from(column.sum()?),
        "min" => Value::from(column.min()?),
        "max" => Value::from(column.max()?),
        "median" => Value::from(column.median()?),
        "std" => Value::from(column.std()?),
        "variance" => Value::from(column.variance()?),
        "count" => Value::from(column.len() - column.count_nones()),
        "quantile" => Value::from(column.quantile(args.f64(2, "q")?)?),
        other => {
            return Err(TascError::invalid(format!("unknown statistic '{other}'")));
        }
    };
    Ok(value.into())
}
