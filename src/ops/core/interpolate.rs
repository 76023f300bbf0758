use super::numeric;
use crate::data::collection::ColumnCollection;
use crate::data::column::{Column, ColumnKind};
use crate::data::value::{Cell, Scalar, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

const STEP: &str = "step";

/// Piecewise-linear interpolation of `(xs, ys)` at every `x_new`, with
/// linear extrapolation from the outer segments. `xs` must be ascending.
pub fn linear_interpolate(xs: &[f64], ys: &[f64], x_new: &[f64]) -> Vec<f64> {
    let line = |j: usize, x: f64| {
        let (x1, x2, y1, y2) = (xs[j], xs[j + 1], ys[j], ys[j + 1]);
        if x2 == x1 {
            y1
        } else {
            y1 + (x - x1) * (y2 - y1) / (x2 - x1)
        }
    };
    x_new
        .iter()
        .map(|&x| match xs.len() {
            0 => f64::NAN,
            1 => ys[0],
            _ if x <= xs[0] => line(0, x),
            n if x >= xs[n - 1] => line(n - 2, x),
            n => {
                // first segment whose right end reaches x
                let j = xs.partition_point(|&v| v < x).clamp(1, n - 1) - 1;
                line(j, x)
            }
        })
        .collect()
}

/// Evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count <= 1 {
        return vec![start];
    }
    let step = (stop - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Index of the value closest to `x`; ties go to the lower index.
pub fn nearest_index(xs: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, v) in xs.iter().enumerate() {
        let dist = (v - x).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Values of a complete numeric column.
fn complete(column: &Column) -> Result<Vec<f64>> {
    if column.kind() != ColumnKind::Number {
        return Err(TascError::invalid(format!("column '{}' is not numeric", column.name())));
    }
    numeric(column)?
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| TascError::invalid(format!("column '{}' has missing values", column.name())))
}

/// `interpolate(base_column = "step", x_values? | point_count?, columns?)`.
///
/// Complete numeric columns are interpolated linearly along the base
/// column; every other column (and the `date`/`time` metadata lists) take
/// the value of the nearest original row. The base column itself becomes
/// `x_values`.
pub fn interpolate(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let base_name = args.str_or(0, "base_column", STEP)?;
    let method = args.str_or(4, "method", "linear")?;
    if method != "linear" {
        return Err(TascError::invalid(format!("unsupported interpolation method '{method}'")));
    }
    if c.is_empty() {
        return Err(TascError::EmptyData(base_name.to_string()));
    }

    let base: Vec<f64> = if base_name == STEP {
        c.step().to_vec()
    } else {
        complete(c.column(base_name)?)?
    };
    if base.windows(2).any(|w| w[1] < w[0]) {
        return Err(TascError::invalid(format!("'{base_name}' must be ascending to interpolate along it")));
    }

    let x_new = match (args.f64_list(1, "x_values")?, args.opt_usize(2, "point_count")?) {
        (Some(_), Some(_)) => {
            return Err(TascError::invalid("give either x_values or point_count, not both"));
        }
        (None, None) => return Err(TascError::invalid("x_values or point_count is required")),
        (Some(xs), None) => xs,
        (None, Some(count)) => linspace(base[0], base[base.len() - 1], count),
    };

    let interpolated: Vec<String> = match args.str_list(3, "columns")? {
        Some(names) => {
            for name in &names {
                complete(c.column(name)?)?;
            }
            names
        }
        None => c
            .columns()
            .iter()
            .filter(|col| col.kind() == ColumnKind::Number && !col.has_none())
            .map(|col| col.name().to_string())
            .collect(),
    };

    let nearest: Vec<usize> = x_new.iter().map(|&x| nearest_index(&base, x)).collect();
    let step = linear_interpolate(&base, c.step(), &x_new);

    let mut columns = Vec::with_capacity(c.columns().len());
    for column in c.columns() {
        let values: Vec<Cell> = if column.name() == base_name {
            x_new.iter().map(|&x| Some(Scalar::Float(x))).collect()
        } else if interpolated.iter().any(|n| n == column.name()) {
            linear_interpolate(&base, &complete(column)?, &x_new)
                .into_iter()
                .map(|v| Some(Scalar::Float(v)))
                .collect()
        } else {
            nearest.iter().map(|&i| column.values()[i].clone()).collect()
        };
        columns.push(column.with_values(values));
    }

    let mut metadata = c.metadata().clone();
    for key in ["date", "time"] {
        if let Some(Value::List(items)) = metadata.get(key) {
            if items.len() == c.len() {
                let picked = nearest.iter().map(|&i| items[i].clone()).collect();
                metadata.insert(key.to_string(), Value::List(picked));
            }
        }
    }
    metadata.insert("interpolation_method".to_string(), Value::from(method));
    metadata.insert("interpolation_basis".to_string(), Value::from(base_name));

    let out = ColumnCollection::new(step, columns, metadata)?.with_domain(c.domain().clone());
    Ok(out.into())
}
