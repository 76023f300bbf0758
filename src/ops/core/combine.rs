use super::search::Comparison;
use super::{numeric, store, to_cells};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{Cell, Scalar, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// What the switch and blend boundaries are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// Step values.
    Step,
    /// Row positions.
    Index,
    /// Step values looked up to row positions.
    StepIndex,
}

impl Boundary {
    fn parse(args: &OpArgs, mode_slot: usize, flag_slot: usize) -> Result<Self> {
        let by_step_value = args.bool_or(flag_slot, "by_step_value", true)?;
        match args.str_or(mode_slot, "compare_mode", "value")? {
            "value" if by_step_value => Ok(Boundary::Step),
            "value" => Ok(Boundary::Index),
            "index" if by_step_value => Ok(Boundary::StepIndex),
            "index" => Ok(Boundary::Index),
            other => Err(TascError::invalid(format!(
                "compare_mode must be value or index, got '{other}'"
            ))),
        }
    }

    fn label(by_step_value: bool) -> &'static str {
        if by_step_value {
            "step"
        } else {
            "index"
        }
    }
}

/// Row of the step equal to `value`, or the nearest one within `tolerance`.
pub(crate) fn find_step_index(step: &[f64], value: f64, tolerance: Option<f64>) -> Option<usize> {
    if let Some(i) = step.iter().position(|&s| s == value) {
        return Some(i);
    }
    let tolerance = tolerance?;
    step.iter()
        .enumerate()
        .map(|(i, s)| (i, (s - value).abs()))
        .filter(|&(_, d)| d <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

fn push_warning(out: &mut ColumnCollection, message: String) {
    log::warn!("{message}");
    let warnings = out
        .metadata_mut()
        .entry("warnings".to_string())
        .or_insert_with(|| Value::List(Vec::new()));
    match warnings {
        Value::List(items) => items.push(Value::from(message)),
        other => *other = Value::List(vec![Value::from(message)]),
    }
}

fn pair<'a>(c: &'a ColumnCollection, args: &OpArgs) -> Result<(&'a Column, &'a Column)> {
    Ok((c.column(args.str(0, "column1")?)?, c.column(args.str(1, "column2")?)?))
}

fn record(out: &mut ColumnCollection, entries: Vec<(&str, Value)>) {
    let meta = out.metadata_mut();
    for (key, value) in entries {
        meta.insert(key.to_string(), value);
    }
}

/// `switch_by_step(column1, column2, threshold, compare_mode = "value",
/// by_step_value = true, result_column?, tolerance?)`.
///
/// Rows before the threshold take `column1`, the rest `column2`. With
/// `compare_mode = "index"` a step threshold is first looked up to its
/// row; an unknown step falls back to the middle row and leaves a note
/// under `warnings`.
pub fn switch_by_step(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (first, second) = pair(c, args)?;
    let threshold = args.f64(2, "threshold")?;
    let boundary = Boundary::parse(args, 3, 4)?;
    let by_step_value = args.bool_or(4, "by_step_value", true)?;
    let tolerance = args.opt_f64(6, "tolerance")?;

    let default_name = format!(
        "switch({},{}@{}_{})",
        first.name(),
        second.name(),
        threshold,
        Boundary::label(by_step_value)
    );
    let name = args.str_or(5, "result_column", &default_name)?.to_string();

    let mut out = c.clone();
    let take_first: Box<dyn Fn(usize) -> bool> = match boundary {
        Boundary::Step => {
            let step = c.step().to_vec();
            Box::new(move |i| step[i] < threshold)
        }
        Boundary::Index => Box::new(move |i| (i as f64) < threshold),
        Boundary::StepIndex => {
            let row = match find_step_index(c.step(), threshold, tolerance) {
                Some(row) => row,
                None => {
                    let row = c.len() / 2;
                    push_warning(
                        &mut out,
                        format!("switch_by_step: step {threshold} not found, switching at row {row}"),
                    );
                    row
                }
            };
            Box::new(move |i| i < row)
        }
    };

    let values: Vec<Cell> = (0..c.len())
        .map(|i| {
            let source = if take_first(i) { first } else { second };
            source.values()[i].clone()
        })
        .collect();
    store(&mut out, Some(first), &name, values)?;
    record(
        &mut out,
        vec![
            ("operation", Value::from("switch_by_step")),
            ("by_step_value", Value::from(by_step_value)),
            ("compare_mode", Value::from(args.str_or(3, "compare_mode", "value")?)),
            ("threshold", Value::from(threshold)),
        ],
    );
    Ok(out.into())
}

/// Easing curve of `blend_by_step`, mapping `[0, 1]` onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMethod {
    Linear,
    /// Smoothstep, `3t² - 2t³`.
    Smooth,
    Log,
    Exp,
}

impl BlendMethod {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(BlendMethod::Linear),
            "smooth" => Ok(BlendMethod::Smooth),
            "log" => Ok(BlendMethod::Log),
            "exp" => Ok(BlendMethod::Exp),
            other => Err(TascError::invalid(format!(
                "blend_method must be linear, smooth, log or exp, got '{other}'"
            ))),
        }
    }

    pub fn weight(self, t: f64) -> f64 {
        match self {
            BlendMethod::Linear => t,
            BlendMethod::Smooth => 3.0 * t * t - 2.0 * t * t * t,
            BlendMethod::Log => (9.0 * t + 1.0).log10(),
            BlendMethod::Exp => t.exp_m1() / 1f64.exp_m1(),
        }
    }
}

/// `blend_by_step(column1, column2, start, end, compare_mode = "value",
/// by_step_value = true, blend_method = "linear", result_column?,
/// tolerance?)`.
///
/// `column1` before `start`, `column2` after `end`, and a weighted mix in
/// between. Inside the window a missing cell on either side gives a
/// missing result.
pub fn blend_by_step(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (first, second) = pair(c, args)?;
    let start = args.f64(2, "start")?;
    let end = args.f64(3, "end")?;
    let boundary = Boundary::parse(args, 4, 5)?;
    let by_step_value = args.bool_or(5, "by_step_value", true)?;
    let method = BlendMethod::parse(args.str_or(6, "blend_method", "linear")?)?;
    let tolerance = args.opt_f64(8, "tolerance")?;

    let default_name = format!(
        "blend({},{},{}-{}_{})",
        first.name(),
        second.name(),
        start,
        end,
        Boundary::label(by_step_value)
    );
    let name = args.str_or(7, "result_column", &default_name)?.to_string();

    let mut out = c.clone();
    // Boundaries and the position of each row on the same axis.
    let (lo, hi, position): (f64, f64, Vec<f64>) = match boundary {
        Boundary::Step => (start, end, c.step().to_vec()),
        Boundary::Index => (start, end, (0..c.len()).map(|i| i as f64).collect()),
        Boundary::StepIndex => {
            let mut lookup = |value: f64, fallback: usize| match find_step_index(c.step(), value, tolerance) {
                Some(row) => row,
                None => {
                    push_warning(
                        &mut out,
                        format!("blend_by_step: step {value} not found, using row {fallback}"),
                    );
                    fallback
                }
            };
            let lo = lookup(start, 0);
            let hi = lookup(end, c.len().saturating_sub(1));
            (lo as f64, hi as f64, (0..c.len()).map(|i| i as f64).collect())
        }
    };
    if hi <= lo {
        return Err(TascError::invalid(format!(
            "blend end ({hi}) must be greater than start ({lo})"
        )));
    }

    let a = numeric(first)?;
    let b = numeric(second)?;
    let values: Vec<Option<f64>> = position
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if p < lo {
                a[i]
            } else if p > hi {
                b[i]
            } else {
                let w = method.weight((p - lo) / (hi - lo));
                Some(a[i]? * (1.0 - w) + b[i]? * w)
            }
        })
        .collect();
    store(&mut out, Some(first), &name, to_cells(values))?;
    record(
        &mut out,
        vec![
            ("operation", Value::from("blend_by_step")),
            ("by_step_value", Value::from(by_step_value)),
            ("compare_mode", Value::from(args.str_or(4, "compare_mode", "value")?)),
            ("start", Value::from(start)),
            ("end", Value::from(end)),
            ("blend_method", Value::from(args.str_or(6, "blend_method", "linear")?)),
        ],
    );
    Ok(out.into())
}

/// `conditional_select(column1, column2, condition_column, threshold = 0,
/// compare = ">", result_column?)`.
///
/// Takes `column1` where `condition_column` satisfies the comparison and
/// `column2` everywhere else, including rows with a missing condition.
pub fn conditional_select(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (first, second) = pair(c, args)?;
    let condition = c.column(args.str(2, "condition_column")?)?;
    let threshold = match args.get(3, "threshold").map(Value::to_cell) {
        None => Scalar::Int(0),
        Some(Some(Some(s))) => s,
        Some(_) => return Err(TascError::invalid("'threshold' must be a scalar")),
    };
    let compare_symbol = args.str_or(4, "compare", ">")?;
    let compare = Comparison::parse(compare_symbol)?;

    let default_name = format!(
        "select({},{},where:{}{compare_symbol}{threshold})",
        first.name(),
        second.name(),
        condition.name()
    );
    let name = args.str_or(5, "result_column", &default_name)?.to_string();

    let values: Vec<Cell> = condition
        .values()
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let hit = cell.as_ref().is_some_and(|v| compare.matches(v, &threshold));
            let source = if hit { first } else { second };
            source.values()[i].clone()
        })
        .collect();

    let mut out = c.clone();
    store(&mut out, Some(first), &name, values)?;
    Ok(out.into())
}

/// Element-wise `combine` of two columns. A missing cell on one side
/// yields the other side; both missing stays missing.
pub fn custom_combine<F>(
    c: &ColumnCollection,
    column1: &str,
    column2: &str,
    result_column: &str,
    combine: F,
) -> Result<ColumnCollection>
where
    F: Fn(f64, f64) -> f64,
{
    let first = c.column(column1)?;
    let a = numeric(first)?;
    let b = numeric(c.column(column2)?)?;
    let values = a
        .into_iter()
        .zip(b)
        .map(|pair| match pair {
            (Some(x), Some(y)) => Some(combine(x, y)),
            (x, None) => x,
            (None, y) => y,
        })
        .collect();
    let mut out = c.clone();
    store(&mut out, Some(first), result_column, to_cells(values))?;
    Ok(out)
}
