use super::{find_cycle_column, load_and_displacement};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{Metadata, Scalar, Value};
use crate::error::Result;
use crate::ops::core::numeric;
use crate::ops::core::split::split_rows;
use crate::ops::{OpArgs, OpOutput};

/// Cycle numbers from sign reversals: the count starts at 1 and grows by
/// `step` every time two consecutive present values have opposite signs.
/// Markers are the whole part of the running count.
pub fn count_cycles(data: &[Option<f64>], step: f64) -> Vec<i64> {
    let mut cycle = 1.0;
    data.iter()
        .enumerate()
        .map(|(i, &v)| {
            if i > 0 {
                if let (Some(prev), Some(cur)) = (data[i - 1], v) {
                    if prev * cur < 0.0 {
                        cycle += step;
                    }
                }
            }
            cycle.trunc() as i64
        })
        .collect()
}

/// `cycle_count(column?, step = 0.5, result_column?)`.
///
/// `column` defaults to the load column; the result lands in
/// `<column>_cycle` as integer markers.
pub fn cycle_count(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    Ok(with_cycle_column(c, args)?.0.into())
}

fn with_cycle_column(c: &ColumnCollection, args: &OpArgs) -> Result<(ColumnCollection, String)> {
    let source = match args.opt_str(0, "column")? {
        Some(name) => c.column(name)?,
        None => load_and_displacement(c)?.0,
    };
    let step = args.f64_or(1, "step", 0.5)?;
    let result_name = args
        .opt_str(2, "result_column")?
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_cycle", source.name()));

    let markers = count_cycles(&numeric(source)?, step);
    log::debug!(
        "cycle_count: '{}' spans {} cycles",
        source.name(),
        markers.last().copied().unwrap_or(0)
    );

    let mut meta = Metadata::new();
    meta.insert(
        "description".to_string(),
        Value::from(format!("Cycle count based on {}", source.name())),
    );
    let column = Column::detect(
        result_name.as_str(),
        markers.into_iter().map(|m| Some(Scalar::Int(m))).collect(),
    )
    .with_metadata(meta);

    let mut out = c.clone();
    out.upsert_column(column)?;
    Ok((out, result_name))
}

/// The collection to work on and its per-row cycle markers.
///
/// Without `cycle_column`, the first column whose name mentions "cycle" is
/// used; when there is none, cycles are counted on the load column and the
/// returned collection carries the new marker column. Missing markers read
/// as cycle 0 and fractional ones are truncated.
pub(crate) fn resolve_cycles(
    c: &ColumnCollection,
    cycle_column: Option<&str>,
) -> Result<(ColumnCollection, Vec<i64>)> {
    let (source, name) = match cycle_column.or_else(|| find_cycle_column(c)) {
        Some(name) => (c.clone(), name.to_string()),
        None => with_cycle_column(c, &OpArgs::new())?,
    };
    let markers = numeric(source.column(&name)?)?
        .into_iter()
        .map(|m| m.map_or(0, |m| m.trunc() as i64))
        .collect();
    Ok((source, markers))
}

/// `split_by_cycles(cycle_column?)`: one collection per cycle, in cycle
/// order.
pub fn split_by_cycles(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (source, markers) = resolve_cycles(c, args.opt_str(0, "cycle_column")?)?;
    let groups = split_rows(&source, &markers)?;
    log::debug!("split_by_cycles: {} cycles", groups.len());
    Ok(OpOutput::Collections(groups))
}
