use std::collections::{BTreeMap, BTreeSet};

use super::keep_rows;
use crate::data::collection::ColumnCollection;
use crate::data::value::{Cell, Scalar, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

// ---------------------------------------------------------------------------
// Filter predicate: which cell values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection: column name → set of accepted cells. `None` in a
/// set accepts missing cells.
pub type FilterState = BTreeMap<String, BTreeSet<Cell>>;

/// Return indices of rows that pass every column filter.
///
/// A row passes a column filter when:
/// * the filter set for that column is empty → nothing selected → fails
/// * the row's cell equals one of the selected cells (integers and floats
///   compare by value) → passes
pub fn filtered_indices(collection: &ColumnCollection, filters: &FilterState) -> Result<Vec<usize>> {
    let mut resolved = Vec::with_capacity(filters.len());
    for (name, selected) in filters {
        resolved.push((collection.column(name)?, selected));
    }
    Ok((0..collection.len())
        .filter(|&i| {
            resolved.iter().all(|(column, selected)| {
                if selected.is_empty() {
                    return false;
                }
                let cell = &column.values()[i];
                selected.contains(cell) || selected.iter().any(|s| loosely_equal(s, cell))
            })
        })
        .collect())
}

fn loosely_equal(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.loose_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// `filter_by_value(column, value, tolerance?)`: rows equal to `value`, or
/// within `±tolerance` of it for numbers.
pub fn filter_by_value(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = c.column(args.str(0, "column")?)?;
    let target = to_scalar(args.required(1, "value")?)?;
    let tolerance = args.opt_f64(2, "tolerance")?;

    let values = column.values();
    let out = match (tolerance, target.as_f64()) {
        (Some(tol), Some(t)) => keep_rows(c, |i| {
            values[i]
                .as_ref()
                .and_then(Scalar::as_f64)
                .is_some_and(|v| v >= t - tol && v <= t + tol)
        })?,
        (Some(_), None) => {
            return Err(TascError::invalid("a tolerance needs a numeric value"));
        }
        (None, _) => keep_rows(c, |i| values[i].as_ref().is_some_and(|v| v.loose_eq(&target)))?,
    };
    Ok(out.into())
}

/// `filter_by_values(column, values)`: rows whose cell is one of `values`;
/// a `null` entry keeps rows where the cell is missing.
pub fn filter_by_values(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let name = args.str(0, "column")?;
    let list = args
        .required(1, "values")?
        .as_list()
        .ok_or_else(|| TascError::invalid("'values' must be a list"))?;

    let mut selected = BTreeSet::new();
    for value in list {
        let cell = value
            .to_cell()
            .ok_or_else(|| TascError::invalid("'values' must hold scalars or null"))?;
        selected.insert(cell);
    }
    let mut filters = FilterState::new();
    filters.insert(name.to_string(), selected);

    let indices = filtered_indices(c, &filters)?;
    Ok(c.take_rows(&indices)?.into())
}

fn to_scalar(value: &Value) -> Result<Scalar> {
    match value.to_cell() {
        Some(Some(s)) => Ok(s),
        _ => Err(TascError::invalid(format!("cannot compare against {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::core::fixtures::{registry, sample};

    #[test]
    fn test_filter_by_value_exact_and_tolerance() {
        let registry = registry();
        let exact = sample()
            .ops(&registry)
            .call("filter_by_value", OpArgs::new().arg("label").arg("y"))
            .unwrap()
            .end();
        assert_eq!(exact.step(), &[2.0, 5.0]);

        let near = sample()
            .ops(&registry)
            .call(
                "filter_by_value",
                OpArgs::new().arg("b").arg(30).with("tolerance", 10.0),
            )
            .unwrap()
            .end();
        assert_eq!(near.step(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_filter_by_values_keeps_missing_on_null() {
        let registry = registry();
        let out = sample()
            .ops(&registry)
            .call(
                "filter_by_values",
                OpArgs::new().arg("a").arg(vec![Value::Int(1), Value::Null]),
            )
            .unwrap()
            .end();
        assert_eq!(out.step(), &[1.0, 3.0]);
    }

    #[test]
    fn test_empty_selection_hides_everything() {
        let c = sample();
        let mut filters = FilterState::new();
        filters.insert("label".to_string(), BTreeSet::new());
        assert!(filtered_indices(&c, &filters).unwrap().is_empty());

        filters.insert("ghost".to_string(), BTreeSet::new());
        assert!(filtered_indices(&c, &filters).is_err());
    }
}
