use std::collections::BTreeMap;

use crate::data::collection::ColumnCollection;
use crate::data::value::{Scalar, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// Group rows by integer marker, one collection per distinct marker in
/// ascending order. Every group keeps the source's metadata and domain.
pub fn split_rows(c: &ColumnCollection, markers: &[i64]) -> Result<Vec<ColumnCollection>> {
    if markers.len() != c.len() {
        return Err(TascError::invalid(format!(
            "{} markers for {} rows",
            markers.len(),
            c.len()
        )));
    }
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &m) in markers.iter().enumerate() {
        groups.entry(m).or_default().push(i);
    }
    groups
        .values()
        .map(|indices| c.take_rows(indices))
        .collect()
}

/// Integer markers from a column. Every cell must be a whole number.
pub(crate) fn column_markers(c: &ColumnCollection, name: &str) -> Result<Vec<i64>> {
    let column = c.column(name)?;
    column
        .values()
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Some(Scalar::Int(m)) => Ok(*m),
            Some(Scalar::Float(m)) if m.fract() == 0.0 => Ok(*m as i64),
            other => Err(TascError::invalid(format!(
                "marker column '{name}' holds a non-integer at row {i}: {other:?}"
            ))),
        })
        .collect()
}

/// `split_by_integers(markers)`: `markers` is a list as long as the
/// collection, or the name of a column holding the markers.
pub fn split_by_integers(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let markers = match args.required(0, "markers")? {
        Value::Str(name) => column_markers(c, name)?,
        Value::List(items) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| TascError::invalid(format!("marker {v} is not an integer")))
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(TascError::invalid(format!(
                "'markers' must be a list of integers or a column name, got {other}"
            )))
        }
    };
    let groups = split_rows(c, &markers)?;
    log::debug!("split_by_integers: {} rows into {} groups", c.len(), groups.len());
    Ok(OpOutput::Collections(groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::core::fixtures::{registry, sample};

    #[test]
    fn test_groups_in_ascending_marker_order() {
        let registry = registry();
        let groups = sample()
            .ops(&registry)
            .split("split_by_integers", OpArgs::new().arg(vec![2, 1, 2, 3, 1]))
            .unwrap()
            .end_all();
        let steps: Vec<Vec<f64>> = groups.iter().map(|g| g.step().to_vec()).collect();
        assert_eq!(steps, vec![vec![2.0, 5.0], vec![1.0, 3.0], vec![4.0]]);
    }

    #[test]
    fn test_markers_from_column() {
        let mut c = sample();
        c.add_values("group", crate::data::value::cells([0_i64, 0, 1, 1, 1])).unwrap();
        let groups = split_rows(&c, &column_markers(&c, "group").unwrap()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].len(), 3);
        assert!(column_markers(&c, "label").is_err());
    }

    #[test]
    fn test_marker_length_must_match() {
        let err = split_rows(&sample(), &[1, 2]).unwrap_err();
        assert!(matches!(err, TascError::InvalidArgument(_)));
    }
}
