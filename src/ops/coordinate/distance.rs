use std::collections::BTreeMap;

use super::{coordinate_map, distance_between, position};
use crate::data::collection::ColumnCollection;
use crate::data::value::{insert_path, Value};
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// `calculate_distance(column1, column2)` → number.
pub fn calculate_distance(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let d = distance_between(c, args.str(0, "column1")?, args.str(1, "column2")?)?;
    Ok(Value::from(d).into())
}

/// `calculate_distance_matrix(columns?)`.
///
/// Pairwise distances go to `analysis.distance_matrix` as `{columns,
/// matrix}`; pairs without a measurable distance hold null.
pub fn calculate_distance_matrix(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let columns = match args.str_list(0, "columns")? {
        Some(names) => names,
        None => coordinate_map(c)?
            .columns_with_coordinates()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    if columns.len() < 2 {
        return Err(TascError::invalid("a distance matrix needs at least two columns"));
    }

    let n = columns.len();
    let mut matrix = vec![vec![Value::Float(0.0); n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = match distance_between(c, &columns[i], &columns[j]) {
                Ok(d) => Value::Float(d),
                Err(TascError::InvalidArgument(_)) => Value::Null,
                Err(e) => return Err(e),
            };
            matrix[i][j] = d.clone();
            matrix[j][i] = d;
        }
    }

    let mut entry = BTreeMap::new();
    entry.insert("columns".to_string(), Value::from(columns));
    entry.insert(
        "matrix".to_string(),
        Value::List(matrix.into_iter().map(Value::List).collect()),
    );
    let mut out = c.clone();
    insert_path(out.metadata_mut(), "analysis.distance_matrix", Value::Map(entry));
    Ok(out.into())
}

/// `find_nearest_neighbors(column, n_neighbors = 3)`.
///
/// Ranks the other positioned columns by distance and stores the closest
/// under `analysis.nearest_neighbors` as `{reference_column, neighbors:
/// [{column, distance}]}`.
pub fn find_nearest_neighbors(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = args.str(0, "column")?;
    let n_neighbors = args.usize_or(1, "n_neighbors", 3)?;

    let candidates = coordinate_map(c)?.columns_with_coordinates();
    if !candidates.contains(&column) {
        position(c, column)?;
        return Err(TascError::invalid(format!("column '{column}' has no coordinates")));
    }
    if candidates.len() < 2 {
        return Err(TascError::invalid("nearest neighbours need at least two positioned columns"));
    }

    let mut ranked: Vec<(&str, f64)> = candidates
        .iter()
        .filter(|&&other| other != column)
        .filter_map(|&other| Some((other, distance_between(c, column, other).ok()?)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.truncate(n_neighbors);

    let neighbors: Vec<Value> = ranked
        .iter()
        .map(|(other, d)| {
            let mut m = BTreeMap::new();
            m.insert("column".to_string(), Value::from(*other));
            m.insert("distance".to_string(), Value::from(*d));
            Value::Map(m)
        })
        .collect();
    log::debug!("find_nearest_neighbors: {} neighbours of '{column}'", neighbors.len());

    let mut entry = BTreeMap::new();
    entry.insert("reference_column".to_string(), Value::from(column));
    entry.insert("neighbors".to_string(), Value::List(neighbors));
    let mut out = c.clone();
    insert_path(out.metadata_mut(), "analysis.nearest_neighbors", Value::Map(entry));
    Ok(out.into())
}
