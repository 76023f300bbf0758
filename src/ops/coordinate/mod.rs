//! Operations of the `coordinate` domain: per-column sensor positions and
//! the spatial analyses built on them.

pub mod basic;
pub mod distance;
pub mod interpolation;
pub mod plot;

use super::OperationRegistry;
use crate::data::collection::ColumnCollection;
use crate::domains::{Coordinate, CoordinateMap, COORDINATE};
use crate::error::{Result, TascError};

pub(crate) fn register(registry: &mut OperationRegistry) {
    registry.register(COORDINATE, "set_column_coordinates", basic::set_column_coordinates);
    registry.register(COORDINATE, "get_column_coordinates", basic::get_column_coordinates);
    registry.register(COORDINATE, "get_columns_with_coordinates", basic::get_columns_with_coordinates);
    registry.register(COORDINATE, "extract_coordinates", basic::extract_coordinates);

    registry.register(COORDINATE, "calculate_distance", distance::calculate_distance);
    registry.register(COORDINATE, "calculate_distance_matrix", distance::calculate_distance_matrix);
    registry.register(COORDINATE, "find_nearest_neighbors", distance::find_nearest_neighbors);

    registry.register(COORDINATE, "interpolate_at_point", interpolation::interpolate_at_point);

    registry.register(COORDINATE, "plot_coordinates", plot::plot_coordinates);
    registry.register(COORDINATE, "plot_spatial_values", plot::plot_spatial_values);
    registry.register(COORDINATE, "plot_coordinate_timeseries", plot::plot_coordinate_timeseries);
}

pub(crate) fn coordinate_map(c: &ColumnCollection) -> Result<&CoordinateMap> {
    c.coordinates().ok_or_else(|| {
        TascError::invalid(format!(
            "needs a coordinate collection, this one is '{}'",
            c.domain_name()
        ))
    })
}

/// Position of `column`; unknown columns read as all-unknown.
pub(crate) fn position(c: &ColumnCollection, column: &str) -> Result<Coordinate> {
    c.column(column)?;
    Ok(coordinate_map(c)?.get(column).copied().unwrap_or_default())
}

/// Distance between the positions of two columns.
pub(crate) fn distance_between(c: &ColumnCollection, a: &str, b: &str) -> Result<f64> {
    position(c, a)?.distance(&position(c, b)?).ok_or_else(|| {
        TascError::invalid(format!(
            "'{a}' and '{b}' need known x and y coordinates to measure a distance"
        ))
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::data::collection::ColumnCollection;
    use crate::data::value::{cells, optional_cells, Metadata};
    use crate::domains::{Coordinate, CoordinateMap};

    /// Four strain gauges on a 3-4-5 grid; `g4` has no position.
    pub fn gauges() -> ColumnCollection {
        let c = ColumnCollection::from_raw(
            vec![1.0, 2.0, 3.0],
            vec![
                ("g1", cells([1.0, 2.0, 3.0])),
                ("g2", cells([2.0, 4.0, 6.0])),
                ("g3", optional_cells([Some(3.0), None, Some(9.0)])),
                ("g4", cells([0.0, 0.0, 0.0])),
            ],
            Metadata::new(),
            true,
        )
        .unwrap();
        let mut map = CoordinateMap::default();
        map.insert("g1", Coordinate::new(Some(0.0), Some(0.0), None));
        map.insert("g2", Coordinate::new(Some(3.0), Some(4.0), None));
        map.insert("g3", Coordinate::new(Some(6.0), Some(8.0), Some(1.0)));
        map.attach(c).unwrap()
    }
}
