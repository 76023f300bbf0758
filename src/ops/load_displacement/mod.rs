//! Operations of the `load_displacement` domain.
//!
//! Every operation here reads the load and displacement columns named by
//! the collection's [`LoadDisplacement`](crate::domains::LoadDisplacement)
//! payload. Curves whose length differs from the step index (skeleton,
//! cumulative) are stored in metadata under `curves.<name>`, never as
//! columns.

pub mod analysis;
pub mod curves;
pub mod cycles;
pub mod plot;

use super::core::numeric;
use super::OperationRegistry;
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::domains::LOAD_DISPLACEMENT;
use crate::error::{Result, TascError};

pub(crate) fn register(registry: &mut OperationRegistry) {
    registry.register(LOAD_DISPLACEMENT, "cycle_count", cycles::cycle_count);
    registry.register(LOAD_DISPLACEMENT, "split_by_cycles", cycles::split_by_cycles);

    registry.register(LOAD_DISPLACEMENT, "calculate_slopes", analysis::calculate_slopes);
    registry.register(LOAD_DISPLACEMENT, "calculate_stiffness", analysis::calculate_stiffness);
    registry.register(LOAD_DISPLACEMENT, "find_yield_point", analysis::find_yield_point);

    registry.register(LOAD_DISPLACEMENT, "create_skeleton_curve", curves::create_skeleton_curve);
    registry.register(LOAD_DISPLACEMENT, "create_cumulative_curve", curves::create_cumulative_curve);

    registry.register(LOAD_DISPLACEMENT, "plot", plot::plot);
    registry.register(LOAD_DISPLACEMENT, "plot_skeleton_curve", plot::plot_skeleton_curve);
    registry.register(LOAD_DISPLACEMENT, "plot_cumulative_curve", plot::plot_cumulative_curve);
    registry.register(LOAD_DISPLACEMENT, "plot_yield_point", plot::plot_yield_point);
    registry.register(LOAD_DISPLACEMENT, "compare_yield_methods", plot::compare_yield_methods);
}

/// The load and displacement columns of a load-displacement collection.
pub(crate) fn load_and_displacement(c: &ColumnCollection) -> Result<(&Column, &Column)> {
    match (c.load_column(), c.displacement_column()) {
        (Some(load), Some(disp)) => Ok((c.column(load)?, c.column(disp)?)),
        _ => Err(TascError::invalid(format!(
            "needs a load_displacement collection, this one is '{}'",
            c.domain_name()
        ))),
    }
}

/// Row-aligned `(displacement, load)` pairs where both are present.
pub(crate) fn valid_pairs(c: &ColumnCollection) -> Result<(Vec<f64>, Vec<f64>)> {
    let (load, disp) = load_and_displacement(c)?;
    let mut displacements = Vec::with_capacity(c.len());
    let mut loads = Vec::with_capacity(c.len());
    for (d, l) in numeric(disp)?.into_iter().zip(numeric(load)?) {
        if let (Some(d), Some(l)) = (d, l) {
            displacements.push(d);
            loads.push(l);
        }
    }
    Ok((displacements, loads))
}

/// First column whose name mentions "cycle".
pub(crate) fn find_cycle_column(c: &ColumnCollection) -> Option<&str> {
    c.column_names()
        .into_iter()
        .find(|name| name.to_lowercase().contains("cycle"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::core::fixtures::sample;

    #[test]
    fn test_valid_pairs_requires_domain() {
        assert!(valid_pairs(&sample()).is_err());
        let (disp, load) = valid_pairs(&fixtures::cyclic()).unwrap();
        assert_eq!(disp.len(), 14);
        assert_eq!(load[2], 10.0);
    }
}
