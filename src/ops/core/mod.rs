//! Operations every domain inherits.

pub mod columns;
pub mod combine;
pub mod filters;
pub mod interpolate;
pub mod math;
pub mod plot;
pub mod search;
pub mod select;
pub mod split;
pub mod stats;
pub mod transform;

use std::sync::Arc;

use super::{OpArgs, OperationRegistry};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{Cell, Scalar};
use crate::domains::{DomainCollectionFactory, CORE};
use crate::error::{Result, TascError};

pub(crate) fn register(registry: &mut OperationRegistry, factory: Arc<DomainCollectionFactory>) {
    registry.register(CORE, "select", select::select);
    registry.register(CORE, "select_step", select::select_step);

    registry.register(CORE, "filter_by_value", filters::filter_by_value);
    registry.register(CORE, "filter_by_values", filters::filter_by_values);

    registry.register(CORE, "search_by_value", search::search_by_value);
    registry.register(CORE, "search_by_range", search::search_by_range);
    registry.register(CORE, "search_by_step_range", search::search_by_step_range);
    registry.register(CORE, "search_missing_values", search::search_missing_values);
    registry.register(CORE, "search_top_n", search::search_top_n);

    registry.register(CORE, "add", math::add);
    registry.register(CORE, "subtract", math::subtract);
    registry.register(CORE, "multiply", math::multiply);
    registry.register(CORE, "divide", math::divide);
    registry.register(CORE, "sum_columns", math::sum_columns);
    registry.register(CORE, "average_columns", math::average_columns);

    registry.register(CORE, "switch_by_step", combine::switch_by_step);
    registry.register(CORE, "blend_by_step", combine::blend_by_step);
    registry.register(CORE, "conditional_select", combine::conditional_select);

    registry.register(CORE, "abs_values", transform::abs_values);
    registry.register(CORE, "abs", transform::abs_values);
    registry.register(CORE, "round_values", transform::round_values);
    registry.register(CORE, "normalize", transform::normalize);
    registry.register(CORE, "sin", transform::sin);
    registry.register(CORE, "cos", transform::cos);
    registry.register(CORE, "tan", transform::tan);
    registry.register(CORE, "exp", transform::exp);
    registry.register(CORE, "log", transform::log);
    registry.register(CORE, "sqrt", transform::sqrt);
    registry.register(CORE, "pow", transform::pow);

    registry.register(CORE, "moving_average", stats::moving_average);
    registry.register(CORE, "detect_outliers", stats::detect_outliers);
    registry.register(CORE, "describe", stats::describe);
    registry.register(CORE, "aggregate", stats::aggregate);

    registry.register(CORE, "interpolate", interpolate::interpolate);
    registry.register(CORE, "split_by_integers", split::split_by_integers);

    registry.register(CORE, "add_column", columns::add_column);
    registry.register(CORE, "remove_column", columns::remove_column);
    registry.register(CORE, "rename_column", columns::rename_column);
    registry.register(CORE, "head", columns::head);
    registry.register(CORE, "tail", columns::tail);
    registry.register(CORE, "as_domain", move |c: &ColumnCollection, args: &OpArgs| {
        columns::as_domain(&factory, c, args)
    });

    registry.register(CORE, "plot", plot::plot);
}

// ---------------------------------------------------------------------------
// Helpers shared by the operation modules
// ---------------------------------------------------------------------------

/// Numeric view of a column. Missing cells stay `None`; any other
/// non-numeric cell is an error.
pub(crate) fn numeric(column: &Column) -> Result<Vec<Option<f64>>> {
    column
        .values()
        .iter()
        .map(|cell| match cell {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                TascError::invalid(format!(
                    "column '{}' holds a non-numeric {} value ({v})",
                    column.name(),
                    v.type_name()
                ))
            }),
        })
        .collect()
}

pub(crate) fn to_cells(values: Vec<Option<f64>>) -> Vec<Cell> {
    values.into_iter().map(|v| v.map(Scalar::Float)).collect()
}

/// Write `values` as column `name` of `out`.
///
/// An existing column of that name keeps its header and gets the new
/// values; otherwise a new column inherits the unit of `source`.
pub(crate) fn store(
    out: &mut ColumnCollection,
    source: Option<&Column>,
    name: &str,
    values: Vec<Cell>,
) -> Result<()> {
    let column = match out.column(name) {
        Ok(existing) if existing.name() == name => existing.with_values(values),
        _ => {
            let column = Column::detect(name, values);
            match source.and_then(Column::unit) {
                Some(unit) => column.with_unit(unit),
                None => column,
            }
        }
    };
    out.upsert_column(column)
}

/// Rows of `collection` kept by `keep`, as a new collection.
pub(crate) fn keep_rows<F>(collection: &ColumnCollection, keep: F) -> Result<ColumnCollection>
where
    F: Fn(usize) -> bool,
{
    let indices: Vec<usize> = (0..collection.len()).filter(|&i| keep(i)).collect();
    collection.take_rows(&indices)
}
