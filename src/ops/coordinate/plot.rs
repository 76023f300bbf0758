use super::coordinate_map;
use crate::color::{generate_palette, value_color};
use crate::data::collection::ColumnCollection;
use crate::data::value::Scalar;
use crate::error::{Result, TascError};
use crate::ops::core::numeric;
use crate::ops::core::plot::{surface, PlotType};
use crate::ops::{OpArgs, OpOutput};
use crate::plot::LineSeries;

const X_LABEL: &str = "X [m]";
const Y_LABEL: &str = "Y [m]";

/// Positioned columns with known x and y, in name order.
fn planar_positions(c: &ColumnCollection) -> Result<Vec<(&str, f64, f64)>> {
    let map = coordinate_map(c)?;
    let placed: Vec<(&str, f64, f64)> = map
        .iter()
        .filter_map(|(name, p)| Some((name, p.x?, p.y?)))
        .collect();
    if placed.is_empty() {
        return Err(TascError::invalid("no column has both an x and a y coordinate"));
    }
    Ok(placed)
}

/// `plot_coordinates(labels = true)`: one marker per positioned column.
///
/// With `labels` each marker series is named after its column. Only the
/// plan view is drawn; z is ignored.
pub fn plot_coordinates(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let labels = args.bool_or(0, "labels", true)?;
    let placed = planar_positions(c)?;

    let mut surface = surface.borrow_mut();
    for ((name, x, y), color) in placed.iter().zip(generate_palette(placed.len())) {
        surface.draw_points(LineSeries {
            name: if labels { name.to_string() } else { String::new() },
            points: vec![[*x, *y]],
            color,
            width: 4.0,
        });
    }
    surface.set_axis_labels(X_LABEL, Y_LABEL);
    Ok(c.clone().into())
}

/// `plot_spatial_values(step_index = 0, plot_type = "scatter")`.
///
/// Each positioned column's value at row `step_index`, placed at its
/// position. Scatter markers are coloured on a blue-to-red ramp between
/// the smallest and largest value; `line` joins the positions in order
/// of x. Columns with a missing value at that row are left out.
pub fn plot_spatial_values(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let row = args.usize_or(0, "step_index", 0)?;
    let plot_type = PlotType::parse(args.str_or(1, "plot_type", "scatter")?)?;
    if row >= c.len() {
        return Err(TascError::invalid(format!(
            "step_index {row} is out of range for {} rows",
            c.len()
        )));
    }

    let mut placed = Vec::new();
    for (name, x, y) in planar_positions(c)? {
        if let Some(value) = c.column(name)?.values()[row].as_ref().and_then(Scalar::as_f64) {
            placed.push((name, x, y, value));
        }
    }
    if placed.is_empty() {
        return Err(TascError::invalid(format!(
            "no positioned column has a numeric value at row {row}"
        )));
    }

    let min = placed.iter().map(|p| p.3).fold(f64::INFINITY, f64::min);
    let max = placed.iter().map(|p| p.3).fold(f64::NEG_INFINITY, f64::max);
    let scale = |v: f64| if max > min { (v - min) / (max - min) } else { 0.0 };

    let mut surface = surface.borrow_mut();
    match plot_type {
        PlotType::Scatter => {
            for (name, x, y, value) in &placed {
                surface.draw_points(LineSeries {
                    name: format!("{name}: {value}"),
                    points: vec![[*x, *y]],
                    color: value_color(scale(*value)),
                    width: 4.0,
                });
            }
        }
        PlotType::Line => {
            placed.sort_by(|a, b| a.1.total_cmp(&b.1));
            surface.draw_line(LineSeries {
                name: format!("step {}", c.step()[row]),
                points: placed.iter().map(|p| [p.1, p.2]).collect(),
                color: value_color(0.0),
                width: 1.5,
            });
        }
    }
    surface.set_axis_labels(X_LABEL, Y_LABEL);
    Ok(c.clone().into())
}

/// `plot_coordinate_timeseries(time_column = step)`: one line per
/// positioned column, value against step or against `time_column`.
///
/// Rows where either the value or the time is missing are skipped.
pub fn plot_coordinate_timeseries(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let (time, time_label) = match args.opt_str(0, "time_column")? {
        Some(name) => (numeric(c.column(name)?)?, name.to_string()),
        None => (c.step().iter().copied().map(Some).collect(), "Step".to_string()),
    };
    let placed = planar_positions(c)?;

    let mut surface = surface.borrow_mut();
    for ((name, _, _), color) in placed.iter().zip(generate_palette(placed.len())) {
        let points = numeric(c.column(name)?)?
            .into_iter()
            .zip(&time)
            .filter_map(|(v, t)| Some([(*t)?, v?]))
            .collect();
        surface.draw_line(LineSeries {
            name: name.to_string(),
            points,
            color,
            width: 1.5,
        });
    }
    surface.set_axis_labels(&time_label, "Value");
    Ok(c.clone().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::coordinate::fixtures::gauges;
    use crate::ops::core::fixtures::{registry, sample};
    use crate::plot::{DrawCall, RecordingSurface};

    #[test]
    fn test_plot_coordinates_marks_each_position() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        gauges()
            .ops(&registry)
            .call("plot_coordinates", OpArgs::new().surface(handle))
            .unwrap();
        let recording = recording.borrow();
        let names: Vec<&str> = recording.series().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["g1", "g2", "g3"], "g4 has no position");
        assert_eq!(recording.series().nth(1).unwrap().points, vec![[3.0, 4.0]]);
        assert_eq!(recording.x_label.as_deref(), Some("X [m]"));
    }

    #[test]
    fn test_plot_spatial_values_colours_by_value() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        gauges()
            .ops(&registry)
            .call("plot_spatial_values", OpArgs::new().surface(handle).arg(2))
            .unwrap();
        let recording = recording.borrow();
        let series: Vec<&LineSeries> = recording.series().collect();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].color, value_color(0.0), "g1 = 3 is the minimum");
        assert_eq!(series[2].color, value_color(1.0), "g3 = 9 is the maximum");
    }

    #[test]
    fn test_plot_spatial_values_skips_missing_and_draws_lines() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        gauges()
            .ops(&registry)
            .call(
                "plot_spatial_values",
                OpArgs::new().surface(handle).arg(1).arg("line"),
            )
            .unwrap();
        let recording = recording.borrow();
        assert_eq!(recording.calls.len(), 1);
        match &recording.calls[0] {
            DrawCall::Line(series) => assert_eq!(series.points, vec![[0.0, 0.0], [3.0, 4.0]]),
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn test_spatial_plots_need_positions_and_rows() {
        let (_recording, handle) = RecordingSurface::shared();
        let args = OpArgs::new().surface(handle.clone()).arg(7);
        assert!(plot_spatial_values(&gauges(), &args).is_err());
        assert!(plot_coordinates(&sample(), &OpArgs::new().surface(handle)).is_err());
    }

    #[test]
    fn test_plot_coordinate_timeseries_draws_each_gauge() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        gauges()
            .ops(&registry)
            .call("plot_coordinate_timeseries", OpArgs::new().surface(handle))
            .unwrap();
        let recording = recording.borrow();
        let series: Vec<&LineSeries> = recording.series().collect();
        assert_eq!(series.len(), 3);
        assert_eq!(series[1].points.len(), 3);
        assert_eq!(series[2].points.len(), 2, "missing g3 value is skipped");
        assert_eq!(recording.x_label.as_deref(), Some("Step"));
    }
}
