use super::analysis::find_yield_point;
use super::{load_and_displacement, valid_pairs};
use crate::color::{generate_palette, Rgb};
use crate::data::collection::ColumnCollection;
use crate::data::value::Value;
use crate::error::{Result, TascError};
use crate::ops::core::numeric;
use crate::ops::core::plot::{self as core_plot, surface};
use crate::ops::{OpArgs, OpOutput};
use crate::plot::{axis_label, points, LineSeries, SharedSurface};

/// `plot(plot_type = "line", normalize = false)`: load against
/// displacement, labelled with both units.
pub fn plot(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (load, disp) = load_and_displacement(c)?;
    let forwarded = OpArgs::new()
        .surface(surface(args)?.clone())
        .with("x_column", disp.name())
        .with("y_columns", load.name())
        .with("plot_type", args.str_or(0, "plot_type", "line")?)
        .with("normalize", args.bool_or(1, "normalize", false)?);
    core_plot::plot(c, &forwarded)
}

/// Raw record as a thin grey line, and the axis labels of the record.
fn draw_original(c: &ColumnCollection, surface: &SharedSurface) -> Result<()> {
    let (load, disp) = load_and_displacement(c)?;
    let series = LineSeries {
        name: "Original Data".to_string(),
        points: points(&numeric(disp)?, &numeric(load)?),
        color: Rgb::GRAY,
        width: 1.0,
    };
    let mut surface = surface.borrow_mut();
    surface.draw_line(series);
    surface.set_axis_labels(
        &axis_label(disp.name(), disp.unit()),
        &axis_label(load.name(), load.unit()),
    );
    Ok(())
}

/// Points of a stored `curves.<name>` entry.
fn stored_curve(c: &ColumnCollection, name: &str) -> Result<Vec<[f64; 2]>> {
    let axis = |axis: &str| -> Result<Vec<f64>> {
        let path = format!("curves.{name}.{axis}");
        c.metadata_path(&path)?
            .as_list()
            .ok_or_else(|| TascError::invalid(format!("'{path}' is not a list")))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| TascError::invalid(format!("'{path}' holds a non-number: {v}")))
            })
            .collect()
    };
    Ok(axis("x")?.into_iter().zip(axis("y")?).map(|(x, y)| [x, y]).collect())
}

fn overlay_curve(
    c: &ColumnCollection,
    args: &OpArgs,
    curve: &str,
    label: &str,
) -> Result<OpOutput> {
    let surface = surface(args)?;
    let points = stored_curve(c, curve)?;
    if args.bool_or(0, "plot_original", true)? {
        draw_original(c, surface)?;
    }
    surface.borrow_mut().draw_line(LineSeries {
        name: label.to_string(),
        points,
        color: Rgb::STEEL_BLUE,
        width: 2.0,
    });
    Ok(c.clone().into())
}

/// `plot_skeleton_curve(plot_original = true)`: draws the curve stored by
/// `create_skeleton_curve`, optionally over the raw record.
pub fn plot_skeleton_curve(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    overlay_curve(c, args, "skeleton_curve", "Skeleton Curve")
}

/// `plot_cumulative_curve(plot_original = true)`.
pub fn plot_cumulative_curve(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    overlay_curve(c, args, "cumulative_curve", "Cumulative Curve")
}

/// `plot_yield_point(plot_original = true, plot_initial_slope = true)`:
/// marks the point stored by `find_yield_point`.
pub fn plot_yield_point(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let field = |key: &str| -> Result<f64> {
        let path = format!("analysis.yield_point.{key}");
        c.metadata_path(&path)?
            .as_f64()
            .ok_or_else(|| TascError::invalid(format!("'{path}' is not a number")))
    };
    let (disp, load, slope) = (field("displacement")?, field("load")?, field("initial_slope")?);
    let method = c
        .metadata_path("analysis.yield_point.method")
        .ok()
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if args.bool_or(0, "plot_original", true)? {
        draw_original(c, surface)?;
    }
    let mut surface = surface.borrow_mut();
    if args.bool_or(1, "plot_initial_slope", true)? && slope != 0.0 {
        surface.draw_line(LineSeries {
            name: format!("Initial Slope: {slope:.2}"),
            points: vec![[0.0, 0.0], [load / slope, load]],
            color: Rgb::FOREST_GREEN,
            width: 1.0,
        });
    }
    surface.draw_points(LineSeries {
        name: format!("Yield Point ({method})"),
        points: vec![[disp, load]],
        color: Rgb::CRIMSON,
        width: 4.0,
    });
    Ok(c.clone().into())
}

fn default_yield_methods() -> Vec<Value> {
    let method = |pairs: [(&str, Value); 2]| {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    };
    vec![
        method([("method", "offset".into()), ("offset_value", 0.002.into())]),
        method([("method", "general".into()), ("factor", 0.33.into())]),
    ]
}

/// `compare_yield_methods(methods?)`: runs `find_yield_point` once per
/// entry of `methods` (maps of its arguments) and marks every result over
/// the raw record. Offset results also get their offset line. Defaults to
/// the offset method at 0.002 and the general method at factor 0.33.
pub fn compare_yield_methods(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let methods = match args.get(0, "methods") {
        Some(Value::List(items)) => items.clone(),
        Some(other) => {
            return Err(TascError::invalid(format!(
                "'methods' must be a list of argument maps, got {other}"
            )))
        }
        None => default_yield_methods(),
    };
    let (disp, _) = valid_pairs(c)?;
    let max_disp = disp.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    draw_original(c, surface)?;
    for (entry, color) in methods.iter().zip(generate_palette(methods.len())) {
        let params = entry.as_map().ok_or_else(|| {
            TascError::invalid(format!("yield method entries must be maps, got {entry}"))
        })?;
        let call = params
            .iter()
            .fold(OpArgs::new(), |call, (k, v)| call.with(k.as_str(), v.clone()));
        let analysed = match find_yield_point(c, &call)? {
            OpOutput::Collection(out) => out,
            _ => return Err(TascError::invalid("find_yield_point did not return a collection")),
        };
        let field = |key: &str| -> Result<f64> {
            let path = format!("analysis.yield_point.{key}");
            analysed
                .metadata_path(&path)?
                .as_f64()
                .ok_or_else(|| TascError::invalid(format!("'{path}' is not a number")))
        };
        let (yield_disp, yield_load, slope) =
            (field("displacement")?, field("load")?, field("initial_slope")?);
        let offset = field("parameters.offset_value")?;
        let factor = field("parameters.factor")?;
        let is_offset = analysed
            .metadata_path("analysis.yield_point.method")?
            .as_str()
            == Some("offset");

        let label = if is_offset {
            format!("Offset ({offset})")
        } else {
            format!("General (factor={factor})")
        };
        let mut surface = surface.borrow_mut();
        surface.draw_points(LineSeries {
            name: label,
            points: vec![[yield_disp, yield_load]],
            color,
            width: 4.0,
        });
        if is_offset {
            surface.draw_line(LineSeries {
                name: format!("Offset Line ({offset})"),
                points: vec![[0.0, -slope * offset], [max_disp, slope * (max_disp - offset)]],
                color,
                width: 1.0,
            });
        }
    }
    Ok(c.clone().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::core::fixtures::registry;
    use crate::ops::load_displacement::fixtures::{bilinear, cyclic};
    use crate::plot::{DrawCall, RecordingSurface};

    #[test]
    fn test_plot_draws_load_against_displacement() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        cyclic()
            .ops(&registry)
            .call("plot", OpArgs::new().surface(handle))
            .unwrap();
        let recording = recording.borrow();
        assert_eq!(recording.calls.len(), 1);
        match &recording.calls[0] {
            DrawCall::Line(series) => {
                assert_eq!(series.name, "load");
                assert_eq!(series.points[2], [2.0, 10.0]);
            }
            other => panic!("expected a line, got {other:?}"),
        }
        assert_eq!(recording.x_label.as_deref(), Some("disp [mm]"));
        assert_eq!(recording.y_label.as_deref(), Some("load [kN]"));
    }

    #[test]
    fn test_plot_skeleton_curve_over_original() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        cyclic()
            .ops(&registry)
            .call("create_skeleton_curve", OpArgs::new())
            .unwrap()
            .call("plot_skeleton_curve", OpArgs::new().surface(handle))
            .unwrap();
        let recording = recording.borrow();
        let series: Vec<&LineSeries> = recording.series().collect();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "Original Data");
        assert_eq!(series[0].color, Rgb::GRAY);
        assert_eq!(series[1].name, "Skeleton Curve");
        assert_eq!(series[1].width, 2.0);
    }

    #[test]
    fn test_plot_skeleton_curve_requires_stored_curve() {
        let registry = registry();
        let (_recording, handle) = RecordingSurface::shared();
        let err = cyclic()
            .ops(&registry)
            .call("plot_skeleton_curve", OpArgs::new().surface(handle).arg(false))
            .unwrap_err();
        assert!(matches!(err, TascError::PathNotFound { .. }));
    }

    #[test]
    fn test_compare_yield_methods_defaults() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        let out = bilinear()
            .ops(&registry)
            .call("compare_yield_methods", OpArgs::new().surface(handle))
            .unwrap()
            .end();
        assert!(out.metadata_path("analysis.yield_point").is_err(), "the input is returned as is");

        let recording = recording.borrow();
        let names: Vec<&str> = recording.series().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Original Data", "Offset (0.002)", "Offset Line (0.002)", "General (factor=0.33)"]
        );
        match &recording.calls[3] {
            DrawCall::Points(series) => {
                let [d, l] = series.points[0];
                assert!((d - 0.011).abs() < 1e-9 && (l - 10.1).abs() < 1e-9, "got {d}, {l}");
            }
            other => panic!("expected points, got {other:?}"),
        }
    }

    #[test]
    fn test_compare_yield_methods_custom_list() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        let general = |factor: f64| {
            Value::Map(
                [
                    ("method".to_string(), Value::from("general")),
                    ("factor".to_string(), Value::from(factor)),
                ]
                .into_iter()
                .collect(),
            )
        };
        bilinear()
            .ops(&registry)
            .call(
                "compare_yield_methods",
                OpArgs::new()
                    .surface(handle)
                    .arg(Value::List(vec![general(0.33), general(0.5)])),
            )
            .unwrap();
        let recording = recording.borrow();
        assert_eq!(recording.calls.len(), 3);
        assert_ne!(
            recording.series().nth(1).unwrap().color,
            recording.series().nth(2).unwrap().color
        );
    }

    #[test]
    fn test_plot_yield_point_marks_the_point() {
        let registry = registry();
        let (recording, handle) = RecordingSurface::shared();
        bilinear()
            .ops(&registry)
            .call("find_yield_point", OpArgs::new())
            .unwrap()
            .call(
                "plot_yield_point",
                OpArgs::new().surface(handle).with("plot_original", false),
            )
            .unwrap();
        let recording = recording.borrow();
        assert_eq!(recording.calls.len(), 2);
        match &recording.calls[1] {
            DrawCall::Points(series) => assert_eq!(series.name, "Yield Point (offset)"),
            other => panic!("expected points, got {other:?}"),
        }
    }
}
