use std::collections::BTreeMap;

use super::numeric;
use crate::color::{generate_palette, ColorMap, Rgb};
use crate::data::collection::ColumnCollection;
use crate::data::column::{Column, ColumnKind};
use crate::data::value::Scalar;
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};
use crate::plot::{axis_label, minmax_scale, points, LineSeries, SharedSurface};

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    Scatter,
    Line,
}

impl PlotType {
    pub(crate) fn parse(name: &str) -> Result<Self> {
        match name {
            "scatter" => Ok(PlotType::Scatter),
            "line" => Ok(PlotType::Line),
            other => Err(TascError::invalid(format!(
                "plot_type must be scatter or line, got '{other}'"
            ))),
        }
    }
}

pub(crate) fn surface(args: &OpArgs) -> Result<&SharedSurface> {
    args.plot_surface()
        .ok_or_else(|| TascError::invalid("plotting needs a surface, attach one with OpArgs::surface"))
}

pub(crate) fn draw(surface: &SharedSurface, plot_type: PlotType, series: LineSeries) {
    let mut surface = surface.borrow_mut();
    match plot_type {
        PlotType::Scatter => surface.draw_points(series),
        PlotType::Line => surface.draw_line(series),
    }
}

/// Numeric view and axis label of a column, or of the step index when
/// `column` is `None`.
pub(crate) fn axis(c: &ColumnCollection, column: Option<&Column>) -> Result<(Vec<Option<f64>>, String)> {
    Ok(match column {
        Some(column) => (numeric(column)?, axis_label(column.name(), column.unit())),
        None => (c.step().iter().copied().map(Some).collect(), "Step".to_string()),
    })
}

/// `plot(x_column?, y_columns?, plot_type = "scatter", normalize = false,
/// color_by?)`.
///
/// `x_column` defaults to the step index and `y_columns` to every numeric
/// column. With `color_by`, each y column is drawn as one series per
/// distinct value of that column. Returns the input unchanged.
pub fn plot(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let surface = surface(args)?;
    let x_column = args.opt_str(0, "x_column")?.map(|n| c.column(n)).transpose()?;
    let plot_type = PlotType::parse(args.str_or(2, "plot_type", "scatter")?)?;
    let normalize = args.bool_or(3, "normalize", false)?;
    let color_by = args.opt_str(4, "color_by")?.map(|n| c.column(n)).transpose()?;

    let y_names = match args.str_list(1, "y_columns")? {
        Some(names) => names,
        None => c
            .columns()
            .iter()
            .filter(|col| col.kind() == ColumnKind::Number)
            .filter(|col| x_column.map_or(true, |x| x.name() != col.name()))
            .map(|col| col.name().to_string())
            .collect(),
    };
    if y_names.is_empty() {
        return Err(TascError::invalid("nothing to plot: no numeric y columns"));
    }

    let (x, x_label) = axis(c, x_column)?;
    let palette = generate_palette(y_names.len());
    let mut y_labels = Vec::with_capacity(y_names.len());

    for (name, &color) in y_names.iter().zip(&palette) {
        let (y, label) = axis(c, Some(c.column(name)?))?;
        y_labels.push(label);
        match color_by {
            None => {
                let mut pts = points(&x, &y);
                if normalize {
                    minmax_scale(&mut pts);
                }
                draw(surface, plot_type, series(name.clone(), pts, color));
            }
            Some(group_column) => {
                let colors = ColorMap::new(&group_column.unique_values());
                for (group, pts) in grouped(&x, &y, group_column, normalize) {
                    let color = colors.color_for(group.as_ref());
                    let label = match &group {
                        Some(g) => format!("{name} ({}={g})", group_column.name()),
                        None => format!("{name} ({}=none)", group_column.name()),
                    };
                    draw(surface, plot_type, series(label, pts, color));
                }
            }
        }
    }

    surface
        .borrow_mut()
        .set_axis_labels(&x_label, &y_labels.join(", "));
    log::debug!("plot: {} series against '{x_label}'", y_names.len());
    Ok(c.clone().into())
}

fn series(name: String, points: Vec<[f64; 2]>, color: Rgb) -> LineSeries {
    LineSeries {
        name,
        points,
        color,
        width: 1.5,
    }
}

/// Points split by the value of `group_column`, in group order.
fn grouped(
    x: &[Option<f64>],
    y: &[Option<f64>],
    group_column: &Column,
    normalize: bool,
) -> BTreeMap<Option<Scalar>, Vec<[f64; 2]>> {
    let mut groups: BTreeMap<Option<Scalar>, Vec<[f64; 2]>> = BTreeMap::new();
    for (i, cell) in group_column.values().iter().enumerate() {
        if let (Some(xi), Some(yi)) = (x[i], y[i]) {
            groups.entry(cell.clone()).or_default().push([xi, yi]);
        }
    }
    if normalize {
        for pts in groups.values_mut() {
            minmax_scale(pts);
        }
    }
    groups
}
