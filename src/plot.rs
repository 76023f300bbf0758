use std::cell::RefCell;
use std::rc::Rc;

use crate::color::Rgb;

// ---------------------------------------------------------------------------
// Plot surface collaborator
// ---------------------------------------------------------------------------

/// One named series of `[x, y]` points.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub color: Rgb,
    pub width: f32,
}

/// Something plotting operations can draw onto. Rendering is entirely up to
/// the implementor.
pub trait PlotSurface {
    fn draw_line(&mut self, series: LineSeries);
    fn draw_points(&mut self, series: LineSeries);
    fn set_axis_labels(&mut self, x: &str, y: &str);
}

/// Surface handle carried in operation arguments.
pub type SharedSurface = Rc<RefCell<dyn PlotSurface>>;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Line(LineSeries),
    Points(LineSeries),
}

/// Surface that only remembers what was drawn.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<DrawCall>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh recording surface plus the type-erased handle to pass around.
    pub fn shared() -> (Rc<RefCell<RecordingSurface>>, SharedSurface) {
        let surface = Rc::new(RefCell::new(RecordingSurface::new()));
        let handle: SharedSurface = surface.clone();
        (surface, handle)
    }

    pub fn series(&self) -> impl Iterator<Item = &LineSeries> {
        self.calls.iter().map(|call| match call {
            DrawCall::Line(s) | DrawCall::Points(s) => s,
        })
    }
}

impl PlotSurface for RecordingSurface {
    fn draw_line(&mut self, series: LineSeries) {
        self.calls.push(DrawCall::Line(series));
    }

    fn draw_points(&mut self, series: LineSeries) {
        self.calls.push(DrawCall::Points(series));
    }

    fn set_axis_labels(&mut self, x: &str, y: &str) {
        self.x_label = Some(x.to_string());
        self.y_label = Some(y.to_string());
    }
}

// ---------------------------------------------------------------------------
// Point helpers
// ---------------------------------------------------------------------------

/// Zip two numeric views into points, skipping rows where either side is
/// missing.
pub fn points(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<[f64; 2]> {
    x.iter()
        .zip(y)
        .filter_map(|(xi, yi)| Some([(*xi)?, (*yi)?]))
        .collect()
}

/// Min-max scale the y coordinates into `[0, 1]`. A flat series maps to 0.
pub fn minmax_scale(points: &mut [[f64; 2]]) {
    let min = points.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    for p in points.iter_mut() {
        p[1] = if range.abs() < f64::EPSILON {
            0.0
        } else {
            (p[1] - min) / range
        };
    }
}

/// `"load [kN]"` when a unit is known, else the bare name.
pub fn axis_label(name: &str, unit: Option<&str>) -> String {
    match unit {
        Some(u) if !u.is_empty() => format!("{name} [{u}]"),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_skip_missing() {
        let pts = points(&[Some(0.0), None, Some(2.0)], &[Some(1.0), Some(5.0), None]);
        assert_eq!(pts, vec![[0.0, 1.0]]);
    }

    #[test]
    fn test_minmax_scale() {
        let mut pts = vec![[0.0, 2.0], [1.0, 4.0], [2.0, 6.0]];
        minmax_scale(&mut pts);
        assert_eq!(pts, vec![[0.0, 0.0], [1.0, 0.5], [2.0, 1.0]]);

        let mut flat = vec![[0.0, 3.0], [1.0, 3.0]];
        minmax_scale(&mut flat);
        assert_eq!(flat, vec![[0.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_recording_surface() {
        let (surface, handle) = RecordingSurface::shared();
        handle.borrow_mut().set_axis_labels("disp [mm]", "load [kN]");
        handle.borrow_mut().draw_line(LineSeries {
            name: "load".into(),
            points: vec![[0.0, 0.0]],
            color: Rgb::STEEL_BLUE,
            width: 1.5,
        });
        let recorded = surface.borrow();
        assert_eq!(recorded.calls.len(), 1);
        assert_eq!(recorded.x_label.as_deref(), Some("disp [mm]"));
    }
}
