use std::collections::BTreeMap;

use super::cycles::resolve_cycles;
use super::load_and_displacement;
use crate::data::collection::ColumnCollection;
use crate::data::value::{insert_path, Value};
use crate::error::{Result, TascError};
use crate::ops::core::numeric;
use crate::ops::{recover_failure, OpArgs, OpOutput};

/// A load-displacement curve of its own length, kept beside the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    pub displacement: Vec<f64>,
    pub load: Vec<f64>,
}

impl Curve {
    fn push(&mut self, displacement: f64, load: f64) {
        self.displacement.push(displacement);
        self.load.push(load);
    }

    fn last(&self) -> Option<(f64, f64)> {
        Some((*self.displacement.last()?, *self.load.last()?))
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::from(self.displacement.clone()));
        map.insert("y".to_string(), Value::from(self.load.clone()));
        Value::Map(map)
    }
}

/// Displacement at which the line through two edge points reaches `load`.
/// With fewer than two points, or a flat edge, the edge displacement is
/// returned.
fn extend_to_load(disp: &[f64], load: &[f64], target: f64, at_end: bool) -> f64 {
    let n = disp.len();
    if n < 2 {
        return if at_end { disp[n - 1] } else { disp[0] };
    }
    let (i, j) = if at_end { (n - 2, n - 1) } else { (0, 1) };
    let (x1, y1, x2, y2) = (disp[i], load[i], disp[j], load[j]);
    if y1 == y2 {
        x1
    } else {
        x1 + (x2 - x1) * (target - y1) / (y2 - y1)
    }
}

/// What to append to the skeleton after the peak cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreaseType {
    /// The point of largest displacement in each post-peak cycle.
    Envelope,
    /// The stretch between peak load and peak displacement, skipped when
    /// both fall on the same row.
    ContinuousOnly,
    /// Like `ContinuousOnly`, but a shared row contributes its point.
    Both,
}

impl DecreaseType {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "envelope" => Ok(DecreaseType::Envelope),
            "continuous_only" => Ok(DecreaseType::ContinuousOnly),
            "both" => Ok(DecreaseType::Both),
            other => Err(TascError::invalid(format!(
                "decrease_type must be envelope, continuous_only or both, got '{other}'"
            ))),
        }
    }
}

/// One cycle's rows: displacement and load, `None` where missing.
#[derive(Debug, Clone, Default)]
pub struct CycleRows {
    pub disp: Vec<Option<f64>>,
    pub load: Vec<Option<f64>>,
}

/// Rows grouped by cycle marker, in marker order.
fn cycles(
    c: &ColumnCollection,
    cycle_column: Option<&str>,
) -> Result<(ColumnCollection, BTreeMap<i64, CycleRows>)> {
    let (source, markers) = resolve_cycles(c, cycle_column)?;
    let (load, disp) = load_and_displacement(&source)?;
    let (load, disp) = (numeric(load)?, numeric(disp)?);

    let mut groups: BTreeMap<i64, CycleRows> = BTreeMap::new();
    for (i, &m) in markers.iter().enumerate() {
        let rows = groups.entry(m).or_default();
        rows.disp.push(disp[i]);
        rows.load.push(load[i]);
    }
    Ok((source, groups))
}

/// Envelope of the cyclic record.
///
/// Cycles up to the one holding the peak load contribute every point that
/// raises the running maximum. When a cycle first raises it, the point is
/// shifted so the skeleton continues along the line of its last two points.
pub fn skeleton_curve(
    groups: &BTreeMap<i64, CycleRows>,
    has_decrease: bool,
    decrease_type: DecreaseType,
    max_marker: i64,
) -> Curve {
    let mut skeleton = Curve::default();
    let mut p_max = 0.0;
    let mut d_offset = 0.0;

    for rows in groups.range(1..=max_marker).map(|(_, rows)| rows) {
        d_offset = 0.0;
        for (&disp, &load) in rows.disp.iter().zip(&rows.load) {
            let (Some(disp), Some(load)) = (disp, load) else {
                continue;
            };
            if load <= p_max {
                continue;
            }
            p_max = load;
            if d_offset == 0.0 && skeleton.load.len() >= 2 {
                let x = extend_to_load(&skeleton.displacement, &skeleton.load, load, true);
                d_offset = x - disp;
            }
            skeleton.push(disp + d_offset, load);
        }
    }

    if !has_decrease {
        return skeleton;
    }
    let end_marker = groups.keys().next_back().copied().unwrap_or(max_marker);
    for rows in groups.range(max_marker..=end_marker).map(|(_, rows)| rows) {
        let valid: Vec<(usize, f64, f64)> = rows
            .disp
            .iter()
            .zip(&rows.load)
            .enumerate()
            .filter_map(|(i, (d, l))| Some((i, (*d)?, (*l)?)))
            .collect();
        let Some(load_peak) = first_max(&valid, |&(_, _, l)| l) else {
            continue;
        };
        let disp_peak = first_max(&valid, |&(_, d, _)| d).unwrap_or(load_peak);

        let stretch = |skeleton: &mut Curve| {
            let (from, to) = (load_peak.min(disp_peak), load_peak.max(disp_peak));
            for &(_, d, l) in valid.iter().filter(|(i, _, _)| (from..=to).contains(i)) {
                if skeleton.last() == Some((d + d_offset, l)) {
                    continue;
                }
                skeleton.push(d + d_offset, l);
            }
        };
        let at = |row: usize| valid.iter().find(|(i, _, _)| *i == row).copied();

        match decrease_type {
            DecreaseType::Envelope => {
                if let Some((_, d, l)) = at(disp_peak) {
                    skeleton.push(d + d_offset, l);
                }
            }
            DecreaseType::ContinuousOnly => {
                if load_peak != disp_peak {
                    stretch(&mut skeleton);
                }
            }
            DecreaseType::Both => {
                if load_peak == disp_peak {
                    if let Some((_, d, l)) = at(disp_peak) {
                        skeleton.push(d + d_offset, l);
                    }
                } else {
                    stretch(&mut skeleton);
                }
            }
        }
    }
    skeleton
}

/// Row index of the first maximum of `key` over `points`.
fn first_max<F>(points: &[(usize, f64, f64)], key: F) -> Option<usize>
where
    F: Fn(&(usize, f64, f64)) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for p in points {
        let v = key(p);
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((p.0, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Positive-load halves of every cycle, chained end to end. Each half is
/// extended to zero load at both ends and shifted so it starts where the
/// previous one ended.
pub fn cumulative_curve(groups: &BTreeMap<i64, CycleRows>) -> Curve {
    let mut cumulative = Curve::default();
    for rows in groups.values() {
        let (disp, load): (Vec<f64>, Vec<f64>) = rows
            .disp
            .iter()
            .zip(&rows.load)
            .filter_map(|(d, l)| Some(((*d)?, (*l)?)))
            .filter(|&(_, l)| l >= 0.0)
            .unzip();
        if load.is_empty() {
            continue;
        }
        let x_start = extend_to_load(&disp, &load, 0.0, false);
        let x_end = extend_to_load(&disp, &load, 0.0, true);
        let d_offset = cumulative.displacement.last().map_or(0.0, |last| last - x_start);

        cumulative.push(x_start + d_offset, 0.0);
        for (d, l) in disp.iter().zip(&load) {
            cumulative.push(d + d_offset, *l);
        }
        cumulative.push(x_end + d_offset, 0.0);
    }
    cumulative
}

/// `create_skeleton_curve(has_decrease = false, decrease_type =
/// "envelope", cycle_column?)`.
///
/// Stores the curve under `curves.skeleton_curve` as `{x, y}`. Accepts
/// `fail_silently`.
pub fn create_skeleton_curve(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    recover_failure(c, args, "create_skeleton_curve", skeleton(c, args))
}

fn skeleton(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let has_decrease = args.bool_or(0, "has_decrease", false)?;
    let decrease_type = DecreaseType::parse(args.str_or(1, "decrease_type", "envelope")?)?;
    let (mut out, groups) = cycles(c, args.opt_str(2, "cycle_column")?)?;

    let max_marker = groups
        .iter()
        .flat_map(|(&m, rows)| rows.load.iter().flatten().map(move |&l| (m, l)))
        .fold(None, |best: Option<(i64, f64)>, (m, l)| match best {
            Some((_, b)) if b >= l => best,
            _ => Some((m, l)),
        })
        .map(|(m, _)| m)
        .ok_or_else(|| TascError::EmptyData("load".to_string()))?;

    let curve = skeleton_curve(&groups, has_decrease, decrease_type, max_marker);
    log::debug!(
        "create_skeleton_curve: {} points through cycle {max_marker}",
        curve.load.len()
    );
    insert_path(out.metadata_mut(), "curves.skeleton_curve", curve.to_value());
    Ok(out.into())
}

/// `create_cumulative_curve(cycle_column?)`: stores the curve under
/// `curves.cumulative_curve`. Accepts `fail_silently`.
pub fn create_cumulative_curve(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    recover_failure(c, args, "create_cumulative_curve", cumulative(c, args))
}

fn cumulative(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let (mut out, groups) = cycles(c, args.opt_str(0, "cycle_column")?)?;
    let curve = cumulative_curve(&groups);
    log::debug!("create_cumulative_curve: {} points", curve.load.len());
    insert_path(out.metadata_mut(), "curves.cumulative_curve", curve.to_value());
    Ok(out.into())
}
