use std::collections::BTreeMap;

use super::{coordinate_map, position};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{Metadata, Value};
use crate::domains::Coordinate;
use crate::error::{Result, TascError};
use crate::ops::core::{numeric, to_cells};
use crate::ops::{OpArgs, OpOutput};

/// How values at known positions are combined at a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialMethod {
    /// Weights `1 / d^power`; a source at zero distance wins outright.
    InverseDistance { power: f64 },
    /// Value of the closest source.
    Nearest,
}

impl SpatialMethod {
    fn name(self) -> &'static str {
        match self {
            SpatialMethod::InverseDistance { .. } => "inverse_distance",
            SpatialMethod::Nearest => "nearest",
        }
    }

    /// Combine `(distance, value)` samples. Returns `None` without samples.
    pub fn combine(self, samples: &[(f64, f64)]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        match self {
            SpatialMethod::Nearest => samples
                .iter()
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|&(_, v)| v),
            SpatialMethod::InverseDistance { power } => {
                if let Some(&(_, v)) = samples.iter().find(|(d, _)| *d == 0.0) {
                    return Some(v);
                }
                let (weighted, total) = samples.iter().fold((0.0, 0.0), |(wv, wt), &(d, v)| {
                    let w = 1.0 / d.powf(power);
                    (wv + w * v, wt + w)
                });
                Some(weighted / total)
            }
        }
    }
}

/// `interpolate_at_point(x, y, z?, columns?, method = "inverse_distance",
/// power = 2, result_column?)`.
///
/// For every row, combines the values of the source columns (default:
/// every positioned column) by their distance to `(x, y, z)`. Sources
/// missing a value on a row are left out of that row; with `z` given,
/// sources without a `z` are skipped.
pub fn interpolate_at_point(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let target = Coordinate::new(Some(args.f64(0, "x")?), Some(args.f64(1, "y")?), args.opt_f64(2, "z")?);
    let method = match args.str_or(4, "method", "inverse_distance")? {
        "inverse_distance" => SpatialMethod::InverseDistance {
            power: args.f64_or(5, "power", 2.0)?,
        },
        "nearest" => SpatialMethod::Nearest,
        other => {
            return Err(TascError::invalid(format!(
                "spatial method must be inverse_distance or nearest, got '{other}'"
            )))
        }
    };
    let names = match args.str_list(3, "columns")? {
        Some(names) => names,
        None => coordinate_map(c)?
            .columns_with_coordinates()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    let mut sources: Vec<(&Column, f64)> = Vec::with_capacity(names.len());
    for name in &names {
        let at = position(c, name)?;
        if target.z.is_some() && at.z.is_none() {
            continue;
        }
        if let Some(d) = at.distance(&target) {
            sources.push((c.column(name)?, d));
        }
    }
    if sources.is_empty() {
        return Err(TascError::invalid("no positioned column to interpolate from"));
    }

    let views = sources
        .iter()
        .map(|(column, d)| Ok((numeric(column)?, *d)))
        .collect::<Result<Vec<_>>>()?;
    let values: Vec<Option<f64>> = (0..c.len())
        .map(|row| {
            let samples: Vec<(f64, f64)> = views
                .iter()
                .filter_map(|(values, d)| Some((*d, values[row]?)))
                .collect();
            method.combine(&samples)
        })
        .collect();

    let name = match args.opt_str(6, "result_column")? {
        Some(name) => name.to_string(),
        None => match target.z {
            Some(z) => format!("interp_{}_{}_{z}", args.f64(0, "x")?, args.f64(1, "y")?),
            None => format!("interp_{}_{}", args.f64(0, "x")?, args.f64(1, "y")?),
        },
    };
    log::debug!(
        "interpolate_at_point: '{name}' from {} columns by {}",
        sources.len(),
        method.name()
    );

    let mut detail = BTreeMap::new();
    detail.insert("method".to_string(), Value::from(method.name()));
    if let SpatialMethod::InverseDistance { power } = method {
        detail.insert("power".to_string(), Value::from(power));
    }
    detail.insert("target".to_string(), target.to_value());
    detail.insert(
        "sources".to_string(),
        Value::from(sources.iter().map(|(col, _)| col.name()).collect::<Vec<_>>()),
    );
    let mut meta = Metadata::new();
    meta.insert("interpolation".to_string(), Value::Map(detail));

    let mut column = Column::detect(name, to_cells(values)).with_metadata(meta);
    let first_unit = sources[0].0.unit();
    if let Some(unit) = first_unit {
        if sources.iter().all(|(col, _)| col.unit() == first_unit) {
            column = column.with_unit(unit);
        }
    }

    let mut out = c.clone();
    out.upsert_column(column)?;
    Ok(out.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::coordinate::fixtures::gauges;
    use crate::ops::core::fixtures::{floats, registry};

    #[test]
    fn test_combine() {
        let idw = SpatialMethod::InverseDistance { power: 1.0 };
        assert_eq!(idw.combine(&[(1.0, 10.0), (3.0, 30.0)]), Some(15.0));
        assert_eq!(idw.combine(&[(0.0, 7.0), (3.0, 30.0)]), Some(7.0));
        assert_eq!(SpatialMethod::Nearest.combine(&[(2.0, 1.0), (1.0, 2.0)]), Some(2.0));
        assert_eq!(SpatialMethod::Nearest.combine(&[]), None);
    }

    #[test]
    fn test_inverse_distance_row_by_row() {
        let registry = registry();
        // midway between g1 and g2, 5 from g3
        let out = gauges()
            .ops(&registry)
            .call(
                "interpolate_at_point",
                OpArgs::new().arg(1.5).arg(2.0).with("result_column", "mid"),
            )
            .unwrap()
            .end();
        let mid = floats(&out, "mid");
        // row 0: g1=1 at 2.5, g2=2 at 2.5, g3=3 at 7.5
        let w = [1.0 / 6.25, 1.0 / 6.25, 1.0 / 56.25];
        let expected = (w[0] * 1.0 + w[1] * 2.0 + w[2] * 3.0) / (w[0] + w[1] + w[2]);
        assert!((mid[0].unwrap() - expected).abs() < 1e-12);
        // row 1: g3 is missing, g1 and g2 weigh the same
        assert!((mid[1].unwrap() - 3.0).abs() < 1e-12);
        let detail = &out.column("mid").unwrap().metadata()["interpolation"];
        assert_eq!(detail.as_map().unwrap()["method"].as_str(), Some("inverse_distance"));
    }

    #[test]
    fn test_nearest_with_z_uses_only_3d_sources() {
        let registry = registry();
        let out = gauges()
            .ops(&registry)
            .call(
                "interpolate_at_point",
                OpArgs::new().arg(0.0).arg(0.0).arg(0.0).with("method", "nearest"),
            )
            .unwrap()
            .end();
        assert_eq!(floats(&out, "interp_0_0_0"), vec![Some(3.0), None, Some(9.0)]);
    }

    #[test]
    fn test_rejects_unknown_method() {
        let registry = registry();
        let err = gauges()
            .ops(&registry)
            .call("interpolate_at_point", OpArgs::new().arg(0.0).arg(0.0).with("method", "kriging"))
            .unwrap_err();
        assert!(matches!(err, TascError::InvalidArgument(_)));
    }
}
