use super::{coordinate_map, position};
use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::data::value::{Metadata, Scalar, Value};
use crate::domains::Coordinate;
use crate::error::Result;
use crate::ops::{OpArgs, OpOutput};

/// `set_column_coordinates(column, x?, y?, z?)`: omitted axes become
/// unknown.
pub fn set_column_coordinates(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let column = args.str(0, "column")?;
    let coordinate = Coordinate::new(
        args.opt_f64(1, "x")?,
        args.opt_f64(2, "y")?,
        args.opt_f64(3, "z")?,
    );
    let mut out = c.clone();
    out.set_column_coordinates(column, coordinate)?;
    Ok(out.into())
}

/// `get_column_coordinates(column)` → `{x, y, z}`.
pub fn get_column_coordinates(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    Ok(position(c, args.str(0, "column")?)?.to_value().into())
}

pub fn get_columns_with_coordinates(c: &ColumnCollection, _args: &OpArgs) -> Result<OpOutput> {
    let names = coordinate_map(c)?.columns_with_coordinates();
    Ok(Value::from(names).into())
}

/// `extract_coordinates(result_prefix = "coord_")`.
///
/// Every known axis of every positioned column becomes a constant column
/// `<prefix><column>_<axis>`.
pub fn extract_coordinates(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let prefix = args.str_or(0, "result_prefix", "coord_")?;
    let map = coordinate_map(c)?;
    let mut out = c.clone();
    for column in map.columns_with_coordinates() {
        let Some(coordinate) = map.get(column) else {
            continue;
        };
        for (axis, value) in [("x", coordinate.x), ("y", coordinate.y), ("z", coordinate.z)] {
            let Some(value) = value else {
                continue;
            };
            let mut meta = Metadata::new();
            meta.insert(
                "description".to_string(),
                Value::from(format!("{} coordinate of {column}", axis.to_uppercase())),
            );
            meta.insert("component".to_string(), Value::from(axis));
            let extracted = Column::detect(
                format!("{prefix}{column}_{axis}"),
                vec![Some(Scalar::Float(value)); c.len()],
            )
            .with_metadata(meta);
            out.upsert_column(extracted)?;
        }
    }
    Ok(out.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::COORDINATE;
    use crate::ops::coordinate::fixtures::gauges;
    use crate::ops::core::fixtures::{floats, registry, sample};

    #[test]
    fn test_set_and_get_coordinates() {
        let registry = registry();
        let value = gauges()
            .ops(&registry)
            .call("set_column_coordinates", OpArgs::new().arg("g4").arg(1.0).arg(2.0))
            .unwrap()
            .value("get_column_coordinates", OpArgs::new().arg("g4"))
            .unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["x"], Value::Float(1.0));
        assert_eq!(map["z"], Value::Null);
    }

    #[test]
    fn test_set_mirrors_into_column_metadata() {
        let registry = registry();
        let out = gauges()
            .ops(&registry)
            .call(
                "set_column_coordinates",
                OpArgs::new().arg("g1").with("x", 5.0).with("y", 6.0).with("z", 7.0),
            )
            .unwrap()
            .end();
        let mirrored = out.column("g1").unwrap().metadata()["coordinates"].as_map().unwrap();
        assert_eq!(mirrored["z"], Value::Float(7.0));
        assert_eq!(out.domain_name(), COORDINATE);
    }

    #[test]
    fn test_columns_with_coordinates() {
        let registry = registry();
        let names = gauges()
            .ops(&registry)
            .value("get_columns_with_coordinates", OpArgs::new())
            .unwrap();
        assert_eq!(names, Value::from(vec!["g1", "g2", "g3"]));

        // core collections do not see coordinate operations at all
        assert!(sample()
            .ops(&registry)
            .value("get_columns_with_coordinates", OpArgs::new())
            .is_err());
    }

    #[test]
    fn test_extract_coordinates() {
        let registry = registry();
        let out = gauges()
            .ops(&registry)
            .call("extract_coordinates", OpArgs::new().arg("pos_"))
            .unwrap()
            .end();
        assert_eq!(floats(&out, "pos_g2_y"), vec![Some(4.0); 3]);
        assert!(out.contains("pos_g3_z"));
        assert!(!out.contains("pos_g1_z"), "unknown axes are skipped");
        assert!(!out.contains("pos_g4_x"));
    }
}
