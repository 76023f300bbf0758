use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Domain;
use crate::data::collection::ColumnCollection;
use crate::data::value::Value;
use crate::error::{Result, TascError};
use crate::ops::OpArgs;

pub const DEFAULT_METADATA_KEY: &str = "coordinates";

/// Sensor position of one column. Any axis may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Coordinate {
    pub fn new(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Coordinate { x, y, z }
    }

    /// Euclidean distance; planar when either side lacks `z`.
    pub fn distance(&self, other: &Coordinate) -> Option<f64> {
        let dx = other.x? - self.x?;
        let dy = other.y? - self.y?;
        let dz = match (self.z, other.z) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        };
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), self.x.into());
        map.insert("y".to_string(), self.y.into());
        map.insert("z".to_string(), self.z.into());
        Value::Map(map)
    }

    fn from_value(column: &str, value: &Value) -> Result<Self> {
        let map = value.as_map().ok_or_else(|| {
            TascError::invalid(format!("coordinates of '{column}' must be a map of x/y/z"))
        })?;
        let axis = |name: &str| -> Result<Option<f64>> {
            match map.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                    TascError::invalid(format!("coordinate '{name}' of '{column}' must be a number"))
                }),
            }
        };
        Ok(Coordinate::new(axis("x")?, axis("y")?, axis("z")?))
    }
}

/// Per-column coordinate side table.
///
/// Positions are also mirrored into each column's metadata under
/// `metadata_key`, so they survive export.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMap {
    pub metadata_key: String,
    coordinates: BTreeMap<String, Coordinate>,
}

impl Default for CoordinateMap {
    fn default() -> Self {
        CoordinateMap::new(DEFAULT_METADATA_KEY)
    }
}

impl CoordinateMap {
    pub fn new(metadata_key: impl Into<String>) -> Self {
        CoordinateMap {
            metadata_key: metadata_key.into(),
            coordinates: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Coordinate> {
        self.coordinates.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
        self.coordinates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Columns with at least one known axis.
    pub fn columns_with_coordinates(&self) -> Vec<&str> {
        self.coordinates
            .iter()
            .filter(|(_, c)| c.x.is_some() || c.y.is_some() || c.z.is_some())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn insert(&mut self, column: impl Into<String>, coordinate: Coordinate) {
        self.coordinates.insert(column.into(), coordinate);
    }

    pub(crate) fn retain<F: Fn(&str) -> bool>(&mut self, keep: F) {
        self.coordinates.retain(|column, _| keep(column));
    }

    pub(crate) fn rename_column(&mut self, old: &str, new: &str) {
        if let Some(c) = self.coordinates.remove(old) {
            self.coordinates.insert(new.to_string(), c);
        }
    }

    /// Validate against `collection` and attach, mirroring every position
    /// into column metadata. Columns without an entry get an all-unknown one.
    pub fn attach(mut self, mut collection: ColumnCollection) -> Result<ColumnCollection> {
        for column in self.coordinates.keys() {
            if !collection.contains(column) {
                return Err(TascError::MissingRequiredColumn {
                    key: "coordinates".to_string(),
                    column: column.clone(),
                });
            }
        }
        let names: Vec<String> = collection
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in names {
            let coordinate = *self.coordinates.entry(name.clone()).or_default();
            collection
                .column_mut(&name)?
                .metadata_mut()
                .insert(self.metadata_key.clone(), coordinate.to_value());
        }
        Ok(collection.with_domain(Domain::Coordinate(self)))
    }

    /// Factory constructor: `coordinates` (slot 0) maps column names to
    /// `{x, y, z}`; `coordinate_metadata_key` (slot 1) defaults to
    /// `"coordinates"`.
    pub(crate) fn construct(collection: ColumnCollection, args: &OpArgs) -> Result<ColumnCollection> {
        let key = args.str_or(1, "coordinate_metadata_key", DEFAULT_METADATA_KEY)?;
        let mut map = CoordinateMap::new(key);
        if let Some(value) = args.get(0, "coordinates") {
            let entries = value
                .as_map()
                .ok_or_else(|| TascError::invalid("'coordinates' must map column names to x/y/z"))?;
            for (column, coords) in entries {
                map.insert(column.clone(), Coordinate::from_value(column, coords)?);
            }
        }
        map.attach(collection)
    }
}

impl ColumnCollection {
    /// Set (or overwrite) the position of one column of a coordinate
    /// collection, keeping the metadata mirror in sync.
    pub fn set_column_coordinates(&mut self, column: &str, coordinate: Coordinate) -> Result<()> {
        if !self.contains(column) {
            return Err(TascError::MissingColumn(column.to_string()));
        }
        let domain = self.domain_name().to_string();
        let key = {
            let map = self.coordinates_mut().ok_or_else(|| {
                TascError::invalid(format!(
                    "coordinates need a coordinate collection, this one is '{domain}'"
                ))
            })?;
            map.insert(column, coordinate);
            map.metadata_key.clone()
        };
        self.column_mut(column)?
            .metadata_mut()
            .insert(key, coordinate.to_value());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{cells, Metadata};

    fn sensors() -> ColumnCollection {
        ColumnCollection::from_raw(
            vec![1.0, 2.0],
            vec![("s1", cells([0.1, 0.2])), ("s2", cells([0.3, 0.4]))],
            Metadata::new(),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_distance_falls_back_to_planar() {
        let a = Coordinate::new(Some(0.0), Some(0.0), Some(5.0));
        let b = Coordinate::new(Some(3.0), Some(4.0), None);
        assert_eq!(a.distance(&b), Some(5.0));

        let c = Coordinate::new(Some(0.0), Some(0.0), Some(0.0));
        let d = Coordinate::new(Some(2.0), Some(3.0), Some(6.0));
        assert_eq!(c.distance(&d), Some(7.0));

        assert_eq!(Coordinate::default().distance(&d), None);
    }

    #[test]
    fn test_attach_rejects_unknown_column() {
        let mut map = CoordinateMap::default();
        map.insert("s9", Coordinate::default());
        let err = map.attach(sensors()).unwrap_err();
        assert!(matches!(err, TascError::MissingRequiredColumn { column, .. } if column == "s9"));
    }

    #[test]
    fn test_attach_mirrors_into_column_metadata() {
        let mut map = CoordinateMap::new("pos");
        map.insert("s1", Coordinate::new(Some(1.0), Some(2.0), None));
        let c = map.attach(sensors()).unwrap();

        let mirrored = &c.column("s1").unwrap().metadata()["pos"];
        assert_eq!(mirrored.as_map().unwrap()["y"], Value::Float(2.0));
        assert!(c.column("s2").unwrap().metadata().contains_key("pos"));
        assert_eq!(c.coordinates().unwrap().columns_with_coordinates(), vec!["s1"]);
    }

    #[test]
    fn test_set_column_coordinates_requires_domain() {
        let mut core = sensors();
        assert!(core
            .set_column_coordinates("s1", Coordinate::default())
            .is_err());

        let mut coord = CoordinateMap::default().attach(sensors()).unwrap();
        coord
            .set_column_coordinates("s2", Coordinate::new(Some(4.0), None, None))
            .unwrap();
        assert_eq!(coord.coordinates().unwrap().get("s2").unwrap().x, Some(4.0));
    }
}
