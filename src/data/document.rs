//! JSON shape of a collection, shared by `to_json` and the JSON reader.
//!
//! ```json
//! {
//!   "step": [1.0, 2.0],
//!   "columns": [
//!     {"name": "load", "channel": "CH1", "unit": "kN", "kind": "number",
//!      "values": [0.5, null], "metadata": {}}
//!   ],
//!   "metadata": {"title": "specimen A"},
//!   "domain": {"name": "load_displacement",
//!              "args": {"load_column": "load", "displacement_column": "disp"}}
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::collection::ColumnCollection;
use super::column::{Column, ColumnKind};
use super::value::{Metadata, Value};
use crate::domains::{CoordinateMap, Domain, LoadDisplacement};
use crate::error::{Result, TascError};
use crate::ops::OpArgs;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CollectionDocument {
    pub step: Vec<f64>,
    pub columns: Vec<ColumnDocument>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ColumnDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Absent: detected from the values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ColumnKind>,
    pub values: Vec<Value>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A domain as the factory arguments that rebuild it.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DomainDocument {
    pub name: String,
    #[serde(default)]
    pub args: Metadata,
}

impl CollectionDocument {
    pub fn from_collection(collection: &ColumnCollection) -> Self {
        let columns = collection
            .columns()
            .iter()
            .map(|column| ColumnDocument {
                name: column.name().to_string(),
                channel: column.channel().map(str::to_string),
                unit: column.unit().map(str::to_string),
                kind: Some(column.kind()),
                values: column.values().iter().cloned().map(Value::from).collect(),
                metadata: column.metadata().clone(),
            })
            .collect();
        CollectionDocument {
            step: collection.step().to_vec(),
            columns,
            metadata: collection.metadata().clone(),
            domain: DomainDocument::from_domain(collection.domain()),
        }
    }

    pub fn into_collection(self, auto_detect: bool) -> Result<ColumnCollection> {
        let columns = self
            .columns
            .into_iter()
            .map(|doc| doc.into_column(auto_detect))
            .collect::<Result<Vec<_>>>()?;
        let collection = ColumnCollection::new(self.step, columns, self.metadata)?;
        match self.domain {
            Some(domain) => domain.attach(collection),
            None => Ok(collection),
        }
    }
}

impl ColumnDocument {
    fn into_column(self, auto_detect: bool) -> Result<Column> {
        let values = self
            .values
            .iter()
            .map(|v| {
                v.to_cell().ok_or_else(|| {
                    TascError::invalid(format!(
                        "column '{}' holds a {}, cells must be scalars",
                        self.name,
                        v.kind_name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut column = match self.kind {
            Some(kind) => Column::typed(self.name, kind, values)?,
            None if auto_detect => Column::detect(self.name, values),
            None => Column::new(self.name, values),
        };
        if let Some(channel) = self.channel {
            column = column.with_channel(channel);
        }
        if let Some(unit) = self.unit {
            column = column.with_unit(unit);
        }
        Ok(column.with_metadata(self.metadata))
    }
}

impl DomainDocument {
    fn from_domain(domain: &Domain) -> Option<Self> {
        let mut args = Metadata::new();
        match domain {
            Domain::Core => return None,
            Domain::LoadDisplacement(ld) => {
                args.insert("load_column".to_string(), Value::from(ld.load_column.as_str()));
                args.insert(
                    "displacement_column".to_string(),
                    Value::from(ld.displacement_column.as_str()),
                );
            }
            Domain::Coordinate(map) => {
                let coordinates = map
                    .iter()
                    .map(|(column, c)| (column.to_string(), c.to_value()))
                    .collect::<Metadata>();
                args.insert("coordinates".to_string(), Value::Map(coordinates));
                args.insert(
                    "coordinate_metadata_key".to_string(),
                    Value::from(map.metadata_key.as_str()),
                );
            }
            Domain::Custom { attributes, .. } => args = attributes.clone(),
        }
        Some(DomainDocument {
            name: domain.name().to_string(),
            args,
        })
    }

    fn attach(self, collection: ColumnCollection) -> Result<ColumnCollection> {
        let args = self
            .args
            .iter()
            .fold(OpArgs::new(), |args, (k, v)| args.with(k.clone(), v.clone()));
        match self.name.as_str() {
            crate::domains::CORE => Ok(collection),
            crate::domains::LOAD_DISPLACEMENT => LoadDisplacement::new(
                args.str(0, "load_column")?,
                args.str(1, "displacement_column")?,
            )
            .attach(collection),
            crate::domains::COORDINATE => CoordinateMap::construct(collection, &args),
            _ => Ok(collection.into_custom_domain(self.name, self.args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::cells;
    use crate::domains::Coordinate;

    #[test]
    fn test_domain_payload_survives() {
        let c = ColumnCollection::from_raw(
            vec![1.0, 2.0],
            vec![("a", cells([1.0, 2.0])), ("b", cells([3.0, 4.0]))],
            Metadata::new(),
            true,
        )
        .unwrap();
        let mut map = CoordinateMap::new("pos");
        map.insert("a", Coordinate::new(Some(1.0), None, None));
        let c = map.attach(c).unwrap();

        let text = serde_json::to_string(&CollectionDocument::from_collection(&c)).unwrap();
        let back: CollectionDocument = serde_json::from_str(&text).unwrap();
        let back = back.into_collection(true).unwrap();

        let map = back.coordinates().expect("coordinate domain restored");
        assert_eq!(map.metadata_key, "pos");
        assert_eq!(map.get("a").unwrap().x, Some(1.0));
        assert_eq!(back, c);
    }

    #[test]
    fn test_nested_cell_rejected() {
        let text = r#"{"step": [1.0], "columns": [{"name": "a", "values": [[1, 2]]}]}"#;
        let doc: CollectionDocument = serde_json::from_str(text).unwrap();
        assert!(matches!(
            doc.into_collection(true),
            Err(TascError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_domain_kept_as_custom() {
        let text = r#"{"step": [], "columns": [], "domain": {"name": "thermal", "args": {"k": 1}}}"#;
        let doc: CollectionDocument = serde_json::from_str(text).unwrap();
        let c = doc.into_collection(true).unwrap();
        assert_eq!(c.domain_name(), "thermal");
    }
}
