use serde::{Deserialize, Serialize};

use super::Domain;
use crate::data::collection::ColumnCollection;
use crate::error::{Result, TascError};
use crate::ops::OpArgs;

const LOAD_HINTS: [&str; 4] = ["load", "force", "荷重", "力"];
const DISPLACEMENT_HINTS: [&str; 4] = ["disp", "displacement", "変位", "変形"];

/// Which columns carry the load and the displacement of a test record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDisplacement {
    pub load_column: String,
    pub displacement_column: String,
}

impl LoadDisplacement {
    pub fn new(load_column: impl Into<String>, displacement_column: impl Into<String>) -> Self {
        LoadDisplacement {
            load_column: load_column.into(),
            displacement_column: displacement_column.into(),
        }
    }

    /// Fill in whichever column was not given.
    ///
    /// Names are matched case-insensitively against the load and
    /// displacement hints, hint by hint; failing that the first two columns
    /// holding any number are used.
    pub fn infer(
        collection: &ColumnCollection,
        load_column: Option<&str>,
        displacement_column: Option<&str>,
    ) -> Result<Self> {
        let mut load = load_column
            .map(str::to_string)
            .or_else(|| match_hint(collection, &LOAD_HINTS));
        let mut displacement = displacement_column
            .map(str::to_string)
            .or_else(|| match_hint(collection, &DISPLACEMENT_HINTS));

        if load.is_none() || displacement.is_none() {
            let numeric: Vec<&str> = collection
                .columns()
                .iter()
                .filter(|c| c.values().iter().flatten().any(|v| v.is_number()))
                .map(|c| c.name())
                .collect();
            if numeric.len() >= 2 {
                load.get_or_insert_with(|| numeric[0].to_string());
                displacement.get_or_insert_with(|| numeric[1].to_string());
            }
        }

        match (load, displacement) {
            (Some(load), Some(displacement)) => Ok(LoadDisplacement::new(load, displacement)),
            (None, _) => Err(TascError::MissingRequiredColumn {
                key: "load_column".to_string(),
                column: "<not detected>".to_string(),
            }),
            (_, None) => Err(TascError::MissingRequiredColumn {
                key: "displacement_column".to_string(),
                column: "<not detected>".to_string(),
            }),
        }
    }

    pub fn validate(&self, collection: &ColumnCollection) -> Result<()> {
        for (key, column) in [
            ("load_column", &self.load_column),
            ("displacement_column", &self.displacement_column),
        ] {
            if !collection.contains(column) {
                return Err(TascError::MissingRequiredColumn {
                    key: key.to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate against `collection` and attach.
    pub fn attach(self, collection: ColumnCollection) -> Result<ColumnCollection> {
        self.validate(&collection)?;
        Ok(collection.with_domain(Domain::LoadDisplacement(self)))
    }

    /// Factory constructor: `load_column` (slot 0) and `displacement_column`
    /// (slot 1), each inferred when omitted.
    pub(crate) fn construct(collection: ColumnCollection, args: &OpArgs) -> Result<ColumnCollection> {
        let columns = LoadDisplacement::infer(
            &collection,
            args.opt_str(0, "load_column")?,
            args.opt_str(1, "displacement_column")?,
        )?;
        columns.attach(collection)
    }
}

fn match_hint(collection: &ColumnCollection, hints: &[&str]) -> Option<String> {
    hints.iter().find_map(|hint| {
        let hint = hint.to_lowercase();
        collection
            .column_names()
            .into_iter()
            .find(|name| name.to_lowercase().contains(&hint))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{cells, Metadata};

    fn collection(names: &[&str]) -> ColumnCollection {
        let columns = names.iter().map(|n| (*n, cells([1.0, 2.0]))).collect();
        ColumnCollection::from_raw(vec![1.0, 2.0], columns, Metadata::new(), true).unwrap()
    }

    #[test]
    fn test_attach_requires_both_columns() {
        let c = collection(&["a", "c"]);
        let err = LoadDisplacement::new("a", "b").attach(c).unwrap_err();
        match err {
            TascError::MissingRequiredColumn { key, column } => {
                assert_eq!(key, "displacement_column");
                assert_eq!(column, "b");
            }
            other => panic!("expected MissingRequiredColumn, got {other:?}"),
        }

        let ok = LoadDisplacement::new("a", "b").attach(collection(&["a", "b"])).unwrap();
        assert_eq!(ok.load_column(), Some("a"));
        assert_eq!(ok.displacement_column(), Some("b"));
    }

    #[test]
    fn test_infer_from_hints() {
        let c = collection(&["time_s", "Displacement_mm", "Applied Force"]);
        let columns = LoadDisplacement::infer(&c, None, None).unwrap();
        assert_eq!(columns.load_column, "Applied Force");
        assert_eq!(columns.displacement_column, "Displacement_mm");

        let jp = collection(&["荷重", "変位"]);
        let columns = LoadDisplacement::infer(&jp, None, None).unwrap();
        assert_eq!(columns, LoadDisplacement::new("荷重", "変位"));
    }

    #[test]
    fn test_infer_falls_back_to_numeric_columns() {
        let c = collection(&["ch1", "ch2", "ch3"]);
        let columns = LoadDisplacement::infer(&c, None, None).unwrap();
        assert_eq!(columns, LoadDisplacement::new("ch1", "ch2"));

        let single = collection(&["ch1"]);
        assert!(matches!(
            LoadDisplacement::infer(&single, None, None),
            Err(TascError::MissingRequiredColumn { .. })
        ));
    }
}
