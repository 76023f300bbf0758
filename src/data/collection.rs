use std::collections::BTreeMap;
use std::ops::Range;

use super::column::{Column, ColumnKind};
use super::value::{resolve_path, Cell, Metadata, Value};
use crate::domains::{CoordinateMap, Domain};
use crate::error::{Result, TascError};

// ---------------------------------------------------------------------------
// Row – one step of a collection
// ---------------------------------------------------------------------------

/// Snapshot of a single row: the step value plus every column's cell, in
/// column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub step: f64,
    pub values: Vec<(String, Cell)>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// ColumnCollection
// ---------------------------------------------------------------------------

/// Columns aligned against a shared step index.
///
/// Every column has exactly `step.len()` values and column names are unique.
/// Both invariants are checked by every constructor and every method that
/// adds columns. Transformations work on clones; nothing here hands out a
/// way to change the row count of an existing collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCollection {
    step: Vec<f64>,
    columns: Vec<Column>,
    metadata: Metadata,
    domain: Domain,
}

impl ColumnCollection {
    pub fn new(step: Vec<f64>, columns: Vec<Column>, metadata: Metadata) -> Result<Self> {
        let mut collection = ColumnCollection {
            step,
            columns: Vec::with_capacity(columns.len()),
            metadata,
            domain: Domain::Core,
        };
        for column in columns {
            collection.add_column(column)?;
        }
        Ok(collection)
    }

    /// Build from raw value sequences. With `auto_detect` every column gets
    /// a detected [`ColumnKind`]; otherwise columns are generic.
    pub fn from_raw<S: Into<String>>(
        step: Vec<f64>,
        columns: Vec<(S, Vec<Cell>)>,
        metadata: Metadata,
        auto_detect: bool,
    ) -> Result<Self> {
        let columns = columns
            .into_iter()
            .map(|(name, values)| {
                if auto_detect {
                    Column::detect(name, values)
                } else {
                    Column::new(name, values)
                }
            })
            .collect();
        Self::new(step, columns, metadata)
    }

    pub(crate) fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    // -- Shape --

    pub fn len(&self) -> usize {
        self.step.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step.is_empty()
    }

    pub fn step(&self) -> &[f64] {
        &self.step
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Name lookup first, then channel id.
    fn locate(&self, key: &str) -> Option<usize> {
        self.position(key)
            .or_else(|| self.columns.iter().position(|c| c.channel() == Some(key)))
    }

    // -- Addressing --

    /// Column by name, falling back to a channel-id match.
    pub fn column(&self, key: &str) -> Result<&Column> {
        self.locate(key)
            .map(|i| &self.columns[i])
            .ok_or_else(|| TascError::MissingColumn(key.to_string()))
    }

    pub fn column_mut(&mut self, key: &str) -> Result<&mut Column> {
        match self.locate(key) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(TascError::MissingColumn(key.to_string())),
        }
    }

    pub fn row(&self, index: usize) -> Result<Row> {
        let step = *self.step.get(index).ok_or_else(|| {
            TascError::invalid(format!("row {index} is out of range for {} rows", self.len()))
        })?;
        let values = self
            .columns
            .iter()
            .map(|c| (c.name().to_string(), c.values()[index].clone()))
            .collect();
        Ok(Row { step, values })
    }

    /// New collection over `range`; metadata and domain are retained.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(TascError::invalid(format!(
                "slice {}..{} is out of range for {} rows",
                range.start,
                range.end,
                self.len()
            )));
        }
        let indices: Vec<usize> = range.collect();
        self.take_rows(&indices)
    }

    /// New collection over the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(TascError::invalid(format!(
                "row {bad} is out of range for {} rows",
                self.len()
            )));
        }
        Ok(ColumnCollection {
            step: indices.iter().map(|&i| self.step[i]).collect(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            metadata: self.metadata.clone(),
            domain: self.domain.clone(),
        })
    }

    pub fn head(&self, n: usize) -> Result<Self> {
        self.check_count(n)?;
        self.slice(0..n)
    }

    pub fn tail(&self, n: usize) -> Result<Self> {
        self.check_count(n)?;
        self.slice(self.len() - n..self.len())
    }

    fn check_count(&self, n: usize) -> Result<()> {
        if n > self.len() {
            return Err(TascError::invalid(format!(
                "requested {n} rows from a collection of {}",
                self.len()
            )));
        }
        Ok(())
    }

    // -- Column set --

    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.contains(column.name()) {
            return Err(TascError::DuplicateColumn(column.name().to_string()));
        }
        self.check_shape(&column)?;
        self.columns.push(column);
        Ok(())
    }

    /// Add a column from raw values, detecting its kind.
    pub fn add_values(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<()> {
        self.add_column(Column::detect(name, values))
    }

    /// Insert `column`, replacing an existing column of the same name in place.
    pub fn upsert_column(&mut self, column: Column) -> Result<()> {
        self.check_shape(&column)?;
        match self.position(column.name()) {
            Some(i) => self.columns[i] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let index = self
            .position(name)
            .ok_or_else(|| TascError::MissingColumn(name.to_string()))?;
        Ok(self.columns.remove(index))
    }

    /// Rename a column. Domain references to the old name follow the rename.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old != new && self.contains(new) {
            return Err(TascError::DuplicateColumn(new.to_string()));
        }
        let index = self
            .position(old)
            .ok_or_else(|| TascError::MissingColumn(old.to_string()))?;
        self.columns[index].rename(new);
        self.domain.rename_column(old, new);
        Ok(())
    }

    /// Keep only `names`, in that order.
    pub fn retain_columns(&mut self, names: &[&str]) -> Result<()> {
        let mut kept = Vec::with_capacity(names.len());
        for name in names {
            let index = self
                .position(name)
                .ok_or_else(|| TascError::MissingColumn(name.to_string()))?;
            if kept.iter().any(|c: &Column| c.name() == *name) {
                return Err(TascError::DuplicateColumn(name.to_string()));
            }
            kept.push(self.columns[index].clone());
        }
        self.columns = kept;
        Ok(())
    }

    fn check_shape(&self, column: &Column) -> Result<()> {
        if column.len() != self.len() {
            return Err(TascError::ShapeMismatch {
                column: column.name().to_string(),
                expected: self.len(),
                actual: column.len(),
            });
        }
        Ok(())
    }

    /// Re-classify every column from its current values.
    pub fn auto_detect_column_types(&mut self) {
        for column in &mut self.columns {
            *column = column.detected();
        }
    }

    // -- Metadata --

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Dotted-path lookup into the metadata tree.
    pub fn metadata_path(&self, path: &str) -> Result<&Value> {
        resolve_path(&self.metadata, path)
    }

    /// Per-column summary: value count, missing count and, for numeric
    /// columns, mean / min / max.
    pub fn describe(&self) -> Value {
        let mut summary = BTreeMap::new();
        for column in &self.columns {
            let mut entry = BTreeMap::new();
            entry.insert("count".to_string(), Value::from(column.len() - column.count_nones()));
            entry.insert("none_count".to_string(), Value::from(column.count_nones()));
            entry.insert("kind".to_string(), Value::from(column.kind().to_string()));
            if column.kind() == ColumnKind::Number {
                entry.insert("mean".to_string(), column.mean().ok().into());
                entry.insert("min".to_string(), column.min().ok().into());
                entry.insert("max".to_string(), column.max().ok().into());
            }
            summary.insert(column.name().to_string(), Value::Map(entry));
        }
        Value::Map(summary)
    }

    // -- Domain --

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_name(&self) -> &str {
        self.domain.name()
    }

    pub fn load_column(&self) -> Option<&str> {
        match &self.domain {
            Domain::LoadDisplacement(ld) => Some(&ld.load_column),
            _ => None,
        }
    }

    pub fn displacement_column(&self) -> Option<&str> {
        match &self.domain {
            Domain::LoadDisplacement(ld) => Some(&ld.displacement_column),
            _ => None,
        }
    }

    pub fn coordinates(&self) -> Option<&CoordinateMap> {
        match &self.domain {
            Domain::Coordinate(map) => Some(map),
            _ => None,
        }
    }

    pub(crate) fn coordinates_mut(&mut self) -> Option<&mut CoordinateMap> {
        match &mut self.domain {
            Domain::Coordinate(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{cells, optional_cells, Scalar};

    fn sample() -> ColumnCollection {
        let mut meta = Metadata::new();
        meta.insert("title".into(), "TEST001".into());
        ColumnCollection::from_raw(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![
                ("load", cells([0.0, 1.5, 3.0, 4.5])),
                ("disp", optional_cells([Some(0.0), None, Some(0.2), Some(0.3)])),
                ("status", cells(["ok", "ok", "warn", "ok"])),
            ],
            meta,
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let err = ColumnCollection::from_raw(
            vec![1.0, 2.0, 3.0],
            vec![("a", cells([1.0, 2.0]))],
            Metadata::new(),
            true,
        )
        .unwrap_err();
        match err {
            TascError::ShapeMismatch { column, expected, actual } => {
                assert_eq!(column, "a");
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let err = ColumnCollection::from_raw(
            vec![1.0],
            vec![("a", cells([1.0])), ("a", cells([2.0]))],
            Metadata::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, TascError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn test_auto_detect_and_generic() {
        let detected = sample();
        assert_eq!(detected.column("load").unwrap().kind(), ColumnKind::Number);
        assert_eq!(detected.column("status").unwrap().kind(), ColumnKind::String);

        let generic = ColumnCollection::from_raw(
            vec![1.0],
            vec![("load", cells([1.0]))],
            Metadata::new(),
            false,
        )
        .unwrap();
        assert_eq!(generic.column("load").unwrap().kind(), ColumnKind::Generic);
    }

    #[test]
    fn test_column_lookup_falls_back_to_channel() {
        let mut c = sample();
        let load = c.remove_column("load").unwrap().with_channel("CH1");
        c.add_column(load).unwrap();
        assert_eq!(c.column("CH1").unwrap().name(), "load");
        assert!(matches!(c.column("CH9"), Err(TascError::MissingColumn(_))));
    }

    #[test]
    fn test_row_view() {
        let c = sample();
        let row = c.row(1).unwrap();
        assert_eq!(row.step, 2.0);
        assert_eq!(row.get("load"), Some(&Some(Scalar::Float(1.5))));
        assert_eq!(row.get("disp"), Some(&None));
        assert!(c.row(4).is_err());
    }

    #[test]
    fn test_slice_head_tail() {
        let c = sample();
        let mid = c.slice(1..3).unwrap();
        assert_eq!(mid.step(), &[2.0, 3.0]);
        assert_eq!(mid.metadata(), c.metadata());
        assert_eq!(mid.column("status").unwrap().values(), &cells(["ok", "warn"])[..]);

        assert_eq!(c.head(2).unwrap().step(), &[1.0, 2.0]);
        assert_eq!(c.tail(1).unwrap().step(), &[4.0]);
        assert_eq!(c.head(0).unwrap().len(), 0);
        assert!(matches!(c.head(5), Err(TascError::InvalidArgument(_))));
        assert!(matches!(c.tail(5), Err(TascError::InvalidArgument(_))));
        assert!(c.slice(3..5).is_err());
    }

    #[test]
    fn test_add_then_remove_restores_column_set() {
        let original = sample();
        let mut c = original.clone();
        c.add_values("extra", cells([1_i64, 2, 3, 4])).unwrap();
        assert_eq!(c.columns().len(), 4);
        c.remove_column("extra").unwrap();
        assert_eq!(c, original);

        assert!(matches!(c.add_values("load", cells([1.0, 2.0, 3.0, 4.0])), Err(TascError::DuplicateColumn(_))));
        assert!(matches!(c.add_values("short", cells([1.0])), Err(TascError::ShapeMismatch { .. })));
        assert!(matches!(c.remove_column("missing"), Err(TascError::MissingColumn(_))));
    }

    #[test]
    fn test_clone_isolation() {
        let original = sample();
        let mut copy = original.clone();
        copy.column_mut("load").unwrap().values_mut()[0] = Some(Scalar::Float(-1.0));
        copy.metadata_mut().insert("title".into(), "changed".into());

        assert_eq!(original.column("load").unwrap().values()[0], Some(Scalar::Float(0.0)));
        assert_eq!(original.metadata_path("title").unwrap().as_str(), Some("TEST001"));
    }

    #[test]
    fn test_rename_and_retain() {
        let mut c = sample();
        c.rename_column("disp", "displacement").unwrap();
        assert!(c.contains("displacement"));
        assert!(matches!(c.rename_column("load", "status"), Err(TascError::DuplicateColumn(_))));

        c.retain_columns(&["status", "load"]).unwrap();
        assert_eq!(c.column_names(), vec!["status", "load"]);
    }

    #[test]
    fn test_column_mut_keeps_names_unique() {
        let mut c = crate::domains::LoadDisplacement::new("load", "disp")
            .attach(sample())
            .unwrap();
        {
            let disp = c.column_mut("disp").unwrap();
            disp.values_mut()[1] = Some(Scalar::Float(0.1));
            disp.metadata_mut().insert("gauge".into(), "LVDT".into());
        }
        assert_eq!(c.column_names(), vec!["load", "disp", "status"]);

        assert!(matches!(c.rename_column("disp", "load"), Err(TascError::DuplicateColumn(_))));
        c.rename_column("disp", "stroke").unwrap();
        assert_eq!(c.column_names(), vec!["load", "stroke", "status"]);
        assert_eq!(c.displacement_column(), Some("stroke"), "the domain follows a rename");
    }

    #[test]
    fn test_describe() {
        let summary = sample().describe();
        let disp = summary.as_map().unwrap()["disp"].as_map().unwrap();
        assert_eq!(disp["count"], Value::Int(3));
        assert_eq!(disp["none_count"], Value::Int(1));
        assert_eq!(disp["max"].as_f64(), Some(0.3));
        let status = summary.as_map().unwrap()["status"].as_map().unwrap();
        assert!(!status.contains_key("mean"));
    }
}
