use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{Cell, Metadata, Scalar};
use crate::error::{Result, TascError};

// ---------------------------------------------------------------------------
// ColumnKind – the element kind a column was validated against
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Untyped column; any mix of values.
    Generic,
    Number,
    String,
    Boolean,
    /// Every value is missing.
    Invalid,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Generic => "generic",
            ColumnKind::Number => "number",
            ColumnKind::String => "string",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

impl ColumnKind {
    /// Classify raw values by inspecting their non-missing elements.
    ///
    /// Empty input stays `Generic`; all-missing input is `Invalid`.
    pub fn detect(values: &[Cell]) -> ColumnKind {
        if values.is_empty() {
            return ColumnKind::Generic;
        }
        let mut present = values.iter().flatten().peekable();
        if present.peek().is_none() {
            return ColumnKind::Invalid;
        }
        let mut kind = None;
        for value in present {
            let this = match value {
                Scalar::Int(_) | Scalar::Float(_) => ColumnKind::Number,
                Scalar::Str(_) => ColumnKind::String,
                Scalar::Bool(_) => ColumnKind::Boolean,
            };
            match kind {
                None => kind = Some(this),
                Some(k) if k == this => {}
                Some(_) => return ColumnKind::Generic,
            }
        }
        kind.unwrap_or(ColumnKind::Generic)
    }

    fn accepts(self, value: &Scalar) -> bool {
        match self {
            ColumnKind::Generic => true,
            ColumnKind::Number => value.is_number(),
            ColumnKind::String => matches!(value, Scalar::Str(_)),
            ColumnKind::Boolean => matches!(value, Scalar::Bool(_)),
            ColumnKind::Invalid => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Column – one named channel of a measurement record
// ---------------------------------------------------------------------------

/// A named, ordered sequence of cells with channel id, unit and metadata.
///
/// The number of values is fixed once built: values are only handed out
/// mutably as a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    channel: Option<String>,
    unit: Option<String>,
    values: Vec<Cell>,
    metadata: Metadata,
    kind: ColumnKind,
}

impl Column {
    /// Untyped column; no kind validation.
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Column {
            name: name.into(),
            channel: None,
            unit: None,
            values,
            metadata: Metadata::new(),
            kind: ColumnKind::Generic,
        }
    }

    /// Column whose kind is inferred from its values.
    pub fn detect(name: impl Into<String>, values: Vec<Cell>) -> Self {
        let kind = ColumnKind::detect(&values);
        Column {
            kind,
            ..Column::new(name, values)
        }
    }

    /// Column validated against a declared kind.
    pub fn typed(name: impl Into<String>, kind: ColumnKind, values: Vec<Cell>) -> Result<Self> {
        let name = name.into();
        for value in &values {
            match value {
                Some(v) if !kind.accepts(v) => {
                    return Err(TascError::TypeConflict {
                        column: name,
                        declared: kind,
                        found: format!("a {} value ({v})", v.type_name()),
                    });
                }
                _ => {}
            }
        }
        Ok(Column {
            kind,
            ..Column::new(name, values)
        })
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Mutable access to the cells. The slice cannot grow or shrink.
    pub fn values_mut(&mut self) -> &mut [Cell] {
        &mut self.values
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Same name, channel, unit and metadata over new values.
    ///
    /// Typed columns re-detect their kind; generic columns stay generic.
    pub fn with_values(&self, values: Vec<Cell>) -> Column {
        let kind = match self.kind {
            ColumnKind::Generic => ColumnKind::Generic,
            _ => ColumnKind::detect(&values),
        };
        Column {
            name: self.name.clone(),
            channel: self.channel.clone(),
            unit: self.unit.clone(),
            values,
            metadata: self.metadata.clone(),
            kind,
        }
    }

    /// Copy of the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Column {
        let values = indices
            .iter()
            .map(|&i| self.values.get(i).cloned().flatten())
            .collect();
        self.with_values(values)
    }

    /// Re-run kind detection over the current values.
    pub fn detected(&self) -> Column {
        Column {
            kind: ColumnKind::detect(&self.values),
            ..self.clone()
        }
    }

    // -- None accounting --

    pub fn has_none(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }

    pub fn count_nones(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn none_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Sorted set of distinct non-missing values.
    pub fn unique_values(&self) -> BTreeSet<Scalar> {
        self.values.iter().flatten().cloned().collect()
    }

    // -- Numeric aggregates (missing values skipped) --

    /// Non-missing values as numbers.
    pub fn numeric_values(&self) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.values.len());
        for value in self.values.iter().flatten() {
            match value.as_f64() {
                Some(v) => out.push(v),
                None => {
                    return Err(TascError::invalid(format!(
                        "column '{}' holds a non-numeric {} value",
                        self.name,
                        value.type_name()
                    )))
                }
            }
        }
        if out.is_empty() {
            return Err(TascError::EmptyData(self.name.clone()));
        }
        Ok(out)
    }

    /// Numeric view of every cell, `None` for missing or non-numeric cells.
    pub fn as_f64_options(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|v| v.as_ref().and_then(Scalar::as_f64))
            .collect()
    }

    pub fn max(&self) -> Result<f64> {
        Ok(self
            .numeric_values()?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    pub fn min(&self) -> Result<f64> {
        Ok(self
            .numeric_values()?
            .into_iter()
            .fold(f64::INFINITY, f64::min))
    }

    pub fn sum(&self) -> Result<f64> {
        Ok(self.numeric_values()?.iter().sum())
    }

    pub fn mean(&self) -> Result<f64> {
        let values = self.numeric_values()?;
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Population variance.
    pub fn variance(&self) -> Result<f64> {
        let values = self.numeric_values()?;
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        Ok(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
    }

    /// Population standard deviation.
    pub fn std(&self) -> Result<f64> {
        Ok(self.variance()?.sqrt())
    }

    pub fn median(&self) -> Result<f64> {
        self.quantile(0.5)
    }

    /// Linear interpolation between the closest ranks.
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(TascError::invalid(format!(
                "quantile must be within [0, 1], got {q}"
            )));
        }
        let mut values = self.numeric_values()?;
        values.sort_by(f64::total_cmp);
        let pos = q * (values.len() - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        let frac = pos - lower as f64;
        Ok(values[lower] + (values[upper] - values[lower]) * frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{cells, optional_cells};

    #[test]
    fn test_detect_kinds() {
        assert_eq!(ColumnKind::detect(&cells([1.0, 2.5])), ColumnKind::Number);
        assert_eq!(
            ColumnKind::detect(&optional_cells([Some(1_i64), None, Some(3)])),
            ColumnKind::Number
        );
        assert_eq!(ColumnKind::detect(&cells(["OK", ""])), ColumnKind::String);
        assert_eq!(ColumnKind::detect(&cells([true, false])), ColumnKind::Boolean);
        assert_eq!(ColumnKind::detect(&[None, None]), ColumnKind::Invalid);
        assert_eq!(ColumnKind::detect(&[]), ColumnKind::Generic);

        let mixed = vec![Some(Scalar::Int(1)), Some(Scalar::from("text")), None];
        assert_eq!(ColumnKind::detect(&mixed), ColumnKind::Generic);
    }

    #[test]
    fn test_typed_rejects_conflicting_values() {
        let values = vec![Some(Scalar::Int(1)), Some(Scalar::from("2")), None];
        let err = Column::typed("temperature", ColumnKind::Number, values).unwrap_err();
        assert!(matches!(err, TascError::TypeConflict { declared: ColumnKind::Number, .. }));

        let err = Column::typed("empty", ColumnKind::Invalid, optional_cells([None, Some(1.0)]))
            .unwrap_err();
        assert!(matches!(err, TascError::TypeConflict { .. }));

        let ok = Column::typed("status", ColumnKind::String, optional_cells([Some("OK"), None]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Column::detect("load", cells([1.0, 2.0, 3.0]))
            .with_channel("CH0")
            .with_unit("kN");
        let mut copy = original.clone();
        copy.values_mut()[0] = Some(Scalar::Float(99.0));
        copy.metadata_mut().insert("note".into(), "edited".into());

        assert_eq!(original.values()[0], Some(Scalar::Float(1.0)));
        assert!(original.metadata().is_empty());
        assert_eq!(copy.channel(), Some("CH0"));
        assert_eq!(copy.unit(), Some("kN"));
    }

    #[test]
    fn test_none_accounting() {
        let col = Column::detect("temp", optional_cells([Some(1.0), None, Some(3.0), None, Some(5.0)]));
        assert!(col.has_none());
        assert_eq!(col.count_nones(), 2);
        assert_eq!(col.none_indices(), vec![1, 3]);

        let empty = Column::new("empty", vec![]);
        assert!(!empty.has_none());
        assert_eq!(empty.count_nones(), 0);
        assert!(empty.none_indices().is_empty());
    }

    #[test]
    fn test_aggregates_skip_missing() {
        let with_gap = Column::detect("a", optional_cells([Some(1.0), None, Some(3.0)]));
        let dense = Column::detect("a", cells([1.0, 3.0]));
        assert_eq!(with_gap.mean().unwrap(), dense.mean().unwrap());
        assert_eq!(with_gap.sum().unwrap(), dense.sum().unwrap());
        assert_eq!(with_gap.max().unwrap(), 3.0);
        assert_eq!(with_gap.min().unwrap(), 1.0);
        assert_eq!(with_gap.median().unwrap(), 2.0);
        assert_eq!(with_gap.variance().unwrap(), 1.0);
        assert_eq!(with_gap.std().unwrap(), 1.0);
    }

    #[test]
    fn test_quantile() {
        let col = Column::detect("q", cells([4.0, 1.0, 3.0, 2.0]));
        assert_eq!(col.quantile(0.0).unwrap(), 1.0);
        assert_eq!(col.quantile(1.0).unwrap(), 4.0);
        assert!((col.quantile(0.25).unwrap() - 1.75).abs() < 1e-12);
        assert!(matches!(col.quantile(1.5), Err(TascError::InvalidArgument(_))));
        assert!(matches!(col.quantile(-0.1), Err(TascError::InvalidArgument(_))));
    }

    #[test]
    fn test_aggregate_on_all_missing_fails() {
        let col = Column::detect("gone", vec![None, None, None]);
        assert_eq!(col.kind(), ColumnKind::Invalid);
        assert!(matches!(col.mean(), Err(TascError::EmptyData(name)) if name == "gone"));
        assert!(matches!(col.quantile(0.5), Err(TascError::EmptyData(_))));
    }

    #[test]
    fn test_take_keeps_header() {
        let col = Column::detect("disp", cells([0.1, 0.2, 0.3, 0.4])).with_unit("mm");
        let picked = col.take(&[3, 1]);
        assert_eq!(picked.values(), &cells([0.4, 0.2])[..]);
        assert_eq!(picked.unit(), Some("mm"));
        assert_eq!(picked.kind(), ColumnKind::Number);
    }
}
