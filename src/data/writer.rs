use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::collection::ColumnCollection;
use super::column::{Column, ColumnKind};
use super::document::CollectionDocument;
use super::format::{FileFormat, FormatRegistry};
use super::value::{Cell, Scalar, Value};
use crate::error::{Result, TascError};

/// Text form of one cell. Floats keep their decimal point so they read back
/// as floats.
///
/// NaN is written as the `nan` missing marker and reads back as a missing
/// cell, the same as in the JSON document. Infinities survive.
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        None => "none".to_string(),
        Some(Scalar::Float(v)) if v.is_nan() => "nan".to_string(),
        Some(Scalar::Float(v)) => format!("{v:?}"),
        Some(other) => other.to_string(),
    }
}

impl ColumnCollection {
    /// Write a delimited file in one of the built-in formats.
    pub fn to_file(&self, path: &Path, format: &str) -> Result<()> {
        self.to_file_with(path, format, &FormatRegistry::with_builtin())
    }

    pub fn to_file_with(&self, path: &Path, format: &str, formats: &FormatRegistry) -> Result<()> {
        let layout = formats.get(format)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(layout.delimiter_byte()?)
            .flexible(true)
            .from_writer(Vec::new());
        for record in self.text_records(layout) {
            writer.write_record(&record)?;
        }
        let buffer = writer.into_inner().map_err(|err| err.into_error())?;
        let text = String::from_utf8(buffer)
            .map_err(|err| TascError::invalid(format!("csv output is not UTF-8: {err}")))?;

        let encoding = layout.text_encoding();
        let (bytes, _, unmappable) = encoding.encode(&text);
        if unmappable {
            log::warn!(
                "{} has characters {} cannot represent; they are written as numeric references",
                path.display(),
                encoding.name()
            );
        }
        std::fs::write(path, &bytes)?;
        log::info!(
            "wrote {} ({} rows, {} columns, format '{format}')",
            path.display(),
            self.len(),
            self.columns().len()
        );
        Ok(())
    }

    /// Records of the delimited layout, header rows first.
    fn text_records(&self, layout: &FileFormat) -> Vec<Vec<String>> {
        let prefix = layout.data_start_col;
        let header = |label: &str, with_date_time: bool, cells: Vec<String>| {
            let mut record = vec![String::new(); prefix];
            if let Some(first) = record.first_mut() {
                *first = label.to_string();
            }
            if with_date_time {
                for (col, text) in [(layout.date_col, "DATE"), (layout.time_col, "TIME")] {
                    if let Some(slot) = col.and_then(|c| record.get_mut(c)) {
                        *slot = text.to_string();
                    }
                }
            }
            record.extend(cells);
            record
        };

        let channel_or_name = |c: &Column| c.channel().unwrap_or(c.name()).to_string();
        let title = self
            .metadata()
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("DATA");
        let channels: Vec<String> = self.columns().iter().map(channel_or_name).collect();
        let names: Vec<String> = if layout.use_channel_name {
            channels.clone()
        } else {
            self.columns().iter().map(|c| c.name().to_string()).collect()
        };
        let units: Vec<String> = self
            .columns()
            .iter()
            .map(|c| c.unit().unwrap_or("").to_string())
            .collect();

        let mut records = vec![Vec::new(); layout.data_start_row];
        let headers = [
            (layout.title_row, vec![title.to_string()]),
            (layout.ch_row, header("CH", true, channels)),
            (layout.name_row, header("NAME", true, names)),
            (layout.unit_row, header("UNIT", false, units)),
        ];
        for (row, record) in headers {
            if let Some(slot) = row.and_then(|r| records.get_mut(r)) {
                *slot = record;
            }
        }

        let list_item = |key: &str, row: usize| -> String {
            self.metadata()
                .get(key)
                .and_then(Value::as_list)
                .and_then(|items| items.get(row))
                .map(|v| match v {
                    Value::Str(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };
        for (row, step) in self.step().iter().enumerate() {
            let mut record = vec![String::new(); prefix];
            let fixed = [
                (layout.step_col, step.to_string()),
                (layout.date_col, list_item("date", row)),
                (layout.time_col, list_item("time", row)),
            ];
            for (col, text) in fixed {
                if let Some(slot) = col.and_then(|c| record.get_mut(c)) {
                    *slot = text;
                }
            }
            record.extend(self.columns().iter().map(|c| format_cell(&c.values()[row])));
            records.push(record);
        }
        records
    }

    /// The collection as a JSON document, domain payload included.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&CollectionDocument::from_collection(self))?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("wrote {} ({} rows)", path.display(), self.len());
        Ok(())
    }

    /// Write a flat Parquet table: `step` plus one column per collection
    /// column, channel and unit kept as field metadata.
    pub fn to_parquet(&self, path: &Path) -> Result<()> {
        let mut fields = vec![Field::new("step", DataType::Float64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Float64Array::from(self.step().to_vec()))];
        for column in self.columns() {
            let array = arrow_array(column);
            let mut meta = HashMap::new();
            if let Some(channel) = column.channel() {
                meta.insert("channel".to_string(), channel.to_string());
            }
            if let Some(unit) = column.unit() {
                meta.insert("unit".to_string(), unit.to_string());
            }
            fields.push(
                Field::new(column.name(), array.data_type().clone(), true).with_metadata(meta),
            );
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        let file = std::fs::File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        log::info!("wrote {} ({} rows)", path.display(), self.len());
        Ok(())
    }
}

/// Numbers become Int64 when every present value is an integer, Float64
/// otherwise; anything that is not a single scalar kind is written as text.
fn arrow_array(column: &Column) -> ArrayRef {
    let values = column.values();
    match column.kind() {
        ColumnKind::Number if values.iter().flatten().all(|v| matches!(v, Scalar::Int(_))) => {
            Arc::new(Int64Array::from(
                values
                    .iter()
                    .map(|v| match v {
                        Some(Scalar::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            ))
        }
        ColumnKind::Number => Arc::new(Float64Array::from(column.as_f64_options())),
        ColumnKind::Boolean => Arc::new(BooleanArray::from(
            values
                .iter()
                .map(|v| match v {
                    Some(Scalar::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| v.as_ref().map(Scalar::to_string))
                .collect::<Vec<_>>(),
        )),
    }
}
