use std::collections::BTreeMap;
use std::path::Path;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::collection::ColumnCollection;
use super::column::Column;
use super::document::CollectionDocument;
use super::format::{FileFormat, FormatRegistry};
use super::value::{Cell, Metadata, Scalar, Value};
use crate::error::{Result, TascError};

/// Markers read as a missing value, compared case-insensitively.
const MISSING_MARKERS: [&str; 5] = ["", "none", "null", "nan", "*******"];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How [`ColumnCollection::from_file`] reads a delimited file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Name of a format in the [`FormatRegistry`].
    pub format: String,
    pub auto_detect_types: bool,
    /// Keep only these columns, matched by name or channel id.
    pub selected_columns: Option<Vec<String>>,
    /// Overrides the format's delimiter.
    pub delimiter: Option<char>,
    /// Overrides the format's encoding.
    pub encoding: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            format: "standard".to_string(),
            auto_detect_types: true,
            selected_columns: None,
            delimiter: None,
            encoding: None,
        }
    }
}

impl ReadOptions {
    pub fn format(name: impl Into<String>) -> Self {
        ReadOptions {
            format: name.into(),
            ..Self::default()
        }
    }

    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.selected_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a collection from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – flat table, one column per channel plus `step`
/// * `.json`            – the document written by [`ColumnCollection::to_json`]
/// * `.csv`             – the `csv` layout
/// * `.txt`             – the `tasc_txt` layout
pub fn load_file(path: &Path) -> Result<ColumnCollection> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => ColumnCollection::from_file(path, &ReadOptions::format("csv")),
        "txt" => ColumnCollection::from_file(path, &ReadOptions::format("tasc_txt")),
        other => Err(TascError::UnknownFormat(format!(".{other}"))),
    }
}

impl ColumnCollection {
    /// Read a delimited file laid out by one of the built-in formats.
    pub fn from_file(path: &Path, options: &ReadOptions) -> Result<ColumnCollection> {
        Self::from_file_with(path, options, &FormatRegistry::with_builtin())
    }

    /// Read a delimited file laid out by a format of `formats`.
    pub fn from_file_with(
        path: &Path,
        options: &ReadOptions,
        formats: &FormatRegistry,
    ) -> Result<ColumnCollection> {
        let mut format = formats.get(&options.format)?.clone();
        if let Some(delimiter) = options.delimiter {
            format.delimiter = delimiter;
        }
        if let Some(encoding) = &options.encoding {
            format.encoding = encoding.clone();
        }

        let bytes = std::fs::read(path)?;
        let text = decode(&bytes, &format, path);
        let mut collection = parse_delimited(&text, &format, options)?;

        let meta = collection.metadata_mut();
        meta.insert("format".to_string(), Value::from(options.format.as_str()));
        meta.insert("source".to_string(), Value::from(path.display().to_string()));
        log::info!(
            "loaded {} ({} rows, {} columns, format '{}')",
            path.display(),
            collection.len(),
            collection.columns().len(),
            options.format
        );
        Ok(collection)
    }

    /// Rebuild a collection from the document written by `to_json`.
    pub fn from_json(text: &str) -> Result<ColumnCollection> {
        let document: CollectionDocument = serde_json::from_str(text)?;
        document.into_collection(true)
    }
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Decode with the format's encoding. A byte-order mark overrides it.
fn decode(bytes: &[u8], format: &FileFormat, path: &Path) -> String {
    let encoding = format.text_encoding();
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::warn!(
            "{} is not valid {}; undecodable bytes are replaced",
            path.display(),
            used.name()
        );
    }
    text.into_owned()
}

/// Parse one cell: missing markers, booleans, integers, floats, then text.
pub fn parse_cell(raw: &str) -> Cell {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if MISSING_MARKERS.contains(&lower.as_str()) {
        return None;
    }
    match lower.as_str() {
        "true" => return Some(Scalar::Bool(true)),
        "false" => return Some(Scalar::Bool(false)),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Scalar::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Some(Scalar::Float(f));
    }
    Some(Scalar::Str(raw.to_string()))
}

pub(crate) fn parse_delimited(
    text: &str,
    format: &FileFormat,
    options: &ReadOptions,
) -> Result<ColumnCollection> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(format.delimiter_byte()?)
        .from_reader(text.as_bytes());
    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let header = |row: Option<usize>| -> Vec<String> {
        row.and_then(|r| rows.get(r))
            .map(|record| {
                record
                    .iter()
                    .skip(format.data_start_col)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let channels = header(format.ch_row);
    let mut names = header(format.name_row);
    if names.iter().all(String::is_empty) {
        names = channels.clone();
    }
    let units = header(format.unit_row);

    let data_rows: Vec<&csv::StringRecord> = rows
        .iter()
        .skip(format.data_start_row)
        .filter(|record| record.iter().any(|field| !field.is_empty()))
        .collect();
    if names.is_empty() {
        let width = data_rows
            .iter()
            .map(|r| r.len().saturating_sub(format.data_start_col))
            .max()
            .unwrap_or(0);
        names = (1..=width).map(|i| format!("col{i}")).collect();
    }

    let field = |record: &csv::StringRecord, col: Option<usize>| -> String {
        col.and_then(|c| record.get(c)).unwrap_or("").to_string()
    };
    let step: Vec<f64> = data_rows
        .iter()
        .enumerate()
        .map(|(i, record)| {
            field(record, format.step_col)
                .parse::<f64>()
                .unwrap_or((i + 1) as f64)
        })
        .collect();
    let dates: Vec<String> = data_rows.iter().map(|r| field(r, format.date_col)).collect();
    let times: Vec<String> = data_rows.iter().map(|r| field(r, format.time_col)).collect();

    let mut columns = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let channel = channels.get(i).filter(|ch| !ch.is_empty());
        if let Some(selected) = &options.selected_columns {
            let picked = selected
                .iter()
                .any(|s| s == name || channel.is_some_and(|ch| ch == s));
            if !picked {
                continue;
            }
        }
        let values: Vec<Cell> = data_rows
            .iter()
            .map(|record| parse_cell(record.get(format.data_start_col + i).unwrap_or("")))
            .collect();
        let mut column = if options.auto_detect_types {
            Column::detect(name.as_str(), values)
        } else {
            Column::new(name.as_str(), values)
        };
        if let Some(channel) = channel {
            column = column.with_channel(channel.as_str());
        }
        if let Some(unit) = units.get(i).filter(|u| !u.is_empty()) {
            column = column.with_unit(unit.as_str());
        }
        columns.push(column);
    }

    let mut metadata = Metadata::new();
    if let Some(title) = format.title_row.and_then(|r| rows.get(r)) {
        let title: Vec<&str> = title.iter().filter(|f| !f.is_empty()).collect();
        if !title.is_empty() {
            metadata.insert("title".to_string(), Value::from(title.join(" ")));
        }
    }
    for (key, list) in [("date", dates), ("time", times)] {
        if list.iter().any(|s| !s.is_empty()) {
            metadata.insert(key.to_string(), Value::from(list));
        }
    }
    ColumnCollection::new(step, columns, metadata)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<ColumnCollection> {
    let text = std::fs::read_to_string(path)?;
    let collection = ColumnCollection::from_json(&text)?;
    log::info!(
        "loaded {} ({} rows, {} columns, domain '{}')",
        path.display(),
        collection.len(),
        collection.columns().len(),
        collection.domain_name()
    );
    Ok(collection)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet table.
///
/// A numeric `step` column becomes the step index (1-based row numbers
/// otherwise); every other column becomes a collection column. Field
/// metadata keys `channel` and `unit` are carried over.
fn load_parquet(path: &Path) -> Result<ColumnCollection> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut step: Vec<Option<f64>> = Vec::new();
    let mut values: BTreeMap<usize, Vec<Cell>> = BTreeMap::new();
    let mut rows = 0;
    for batch in reader {
        let batch = batch?;
        rows += batch.num_rows();
        for (i, field) in schema.fields().iter().enumerate() {
            let cells = arrow_cells(batch.column(i), field.name())?;
            if field.name() == "step" {
                step.extend(cells.iter().map(|c| c.as_ref().and_then(Scalar::as_f64)));
            } else {
                values.entry(i).or_default().extend(cells);
            }
        }
    }

    let step: Vec<f64> = if step.len() == rows {
        step.iter()
            .enumerate()
            .map(|(i, s)| s.unwrap_or((i + 1) as f64))
            .collect()
    } else {
        (1..=rows).map(|i| i as f64).collect()
    };

    let mut columns = Vec::with_capacity(values.len());
    for (i, cells) in values {
        let field = schema.field(i);
        let mut column = Column::detect(field.name().as_str(), cells);
        if let Some(channel) = field.metadata().get("channel") {
            column = column.with_channel(channel.as_str());
        }
        if let Some(unit) = field.metadata().get("unit") {
            column = column.with_unit(unit.as_str());
        }
        columns.push(column);
    }

    let mut metadata = Metadata::new();
    metadata.insert("format".to_string(), Value::from("parquet"));
    metadata.insert("source".to_string(), Value::from(path.display().to_string()));
    let collection = ColumnCollection::new(step, columns, metadata)?;
    log::info!(
        "loaded {} ({} rows, {} columns)",
        path.display(),
        collection.len(),
        collection.columns().len()
    );
    Ok(collection)
}

// -- Arrow helpers --

/// Cells of one Arrow column; nulls become missing.
fn arrow_cells(col: &ArrayRef, name: &str) -> Result<Vec<Cell>> {
    fn collect<A: Array, F: Fn(&A, usize) -> Scalar>(arr: Option<&A>, read: F) -> Vec<Cell> {
        let Some(arr) = arr else {
            return Vec::new();
        };
        (0..arr.len())
            .map(|row| (!arr.is_null(row)).then(|| read(arr, row)))
            .collect()
    }

    let any = col.as_any();
    let cells = match col.data_type() {
        DataType::Float64 => collect(any.downcast_ref::<Float64Array>(), |a, r| {
            Scalar::Float(a.value(r))
        }),
        DataType::Float32 => collect(any.downcast_ref::<Float32Array>(), |a, r| {
            Scalar::Float(a.value(r) as f64)
        }),
        DataType::Int64 => collect(any.downcast_ref::<Int64Array>(), |a, r| Scalar::Int(a.value(r))),
        DataType::Int32 => collect(any.downcast_ref::<Int32Array>(), |a, r| {
            Scalar::Int(a.value(r) as i64)
        }),
        DataType::Boolean => collect(any.downcast_ref::<BooleanArray>(), |a, r| {
            Scalar::Bool(a.value(r))
        }),
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            (0..arr.len())
                .map(|row| (!arr.is_null(row)).then(|| Scalar::Str(arr.value(row).to_string())))
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            (0..arr.len())
                .map(|row| (!arr.is_null(row)).then(|| Scalar::Str(arr.value(row).to_string())))
                .collect()
        }
        other => {
            return Err(TascError::invalid(format!(
                "parquet column '{name}' has unsupported type {other:?}"
            )))
        }
    };
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::ColumnKind;

    const STANDARD: &str = "\
DATA\t\t\t
CH\tDATE\tTIME\tCH1\tCH2\tCH3
NAME\tDATE\tTIME\tload\tdisp\tflag
UNIT\t\t\tkN\tmm\t
1\t2024/01/01\t10:00:00\t0.5\t1\ttrue
2\t2024/01/01\t10:00:01\tnone\t2\tfalse
x\t2024/01/01\t10:00:02\t*******\t-3\tNaN
";

    fn parse(text: &str, options: &ReadOptions) -> ColumnCollection {
        let format = FormatRegistry::with_builtin()
            .get(&options.format)
            .unwrap()
            .clone();
        parse_delimited(text, &format, options).unwrap()
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("NULL"), None);
        assert_eq!(parse_cell(" nan "), None);
        assert_eq!(parse_cell("*******"), None);
        assert_eq!(parse_cell("TRUE"), Some(Scalar::Bool(true)));
        assert_eq!(parse_cell("-4"), Some(Scalar::Int(-4)));
        assert_eq!(parse_cell("2.5e3"), Some(Scalar::Float(2500.0)));
        assert_eq!(parse_cell("broken"), Some(Scalar::Str("broken".to_string())));
    }

    #[test]
    fn test_standard_layout() {
        let c = parse(STANDARD, &ReadOptions::default());
        assert_eq!(c.column_names(), vec!["load", "disp", "flag"]);
        assert_eq!(c.step(), &[1.0, 2.0, 3.0], "unparseable step falls back to the row number");

        let load = c.column("load").unwrap();
        assert_eq!(load.channel(), Some("CH1"));
        assert_eq!(load.unit(), Some("kN"));
        assert_eq!(load.values(), &[Some(Scalar::Float(0.5)), None, None]);
        assert_eq!(load.kind(), ColumnKind::Number);

        assert_eq!(c.column("flag").unwrap().unit(), None);
        assert_eq!(c.column("flag").unwrap().kind(), ColumnKind::Boolean);
        assert_eq!(c.metadata_path("date.2").unwrap().as_str(), Some("2024/01/01"));
        assert_eq!(c.metadata_path("title").unwrap().as_str(), Some("DATA"));
    }

    #[test]
    fn test_selected_columns_by_name_or_channel() {
        let c = parse(STANDARD, &ReadOptions::default().select(["disp", "CH3"]));
        assert_eq!(c.column_names(), vec!["disp", "flag"]);
    }

    #[test]
    fn test_without_auto_detect() {
        let options = ReadOptions {
            auto_detect_types: false,
            ..ReadOptions::default()
        };
        let c = parse(STANDARD, &options);
        assert_eq!(c.column("load").unwrap().kind(), ColumnKind::Generic);
    }

    #[test]
    fn test_missing_name_row_uses_channels_and_no_dates() {
        let text = "T,,,\nCH,,,A,B\n,,,,\n,,,,\n1,,,1,2\n2,,,3,4\n";
        let c = parse(text, &ReadOptions::format("csv"));
        assert_eq!(c.column_names(), vec!["A", "B"]);
        assert!(!c.metadata().contains_key("date"));
        assert_eq!(c.metadata_path("date").unwrap(), &Value::List(Vec::new()));
    }

    #[test]
    fn test_load_file_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.csv");
        std::fs::write(&path, STANDARD.replace('\t', ",")).unwrap();
        let c = load_file(&path).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.metadata()["format"].as_str(), Some("csv"));

        let err = load_file(&dir.path().join("record.xlsx")).unwrap_err();
        assert!(matches!(err, TascError::UnknownFormat(_)));
    }

    #[test]
    fn test_shift_jis_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sjis.txt");
        let text = STANDARD.replace("load\tdisp", "荷重\t変位");
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(&text);
        assert!(bytes.windows(4).any(|w| w == [0x89, 0xd7, 0x8f, 0x64]), "荷重 in Shift_JIS");
        std::fs::write(&path, &bytes).unwrap();

        let c = ColumnCollection::from_file(&path, &ReadOptions::format("tasc_txt")).unwrap();
        assert_eq!(c.column_names(), vec!["荷重", "変位", "flag"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        let mut bytes = STANDARD.as_bytes().to_vec();
        bytes.splice(4..4, [0xff, 0xfe, 0x80]);
        std::fs::write(&path, bytes).unwrap();

        let c = ColumnCollection::from_file(&path, &ReadOptions::default()).unwrap();
        assert_eq!(c.column_names(), vec!["load", "disp", "flag"]);
    }
}
