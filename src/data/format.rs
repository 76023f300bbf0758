use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TascError};

/// Layout of a delimited measurement file.
///
/// Row and column positions are zero-based. A `None` position means the
/// file has no such row or column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFormat {
    pub delimiter: char,
    pub title_row: Option<usize>,
    pub ch_row: Option<usize>,
    pub name_row: Option<usize>,
    pub unit_row: Option<usize>,
    pub data_start_row: usize,
    pub step_col: Option<usize>,
    pub date_col: Option<usize>,
    pub time_col: Option<usize>,
    pub data_start_col: usize,
    pub encoding: String,
    /// Write channel ids into the name row instead of column names.
    pub use_channel_name: bool,
}

impl Default for FileFormat {
    fn default() -> Self {
        FileFormat {
            delimiter: '\t',
            title_row: Some(0),
            ch_row: Some(1),
            name_row: Some(2),
            unit_row: Some(3),
            data_start_row: 4,
            step_col: Some(0),
            date_col: Some(1),
            time_col: Some(2),
            data_start_col: 3,
            encoding: "utf-8".to_string(),
            use_channel_name: false,
        }
    }
}

impl FileFormat {
    /// The delimiter as the single byte the csv crate wants.
    pub(crate) fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .map_err(|_| TascError::invalid(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }

    /// The declared text encoding. Labels `encoding_rs` does not know fall
    /// back to UTF-8.
    pub(crate) fn text_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.encoding.trim().as_bytes()).unwrap_or_else(|| {
            log::warn!("unknown encoding '{}', using UTF-8", self.encoding);
            UTF_8
        })
    }
}

/// Named file layouts.
///
/// `with_builtin` knows:
///
/// | name       | delimiter | encoding  | name row holds |
/// |------------|-----------|-----------|----------------|
/// | `standard` | tab       | utf-8     | names          |
/// | `csv`      | `,`       | utf-8     | names          |
/// | `tasc_txt` | tab       | shift_jis | channel ids    |
/// | `tasc_csv` | `,`       | shift_jis | channel ids    |
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, FileFormat>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let standard = FileFormat::default();
        let tasc = FileFormat {
            encoding: "shift_jis".to_string(),
            use_channel_name: true,
            ..standard.clone()
        };
        registry.register(
            "csv",
            FileFormat {
                delimiter: ',',
                ..standard.clone()
            },
        );
        registry.register(
            "tasc_csv",
            FileFormat {
                delimiter: ',',
                ..tasc.clone()
            },
        );
        registry.register("tasc_txt", tasc);
        registry.register("standard", standard);
        registry
    }

    /// Add or replace a format.
    pub fn register(&mut self, name: impl Into<String>, format: FileFormat) {
        let name = name.into();
        log::debug!("registering file format '{name}'");
        self.formats.insert(name, format);
    }

    pub fn get(&self, name: &str) -> Result<&FileFormat> {
        self.formats
            .get(name)
            .ok_or_else(|| TascError::UnknownFormat(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.formats.keys().map(String::as_str).collect()
    }

    /// Register every format of a JSON object `{name: {field: value}}`.
    /// Omitted fields take the `standard` values. Returns how many were read.
    pub fn load_json(&mut self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let formats: BTreeMap<String, FileFormat> = serde_json::from_str(&text)?;
        let count = formats.len();
        for (name, format) in formats {
            self.register(name, format);
        }
        log::info!("loaded {count} file formats from {}", path.display());
        Ok(count)
    }
}
