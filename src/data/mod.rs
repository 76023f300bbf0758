/// Data layer: cell values, columns, collections and file I/O.
///
/// Architecture:
/// ```text
///  .txt / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐   FileFormat / FormatRegistry
///   │  loader   │◄─ (format)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ ColumnCollection │  step index, Vec<Column>, metadata, domain
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  delimited text / JSON document / Parquet
///   └──────────┘
/// ```

pub mod collection;
pub mod column;
mod document;
pub mod format;
pub mod loader;
pub mod value;
pub mod writer;
