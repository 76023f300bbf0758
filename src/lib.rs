//! Column-oriented measurement records with chainable, domain-aware
//! operations.
//!
//! A [`ColumnCollection`] holds named columns aligned against a shared step
//! index. Operations live in an [`OperationRegistry`] keyed by domain and
//! are chained through [`CollectionOps`]; every step works on a clone, so
//! the source collection is never touched.
//!
//! ```
//! use tasc::{ColumnCollection, Metadata, OpArgs, OperationRegistry};
//! use tasc::data::value::cells;
//!
//! let registry = OperationRegistry::with_builtin();
//! let record = ColumnCollection::from_raw(
//!     vec![1.0, 2.0, 3.0],
//!     vec![("force", cells([0.0, 5.0, 10.0])), ("stroke", cells([0.0, 1.0, 2.0]))],
//!     Metadata::new(),
//!     true,
//! )?;
//!
//! let stiffness = record
//!     .ops(&registry)
//!     .as_domain("load_displacement", OpArgs::new().arg("force").arg("stroke"))?
//!     .value("calculate_stiffness", OpArgs::new().arg(0.0).arg(1.0))?;
//! assert_eq!(stiffness.as_f64(), Some(5.0));
//! # Ok::<(), tasc::TascError>(())
//! ```

pub mod color;
pub mod data;
pub mod domains;
pub mod error;
pub mod ops;
pub mod plot;

pub use data::collection::{ColumnCollection, Row};
pub use data::column::{Column, ColumnKind};
pub use data::format::{FileFormat, FormatRegistry};
pub use data::loader::{load_file, ReadOptions};
pub use data::value::{Cell, Metadata, Scalar, Value};
pub use domains::{Domain, DomainCollectionFactory};
pub use error::{Result, TascError};
pub use ops::{CollectionListOps, CollectionOps, OpArgs, OpOutput, OperationRegistry};
