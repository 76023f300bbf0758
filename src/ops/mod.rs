//! Operation plumbing: the uniform argument bag, operation outputs, the
//! registry and the chain proxies.
//!
//! ```text
//!   ColumnCollection ──ops()──► CollectionOps ──call(name, args)──► CollectionOps
//!                                    │                                  │
//!                                    │ resolve(domain, name)            ├─ split ─► CollectionListOps
//!                                    ▼                                  └─ value ─► Value
//!                             OperationRegistry
//!                       domain ops ──fallback──► core ops
//! ```

pub mod core;
pub mod coordinate;
pub mod load_displacement;
pub mod proxy;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;

use crate::data::collection::ColumnCollection;
use crate::data::value::{insert_path, Value};
use crate::error::{Result, TascError};
use crate::plot::SharedSurface;

pub use proxy::{ChainStep, CollectionListOps, CollectionOps};
pub use registry::{OperationFn, OperationRegistry};

// ---------------------------------------------------------------------------
// OpArgs – positional + named arguments shared by every operation
// ---------------------------------------------------------------------------

/// Arguments for one operation call.
///
/// Every accessor takes the positional slot and the keyword name of a
/// parameter; a named argument wins over a positional one and `Null` counts
/// as absent.
#[derive(Clone, Default)]
pub struct OpArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
    surface: Option<SharedSurface>,
}

impl fmt::Debug for OpArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpArgs")
            .field("positional", &self.positional)
            .field("named", &self.named)
            .field("surface", &self.surface.is_some())
            .finish()
    }
}

impl OpArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Attach the surface plotting operations draw on.
    pub fn surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn plot_surface(&self) -> Option<&SharedSurface> {
        self.surface.as_ref()
    }

    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.named
            .get(name)
            .filter(|v| !v.is_null())
            .or_else(|| self.positional.get(index).filter(|v| !v.is_null()))
    }

    /// Named-only lookup, for flags that never take a positional slot.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name).filter(|v| !v.is_null())
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&Value> {
        self.get(index, name)
            .ok_or_else(|| TascError::invalid(format!("missing required argument '{name}'")))
    }

    pub fn str(&self, index: usize, name: &str) -> Result<&str> {
        let value = self.required(index, name)?;
        value.as_str().ok_or_else(|| wrong_type(name, "a string", value))
    }

    pub fn opt_str(&self, index: usize, name: &str) -> Result<Option<&str>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| wrong_type(name, "a string", value)),
        }
    }

    pub fn str_or<'a>(&'a self, index: usize, name: &str, default: &'a str) -> Result<&'a str> {
        Ok(self.opt_str(index, name)?.unwrap_or(default))
    }

    pub fn f64(&self, index: usize, name: &str) -> Result<f64> {
        let value = self.required(index, name)?;
        value.as_f64().ok_or_else(|| wrong_type(name, "a number", value))
    }

    pub fn opt_f64(&self, index: usize, name: &str) -> Result<Option<f64>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| wrong_type(name, "a number", value)),
        }
    }

    pub fn f64_or(&self, index: usize, name: &str, default: f64) -> Result<f64> {
        Ok(self.opt_f64(index, name)?.unwrap_or(default))
    }

    pub fn opt_usize(&self, index: usize, name: &str) -> Result<Option<usize>> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => match value.as_i64() {
                Some(i) if i >= 0 => Ok(Some(i as usize)),
                _ => Err(wrong_type(name, "a non-negative integer", value)),
            },
        }
    }

    pub fn usize(&self, index: usize, name: &str) -> Result<usize> {
        self.opt_usize(index, name)?
            .ok_or_else(|| TascError::invalid(format!("missing required argument '{name}'")))
    }

    pub fn usize_or(&self, index: usize, name: &str, default: usize) -> Result<usize> {
        Ok(self.opt_usize(index, name)?.unwrap_or(default))
    }

    pub fn bool_or(&self, index: usize, name: &str, default: bool) -> Result<bool> {
        match self.get(index, name) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| wrong_type(name, "a boolean", value)),
        }
    }

    /// A list of names; a single string is accepted as a one-element list.
    pub fn str_list(&self, index: usize, name: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.get(index, name) else {
            return Ok(None);
        };
        match value {
            Value::Str(s) => Ok(Some(vec![s.clone()])),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| wrong_type(name, "a list of strings", value))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            other => Err(wrong_type(name, "a list of strings", other)),
        }
    }

    /// A list of numbers; a single number is accepted as a one-element list.
    pub fn f64_list(&self, index: usize, name: &str) -> Result<Option<Vec<f64>>> {
        let Some(value) = self.get(index, name) else {
            return Ok(None);
        };
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .ok_or_else(|| wrong_type(name, "a list of numbers", value))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            other => other
                .as_f64()
                .map(|v| Some(vec![v]))
                .ok_or_else(|| wrong_type(name, "a list of numbers", other)),
        }
    }

    pub fn usize_list(&self, index: usize, name: &str) -> Result<Option<Vec<usize>>> {
        let Some(values) = self.f64_list(index, name)? else {
            return Ok(None);
        };
        values
            .into_iter()
            .map(|v| {
                if v >= 0.0 && v.fract() == 0.0 {
                    Ok(v as usize)
                } else {
                    Err(TascError::invalid(format!(
                        "'{name}' must hold non-negative integers, got {v}"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Arguments with the first `skip` positional slots and the given named
    /// keys dropped. Used to forward the remainder of a call.
    pub fn forward(&self, skip: usize, drop_named: &[&str]) -> OpArgs {
        OpArgs {
            positional: self.positional.iter().skip(skip).cloned().collect(),
            named: self
                .named
                .iter()
                .filter(|(k, _)| !drop_named.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            surface: self.surface.clone(),
        }
    }
}

fn wrong_type(name: &str, expected: &str, found: &Value) -> TascError {
    TascError::invalid(format!(
        "argument '{name}' must be {expected}, got {} ({found})",
        found.kind_name()
    ))
}

// ---------------------------------------------------------------------------
// OpOutput
// ---------------------------------------------------------------------------

/// What an operation hands back to the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutput {
    Collection(ColumnCollection),
    /// A split: one collection per group.
    Collections(Vec<ColumnCollection>),
    /// Terminal value; ends the chain.
    Value(Value),
}

impl From<ColumnCollection> for OpOutput {
    fn from(c: ColumnCollection) -> Self {
        OpOutput::Collection(c)
    }
}

impl From<Value> for OpOutput {
    fn from(v: Value) -> Self {
        OpOutput::Value(v)
    }
}

/// Apply the `fail_silently` convention: when the caller opted in, a failed
/// analysis returns the input collection with the error text stored under
/// `analysis.<operation>.error`.
pub(crate) fn recover_failure(
    collection: &ColumnCollection,
    args: &OpArgs,
    operation: &str,
    result: Result<OpOutput>,
) -> Result<OpOutput> {
    let silent = args
        .named("fail_silently")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    match result {
        Err(err) if silent => {
            log::warn!("{operation} failed, recording in metadata: {err}");
            let mut out = collection.clone();
            insert_path(
                out.metadata_mut(),
                &format!("analysis.{operation}.error"),
                Value::from(err.to_string()),
            );
            Ok(OpOutput::Collection(out))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_argument_wins() {
        let args = OpArgs::new().arg("a").arg(3).with("column", "b");
        assert_eq!(args.str(0, "column").unwrap(), "b");
        assert_eq!(args.usize(1, "window_size").unwrap(), 3);
        assert!(args.opt_f64(2, "tolerance").unwrap().is_none());
    }

    #[test]
    fn test_null_counts_as_absent() {
        let args = OpArgs::new().with("result_column", Value::Null).arg("fallback");
        assert_eq!(args.opt_str(0, "result_column").unwrap(), Some("fallback"));
        assert_eq!(args.str_or(1, "method", "minmax").unwrap(), "minmax");
    }

    #[test]
    fn test_wrong_type_is_invalid_argument() {
        let args = OpArgs::new().with("window_size", "wide").with("columns", 5);
        assert!(matches!(args.usize(0, "window_size"), Err(TascError::InvalidArgument(_))));
        assert!(matches!(args.str_list(0, "columns"), Err(TascError::InvalidArgument(_))));
        assert!(matches!(args.str(0, "column"), Err(TascError::InvalidArgument(msg)) if msg.contains("column")));
    }

    #[test]
    fn test_lists() {
        let args = OpArgs::new()
            .with("columns", "load")
            .with("steps", vec![1.0, 2.0])
            .with("indices", vec![0_i64, 2]);
        assert_eq!(args.str_list(0, "columns").unwrap(), Some(vec!["load".to_string()]));
        assert_eq!(args.f64_list(0, "steps").unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(args.usize_list(0, "indices").unwrap(), Some(vec![0, 2]));
        assert!(args.usize_list(0, "steps").is_ok());
    }

    #[test]
    fn test_forward_drops_consumed_arguments() {
        let args = OpArgs::new()
            .arg("load_displacement")
            .arg("load")
            .with("domain", "x")
            .with("displacement_column", "disp");
        let rest = args.forward(1, &["domain"]);
        assert_eq!(rest.positional, vec![Value::from("load")]);
        assert!(!rest.named.contains_key("domain"));
        assert!(rest.named.contains_key("displacement_column"));
    }
}
