use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TascError};

// ---------------------------------------------------------------------------
// Scalar – a single non-missing cell value
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value. Missing cells are `None` at the [`Cell`]
/// level, so a `Scalar` is always present.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// One cell of a column: `None` is the missing marker.
pub type Cell = Option<Scalar>;

// -- Manual Eq/Ord so we can put Scalar in BTreeSet --

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Scalar::*;
        fn discriminant(v: &Scalar) -> u8 {
            match v {
                Bool(_) => 0,
                Int(_) => 1,
                Float(_) => 2,
                Str(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Scalar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Str(s) => s.hash(state),
            Scalar::Int(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

impl Scalar {
    /// Numeric view of the value; booleans and text are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    /// Equality that treats `Int(2)` and `Float(2.0)` as the same number.
    pub fn loose_eq(&self, other: &Scalar) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Bool(_) => "boolean",
            Scalar::Str(_) => "string",
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Build a run of present cells.
pub fn cells<T: Into<Scalar>>(values: impl IntoIterator<Item = T>) -> Vec<Cell> {
    values.into_iter().map(|v| Some(v.into())).collect()
}

/// Build a run of cells where `None` marks a missing value.
pub fn optional_cells<T: Into<Scalar>>(values: impl IntoIterator<Item = Option<T>>) -> Vec<Cell> {
    values.into_iter().map(|v| v.map(Into::into)).collect()
}

// ---------------------------------------------------------------------------
// Value – the metadata tree and the operation-argument currency
// ---------------------------------------------------------------------------

/// Nested metadata tree: scalars, sequences and string-keyed mappings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Collection- and column-level metadata.
pub type Metadata = BTreeMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Interpret the value as a cell. Lists and maps are not cells.
    pub fn to_cell(&self) -> Option<Cell> {
        match self {
            Value::Null => Some(None),
            Value::Bool(b) => Some(Some(Scalar::Bool(*b))),
            Value::Int(i) => Some(Some(Scalar::Int(*i))),
            Value::Float(v) => Some(Some(Scalar::Float(*v))),
            Value::Str(s) => Some(Some(Scalar::Str(s.clone()))),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Int(i) => Value::Int(i),
            Scalar::Float(v) => Value::Float(v),
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(val: serde_json::Value) -> Self {
        use serde_json::Value as JsonValue;
        match val {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Str(n.to_string())
                }
            }
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dotted-path resolution
// ---------------------------------------------------------------------------

static EMPTY_LIST: Value = Value::List(Vec::new());
static EMPTY_MAP: Value = Value::Map(BTreeMap::new());

/// Top-level keys that read as empty when absent instead of failing.
fn default_for(key: &str) -> Option<&'static Value> {
    match key {
        "date" | "time" => Some(&EMPTY_LIST),
        "curves" | "analysis" => Some(&EMPTY_MAP),
        _ => None,
    }
}

/// Resolve `"curves.skeleton_curve.x"` style paths through nested maps and
/// lists. Numeric segments index lists.
pub fn resolve_path<'a>(root: &'a Metadata, path: &str) -> Result<&'a Value> {
    let not_found = |segment: &str| TascError::PathNotFound {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = match root.get(first) {
        Some(v) => v,
        None => default_for(first).ok_or_else(|| not_found(first))?,
    };

    for segment in segments {
        current = match current {
            Value::Map(map) => map.get(segment).ok_or_else(|| not_found(segment))?,
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| not_found(segment))?,
            _ => return Err(not_found(segment)),
        };
    }
    Ok(current)
}

/// Insert `value` at a dotted path, creating intermediate maps.
/// Non-map intermediates are replaced.
pub fn insert_path(root: &mut Metadata, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };
    let mut map = root;
    for segment in segments {
        let entry = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !matches!(entry, Value::Map(_)) {
            *entry = Value::Map(BTreeMap::new());
        }
        let Value::Map(inner) = entry else {
            return;
        };
        map = inner;
    }
    map.insert(last.to_string(), value);
}
