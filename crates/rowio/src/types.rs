use std::collections::BTreeSet;
use std::fmt;

use crate::error::MappingError;

/// Identifier assigned by the store to an inserted row.
pub type RowId = i64;

// ============================================================================
// Value
// ============================================================================

/// A single column value as exchanged with the row store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lowercase name of the variant, used in mapping error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(if v { 1 } else { 0 })
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// FromValue: typed column access
// ============================================================================

/// Conversion from a stored [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError>;
}

fn mismatch(column: &str, expected: &'static str, found: &Value) -> MappingError {
    MappingError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: &Value) -> Result<Self, MappingError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Integer(i) => i32::try_from(*i).map_err(|_| mismatch(column, "i32", value)),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Integer(i) => Ok(*i != 0),
            other => Err(mismatch(column, "integer", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Real(r) => Ok(*r),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(column, "real", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(mismatch(column, "blob", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(column, other).map(Some),
        }
    }
}

// ============================================================================
// Row
// ============================================================================

/// Column-name-to-value mapping for one record, in column order.
///
/// Setting an existing column replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Row::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Typed read of `column`. A missing column is an error; use `Option<T>`
    /// to accept NULL.
    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T, MappingError> {
        let value = self
            .get(column)
            .ok_or_else(|| MappingError::MissingColumn(column.to_string()))?;
        T::from_value(column, value)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// Which branch a put took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutKind {
    Inserted { id: RowId },
    Updated { rows_affected: usize },
}

/// Outcome of a single put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    kind: PutKind,
    affected_tables: BTreeSet<String>,
}

impl PutResult {
    pub fn inserted(id: RowId, table: impl Into<String>) -> Self {
        Self {
            kind: PutKind::Inserted { id },
            affected_tables: BTreeSet::from([table.into()]),
        }
    }

    pub fn updated(rows_affected: usize, table: impl Into<String>) -> Self {
        Self {
            kind: PutKind::Updated { rows_affected },
            affected_tables: BTreeSet::from([table.into()]),
        }
    }

    pub fn kind(&self) -> PutKind {
        self.kind
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self.kind, PutKind::Inserted { .. })
    }

    pub fn was_updated(&self) -> bool {
        matches!(self.kind, PutKind::Updated { .. })
    }

    pub fn inserted_id(&self) -> Option<RowId> {
        match self.kind {
            PutKind::Inserted { id } => Some(id),
            PutKind::Updated { .. } => None,
        }
    }

    pub fn rows_updated(&self) -> Option<usize> {
        match self.kind {
            PutKind::Updated { rows_affected } => Some(rows_affected),
            PutKind::Inserted { .. } => None,
        }
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        &self.affected_tables
    }
}

/// Outcome of a delete. `rows_deleted` may be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    rows_deleted: usize,
    affected_tables: BTreeSet<String>,
}

impl DeleteResult {
    pub fn new(rows_deleted: usize, table: impl Into<String>) -> Self {
        Self {
            rows_deleted,
            affected_tables: BTreeSet::from([table.into()]),
        }
    }

    pub fn rows_deleted(&self) -> usize {
        self.rows_deleted
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        &self.affected_tables
    }
}

// ============================================================================
// Tests
// ============================================================================
