//! Query result data model
//!
//! A query produces one [`ResultGroup`] per statement. Each group carries an
//! ordered column list and an ordered row list; every row holds exactly one
//! value per column, in column order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{docsqlError, Result};

/// Column descriptor within a result group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A single cell value returned by the engine
///
/// Untagged so that fixtures and page manifests can use plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // NULL renders as an empty cell, like psql
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Number text as a JavaScript engine prints it
///
/// Exponent notation below 1e-6 and from 1e21 on, `Infinity` and `NaN` spelled
/// out, and no negative zero.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }

    let abs = x.abs();
    if (1e-6..1e21).contains(&abs) {
        return x.to_string();
    }

    let exp = format!("{:e}", x);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row of a result group, values in column order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Into<Value>> FromIterator<V> for Row {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Row(iter.into_iter().map(Into::into).collect())
    }
}

/// The result of a single statement
///
/// Construct with [`ResultGroup::new`], which rejects rows whose arity does not
/// match the column list, or [`ResultGroup::empty`] for statements that
/// return nothing. Column names are unique within a group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawResultGroup")]
pub struct ResultGroup {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct RawResultGroup {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<RawResultGroup> for ResultGroup {
    type Error = docsqlError;

    fn try_from(raw: RawResultGroup) -> Result<Self> {
        ResultGroup::new(raw.columns, raw.rows)
    }
}

impl ResultGroup {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(docsqlError::ResultError(format!(
                    "Row {} has {} values but the result has {} columns",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
        }

        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(docsqlError::ResultError(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    /// A group with no columns and no rows (DDL, DML)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Look up a cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col_idx = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row).and_then(|r| r.0.get(col_idx))
    }

    /// Groups without columns or without rows are not rendered
    pub fn is_tabular(&self) -> bool {
        !self.columns.is_empty() && !self.rows.is_empty()
    }
}
