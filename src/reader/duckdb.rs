//! DuckDB query source
//!
//! Runs example text against an embedded DuckDB database and converts each
//! statement's result into a [`ResultGroup`] of display-ready values.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as DuckValue, ValueRef};
use duckdb::{params, Connection};

use crate::reader::connection::ConnectionInfo;
use crate::reader::splitter::{leading_keyword, split_statements};
use crate::reader::Reader;
use crate::result::{Column, ResultGroup, Row, Value};
use crate::{docsqlError, Result};

/// DuckDB database reader
///
/// One reader is opened per page load and shared by every live block.
///
/// # Examples
///
/// ```rust,ignore
/// use docsql::reader::{Reader, DuckDBReader};
///
/// // In-memory database
/// let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
/// let groups = reader.execute("SELECT 1 AS x, 2 AS y").await?;
///
/// // File-based database with tables prepared for the docs
/// let reader = DuckDBReader::from_connection_string("duckdb://docs.db")?;
/// let groups = reader.execute("SELECT * FROM sales").await?;
/// ```
pub struct DuckDBReader {
    conn: Connection,
}

impl DuckDBReader {
    /// Create a new DuckDB reader from a connection string
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The connection string format is invalid
    /// - The database file cannot be opened
    /// - DuckDB initialization fails
    pub fn from_connection_string(uri: &str) -> Result<Self> {
        let conn_info = super::connection::parse_connection_string(uri)?;

        let conn = match conn_info {
            ConnectionInfo::DuckDBMemory => Connection::open_in_memory().map_err(|e| {
                docsqlError::ReaderError(format!("Failed to open in-memory DuckDB: {}", e))
            })?,
            ConnectionInfo::DuckDBFile(path) => Connection::open(&path).map_err(|e| {
                docsqlError::ReaderError(format!("Failed to open DuckDB file '{}': {}", path, e))
            })?,
        };

        tracing::info!("Opened DuckDB reader for {}", uri);

        Ok(Self { conn })
    }

    /// Get a reference to the underlying DuckDB connection
    ///
    /// Useful for executing setup statements before the page is loaded.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn execute_statement(&self, sql: &str) -> Result<ResultGroup> {
        // Statements that change state return a row count in DuckDB; render
        // them as returning nothing
        let is_ddl = matches!(
            leading_keyword(sql).as_deref(),
            Some("CREATE" | "DROP" | "INSERT" | "UPDATE" | "DELETE" | "ALTER")
        );

        if is_ddl {
            self.conn
                .execute(sql, params![])
                .map_err(|e| docsqlError::QueryError(format!("{}", e)))?;
            return Ok(ResultGroup::empty());
        }

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| docsqlError::QueryError(format!("{}", e)))?;

        let mut rows = stmt
            .query(params![])
            .map_err(|e| docsqlError::QueryError(format!("{}", e)))?;

        let names = rows
            .as_ref()
            .map(|stmt| stmt.column_names())
            .unwrap_or_default();
        let columns: Vec<Column> = unique_names(names).into_iter().map(Column::new).collect();

        let mut result_rows = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| docsqlError::QueryError(format!("Failed to read row: {}", e)))?
        {
            let values = (0..columns.len())
                .map(|idx| cell_value(row, idx))
                .collect::<Result<Vec<_>>>()?;
            result_rows.push(Row::new(values));
        }

        ResultGroup::new(columns, result_rows)
    }
}

#[async_trait(?Send)]
impl Reader for DuckDBReader {
    async fn execute(&self, sql: &str) -> Result<Vec<ResultGroup>> {
        let statements = split_statements(sql);
        tracing::debug!("Executing {} statements", statements.len());

        let mut groups = Vec::with_capacity(statements.len());
        for statement in &statements {
            let group = self.execute_statement(statement)?;
            tracing::debug!(
                "Statement returned {} columns, {} rows",
                group.columns().len(),
                group.rows().len()
            );
            groups.push(group);
        }

        Ok(groups)
    }
}

/// Suffix repeated column names (`SELECT *` over a join) with `_1`, `_2`, ...
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn format_date(days: i32) -> String {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days.to_string())
}

fn format_timestamp(unit: TimeUnit, value: i64) -> String {
    DateTime::from_timestamp_micros(micros(unit, value))
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
        .unwrap_or_else(|| value.to_string())
}

fn format_time(unit: TimeUnit, value: i64) -> String {
    let us = micros(unit, value);
    let secs = us.div_euclid(1_000_000);
    let nanos = us.rem_euclid(1_000_000) * 1_000;
    u32::try_from(secs)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos as u32))
        .map(|t| t.format("%H:%M:%S%.f").to_string())
        .unwrap_or_else(|| value.to_string())
}

fn format_blob(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                (b as char).to_string()
            } else {
                format!("\\x{:02X}", b)
            }
        })
        .collect()
}

fn format_interval(months: i32, days: i32, nanos: i64) -> String {
    fn unit(n: i64, name: &str) -> String {
        if n.abs() == 1 {
            format!("{} {}", n, name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(unit(years as i64, "year"));
    }
    if months != 0 {
        parts.push(unit(months as i64, "month"));
    }
    if days != 0 {
        parts.push(unit(days as i64, "day"));
    }
    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let micros = (nanos / 1_000).unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if micros % 1_000_000 != 0 {
            time.push_str(&format!(".{:06}", micros % 1_000_000));
        }
        parts.push(time);
    }
    parts.join(" ")
}

/// Text form of a nested DuckDB value (lists, structs, intervals, ...)
fn format_value(value: &DuckValue) -> String {
    match value {
        DuckValue::Null => "NULL".to_string(),
        DuckValue::Boolean(b) => b.to_string(),
        DuckValue::TinyInt(i) => i.to_string(),
        DuckValue::SmallInt(i) => i.to_string(),
        DuckValue::Int(i) => i.to_string(),
        DuckValue::BigInt(i) => i.to_string(),
        DuckValue::HugeInt(i) => i.to_string(),
        DuckValue::UTinyInt(u) => u.to_string(),
        DuckValue::USmallInt(u) => u.to_string(),
        DuckValue::UInt(u) => u.to_string(),
        DuckValue::UBigInt(u) => u.to_string(),
        DuckValue::Float(f) => f.to_string(),
        DuckValue::Double(f) => f.to_string(),
        DuckValue::Decimal(d) => d.to_string(),
        DuckValue::Text(s) => s.clone(),
        DuckValue::Enum(s) => s.clone(),
        DuckValue::Blob(bytes) => format_blob(bytes),
        DuckValue::Date32(days) => format_date(*days),
        DuckValue::Timestamp(unit, t) => format_timestamp(*unit, *t),
        DuckValue::Time64(unit, t) => format_time(*unit, *t),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => format_interval(*months, *days, *nanos),
        DuckValue::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        DuckValue::Struct(fields) => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(name, v)| format!("'{}': {}", name, format_value(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        other => format!("{:?}", other),
    }
}

/// Convert one DuckDB cell into a display value
fn cell_value(row: &duckdb::Row, idx: usize) -> Result<Value> {
    let value_ref = row
        .get_ref(idx)
        .map_err(|e| docsqlError::QueryError(format!("Failed to read column {}: {}", idx, e)))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i as i64),
        ValueRef::SmallInt(i) => Value::Int(i as i64),
        ValueRef::Int(i) => Value::Int(i as i64),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::HugeInt(i) => match i64::try_from(i) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Text(i.to_string()),
        },
        ValueRef::UTinyInt(u) => Value::Int(u as i64),
        ValueRef::USmallInt(u) => Value::Int(u as i64),
        ValueRef::UInt(u) => Value::Int(u as i64),
        ValueRef::UBigInt(u) => Value::UInt(u),
        // Widening f32 would print artifacts like 1.100000023841858
        ValueRef::Float(f) => Value::Text(f.to_string()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => Value::Text(d.to_string()),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Date32(days) => Value::Text(format_date(days)),
        ValueRef::Timestamp(unit, t) => Value::Text(format_timestamp(unit, t)),
        ValueRef::Time64(unit, t) => Value::Text(format_time(unit, t)),
        ValueRef::Blob(bytes) => Value::Text(format_blob(bytes)),
        _ => match row.get::<_, String>(idx) {
            Ok(text) => Value::Text(text),
            Err(_) => {
                let nested = row.get::<_, DuckValue>(idx).map_err(|e| {
                    docsqlError::QueryError(format!("Failed to read column {}: {}", idx, e))
                })?;
                Value::Text(format_value(&nested))
            }
        },
    };

    Ok(value)
}
