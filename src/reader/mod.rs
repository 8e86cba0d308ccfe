//! Query sources for live examples
//!
//! The reader module hides the embedded engine behind the [`Reader`] trait. A
//! page creates one reader at load time and every live block on the page shares
//! it.
//!
//! # Example
//!
//! ```rust,ignore
//! use docsql::reader::{Reader, DuckDBReader};
//!
//! let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
//! let groups = reader.execute("CREATE TABLE t(x INT); SELECT 42 AS x").await?;
//! assert_eq!(groups.len(), 2);
//! ```

use async_trait::async_trait;

use crate::result::ResultGroup;
use crate::Result;

#[cfg(feature = "duckdb")]
pub mod duckdb;

pub mod connection;
pub mod splitter;

#[cfg(feature = "duckdb")]
pub use duckdb::DuckDBReader;

/// Trait for query engines backing live examples
///
/// Execution is asynchronous and single-threaded: futures are not `Send`, and
/// callers await one query per activation.
#[async_trait(?Send)]
pub trait Reader {
    /// Execute the text of an example and return one result group per statement
    ///
    /// Statements that return no rows (DDL, DML) yield a group without columns.
    ///
    /// # Errors
    ///
    /// Returns `docsqlError::QueryError` if any statement fails. Statements
    /// before the failing one have already been applied.
    async fn execute(&self, sql: &str) -> Result<Vec<ResultGroup>>;
}
