//! Connection string parsing for the embedded engine
//!
//! Parses URI-style connection strings to decide how the page's engine is opened.

use crate::{docsqlError, Result};

/// Parsed connection information
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionInfo {
    /// DuckDB in-memory database, fresh for every page load
    DuckDBMemory,
    /// DuckDB file-based database, for pages that query prepared data
    DuckDBFile(String),
}

/// Parse a connection string into connection information
///
/// # Supported Formats
///
/// - `duckdb://memory` - DuckDB in-memory database
/// - `duckdb:///absolute/path/file.db` - DuckDB file (absolute path)
/// - `duckdb://relative/file.db` - DuckDB file (relative path)
///
/// # Examples
///
/// ```
/// use docsql::reader::connection::{parse_connection_string, ConnectionInfo};
///
/// let info = parse_connection_string("duckdb://memory").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBMemory);
///
/// let info = parse_connection_string("duckdb://docs.db").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBFile("docs.db".to_string()));
/// ```
pub fn parse_connection_string(uri: &str) -> Result<ConnectionInfo> {
    if uri == "duckdb://memory" {
        return Ok(ConnectionInfo::DuckDBMemory);
    }

    if let Some(path) = uri.strip_prefix("duckdb://") {
        if path.is_empty() {
            return Err(docsqlError::ReaderError(
                "DuckDB file path cannot be empty".to_string(),
            ));
        }
        // duckdb:///abs/path keeps its leading slash
        return Ok(ConnectionInfo::DuckDBFile(path.to_string()));
    }

    Err(docsqlError::ReaderError(format!(
        "Unsupported connection string format: {}. Supported: duckdb://memory, duckdb://<path>",
        uri
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duckdb_memory() {
        let info = parse_connection_string("duckdb://memory").unwrap();
        assert_eq!(info, ConnectionInfo::DuckDBMemory);
    }

    #[test]
    fn test_duckdb_file_relative() {
        let info = parse_connection_string("duckdb://docs.db").unwrap();
        assert_eq!(info, ConnectionInfo::DuckDBFile("docs.db".to_string()));
    }

    #[test]
    fn test_duckdb_file_absolute() {
        let info = parse_connection_string("duckdb:///srv/site/docs.db").unwrap();
        assert_eq!(
            info,
            ConnectionInfo::DuckDBFile("/srv/site/docs.db".to_string())
        );
    }

    #[test]
    fn test_empty_duckdb_path() {
        assert!(parse_connection_string("duckdb://").is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = parse_connection_string("postgres://localhost/db");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unsupported connection string"));
    }
}
