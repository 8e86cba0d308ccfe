/*!
# docsql - runnable SQL examples for documentation pages

docsql turns the SQL snippets of a documentation page into runnable examples.
Each example block shows its query with a "Run" trigger; activating it runs the
query once and places a psql-style text table under the query.

## Example

```text
SELECT id, name FROM users;

 id | name
----------
  1 |    a
(1 row)
```

## Architecture

- **Live** blocks run against an embedded engine shared by the whole page
  (DuckDB, in memory)
- **Canned** blocks reveal a result rendered ahead of time, for pages where the
  engine should not run
- Rendering is a pure function from result groups to lines; placing those lines
  on the page is the job of a [`page::Surface`]

## Core Components

- [`result`] - Query result data model
- [`render`] - Text table rendering
- [`page`] - Page model, marker protocol and block discovery
- [`controller`] - Block lifecycle: arm once, run once
- [`reader`] - Query engine abstraction
*/

pub mod controller;
pub mod page;
pub mod reader;
pub mod render;
pub mod result;

// Re-export key types for convenience
pub use controller::{Activation, BlockState, Controller, ControllerConfig};
pub use page::{discover, BlockId, MemorySurface, Page, PageMarkers, PageMode, Surface};
pub use render::{render_group, render_result_set};
pub use result::{Column, ResultGroup, Row, Value};

/// Main library error type
#[allow(non_camel_case_types)]
#[derive(thiserror::Error, Debug)]
pub enum docsqlError {
    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Data source error: {0}")]
    ReaderError(String),

    #[error("Invalid result: {0}")]
    ResultError(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Unknown block: #{0}")]
    UnknownBlock(usize),
}

pub type Result<T> = std::result::Result<T, docsqlError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
