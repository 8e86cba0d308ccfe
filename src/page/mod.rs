//! Page model and block discovery
//!
//! A page is described by its URL and its block elements in document order.
//! Each element carries CSS-style class markers; the ones matching
//! [`PageMarkers`] are runnable examples.
//!
//! # Marker protocol
//!
//! - `div.fake-pg` blocks are always canned
//! - `div.pg` blocks are live, unless the page URL ends in `?fake-pg`, in
//!   which case every `pg` block is canned as well
//! - inside a block, `.query` holds the SQL text and `.result` the
//!   placeholder output (the canned payload)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::controller::ControllerConfig;
use crate::{docsqlError, Result};

pub mod surface;

pub use surface::{MemorySurface, Surface};

/// Class and query-string markers recognised on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMarkers {
    /// Block class for examples run against the live engine
    pub live_class: String,
    /// Block class for examples that always reveal their canned result
    pub canned_class: String,
    /// Child class holding the query text
    pub query_class: String,
    /// Child class holding the placeholder output
    pub placeholder_class: String,
    /// Query-string value that switches the whole page to canned mode
    pub canned_flag: String,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self {
            live_class: "pg".to_string(),
            canned_class: "fake-pg".to_string(),
            query_class: "query".to_string(),
            placeholder_class: "result".to_string(),
            canned_flag: "fake-pg".to_string(),
        }
    }
}

/// Whether live blocks run against the engine for this page load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Live,
    CannedOnly,
}

impl PageMode {
    /// Canned-only when the URL has exactly one `?` followed by the flag and
    /// nothing else
    pub fn from_url(url: &str, markers: &PageMarkers) -> Self {
        let parts: Vec<&str> = url.split('?').collect();
        if parts.len() == 2 && parts[1] == markers.canned_flag {
            PageMode::CannedOnly
        } else {
            PageMode::Live
        }
    }

    pub fn needs_engine(self) -> bool {
        self == PageMode::Live
    }
}

/// How an example produces its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMode {
    Live { query: String },
    Canned { payload: String },
}

/// A child element of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub class: String,
    #[serde(default)]
    pub text: String,
}

/// A top-level element on the page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockMarkup {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub children: Vec<Element>,
}

impl BlockMarkup {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Text of the first child with the given class
    pub fn child_text(&self, class: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|e| e.class == class)
            .map(|e| e.text.as_str())
    }
}

/// A documentation page as loaded in the browser
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub markers: PageMarkers,
    /// Controller settings for this page
    #[serde(default)]
    pub config: ControllerConfig,
    #[serde(default)]
    pub elements: Vec<BlockMarkup>,
}

impl Page {
    /// Parse a page manifest from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| docsqlError::PageError(format!("Invalid page manifest: {}", e)))
    }

    /// Read a page manifest from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            docsqlError::PageError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn mode(&self) -> PageMode {
        PageMode::from_url(&self.url, &self.markers)
    }
}

/// Identifies a block by its position among the page's elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A runnable example found on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBlock {
    pub id: BlockId,
    pub mode: BlockMode,
    /// Text of the `.query` child, shown above the output in both modes
    pub query_text: String,
}

/// Find every runnable example on the page, in document order
pub fn discover(page: &Page) -> Vec<DiscoveredBlock> {
    let markers = &page.markers;
    let mode = page.mode();
    let mut blocks = Vec::new();

    for (position, element) in page.elements.iter().enumerate() {
        let canned = if element.has_class(&markers.canned_class) {
            true
        } else if element.has_class(&markers.live_class) {
            mode == PageMode::CannedOnly
        } else {
            continue;
        };

        let query_text = element
            .child_text(&markers.query_class)
            .unwrap_or_default()
            .to_string();

        let block_mode = if canned {
            match element.child_text(&markers.placeholder_class) {
                Some(payload) => BlockMode::Canned {
                    payload: payload.to_string(),
                },
                None => {
                    tracing::warn!(
                        "Skipping canned block at position {}: no .{} placeholder",
                        position,
                        markers.placeholder_class
                    );
                    continue;
                }
            }
        } else {
            BlockMode::Live {
                query: query_text.clone(),
            }
        };

        blocks.push(DiscoveredBlock {
            id: BlockId(position),
            mode: block_mode,
            query_text,
        });
    }

    tracing::info!(
        "Discovered {} example blocks ({:?} mode)",
        blocks.len(),
        mode
    );

    blocks
}
