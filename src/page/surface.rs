//! Presentation surface
//!
//! The controller never touches page markup directly. It drives a [`Surface`],
//! which owns the visible state of every block: the placeholder, the trigger
//! button, the loading marker and the appended output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BlockId, Page};

/// Label of the trigger affordance
pub const TRIGGER_LABEL: &str = "Run";

/// Marker shown in the output region while a query is pending
pub const LOADING_MARKER: &str = "\n...";

/// Spacing placed before a revealed canned payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CannedSpacing {
    /// Two line breaks, then the payload
    #[default]
    TwoBlankLines,
    /// The payload is reattached as-is
    None,
}

impl CannedSpacing {
    pub fn prefix(self) -> &'static str {
        match self {
            CannedSpacing::TwoBlankLines => "\n\n",
            CannedSpacing::None => "",
        }
    }
}

/// Presentation adapter for example blocks
pub trait Surface {
    /// Take the placeholder output out of the block
    fn remove_placeholder(&mut self, id: BlockId);

    /// Install the trigger affordance
    fn insert_trigger(&mut self, id: BlockId);

    /// Remove the trigger affordance
    fn remove_trigger(&mut self, id: BlockId);

    /// Show the loading marker under the query text
    fn show_loading(&mut self, id: BlockId);

    /// Remove the loading marker
    fn clear_loading(&mut self, id: BlockId);

    /// Append rendered table lines after the query text
    fn append_lines(&mut self, id: BlockId, lines: &[String]);

    /// Append a pre-rendered fragment after the query text, unchanged
    fn append_fragment(&mut self, id: BlockId, spacing: CannedSpacing, fragment: &str);
}

/// Visible state of one block on a [`MemorySurface`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockView {
    pub query_text: String,
    pub placeholder: Option<String>,
    pub trigger: Option<String>,
    pub loading: bool,
    pub output: String,
}

impl BlockView {
    /// What a reader sees in the block's code area
    pub fn text(&self) -> String {
        let mut text = format!("{}{}", self.query_text, self.output);
        if self.loading {
            text.push_str(LOADING_MARKER);
        }
        text
    }
}

/// In-memory surface, used for pre-rendering pages and in tests
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    views: BTreeMap<BlockId, BlockView>,
}

impl MemorySurface {
    /// One view per page element, seeded with its query text and placeholder
    pub fn from_page(page: &Page) -> Self {
        let markers = &page.markers;
        let views = page
            .elements
            .iter()
            .enumerate()
            .map(|(position, element)| {
                let view = BlockView {
                    query_text: element
                        .child_text(&markers.query_class)
                        .unwrap_or_default()
                        .to_string(),
                    placeholder: element
                        .child_text(&markers.placeholder_class)
                        .map(str::to_string),
                    ..Default::default()
                };
                (BlockId(position), view)
            })
            .collect();

        Self { views }
    }

    pub fn view(&self, id: BlockId) -> Option<&BlockView> {
        self.views.get(&id)
    }

    pub fn text(&self, id: BlockId) -> Option<String> {
        self.view(id).map(BlockView::text)
    }

    pub fn views(&self) -> impl Iterator<Item = (BlockId, &BlockView)> {
        self.views.iter().map(|(id, view)| (*id, view))
    }

    fn view_mut(&mut self, id: BlockId) -> Option<&mut BlockView> {
        let view = self.views.get_mut(&id);
        if view.is_none() {
            tracing::warn!("No element at position {} on this surface", id);
        }
        view
    }
}

impl Surface for MemorySurface {
    fn remove_placeholder(&mut self, id: BlockId) {
        if let Some(view) = self.view_mut(id) {
            view.placeholder = None;
        }
    }

    fn insert_trigger(&mut self, id: BlockId) {
        if let Some(view) = self.view_mut(id) {
            view.trigger = Some(TRIGGER_LABEL.to_string());
        }
    }

    fn remove_trigger(&mut self, id: BlockId) {
        if let Some(view) = self.view_mut(id) {
            view.trigger = None;
        }
    }

    fn show_loading(&mut self, id: BlockId) {
        if let Some(view) = self.view_mut(id) {
            view.loading = true;
        }
    }

    fn clear_loading(&mut self, id: BlockId) {
        if let Some(view) = self.view_mut(id) {
            view.loading = false;
        }
    }

    fn append_lines(&mut self, id: BlockId, lines: &[String]) {
        if let Some(view) = self.view_mut(id) {
            view.output.push('\n');
            for line in lines {
                view.output.push_str(line);
                view.output.push('\n');
            }
        }
    }

    fn append_fragment(&mut self, id: BlockId, spacing: CannedSpacing, fragment: &str) {
        if let Some(view) = self.view_mut(id) {
            view.output.push_str(spacing.prefix());
            view.output.push_str(fragment);
        }
    }
}
