//! Result rendering
//!
//! Turns a query result set into the aligned, monospace text table shown under
//! a runnable example:
//!
//! ```text
//!  id | name
//! ----------
//!   1 |    a 
//! (1 row)
//! ```
//!
//! Rendering is pure: the same result set always produces the same lines, and
//! nothing here knows where the lines end up.

use crate::result::ResultGroup;

/// Text table derived from one tabular result group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub widths: Vec<usize>,
    pub header: String,
    pub separator: String,
    pub rows: Vec<String>,
    pub row_count: String,
}

impl RenderedTable {
    /// Header, separator, one line per row, then the row count
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.header.as_str())
            .chain(std::iter::once(self.separator.as_str()))
            .chain(self.rows.iter().map(String::as_str))
            .chain(std::iter::once(self.row_count.as_str()))
    }
}

fn text_len(s: &str) -> usize {
    s.chars().count()
}

/// Width of every column: the longest of its name and its values, plus two
pub fn column_widths(group: &ResultGroup) -> Vec<usize> {
    let mut widths: Vec<usize> = group
        .columns()
        .iter()
        .map(|c| text_len(&c.name) + 2)
        .collect();

    for row in group.rows() {
        for (width, value) in widths.iter_mut().zip(row.values()) {
            *width = (*width).max(text_len(&value.to_string()) + 2);
        }
    }

    widths
}

/// Name centered in its column. Odd padding loses the extra space, so the
/// name sits one column left of true center.
fn header_cell(name: &str, width: usize) -> String {
    let pad = " ".repeat((width - text_len(name)) / 2);
    format!("{pad}{name}{pad}")
}

/// Value right-aligned with a single trailing space
fn value_cell(value: &str, width: usize) -> String {
    let pad = " ".repeat(width - text_len(value) - 1);
    format!("{pad}{value} ")
}

/// `(1 row)` or `(N rows)`
pub fn row_count_line(count: usize) -> String {
    let plural = if count > 1 { "s" } else { "" };
    format!("({} row{})", count, plural)
}

/// Render a single result group, or `None` when it has no columns or no rows
pub fn render_group(group: &ResultGroup) -> Option<RenderedTable> {
    if !group.is_tabular() {
        return None;
    }

    let widths = column_widths(group);

    let header = group
        .columns()
        .iter()
        .zip(&widths)
        .map(|(column, &width)| header_cell(&column.name, width))
        .collect::<Vec<_>>()
        .join("|");

    let separator: String = widths.iter().map(|&width| "-".repeat(width)).collect();

    let rows = group
        .rows()
        .iter()
        .map(|row| {
            row.values()
                .iter()
                .zip(&widths)
                .map(|(value, &width)| value_cell(&value.to_string(), width))
                .collect::<Vec<_>>()
                .join("|")
        })
        .collect();

    Some(RenderedTable {
        widths,
        header,
        separator,
        rows,
        row_count: row_count_line(group.rows().len()),
    })
}

/// Render every tabular group in order, each preceded by a blank line
pub fn render_result_set(groups: &[ResultGroup]) -> Vec<String> {
    let mut lines = Vec::new();

    for table in groups.iter().filter_map(render_group) {
        lines.push(String::new());
        lines.extend(table.lines().map(str::to_string));
    }

    tracing::debug!(
        "Rendered {} groups into {} lines",
        groups.len(),
        lines.len()
    );

    lines
}
