//! Indentation-based hierarchy grammar (feature structures, mind maps).
//!
//! Indentation is measured in columns relative to the first non-blank line. Parents are
//! resolved with a stack of open items ordered by column: a line closes every open item
//! indented at least as far, then nests under whatever is left. Any positive step opens one
//! level whatever its width, so skip-level jumps attach to the nearest enclosing ancestor
//! and lines that dedent past the first line become additional top-level items.

use serde::{Deserialize, Serialize};

use super::utils::{split_indent, strip_inline_comment, unquote};

pub const DEFAULT_TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndentOptions {
    /// Columns a tab character counts for.
    pub tab_width: usize,
}

impl Default for IndentOptions {
    fn default() -> Self {
        Self {
            tab_width: DEFAULT_TAB_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramItem {
    pub id: String,
    pub label: String,
    /// Depth in the resolved hierarchy (parent level + 1).
    pub level: usize,
    /// Indentation in columns, relative to the first line.
    pub indent: usize,
    pub parent_id: Option<String>,
}

pub fn item_id(index: usize) -> String {
    format!("item-{index}")
}

pub fn parse_indented(text: &str, options: &IndentOptions) -> Vec<DiagramItem> {
    let mut items: Vec<DiagramItem> = Vec::new();
    let mut base_indent: Option<usize> = None;
    // (relative columns, index into `items`)
    let mut open: Vec<(usize, usize)> = Vec::new();

    for line in text.lines() {
        let line = strip_inline_comment(line);
        let (columns, rest) = split_indent(line, options.tab_width);
        let label = unquote(rest.trim_end());
        if label.is_empty() {
            continue;
        }

        let base = *base_indent.get_or_insert(columns);
        let relative = columns.saturating_sub(base);

        while open.last().is_some_and(|(indent, _)| *indent >= relative) {
            open.pop();
        }
        let parent = open.last().map(|(_, idx)| *idx);

        let (level, parent_id) = match parent {
            Some(p) => (items[p].level + 1, Some(items[p].id.clone())),
            None => (0, None),
        };
        let index = items.len();
        items.push(DiagramItem {
            id: item_id(index),
            label: label.to_string(),
            level,
            indent: relative,
            parent_id,
        });
        open.push((relative, index));
    }

    tracing::debug!(items = items.len(), "parsed indented text");
    items
}
