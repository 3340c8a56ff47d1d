//! Node sizing shared by every layout, plus the per-kind placement algorithms.

pub mod graph;
pub mod tree;

use crate::LayoutOptions;
use crate::text::{DeterministicTextMeasurer, TextStyle, one_char_per_line};
use arbora_core::{DiagramDocument, DiagramEdge, DiagramNode, ParserKind};

/// Horizontal padding between a node border and its label.
pub const NODE_PADDING_X: f64 = 16.0;
/// Vertical padding between a node border and its label.
pub const NODE_PADDING_Y: f64 = 10.0;
/// Gap between the label and the first entity field row.
pub const FIELD_DIVIDER_GAP: f64 = 8.0;

pub(crate) struct SizedLabel {
    pub label: String,
    pub width: f64,
    pub height: f64,
}

pub(crate) fn text_style(options: &LayoutOptions) -> TextStyle {
    TextStyle {
        font_family: None,
        font_size: options.font_size,
    }
}

/// Line height used for field rows; matches the deterministic measurer.
pub(crate) fn line_height(options: &LayoutOptions) -> f64 {
    DeterministicTextMeasurer::default().line_height(&text_style(options))
}

/// Measures a label (and optional field rows) into a node box.
pub(crate) fn size_node(label: &str, fields: &[String], options: &LayoutOptions) -> SizedLabel {
    let style = text_style(options);
    let label = if options.settings.single_char_per_line {
        one_char_per_line(label)
    } else {
        label.to_string()
    };
    let metrics = options.text_measurer.measure(&label, &style);

    let mut width = metrics.width + 2.0 * NODE_PADDING_X;
    let mut height = metrics.height + 2.0 * NODE_PADDING_Y;
    if !fields.is_empty() {
        let rows = fields.join("\n");
        let field_metrics = options.text_measurer.measure(&rows, &style);
        width = width.max(field_metrics.width + 2.0 * NODE_PADDING_X);
        height += FIELD_DIVIDER_GAP + fields.len() as f64 * line_height(options);
    }

    SizedLabel {
        label,
        width: width.max(options.node_width),
        height,
    }
}

/// Builds the document shell and grows the canvas around the placed nodes.
pub(crate) fn finish_document(
    title: Option<&str>,
    kind: ParserKind,
    nodes: Vec<DiagramNode>,
    edges: Vec<DiagramEdge>,
    options: &LayoutOptions,
) -> DiagramDocument {
    let padding = options.padding();
    let mut doc = DiagramDocument::empty(title.unwrap_or("diagram"), kind, padding);
    doc.nodes = nodes;
    doc.edges = edges;
    doc.grow_canvas(padding);
    if let Some(at) = options.generated_at {
        doc.generated_at = at;
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_width_never_below_configured_width() {
        let opts = LayoutOptions::default();
        let s = size_node("a", &[], &opts);
        assert_eq!(s.width, opts.node_width);
        assert!(s.height > 0.0);
    }

    #[test]
    fn long_labels_widen_the_node() {
        let opts = LayoutOptions::default();
        let s = size_node("一个非常非常非常长的中文节点名称", &[], &opts);
        assert!(s.width > opts.node_width);
    }

    #[test]
    fn single_char_mode_stacks_characters() {
        let mut opts = LayoutOptions::default();
        let flat = size_node("订单支付", &[], &opts);
        opts.settings.single_char_per_line = true;
        let tall = size_node("订单支付", &[], &opts);
        assert_eq!(tall.label, "订\n单\n支\n付");
        assert!(tall.height > flat.height * 2.0);
        assert!(tall.width <= flat.width);
    }

    #[test]
    fn fields_add_rows() {
        let opts = LayoutOptions::default();
        let bare = size_node("User", &[], &opts);
        let fields = vec!["id".to_string(), "email".to_string()];
        let entity = size_node("User", &fields, &opts);
        let expected = bare.height + FIELD_DIVIDER_GAP + 2.0 * line_height(&opts);
        assert!((entity.height - expected).abs() < 1e-9);
    }
}
