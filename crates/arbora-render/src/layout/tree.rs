//! Tidy tree placement for indentation grammars.
//!
//! Hierarchy documents grow top-down: depth maps to rows, siblings spread horizontally.
//! Mind maps use the same algorithm transposed: depth maps to columns, siblings stack
//! vertically. In both cases `node_gap_y` separates depths and `node_gap_x` separates
//! siblings, every node at a depth shares the same depth coordinate, and a parent is centred
//! over the span of its children.

use rustc_hash::FxHashMap;

use super::{finish_document, size_node};
use crate::LayoutOptions;
use arbora_core::{
    DiagramDocument, DiagramEdge, DiagramItem, DiagramNode, NodeKind, ParserKind, edge_id,
    node_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    TopDown,
    LeftRight,
}

impl Orientation {
    /// Splits a (width, height) pair into (breadth, depth) extents.
    fn split(self, width: f64, height: f64) -> (f64, f64) {
        match self {
            Orientation::TopDown => (width, height),
            Orientation::LeftRight => (height, width),
        }
    }

    fn join(self, breadth: f64, depth: f64) -> (f64, f64) {
        match self {
            Orientation::TopDown => (breadth, depth),
            Orientation::LeftRight => (depth, breadth),
        }
    }
}

struct TreeNode {
    label: String,
    width: f64,
    height: f64,
    depth: usize,
    children: Vec<usize>,
}

pub fn layout_tree(items: &[DiagramItem], kind: ParserKind, options: &LayoutOptions) -> DiagramDocument {
    let orientation = match kind {
        ParserKind::Mind => Orientation::LeftRight,
        _ => Orientation::TopDown,
    };

    let index_of: FxHashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();

    let mut nodes: Vec<TreeNode> = items
        .iter()
        .map(|item| {
            let sized = size_node(&item.label, &[], options);
            TreeNode {
                label: sized.label,
                width: sized.width,
                height: sized.height,
                depth: 0,
                children: Vec::new(),
            }
        })
        .collect();

    let mut roots: Vec<usize> = Vec::new();
    let mut edges: Vec<DiagramEdge> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        // Parents always precede children; anything else is treated as a root.
        let parent = item
            .parent_id
            .as_deref()
            .and_then(|p| index_of.get(p).copied())
            .filter(|p| *p < i);
        match parent {
            Some(p) => {
                nodes[i].depth = nodes[p].depth + 1;
                nodes[p].children.push(i);
                edges.push(DiagramEdge {
                    id: edge_id(edges.len()),
                    source: node_id(p),
                    target: node_id(i),
                    label: None,
                    edge_type: None,
                });
            }
            None => roots.push(i),
        }
    }

    let gap_breadth = options.node_gap_x;
    let gap_depth = options.node_gap_y;
    let padding = options.padding();

    // Breadth of every subtree, children before parents.
    let mut span = vec![0.0_f64; nodes.len()];
    for i in (0..nodes.len()).rev() {
        let (own, _) = orientation.split(nodes[i].width, nodes[i].height);
        let children = &nodes[i].children;
        let child_span: f64 = children.iter().map(|c| span[*c]).sum::<f64>()
            + gap_breadth * children.len().saturating_sub(1) as f64;
        span[i] = own.max(child_span);
    }

    // One band per depth, as thick as its thickest node.
    let max_depth = nodes.iter().map(|n| n.depth).max().unwrap_or(0);
    let mut band = vec![0.0_f64; max_depth + 1];
    for n in &nodes {
        let (_, thickness) = orientation.split(n.width, n.height);
        band[n.depth] = band[n.depth].max(thickness);
    }
    if !options.compact_rows {
        let tallest = band.iter().copied().fold(0.0_f64, f64::max);
        band.iter_mut().for_each(|b| *b = tallest);
    }
    let mut band_start = Vec::with_capacity(band.len());
    let mut cursor = padding;
    for b in &band {
        band_start.push(cursor);
        cursor += b + gap_depth;
    }

    let mut breadth_pos = vec![0.0_f64; nodes.len()];
    let mut stack: Vec<(usize, f64)> = Vec::new();
    let mut offset = padding;
    for &root in &roots {
        stack.push((root, offset));
        offset += span[root] + gap_breadth;
    }
    // Subtree placement: a node is centred in its slot, children share the slot centred.
    stack.reverse();
    while let Some((i, start)) = stack.pop() {
        let (own, _) = orientation.split(nodes[i].width, nodes[i].height);
        breadth_pos[i] = start + (span[i] - own) / 2.0;

        let children = &nodes[i].children;
        let child_span: f64 = children.iter().map(|c| span[*c]).sum::<f64>()
            + gap_breadth * children.len().saturating_sub(1) as f64;
        let mut child_start = start + (span[i] - child_span) / 2.0;
        let mut placed = Vec::with_capacity(children.len());
        for &c in children {
            placed.push((c, child_start));
            child_start += span[c] + gap_breadth;
        }
        stack.extend(placed.into_iter().rev());
    }

    let out_nodes: Vec<DiagramNode> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let (x, y) = orientation.join(breadth_pos[i], band_start[n.depth]);
            let kind = if n.depth == 0 {
                NodeKind::Topic
            } else if n.children.is_empty() {
                NodeKind::Leaf
            } else {
                NodeKind::Module
            };
            DiagramNode {
                id: node_id(i),
                label: n.label.clone(),
                kind,
                x,
                y,
                width: n.width,
                height: n.height,
                fields: None,
                level: Some(n.depth),
            }
        })
        .collect();

    let title = items.first().map(|i| i.label.as_str());
    finish_document(title, kind, out_nodes, edges, options)
}
