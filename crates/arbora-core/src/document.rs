//! The positioned node/edge graph shared by layout, preview, remote generation, persistence
//! and export.
//!
//! Invariants, checked by [`DiagramDocument::validate`]:
//! - node ids are unique and every edge endpoint names an existing node
//! - positions are finite and non-negative, sizes are finite and strictly positive
//! - the canvas contains every node
//!
//! Geometry mutations go through [`DiagramDocument::set_node_rect`], which grows the canvas
//! when needed and never shrinks it.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::geom::{Rect, rect};
use crate::parser::ParserKind;
use crate::{Error, Result};

pub const DEFAULT_CANVAS_PADDING: f64 = 48.0;
pub const MIN_CANVAS_PADDING: f64 = 12.0;
pub const MIN_NODE_SIZE: f64 = 8.0;

/// Padding used around content, clamped to [`MIN_CANVAS_PADDING`].
pub fn canvas_padding(requested: f64) -> f64 {
    if requested.is_finite() {
        requested.max(MIN_CANVAS_PADDING)
    } else {
        DEFAULT_CANVAS_PADDING
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Module,
    Service,
    Topic,
    Leaf,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Entity => "entity",
            NodeKind::Module => "module",
            NodeKind::Service => "service",
            NodeKind::Topic => "topic",
            NodeKind::Leaf => "leaf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    #[default]
    Solid,
    Dashed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
}

impl DiagramNode {
    pub fn rect(&self) -> Rect {
        rect(self.x, self.y, self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn check_geometry(&self) -> Result<()> {
        let fail = |message: String| {
            Err(Error::DegenerateGeometry {
                node_id: self.id.clone(),
                message,
            })
        };
        if !(self.x.is_finite() && self.y.is_finite()) {
            return fail(format!("non-finite position ({}, {})", self.x, self.y));
        }
        if self.x < 0.0 || self.y < 0.0 {
            return fail(format!("negative position ({}, {})", self.x, self.y));
        }
        if !(self.width.is_finite() && self.height.is_finite()) {
            return fail(format!("non-finite size {}x{}", self.width, self.height));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return fail(format!("empty size {}x{}", self.width, self.height));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<EdgeType>,
}

impl DiagramEdge {
    pub fn is_dashed(&self) -> bool {
        self.edge_type == Some(EdgeType::Dashed)
    }
}

/// Node ids are derived from parse order.
pub fn node_id(index: usize) -> String {
    format!("node-{index}")
}

pub fn edge_id(index: usize) -> String {
    format!("edge-{index}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramDocument {
    pub title: String,
    pub parser_kind: ParserKind,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub width: f64,
    pub height: f64,
    pub generated_at: DateTime<Utc>,
}

impl DiagramDocument {
    pub fn empty(title: impl Into<String>, parser_kind: ParserKind, padding: f64) -> Self {
        let side = canvas_padding(padding) * 2.0;
        Self {
            title: title.into(),
            parser_kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            width: side,
            height: side,
            generated_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(Error::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
            node.check_geometry()?;
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(Error::MissingEndpoint {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
        }

        if !(self.width.is_finite() && self.height.is_finite()) {
            return Err(Error::InvalidCanvas {
                message: format!("non-finite canvas {}x{}", self.width, self.height),
            });
        }
        if let Some(bounds) = self.content_bounds() {
            if bounds.max_x() > self.width || bounds.max_y() > self.height {
                return Err(Error::InvalidCanvas {
                    message: format!(
                        "canvas {}x{} does not contain content extending to ({}, {})",
                        self.width,
                        self.height,
                        bounds.max_x(),
                        bounds.max_y()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Clamps broken geometry into a renderable state and grows the canvas to fit.
    ///
    /// Returns the number of nodes that were corrected. Edges with a missing endpoint are
    /// dropped. Intended for documents that did not come out of local layout.
    pub fn sanitize(&mut self, padding: f64) -> usize {
        let mut corrected = 0usize;
        for node in &mut self.nodes {
            let before = (node.x, node.y, node.width, node.height);
            let clamp_pos = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
            let clamp_size = |v: f64| {
                if v.is_finite() {
                    v.max(MIN_NODE_SIZE)
                } else {
                    MIN_NODE_SIZE
                }
            };
            node.x = clamp_pos(node.x);
            node.y = clamp_pos(node.y);
            node.width = clamp_size(node.width);
            node.height = clamp_size(node.height);
            if before != (node.x, node.y, node.width, node.height) {
                tracing::warn!(node = node.id.as_str(), "clamped degenerate node geometry");
                corrected += 1;
            }
        }

        let ids: FxHashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let edges_before = self.edges.len();
        self.edges
            .retain(|e| ids.contains(&e.source) && ids.contains(&e.target));
        if self.edges.len() != edges_before {
            tracing::warn!(
                dropped = edges_before - self.edges.len(),
                "dropped edges with missing endpoints"
            );
        }

        if !self.width.is_finite() {
            self.width = 0.0;
        }
        if !self.height.is_finite() {
            self.height = 0.0;
        }
        self.grow_canvas(padding);
        corrected
    }

    /// Union of all node rectangles.
    pub fn content_bounds(&self) -> Option<Rect> {
        let mut it = self.nodes.iter().map(DiagramNode::rect);
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union(&r)))
    }

    /// Grows width/height so every node fits with `padding` to spare. Never shrinks.
    pub fn grow_canvas(&mut self, padding: f64) {
        let pad = canvas_padding(padding);
        let (right, bottom) = self
            .nodes
            .iter()
            .fold((0.0_f64, 0.0_f64), |(r, b), n| (r.max(n.right()), b.max(n.bottom())));
        self.width = self.width.max(right + pad);
        self.height = self.height.max(bottom + pad);
    }

    /// Moves/resizes a node, clamping to a minimum size, then grows the canvas if needed.
    pub fn set_node_rect(&mut self, id: &str, target: Rect, padding: f64) -> Result<()> {
        let Some(idx) = self.node_index(id) else {
            return Err(Error::UnknownNode {
                node_id: id.to_string(),
            });
        };
        let finite = target.origin.x.is_finite()
            && target.origin.y.is_finite()
            && target.size.width.is_finite()
            && target.size.height.is_finite();
        if !finite {
            return Err(Error::DegenerateGeometry {
                node_id: id.to_string(),
                message: "non-finite target rectangle".to_string(),
            });
        }

        let node = &mut self.nodes[idx];
        node.x = target.origin.x.max(0.0);
        node.y = target.origin.y.max(0.0);
        node.width = target.size.width.max(MIN_NODE_SIZE);
        node.height = target.size.height.max(MIN_NODE_SIZE);
        self.grow_canvas(padding);
        Ok(())
    }

    /// The top-left-most root: smallest `y`, then smallest `x`, then document order.
    ///
    /// Roots are level-0 nodes when levels are present, otherwise nodes without incoming
    /// edges, otherwise every node.
    pub fn primary_root(&self) -> Option<&DiagramNode> {
        let mut roots: Vec<&DiagramNode> = self
            .nodes
            .iter()
            .filter(|n| n.level == Some(0))
            .collect();
        if roots.is_empty() {
            let targets: FxHashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
            roots = self
                .nodes
                .iter()
                .filter(|n| !targets.contains(n.id.as_str()))
                .collect();
        }
        if roots.is_empty() {
            roots = self.nodes.iter().collect();
        }
        roots
            .into_iter()
            .min_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)))
    }

    /// `true` when the edges form a single rooted tree spanning every node.
    pub fn is_tree(&self) -> bool {
        if self.nodes.is_empty() {
            return self.edges.is_empty();
        }
        if self.edges.len() + 1 != self.nodes.len() {
            return false;
        }
        let mut incoming: FxHashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0usize)).collect();
        let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for e in &self.edges {
            let Some(count) = incoming.get_mut(e.target.as_str()) else {
                return false;
            };
            *count += 1;
            children
                .entry(e.source.as_str())
                .or_default()
                .push(e.target.as_str());
        }
        let roots: Vec<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| incoming.get(id) == Some(&0))
            .collect();
        if roots.len() != 1 || incoming.values().any(|c| *c > 1) {
            return false;
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut stack = vec![roots[0]];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return false;
            }
            if let Some(next) = children.get(id) {
                stack.extend(next.iter().copied());
            }
        }
        seen.len() == self.nodes.len()
    }
}
