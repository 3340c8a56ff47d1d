//! Resize handles for direct manipulation of a node box.
//!
//! Handles live in screen space (document units × zoom). Hit testing is plain axis-aligned
//! containment; drags are converted back to document units before being applied.

use arbora_core::geom::{Point, Rect, Vector, point, rect};
use arbora_core::{DiagramDocument, MIN_NODE_SIZE, Result};
use serde::{Deserialize, Serialize};

/// Edge length of a handle square, in screen pixels.
pub const DEFAULT_HANDLE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NorthWest,
        ResizeHandle::North,
        ResizeHandle::NorthEast,
        ResizeHandle::East,
        ResizeHandle::SouthEast,
        ResizeHandle::South,
        ResizeHandle::SouthWest,
        ResizeHandle::West,
    ];

    /// Anchor position as fractions of the box: (0,0) top-left, (1,1) bottom-right.
    fn anchor(self) -> (f64, f64) {
        match self {
            ResizeHandle::North => (0.5, 0.0),
            ResizeHandle::South => (0.5, 1.0),
            ResizeHandle::East => (1.0, 0.5),
            ResizeHandle::West => (0.0, 0.5),
            ResizeHandle::NorthEast => (1.0, 0.0),
            ResizeHandle::NorthWest => (0.0, 0.0),
            ResizeHandle::SouthEast => (1.0, 1.0),
            ResizeHandle::SouthWest => (0.0, 1.0),
        }
    }

    fn moves_left(self) -> bool {
        matches!(
            self,
            ResizeHandle::West | ResizeHandle::NorthWest | ResizeHandle::SouthWest
        )
    }

    fn moves_right(self) -> bool {
        matches!(
            self,
            ResizeHandle::East | ResizeHandle::NorthEast | ResizeHandle::SouthEast
        )
    }

    fn moves_top(self) -> bool {
        matches!(
            self,
            ResizeHandle::North | ResizeHandle::NorthEast | ResizeHandle::NorthWest
        )
    }

    fn moves_bottom(self) -> bool {
        matches!(
            self,
            ResizeHandle::South | ResizeHandle::SouthEast | ResizeHandle::SouthWest
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleBox {
    pub handle: ResizeHandle,
    pub rect: Rect,
}

fn zoom_or_one(zoom: f64) -> f64 {
    if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 }
}

/// Screen-space handle squares for a node box given in document units.
pub fn handle_boxes(node: Rect, zoom: f64, size: f64) -> [HandleBox; 8] {
    let zoom = zoom_or_one(zoom);
    let half = size.max(1.0) / 2.0;
    ResizeHandle::ALL.map(|handle| {
        let (fx, fy) = handle.anchor();
        let cx = (node.origin.x + node.size.width * fx) * zoom;
        let cy = (node.origin.y + node.size.height * fy) * zoom;
        HandleBox {
            handle,
            rect: rect(cx - half, cy - half, half * 2.0, half * 2.0),
        }
    })
}

/// First handle whose square contains `at` (edges inclusive).
pub fn hit_test(boxes: &[HandleBox], at: Point) -> Option<ResizeHandle> {
    boxes
        .iter()
        .find(|b| {
            at.x >= b.rect.min_x()
                && at.x <= b.rect.max_x()
                && at.y >= b.rect.min_y()
                && at.y <= b.rect.max_y()
        })
        .map(|b| b.handle)
}

/// Applies a screen-space drag to `node`. Edges opposite the handle stay fixed and the box
/// never shrinks below `min_size` on either axis.
pub fn apply_drag(node: Rect, handle: ResizeHandle, delta: Vector, zoom: f64, min_size: f64) -> Rect {
    let zoom = zoom_or_one(zoom);
    let dx = if delta.x.is_finite() { delta.x / zoom } else { 0.0 };
    let dy = if delta.y.is_finite() { delta.y / zoom } else { 0.0 };

    let (mut left, mut top) = (node.min_x(), node.min_y());
    let (mut right, mut bottom) = (node.max_x(), node.max_y());
    if handle.moves_left() {
        left = (left + dx).min(right - min_size);
    }
    if handle.moves_right() {
        right = (right + dx).max(left + min_size);
    }
    if handle.moves_top() {
        top = (top + dy).min(bottom - min_size);
    }
    if handle.moves_bottom() {
        bottom = (bottom + dy).max(top + min_size);
    }
    rect(left, top, right - left, bottom - top)
}

/// Drags a handle of the document's primary root and grows the canvas as needed.
///
/// Returns the id of the resized node, or `None` when the document has no nodes.
pub fn resize_primary_root(
    doc: &mut DiagramDocument,
    handle: ResizeHandle,
    delta: Vector,
    zoom: f64,
    padding: f64,
) -> Result<Option<String>> {
    let Some(root) = doc.primary_root() else {
        return Ok(None);
    };
    let id = root.id.clone();
    let target = apply_drag(root.rect(), handle, delta, zoom, MIN_NODE_SIZE);
    doc.set_node_rect(&id, target, padding)?;
    tracing::debug!(node = id.as_str(), ?handle, "resized primary root");
    Ok(Some(id))
}

/// Convenience for pointer handling: the handle under a screen point on the primary root.
pub fn primary_root_handle_at(doc: &DiagramDocument, zoom: f64, at: Point) -> Option<ResizeHandle> {
    let root = doc.primary_root()?;
    hit_test(&handle_boxes(root.rect(), zoom, DEFAULT_HANDLE_SIZE), at)
}
