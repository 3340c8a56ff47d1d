//! SVG serialization of a [`DiagramDocument`].
//!
//! The markup is the single source for preview and every export format. Output depends only
//! on the document and the [`RenderConfig`]: no clock, ids or randomness, so rendering twice
//! yields identical bytes.

mod util;

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::Result;
use crate::layout::{FIELD_DIVIDER_GAP, NODE_PADDING_X, NODE_PADDING_Y};
use crate::text::{DeterministicTextMeasurer, TextStyle, label_lines};
use arbora_core::geom::{Point, point};
use arbora_core::{DiagramDocument, DiagramEdge, DiagramNode, LineStyle, NodeKind, RenderConfig};
use util::{escape_xml, escape_xml_into, fmt, fmt_into, fmt_path_into};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

const FONT_FAMILY: &str = r#""PingFang SC","Microsoft YaHei","Noto Sans CJK SC",Arial,sans-serif"#;
const EDGE_COLOR: &str = "#64748b";
const SHADOW_ID: &str = "arbora-shadow";
const ARROW_ID: &str = "arbora-arrow";

struct NodePalette {
    fill: &'static str,
    stroke: &'static str,
    text: &'static str,
}

fn palette(kind: NodeKind) -> NodePalette {
    match kind {
        NodeKind::Topic => NodePalette {
            fill: "#1f6feb",
            stroke: "#1a5fcc",
            text: "#ffffff",
        },
        NodeKind::Module => NodePalette {
            fill: "#dbeafe",
            stroke: "#1f6feb",
            text: "#0f172a",
        },
        NodeKind::Leaf => NodePalette {
            fill: "#ffffff",
            stroke: "#94a3b8",
            text: "#0f172a",
        },
        NodeKind::Entity => NodePalette {
            fill: "#fff7ed",
            stroke: "#ea580c",
            text: "#431407",
        },
        NodeKind::Service => NodePalette {
            fill: "#ecfdf5",
            stroke: "#059669",
            text: "#064e3b",
        },
    }
}

/// Renders `doc` under `config`. Invalid documents are rejected before any markup is built.
pub fn render_svg(doc: &DiagramDocument, config: &RenderConfig) -> Result<String> {
    doc.validate()?;
    let config = config.sanitized();
    let directed = !doc.parser_kind.is_tree();

    let mut out = String::with_capacity(1024 + doc.nodes.len() * 320);
    let _ = write!(
        &mut out,
        r#"<svg xmlns="{SVG_NS}" width="{}" height="{}" viewBox="0 0 {} {}" role="img" aria-label="{}" class="arbora arbora-{}">"#,
        fmt(doc.width * config.zoom),
        fmt(doc.height * config.zoom),
        fmt(doc.width),
        fmt(doc.height),
        escape_xml(&doc.title),
        doc.parser_kind.as_str(),
    );
    out.push_str("<title>");
    escape_xml_into(&mut out, &doc.title);
    out.push_str("</title>");

    write_style(&mut out, &config);
    write_defs(&mut out, &config, directed);

    let _ = write!(
        &mut out,
        r##"<rect class="background" x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
        fmt(doc.width),
        fmt(doc.height)
    );

    let by_id: FxHashMap<&str, &DiagramNode> =
        doc.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    out.push_str(r#"<g class="edges">"#);
    for edge in &doc.edges {
        let (Some(source), Some(target)) = (
            by_id.get(edge.source.as_str()),
            by_id.get(edge.target.as_str()),
        ) else {
            continue;
        };
        write_edge(&mut out, edge, source, target, &config, directed);
    }
    out.push_str("</g>");

    out.push_str(r#"<g class="nodes">"#);
    for node in &doc.nodes {
        write_node(&mut out, node, &config);
    }
    out.push_str("</g></svg>");

    tracing::debug!(bytes = out.len(), nodes = doc.nodes.len(), "rendered svg");
    Ok(out)
}

fn write_style(out: &mut String, config: &RenderConfig) {
    out.push_str("<style>");
    let _ = write!(
        out,
        ".arbora text{{font-family:{FONT_FAMILY};font-size:{}px;}}",
        fmt(config.font_size)
    );
    let _ = write!(
        out,
        ".arbora .edge-label{{font-size:{}px;fill:#475569;}}",
        fmt((config.font_size * 0.85).max(1.0))
    );
    out.push_str(".arbora .node-fields text{text-anchor:start;}");
    out.push_str("</style>");
}

fn write_defs(out: &mut String, config: &RenderConfig, directed: bool) {
    if !config.shadow && !directed {
        return;
    }
    out.push_str("<defs>");
    if config.shadow {
        let _ = write!(
            out,
            r##"<filter id="{SHADOW_ID}" x="-20%" y="-20%" width="140%" height="140%"><feDropShadow dx="0" dy="2" stdDeviation="3" flood-color="#0f172a" flood-opacity="0.18"/></filter>"##
        );
    }
    if directed {
        let _ = write!(
            out,
            r#"<marker id="{ARROW_ID}" viewBox="0 0 10 10" refX="9" refY="5" markerWidth="8" markerHeight="8" orient="auto"><path d="M0,0L10,5L0,10z" fill="{EDGE_COLOR}"/></marker>"#
        );
    }
    out.push_str("</defs>");
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Vertical,
    Horizontal,
}

/// Picks facing sides of the two boxes: stacked boxes connect bottom to top, side-by-side
/// boxes connect right to left.
fn anchors(source: &DiagramNode, target: &DiagramNode) -> (Point, Point, Axis) {
    let s_mid = point(source.x + source.width / 2.0, source.y + source.height / 2.0);
    let t_mid = point(target.x + target.width / 2.0, target.y + target.height / 2.0);
    if target.y >= source.bottom() {
        (point(s_mid.x, source.bottom()), point(t_mid.x, target.y), Axis::Vertical)
    } else if source.y >= target.bottom() {
        (point(s_mid.x, source.y), point(t_mid.x, target.bottom()), Axis::Vertical)
    } else if target.x >= source.right() {
        (point(source.right(), s_mid.y), point(target.x, t_mid.y), Axis::Horizontal)
    } else {
        (point(source.x, s_mid.y), point(target.right(), t_mid.y), Axis::Horizontal)
    }
}

fn push_xy(d: &mut String, p: Point) {
    fmt_path_into(d, p.x);
    d.push(',');
    fmt_path_into(d, p.y);
}

/// Returns the path data and the point where an edge label sits.
fn edge_path(source: &DiagramNode, target: &DiagramNode, style: LineStyle) -> (String, Point) {
    let mut d = String::with_capacity(64);
    if source.id == target.id {
        let x = source.right();
        let (y1, y2) = (
            source.y + source.height / 3.0,
            source.y + source.height * 2.0 / 3.0,
        );
        let reach = (source.height / 2.0).max(24.0);
        d.push('M');
        push_xy(&mut d, point(x, y1));
        d.push('C');
        push_xy(&mut d, point(x + reach, y1 - reach / 2.0));
        d.push(' ');
        push_xy(&mut d, point(x + reach, y2 + reach / 2.0));
        d.push(' ');
        push_xy(&mut d, point(x, y2));
        return (d, point(x + reach, (y1 + y2) / 2.0));
    }

    let (a, b, axis) = anchors(source, target);
    let mid = point((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    d.push('M');
    push_xy(&mut d, a);
    match (style, axis) {
        (LineStyle::Curve, Axis::Vertical) => {
            d.push('C');
            push_xy(&mut d, point(a.x, mid.y));
            d.push(' ');
            push_xy(&mut d, point(b.x, mid.y));
            d.push(' ');
            push_xy(&mut d, b);
        }
        (LineStyle::Curve, Axis::Horizontal) => {
            d.push('C');
            push_xy(&mut d, point(mid.x, a.y));
            d.push(' ');
            push_xy(&mut d, point(mid.x, b.y));
            d.push(' ');
            push_xy(&mut d, b);
        }
        (LineStyle::Orthogonal, Axis::Vertical) => {
            d.push('V');
            fmt_path_into(&mut d, mid.y);
            d.push('H');
            fmt_path_into(&mut d, b.x);
            d.push('V');
            fmt_path_into(&mut d, b.y);
        }
        (LineStyle::Orthogonal, Axis::Horizontal) => {
            d.push('H');
            fmt_path_into(&mut d, mid.x);
            d.push('V');
            fmt_path_into(&mut d, b.y);
            d.push('H');
            fmt_path_into(&mut d, b.x);
        }
    }
    (d, mid)
}

fn write_edge(
    out: &mut String,
    edge: &DiagramEdge,
    source: &DiagramNode,
    target: &DiagramNode,
    config: &RenderConfig,
    directed: bool,
) {
    let (d, label_at) = edge_path(source, target, config.line_style);
    out.push_str(r#"<path id=""#);
    escape_xml_into(out, &edge.id);
    out.push_str(r#"" class="edge"#);
    if edge.is_dashed() {
        out.push_str(" edge-dashed");
    }
    let _ = write!(
        out,
        r#"" d="{d}" fill="none" stroke="{EDGE_COLOR}" stroke-width="1.5""#
    );
    if edge.is_dashed() {
        out.push_str(r#" stroke-dasharray="6 4""#);
    }
    if directed {
        let _ = write!(out, r#" marker-end="url(#{ARROW_ID})""#);
    }
    out.push_str("/>");

    if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
        out.push_str(r#"<text class="edge-label" x=""#);
        fmt_into(out, label_at.x);
        out.push_str(r#"" y=""#);
        fmt_into(out, label_at.y - 4.0);
        out.push_str(r#"" text-anchor="middle">"#);
        escape_xml_into(out, label);
        out.push_str("</text>");
    }
}

fn write_node(out: &mut String, node: &DiagramNode, config: &RenderConfig) {
    let colors = palette(node.kind);
    let line_height = DeterministicTextMeasurer::default().line_height(&TextStyle {
        font_family: None,
        font_size: config.font_size,
    });

    out.push_str(r#"<g id=""#);
    escape_xml_into(out, &node.id);
    let _ = write!(out, r#"" class="node node-{}""#, node.kind.as_str());
    if config.shadow {
        let _ = write!(out, r#" filter="url(#{SHADOW_ID})""#);
    }
    out.push('>');

    let radius = config.node_radius.min(node.width / 2.0).min(node.height / 2.0);
    let _ = write!(
        out,
        r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" ry="{}" fill="{}" stroke="{}" stroke-width="1.5"/>"#,
        fmt(node.x),
        fmt(node.y),
        fmt(node.width),
        fmt(node.height),
        fmt(radius),
        fmt(radius),
        colors.fill,
        colors.stroke,
    );

    let lines = label_lines(&node.label);
    let fields = node.fields.as_deref().unwrap_or_default();
    let label_height = lines.len() as f64 * line_height;
    let header_height = if fields.is_empty() {
        node.height
    } else {
        label_height + 2.0 * NODE_PADDING_Y
    };
    let cx = node.x + node.width / 2.0;
    let first_line = node.y + (header_height - label_height) / 2.0 + line_height / 2.0;

    out.push_str(r#"<text class="node-label" x=""#);
    fmt_into(out, cx);
    out.push_str(r#"" y=""#);
    fmt_into(out, first_line);
    let _ = write!(
        out,
        r#"" fill="{}" text-anchor="middle" dominant-baseline="central">"#,
        colors.text
    );
    for (i, line) in lines.iter().enumerate() {
        out.push_str(r#"<tspan x=""#);
        fmt_into(out, cx);
        out.push_str(r#"" y=""#);
        fmt_into(out, first_line + i as f64 * line_height);
        out.push_str(r#"">"#);
        escape_xml_into(out, line);
        out.push_str("</tspan>");
    }
    out.push_str("</text>");

    if !fields.is_empty() {
        let divider = node.y + header_height;
        let _ = write!(
            out,
            r#"<path class="node-divider" d="M{},{}H{}" stroke="{}" stroke-width="1"/>"#,
            fmt(node.x),
            fmt(divider),
            fmt(node.right()),
            colors.stroke
        );
        out.push_str(r#"<g class="node-fields">"#);
        let top = divider + FIELD_DIVIDER_GAP / 2.0;
        for (i, field) in fields.iter().enumerate() {
            out.push_str(r#"<text x=""#);
            fmt_into(out, node.x + NODE_PADDING_X);
            out.push_str(r#"" y=""#);
            fmt_into(out, top + (i as f64 + 0.5) * line_height);
            let _ = write!(
                out,
                r#"" fill="{}" dominant-baseline="central">"#,
                colors.text
            );
            escape_xml_into(out, field);
            out.push_str("</text>");
        }
        out.push_str("</g>");
    }
    out.push_str("</g>");
}
