#![forbid(unsafe_code)]

//! Text-to-diagram parsers + document model (headless).
//!
//! Design goals:
//! - parse-tolerant: malformed indentation degrades, it never fails
//! - deterministic, testable outputs (same text in, same items out)
//! - one stable document shape shared by local layout, remote generation and persistence

pub mod config;
pub mod document;
pub mod error;
pub mod geom;
pub mod parser;

pub use config::{LineStyle, RenderConfig, UnzoomedRenderConfig};
pub use document::{
    DEFAULT_CANVAS_PADDING, DiagramDocument, DiagramEdge, DiagramNode, EdgeType, MIN_NODE_SIZE,
    NodeKind, canvas_padding, edge_id, node_id,
};
pub use error::{Error, Result};
pub use parser::{
    DiagramItem, GraphEdgeSpec, GraphNodeSpec, GraphSpec, IndentOptions, ParsedDiagram,
    ParserKind, parse,
};
