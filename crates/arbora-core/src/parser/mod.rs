//! Grammar front ends. Every grammar is parse-tolerant: unrecognized input is skipped or
//! attached to the document root, never reported as an error.

mod flow;
mod graph;
mod indent;
mod relation;
mod utils;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

pub use flow::parse_flow;
pub use graph::{GraphEdgeSpec, GraphNodeSpec, GraphSpec};
pub use indent::{DEFAULT_TAB_WIDTH, DiagramItem, IndentOptions, item_id, parse_indented};
pub use relation::parse_relations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    EntityRelation,
    #[default]
    Hierarchy,
    Flow,
    Mind,
}

impl ParserKind {
    pub const ALL: [ParserKind; 4] = [
        ParserKind::EntityRelation,
        ParserKind::Hierarchy,
        ParserKind::Flow,
        ParserKind::Mind,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParserKind::EntityRelation => "entity-relation",
            ParserKind::Hierarchy => "hierarchy",
            ParserKind::Flow => "flow",
            ParserKind::Mind => "mind",
        }
    }

    /// Hierarchical kinds produce trees: one edge per non-root node.
    pub fn is_tree(self) -> bool {
        matches!(self, ParserKind::Hierarchy | ParserKind::Mind)
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entity-relation" | "er" | "entity" => Ok(Self::EntityRelation),
            "hierarchy" | "tree" | "feature" | "feature-structure" => Ok(Self::Hierarchy),
            "flow" | "flowchart" => Ok(Self::Flow),
            "mind" | "mindmap" | "mind-map" => Ok(Self::Mind),
            other => Err(Error::UnknownParserKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Parser output, one variant per grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "parserKind", content = "model", rename_all = "kebab-case")]
pub enum ParsedDiagram {
    EntityRelation(GraphSpec),
    Hierarchy(Vec<DiagramItem>),
    Flow(GraphSpec),
    Mind(Vec<DiagramItem>),
}

impl ParsedDiagram {
    pub fn kind(&self) -> ParserKind {
        match self {
            ParsedDiagram::EntityRelation(_) => ParserKind::EntityRelation,
            ParsedDiagram::Hierarchy(_) => ParserKind::Hierarchy,
            ParsedDiagram::Flow(_) => ParserKind::Flow,
            ParsedDiagram::Mind(_) => ParserKind::Mind,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ParsedDiagram::Hierarchy(items) | ParsedDiagram::Mind(items) => items.is_empty(),
            ParsedDiagram::EntityRelation(g) | ParsedDiagram::Flow(g) => g.nodes.is_empty(),
        }
    }
}

pub fn parse(kind: ParserKind, text: &str, options: &IndentOptions) -> ParsedDiagram {
    match kind {
        ParserKind::Hierarchy => ParsedDiagram::Hierarchy(parse_indented(text, options)),
        ParserKind::Mind => ParsedDiagram::Mind(parse_indented(text, options)),
        ParserKind::EntityRelation => ParsedDiagram::EntityRelation(parse_relations(text)),
        ParserKind::Flow => ParsedDiagram::Flow(parse_flow(text)),
    }
}
