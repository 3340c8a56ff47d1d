use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node declared by a relational or flow grammar, keyed by its source name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNodeSpec {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdgeSpec {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub dashed: bool,
}

/// Parser output for the non-hierarchical grammars. Node order is first mention order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<GraphNodeSpec>,
    pub edges: Vec<GraphEdgeSpec>,
}

#[derive(Debug, Default)]
pub(super) struct GraphBuilder {
    nodes: IndexMap<String, GraphNodeSpec>,
    edges: Vec<GraphEdgeSpec>,
}

impl GraphBuilder {
    pub(super) fn touch(&mut self, key: &str) -> &mut GraphNodeSpec {
        self.nodes
            .entry(key.to_string())
            .or_insert_with(|| GraphNodeSpec {
                key: key.to_string(),
                label: key.to_string(),
                fields: Vec::new(),
            })
    }

    pub(super) fn add_fields<'a>(&mut self, key: &str, fields: impl IntoIterator<Item = &'a str>) {
        let node = self.touch(key);
        for field in fields {
            let field = field.trim();
            if !field.is_empty() {
                node.fields.push(field.to_string());
            }
        }
    }

    pub(super) fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        label: Option<&str>,
        dashed: bool,
    ) {
        self.touch(source);
        self.touch(target);
        self.edges.push(GraphEdgeSpec {
            source: source.to_string(),
            target: target.to_string(),
            label: label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            dashed,
        });
    }

    pub(super) fn finish(self) -> GraphSpec {
        GraphSpec {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges,
        }
    }
}
