//! Flow grammar: `A -> B`, `A --> B` (dashed), chains `A -> B -> C : label`.
//!
//! A node may carry display text with `Id[Label]`; the label is remembered for later mentions
//! of the same id. A trailing `: label` annotates the last edge of the chain.

use regex::Regex;
use std::sync::OnceLock;

use super::graph::{GraphBuilder, GraphSpec};
use super::utils::{strip_inline_comment, unquote};

fn arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(-->|->)\s*").unwrap())
}

fn node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<id>[^\[\]]+?)\s*(?:\[(?P<label>[^\]]*)\])?$").unwrap())
}

/// Returns the node key, registering a display label when one is given.
fn node_token(graph: &mut GraphBuilder, token: &str) -> Option<String> {
    let token = token.trim();
    let c = node_re().captures(token)?;
    let key = unquote(&c["id"]).to_string();
    if key.is_empty() {
        return None;
    }
    let node = graph.touch(&key);
    if let Some(label) = c.name("label") {
        let label = unquote(label.as_str());
        if !label.is_empty() {
            node.label = label.to_string();
        }
    }
    Some(key)
}

pub fn parse_flow(text: &str) -> GraphSpec {
    let mut graph = GraphBuilder::default();

    for (line_no, raw) in text.lines().enumerate() {
        let line = strip_inline_comment(raw).trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let arrows: Vec<_> = arrow_re().captures_iter(line).collect();
        if arrows.is_empty() {
            if node_token(&mut graph, line).is_none() {
                tracing::warn!(line = line_no + 1, text = line, "skipping unrecognized flow line");
            }
            continue;
        }

        let mut segments: Vec<&str> = Vec::with_capacity(arrows.len() + 1);
        let mut dashed: Vec<bool> = Vec::with_capacity(arrows.len());
        let mut start = 0usize;
        for c in &arrows {
            let (Some(whole), Some(op)) = (c.get(0), c.get(1)) else {
                continue;
            };
            segments.push(&line[start..whole.start()]);
            dashed.push(op.as_str() == "-->");
            start = whole.end();
        }
        let tail = &line[start..];
        let (last, label) = match tail.split_once(':') {
            Some((node, label)) => (node, Some(label)),
            None => (tail, None),
        };
        segments.push(last);

        let keys: Vec<Option<String>> = segments
            .iter()
            .map(|s| node_token(&mut graph, s))
            .collect();
        let edge_count = keys.len().saturating_sub(1);
        for (i, pair) in keys.windows(2).enumerate() {
            let (Some(a), Some(b)) = (&pair[0], &pair[1]) else {
                tracing::warn!(line = line_no + 1, "skipping flow edge with an empty endpoint");
                continue;
            };
            let edge_label = if i + 1 == edge_count { label } else { None };
            graph.add_edge(a, b, edge_label, dashed[i]);
        }
    }

    let spec = graph.finish();
    tracing::debug!(
        nodes = spec.nodes.len(),
        edges = spec.edges.len(),
        "parsed flow"
    );
    spec
}
