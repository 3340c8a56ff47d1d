//! Entity-relation grammar.
//!
//! ```text
//! User { id, name }
//! Order: id, total
//! Item {
//!   sku
//!   price
//! }
//! User -> Order : places
//! Order ..> Item : contains
//! ```

use regex::Regex;
use std::sync::OnceLock;

use super::graph::{GraphBuilder, GraphSpec};
use super::utils::{strip_inline_comment, unquote};

struct RelationPatterns {
    relation: Regex,
    block: Regex,
    block_open: Regex,
    colon: Regex,
    bare: Regex,
}

fn patterns() -> &'static RelationPatterns {
    static PATTERNS: OnceLock<RelationPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| RelationPatterns {
        relation: Regex::new(
            r"^(?P<a>[^\s{}:][^{}:]*?)\s*(?P<op>->|\.\.>)\s*(?P<b>[^\s{}:][^{}:]*?)\s*(?::\s*(?P<label>.*?))?\s*$",
        )
        .unwrap(),
        block: Regex::new(r"^(?P<name>[^\s{}:][^{}:]*?)\s*\{(?P<fields>[^{}]*)\}\s*$").unwrap(),
        block_open: Regex::new(r"^(?P<name>[^\s{}:][^{}:]*?)\s*\{\s*$").unwrap(),
        colon: Regex::new(r"^(?P<name>[^\s{}:][^{}:]*?)\s*:\s*(?P<fields>[^{}]*)$").unwrap(),
        bare: Regex::new(r"^(?P<name>[^\s{}:][^{}:]*?)$").unwrap(),
    })
}

fn split_fields(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([',', ';']).map(unquote)
}

pub fn parse_relations(text: &str) -> GraphSpec {
    let p = patterns();
    let mut graph = GraphBuilder::default();
    let mut open_block: Option<String> = None;

    for (line_no, raw) in text.lines().enumerate() {
        let line = strip_inline_comment(raw).trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(entity) = open_block.as_deref() {
            match line.split_once('}') {
                Some((fields, _)) => {
                    graph.add_fields(entity, split_fields(fields));
                    open_block = None;
                }
                None => graph.add_fields(entity, split_fields(line)),
            }
            continue;
        }

        if let Some(c) = p.relation.captures(line) {
            let dashed = &c["op"] == "..>";
            graph.add_edge(
                unquote(&c["a"]),
                unquote(&c["b"]),
                c.name("label").map(|m| m.as_str()),
                dashed,
            );
        } else if let Some(c) = p.block.captures(line) {
            graph.add_fields(unquote(&c["name"]), split_fields(&c["fields"]));
        } else if let Some(c) = p.block_open.captures(line) {
            let name = unquote(&c["name"]).to_string();
            graph.touch(&name);
            open_block = Some(name);
        } else if let Some(c) = p.colon.captures(line) {
            graph.add_fields(unquote(&c["name"]), split_fields(&c["fields"]));
        } else if let Some(c) = p.bare.captures(line) {
            graph.touch(unquote(&c["name"]));
        } else {
            tracing::warn!(line = line_no + 1, text = line, "skipping unrecognized relation line");
        }
    }

    if let Some(entity) = open_block {
        tracing::warn!(entity = entity.as_str(), "entity block not closed before end of input");
    }

    let spec = graph.finish();
    tracing::debug!(
        nodes = spec.nodes.len(),
        edges = spec.edges.len(),
        "parsed entity relations"
    );
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_entities_in_both_forms() {
        let spec = parse_relations("User { id, name }\nOrder: id, total");
        assert_eq!(spec.nodes.len(), 2);
        assert_eq!(spec.nodes[0].key, "User");
        assert_eq!(spec.nodes[0].fields, vec!["id", "name"]);
        assert_eq!(spec.nodes[1].fields, vec!["id", "total"]);
    }

    #[test]
    fn multi_line_blocks_collect_fields() {
        let spec = parse_relations("Item {\n  sku\n  price, stock\n}\nItem -> Shelf");
        assert_eq!(spec.nodes[0].fields, vec!["sku", "price", "stock"]);
        assert_eq!(spec.edges.len(), 1);
    }

    #[test]
    fn relations_create_missing_endpoints_and_keep_labels() {
        let spec = parse_relations("User -> Order : places\nOrder ..> Item");
        let keys: Vec<_> = spec.nodes.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, vec!["User", "Order", "Item"]);
        assert_eq!(spec.edges[0].label.as_deref(), Some("places"));
        assert!(!spec.edges[0].dashed);
        assert_eq!(spec.edges[1].label, None);
        assert!(spec.edges[1].dashed);
    }

    #[test]
    fn repeated_declarations_append_fields() {
        let spec = parse_relations("User: id\nUser { email }");
        assert_eq!(spec.nodes.len(), 1);
        assert_eq!(spec.nodes[0].fields, vec!["id", "email"]);
    }

    #[test]
    fn comments_and_garbage_are_skipped() {
        let spec = parse_relations("# heading\nUser %% note\n{ broken\nUser -> Role");
        assert_eq!(spec.nodes.len(), 2);
        assert_eq!(spec.edges.len(), 1);
    }

    #[test]
    fn names_may_contain_spaces_and_cjk() {
        let spec = parse_relations("订单 明细 -> 商品 : 包含");
        assert_eq!(spec.nodes[0].key, "订单 明细");
        assert_eq!(spec.nodes[1].key, "商品");
        assert_eq!(spec.edges[0].label.as_deref(), Some("包含"));
    }
}
