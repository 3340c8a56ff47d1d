//! Layered placement for entity-relation and flow documents.
//!
//! 1. Back edges found by a depth-first walk (in declaration order) are ignored, so cycles
//!    never block ranking.
//! 2. Longest-path ranking: a node sits one rank below its deepest predecessor.
//! 3. With `avoid_crossing`, barycenter sweeps reorder each rank by the mean position of its
//!    neighbours in the adjacent rank.
//! 4. Ranks become rows, centred on the widest row.

use rustc_hash::FxHashMap;

use super::{finish_document, size_node};
use crate::LayoutOptions;
use arbora_core::{
    DiagramDocument, DiagramEdge, DiagramNode, EdgeType, GraphSpec, NodeKind, ParserKind, edge_id,
    node_id,
};

/// Down/up sweep pairs run when crossing reduction is enabled.
const BARYCENTER_SWEEPS: usize = 4;

pub fn layout_graph(graph: &GraphSpec, kind: ParserKind, options: &LayoutOptions) -> DiagramDocument {
    let n = graph.nodes.len();
    let index_of: FxHashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.key.as_str(), i))
        .collect();

    let links: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .filter_map(|e| {
            let s = index_of.get(e.source.as_str())?;
            let t = index_of.get(e.target.as_str())?;
            Some((*s, *t))
        })
        .collect();

    let forward = acyclic_links(n, &links);
    let ranks = longest_path_ranks(n, &forward);

    let rank_count = ranks.iter().copied().max().map_or(0, |r| r + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (i, r) in ranks.iter().enumerate() {
        layers[*r].push(i);
    }
    if options.settings.avoid_crossing {
        reduce_crossings(&mut layers, &forward);
    }

    let node_kind = match kind {
        ParserKind::EntityRelation => NodeKind::Entity,
        _ => NodeKind::Service,
    };
    let sized: Vec<_> = graph
        .nodes
        .iter()
        .map(|node| size_node(&node.label, &node.fields, options))
        .collect();

    let padding = options.padding();
    let gap_x = options.node_gap_x;
    let row_width = |layer: &[usize]| {
        layer.iter().map(|i| sized[*i].width).sum::<f64>()
            + gap_x * layer.len().saturating_sub(1) as f64
    };
    let widest = layers.iter().map(|l| row_width(l.as_slice())).fold(0.0_f64, f64::max);
    let tallest = sized.iter().map(|s| s.height).fold(0.0_f64, f64::max);

    let mut pos = vec![(0.0_f64, 0.0_f64); n];
    let mut y = padding;
    for layer in &layers {
        let mut x = padding + (widest - row_width(layer.as_slice())) / 2.0;
        let row_height = if options.compact_rows {
            layer.iter().map(|i| sized[*i].height).fold(0.0_f64, f64::max)
        } else {
            tallest
        };
        for &i in layer {
            pos[i] = (x, y);
            x += sized[i].width + gap_x;
        }
        y += row_height + options.node_gap_y;
    }

    let nodes: Vec<DiagramNode> = graph
        .nodes
        .iter()
        .zip(sized)
        .enumerate()
        .map(|(i, (spec, size))| DiagramNode {
            id: node_id(i),
            label: size.label,
            kind: node_kind,
            x: pos[i].0,
            y: pos[i].1,
            width: size.width,
            height: size.height,
            fields: (!spec.fields.is_empty()).then(|| spec.fields.clone()),
            level: None,
        })
        .collect();

    let edges: Vec<DiagramEdge> = graph
        .edges
        .iter()
        .filter_map(|e| {
            let s = index_of.get(e.source.as_str())?;
            let t = index_of.get(e.target.as_str())?;
            Some((e, *s, *t))
        })
        .enumerate()
        .map(|(i, (e, s, t))| DiagramEdge {
            id: edge_id(i),
            source: node_id(s),
            target: node_id(t),
            label: e.label.clone(),
            edge_type: Some(if e.dashed {
                EdgeType::Dashed
            } else {
                EdgeType::Solid
            }),
        })
        .collect();

    let title = graph.nodes.first().map(|n| n.label.as_str());
    finish_document(title, kind, nodes, edges, options)
}

/// Drops self loops and edges that close a cycle during a DFS in declaration order.
fn acyclic_links(n: usize, links: &[(usize, usize)]) -> Vec<(usize, usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        OnStack,
        Done,
    }

    let mut out_edges: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (ix, (s, t)) in links.iter().enumerate() {
        out_edges[*s].push((ix, *t));
    }

    let mut back = vec![false; links.len()];
    let mut mark = vec![Mark::New; n];
    for start in 0..n {
        if mark[start] != Mark::New {
            continue;
        }
        // (node, next out-edge to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        mark[start] = Mark::OnStack;
        while let Some(top) = stack.last_mut() {
            let (v, next) = *top;
            let Some(&(ix, w)) = out_edges[v].get(next) else {
                mark[v] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;
            match mark[w] {
                Mark::OnStack => back[ix] = true,
                Mark::New => {
                    mark[w] = Mark::OnStack;
                    stack.push((w, 0));
                }
                Mark::Done => {}
            }
        }
    }

    links
        .iter()
        .zip(back)
        .filter(|(_, is_back)| !is_back)
        .map(|(link, _)| *link)
        .collect()
}

fn longest_path_ranks(n: usize, forward: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; n];
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (s, t) in forward {
        indegree[*t] += 1;
        succ[*s].push(*t);
    }

    let mut rank = vec![0usize; n];
    let mut ready: Vec<usize> = (0..n).rev().filter(|i| indegree[*i] == 0).collect();
    while let Some(v) = ready.pop() {
        for &w in &succ[v] {
            rank[w] = rank[w].max(rank[v] + 1);
            indegree[w] -= 1;
            if indegree[w] == 0 {
                ready.push(w);
            }
        }
    }
    rank
}

fn reduce_crossings(layers: &mut [Vec<usize>], forward: &[(usize, usize)]) {
    let n = layers.iter().map(Vec::len).sum::<usize>();
    let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (s, t) in forward {
        neighbours[*s].push(*t);
        neighbours[*t].push(*s);
    }

    let mut order = vec![0usize; n];
    for layer in layers.iter() {
        for (pos, v) in layer.iter().enumerate() {
            order[*v] = pos;
        }
    }

    for _ in 0..BARYCENTER_SWEEPS {
        for r in 1..layers.len() {
            sort_by_barycenter(layers, r, r - 1, &neighbours, &mut order);
        }
        for r in (0..layers.len().saturating_sub(1)).rev() {
            sort_by_barycenter(layers, r, r + 1, &neighbours, &mut order);
        }
    }
}

fn sort_by_barycenter(
    layers: &mut [Vec<usize>],
    movable: usize,
    fixed: usize,
    neighbours: &[Vec<usize>],
    order: &mut [usize],
) {
    let fixed_set: &[usize] = &layers[fixed];
    let mut keyed: Vec<(f64, usize)> = layers[movable]
        .iter()
        .map(|&v| {
            let adjacent: Vec<usize> = neighbours[v]
                .iter()
                .copied()
                .filter(|u| fixed_set.contains(u))
                .collect();
            // Nodes without neighbours in the fixed layer keep their slot.
            let barycenter = if adjacent.is_empty() {
                order[v] as f64
            } else {
                adjacent.iter().map(|u| order[*u] as f64).sum::<f64>() / adjacent.len() as f64
            };
            (barycenter, v)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let layer = &mut layers[movable];
    for (pos, (_, v)) in keyed.into_iter().enumerate() {
        layer[pos] = v;
        order[v] = pos;
    }
}

/// Number of pairwise edge crossings between consecutive ranks.
#[cfg(test)]
fn count_crossings(doc: &DiagramDocument) -> usize {
    let by_id: FxHashMap<&str, &DiagramNode> =
        doc.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let segments: Vec<(f64, f64, f64, f64)> = doc
        .edges
        .iter()
        .filter_map(|e| {
            let a = by_id.get(e.source.as_str())?;
            let b = by_id.get(e.target.as_str())?;
            Some((a.x + a.width / 2.0, a.y, b.x + b.width / 2.0, b.y))
        })
        .collect();
    let mut crossings = 0;
    for (i, s) in segments.iter().enumerate() {
        for t in &segments[i + 1..] {
            let same_rows = s.1 == t.1 && s.3 == t.3;
            if same_rows && (s.0 - t.0) * (s.2 - t.2) < 0.0 {
                crossings += 1;
            }
        }
    }
    crossings
}
