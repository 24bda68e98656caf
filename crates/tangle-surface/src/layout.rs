//! Layered graph layout.
//!
//! Sugiyama-style: longest-path rank assignment, one barycenter ordering
//! pass per rank against the previous rank, then fixed-footprint
//! coordinates. Deterministic for a fixed input sequence and direction.
//! Cycles are tolerated - the back edge found last by visitation order is
//! ignored for ranking - but crossing minimization makes no promises in
//! their presence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tangle_core::{EdgeRecord, NodeId, NodeRecord, Position};

/// Which way ranks grow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    /// Ranks grow left to right ("LR").
    Horizontal,
    /// Ranks grow top to bottom ("TB").
    Vertical,
}

impl LayoutDirection {
    pub fn as_flag(&self) -> &'static str {
        match self {
            LayoutDirection::Horizontal => "LR",
            LayoutDirection::Vertical => "TB",
        }
    }

    pub fn parse_flag(raw: &str) -> Option<Self> {
        match raw {
            "LR" => Some(LayoutDirection::Horizontal),
            "TB" => Some(LayoutDirection::Vertical),
            _ => None,
        }
    }
}

/// Side of the node footprint an edge attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

/// Layout tunables. The footprint values are rendering conventions, not
/// semantically significant.
#[derive(Clone, Copy, Debug)]
pub struct LayoutOptions {
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between consecutive ranks.
    pub rank_gap: f64,
    /// Gap between consecutive nodes within a rank.
    pub lane_gap: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 60.0,
            rank_gap: 60.0,
            lane_gap: 40.0,
        }
    }
}

/// Axis-aligned bounding box of a computed layout, for viewport fitting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Full replacement position for one input node.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedNode {
    pub id: NodeId,
    pub position: Position,
    pub source_anchor: Anchor,
    pub target_anchor: Anchor,
}

/// Result of a layout run. Topology passes through unchanged; only node
/// positions and handle anchors are produced.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    pub nodes: Vec<PlacedNode>,
    pub bounds: Rect,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Unvisited,
    Active,
    Done,
}

/// Longest path from a source. Roots (no incoming edge) get rank 0; every
/// other node sits one past its deepest predecessor. Back edges discovered
/// while a node is on the visitation stack are skipped.
fn assign_ranks(order: usize, preds: &[Vec<usize>]) -> Vec<usize> {
    fn visit(i: usize, preds: &[Vec<usize>], state: &mut [Visit], ranks: &mut [usize]) -> usize {
        match state[i] {
            Visit::Done => return ranks[i],
            Visit::Active => return 0,
            Visit::Unvisited => {}
        }
        state[i] = Visit::Active;
        let mut rank = 0;
        for &p in &preds[i] {
            if state[p] == Visit::Active {
                continue;
            }
            rank = rank.max(visit(p, preds, state, ranks) + 1);
        }
        state[i] = Visit::Done;
        ranks[i] = rank;
        rank
    }

    let mut state = vec![Visit::Unvisited; order];
    let mut ranks = vec![0usize; order];
    for i in 0..order {
        visit(i, preds, &mut state, &mut ranks);
    }
    ranks
}

/// One barycenter pass: order each rank by the mean position of its
/// predecessors in the previous rank. Nodes with no predecessor there keep
/// their current slot; ties keep input order (stable).
fn order_ranks(ranks: &[usize], preds: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let rank_count = ranks.iter().copied().max().map_or(0, |m| m + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (i, &rank) in ranks.iter().enumerate() {
        layers[rank].push(i);
    }

    for r in 1..layers.len() {
        let prev_slot: HashMap<usize, usize> = layers[r - 1]
            .iter()
            .enumerate()
            .map(|(slot, &node)| (node, slot))
            .collect();

        let mut keyed: Vec<(f64, usize, usize)> = layers[r]
            .iter()
            .enumerate()
            .map(|(slot, &node)| {
                let slots: Vec<f64> = preds[node]
                    .iter()
                    .filter_map(|p| prev_slot.get(p))
                    .map(|&s| s as f64)
                    .collect();
                let barycenter = if slots.is_empty() {
                    slot as f64
                } else {
                    slots.iter().sum::<f64>() / slots.len() as f64
                };
                (barycenter, slot, node)
            })
            .collect();

        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        layers[r] = keyed.into_iter().map(|(_, _, node)| node).collect();
    }

    layers
}

/// Compute a deterministic position for every input node.
///
/// Invoked on demand only - writing the result back over live positions is
/// a disruptive, explicit user action, never background behavior.
pub fn layout(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
    direction: LayoutDirection,
    options: &LayoutOptions,
) -> Layout {
    if nodes.is_empty() {
        return Layout::default();
    }

    let index: HashMap<&NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges {
        // Edges with an endpoint outside the node sequence contribute
        // nothing to the hierarchy.
        if let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) {
            if s != t {
                preds[t].push(s);
            }
        }
    }

    let ranks = assign_ranks(nodes.len(), &preds);
    let layers = order_ranks(&ranks, &preds);

    let (source_anchor, target_anchor) = match direction {
        LayoutDirection::Horizontal => (Anchor::Right, Anchor::Left),
        LayoutDirection::Vertical => (Anchor::Bottom, Anchor::Top),
    };

    let mut placed: Vec<Option<PlacedNode>> = vec![None; nodes.len()];
    for (rank, layer) in layers.iter().enumerate() {
        for (slot, &node) in layer.iter().enumerate() {
            let (rank, slot) = (rank as f64, slot as f64);
            let position = match direction {
                LayoutDirection::Horizontal => Position::new(
                    rank * (options.node_width + options.rank_gap),
                    slot * (options.node_height + options.lane_gap),
                ),
                LayoutDirection::Vertical => Position::new(
                    slot * (options.node_width + options.lane_gap),
                    rank * (options.node_height + options.rank_gap),
                ),
            };
            placed[node] = Some(PlacedNode {
                id: nodes[node].id.clone(),
                position,
                source_anchor,
                target_anchor,
            });
        }
    }

    let nodes: Vec<PlacedNode> = placed.into_iter().flatten().collect();
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for node in &nodes {
        max_x = max_x.max(node.position.x);
        max_y = max_y.max(node.position.y);
    }
    let bounds = Rect {
        x: 0.0,
        y: 0.0,
        width: max_x + options.node_width,
        height: max_y + options.node_height,
    };

    Layout { nodes, bounds }
}
