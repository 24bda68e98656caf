//! Drag-time collision resolution.
//!
//! Local and non-iterative: violations are resolved against the dragged
//! node only, in one pass. Pushing a node away can newly overlap it with a
//! third node; those second-order overlaps are accepted, not resolved.

use tangle_core::{NodeId, NodeRecord, Position};

/// Node footprint treated as a disc for separation purposes.
pub const NODE_DIAMETER: f64 = 160.0;
/// Extra breathing room beyond the disc.
pub const COLLISION_BUFFER: f64 = 40.0;
/// Minimum center-to-center distance between the dragged node and any other.
pub const MIN_SEPARATION: f64 = NODE_DIAMETER + COLLISION_BUFFER;

/// Push every node within `MIN_SEPARATION` of the dragged node radially
/// away along the line connecting centers, by exactly the overlap amount.
/// The dragged node itself never moves. Returns only the displaced nodes
/// with their new positions.
///
/// Pure function of the input positions and the dragged identity; two
/// exactly coincident centers push along +x (atan2(0, 0) is 0).
pub fn resolve(nodes: &[NodeRecord], dragged: &NodeId) -> Vec<(NodeId, Position)> {
    let Some(origin) = nodes.iter().find(|n| &n.id == dragged) else {
        return Vec::new();
    };

    nodes
        .iter()
        .filter(|n| &n.id != dragged)
        .filter_map(|n| {
            let dx = n.position.x - origin.position.x;
            let dy = n.position.y - origin.position.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance >= MIN_SEPARATION {
                return None;
            }
            let angle = dy.atan2(dx);
            let push = MIN_SEPARATION - distance;
            Some((
                n.id.clone(),
                Position::new(
                    n.position.x + angle.cos() * push,
                    n.position.y + angle.sin() * push,
                ),
            ))
        })
        .collect()
}
