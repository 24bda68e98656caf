//! Graph store.
//!
//! Typed mutation API over the shared document that preserves structural
//! integrity: removing a node removes every edge mentioning it in the same
//! observable batch, so no peer ever sees a dangling edge from a node
//! removal. The store itself stays permissive about edge endpoints at
//! creation time; that validation is an interaction-boundary concern.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::doc::SharedDoc;
use super::identity::{EdgeId, NodeId};
use super::record::{EdgeRecord, NodeRecord};

/// One-shot self-consistent capture of the graph, for persistence elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Mutation facade over the two replicated maps.
///
/// Operations do not fail under normal conditions; deleting or recoloring a
/// missing id is silently ignored.
#[derive(Clone)]
pub struct GraphStore {
    doc: SharedDoc,
}

impl GraphStore {
    pub fn new(doc: SharedDoc) -> Self {
        Self { doc }
    }

    pub fn doc(&self) -> &SharedDoc {
        &self.doc
    }

    /// Insert or fully replace a node entry. Whole-record granularity: a
    /// concurrent write to any field of the same record loses wholesale.
    pub fn upsert_node(&self, record: NodeRecord) {
        self.doc.transact(|txn| txn.set_node(record));
    }

    /// Insert or fully replace an edge entry. Endpoint existence is NOT
    /// checked here; callers creating edges from user gestures validate
    /// before calling.
    pub fn upsert_edge(&self, record: EdgeRecord) {
        self.doc.transact(|txn| txn.set_edge(record));
    }

    /// Remove a node and, in the same batch, every edge whose source or
    /// target equals `id`. Edge removals are ordered before the node
    /// removal within the batch.
    pub fn delete_node(&self, id: &NodeId) {
        let doomed: Vec<EdgeId> = self
            .doc
            .edges()
            .into_iter()
            .filter(|e| &e.source == id || &e.target == id)
            .map(|e| e.id)
            .collect();

        if !doomed.is_empty() {
            debug!(node = %id, edges = doomed.len(), "cascading node delete");
        }

        self.doc.transact(|txn| {
            for edge_id in &doomed {
                txn.delete_edge(edge_id);
            }
            txn.delete_node(id);
        });
    }

    /// Remove a single edge. No cascading.
    pub fn delete_edge(&self, id: &EdgeId) {
        self.doc.transact(|txn| txn.delete_edge(id));
    }

    /// Empty both maps in one batch. A full-canvas reset.
    pub fn clear(&self) {
        let nodes: Vec<NodeId> = self.doc.nodes().into_iter().map(|n| n.id).collect();
        let edges: Vec<EdgeId> = self.doc.edges().into_iter().map(|e| e.id).collect();
        self.doc.transact(|txn| {
            for edge_id in &edges {
                txn.delete_edge(edge_id);
            }
            for node_id in &nodes {
                txn.delete_node(node_id);
            }
        });
    }

    /// Overwrite the color of every edge whose source is `node_id`.
    ///
    /// Edge color is denormalized from the source node and kept in sync
    /// here, procedurally, when the node's color changes.
    pub fn recolor_outgoing(&self, node_id: &NodeId, color: &str) {
        let outgoing: Vec<EdgeRecord> = self
            .doc
            .edges()
            .into_iter()
            .filter(|e| &e.source == node_id)
            .collect();

        self.doc.transact(|txn| {
            for mut edge in outgoing {
                edge.attributes.color = Some(color.to_string());
                txn.set_edge(edge);
            }
        });
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.doc.nodes()
    }

    /// Live edges in id order.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.doc.edges()
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeRecord> {
        self.doc.node(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<EdgeRecord> {
        self.doc.edge(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.doc.contains_node(id)
    }

    /// Capture the current graph. Self-consistent given the cascade
    /// invariant: no edge in the snapshot references a missing node unless
    /// a caller deliberately stored one.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes(),
            edges: self.edges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{MapEvent, MapName};
    use crate::identity::PeerId;
    use crate::record::Position;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> GraphStore {
        GraphStore::new(SharedDoc::new(PeerId::new("test").unwrap()))
    }

    fn node(id: &str) -> NodeRecord {
        NodeRecord::new(NodeId::parse(id).unwrap(), Position::default(), "tangle")
    }

    fn edge(id: &str, source: &str, target: &str) -> EdgeRecord {
        EdgeRecord::new(
            EdgeId::parse(id).unwrap(),
            NodeId::parse(source).unwrap(),
            NodeId::parse(target).unwrap(),
            "tangle",
        )
    }

    fn seed_chain(store: &GraphStore) {
        // 1 -> 2 -> 3
        store.upsert_node(node("1"));
        store.upsert_node(node("2"));
        store.upsert_node(node("3"));
        store.upsert_edge(edge("e12", "1", "2"));
        store.upsert_edge(edge("e23", "2", "3"));
    }

    #[test]
    fn upsert_replaces_whole_record() {
        let store = store();
        store.upsert_node(node("a").with_label("first"));
        store.upsert_node(node("a").with_label("second"));

        let records = store.nodes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attributes.label, "second");
    }

    #[test]
    fn delete_node_cascades_to_edges() {
        let store = store();
        seed_chain(&store);

        store.delete_node(&NodeId::parse("1").unwrap());

        let node_ids: Vec<_> = store.nodes().into_iter().map(|n| n.id.to_string()).collect();
        assert_eq!(node_ids, vec!["2", "3"]);
        let edge_ids: Vec<_> = store.edges().into_iter().map(|e| e.id.to_string()).collect();
        assert_eq!(edge_ids, vec!["e23"]);
    }

    #[test]
    fn cascade_leaves_no_dangling_edge_for_any_node() {
        for id in ["1", "2", "3"] {
            let store = store();
            seed_chain(&store);
            store.upsert_edge(edge("e31", "3", "1"));
            let victim = NodeId::parse(id).unwrap();
            store.delete_node(&victim);
            for e in store.edges() {
                assert_ne!(e.source, victim);
                assert_ne!(e.target, victim);
            }
        }
    }

    #[test]
    fn cascade_is_one_observable_batch() {
        let store = store();
        seed_chain(&store);

        let events: Rc<RefCell<Vec<MapEvent>>> = Rc::default();
        let sink = Rc::clone(&events);
        let _n = store.doc().observe(MapName::Nodes, move |e| sink.borrow_mut().push(e.clone()));
        let sink = Rc::clone(&events);
        let _e = store.doc().observe(MapName::Edges, move |e| sink.borrow_mut().push(e.clone()));

        store.delete_node(&NodeId::parse("2").unwrap());

        // One event per map for the entire cascade, and at the moment either
        // event fires the maps already agree (no transient dangling edge).
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events.iter().filter(|e| e.map == MapName::Edges).count(), 1);
    }

    #[test]
    fn observer_sees_consistent_state_mid_cascade() {
        let store = store();
        seed_chain(&store);

        let violations = Rc::new(RefCell::new(0u32));
        let doc = store.doc().clone();
        let count = Rc::clone(&violations);
        let _sub = store.doc().observe(MapName::Nodes, move |_| {
            let node_ids: Vec<String> = doc.nodes().iter().map(|n| n.id.to_string()).collect();
            for e in doc.edges() {
                if !node_ids.contains(&e.source.to_string())
                    || !node_ids.contains(&e.target.to_string())
                {
                    *count.borrow_mut() += 1;
                }
            }
        });

        store.delete_node(&NodeId::parse("1").unwrap());
        assert_eq!(*violations.borrow(), 0);
    }

    #[test]
    fn delete_edge_does_not_cascade() {
        let store = store();
        seed_chain(&store);

        store.delete_edge(&EdgeId::parse("e12").unwrap());

        assert_eq!(store.nodes().len(), 3);
        assert_eq!(store.edges().len(), 1);
    }

    #[test]
    fn missing_key_operations_are_no_ops() {
        let store = store();
        seed_chain(&store);

        store.delete_node(&NodeId::parse("ghost").unwrap());
        store.delete_edge(&EdgeId::parse("ghost").unwrap());
        store.recolor_outgoing(&NodeId::parse("ghost").unwrap(), "#ff0000");

        assert_eq!(store.nodes().len(), 3);
        assert_eq!(store.edges().len(), 2);
    }

    #[test]
    fn clear_empties_both_maps() {
        let store = store();
        seed_chain(&store);

        store.clear();

        assert!(store.nodes().is_empty());
        assert!(store.edges().is_empty());
    }

    #[test]
    fn recolor_outgoing_touches_only_source_edges() {
        let store = store();
        seed_chain(&store);

        store.recolor_outgoing(&NodeId::parse("2").unwrap(), "#00ff00");

        let e12 = store.edge(&EdgeId::parse("e12").unwrap()).unwrap();
        let e23 = store.edge(&EdgeId::parse("e23").unwrap()).unwrap();
        assert_eq!(e12.attributes.color, None);
        assert_eq!(e23.attributes.color, Some("#00ff00".to_string()));
    }

    #[test]
    fn snapshot_reflects_current_state() {
        let store = store();
        seed_chain(&store);
        store.delete_node(&NodeId::parse("3").unwrap());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
