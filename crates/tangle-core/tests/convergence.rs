//! Property tests for replica convergence.
//!
//! Two peers apply arbitrary local mutation sequences, exchange their
//! updates in arbitrary order (including duplicate delivery), and must end
//! up with identical map contents.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use tangle_core::{
    DocUpdate, EdgeId, EdgeRecord, GraphStore, NodeId, NodeRecord, PeerId, Position, Register,
    SharedDoc, Stamp, UpdateOp, WriteStamp,
};

fn peer(name: &str) -> PeerId {
    PeerId::new(name).unwrap_or_else(|e| panic!("invalid peer id {name}: {e}"))
}

fn node_id(raw: &str) -> NodeId {
    NodeId::parse(raw).unwrap_or_else(|e| panic!("invalid node id {raw}: {e}"))
}

fn edge_id(raw: &str) -> EdgeId {
    EdgeId::parse(raw).unwrap_or_else(|e| panic!("invalid edge id {raw}: {e}"))
}

fn node(id: &str, label: &str) -> NodeRecord {
    NodeRecord::new(node_id(id), Position::new(0.0, 0.0), "tangle").with_label(label)
}

fn edge(id: &str, source: &str, target: &str) -> EdgeRecord {
    EdgeRecord::new(edge_id(id), node_id(source), node_id(target), "tangle")
}

/// A peer plus the updates it has broadcast.
fn recording_doc(name: &str) -> (SharedDoc, Rc<RefCell<Vec<DocUpdate>>>, tangle_core::Subscription) {
    let doc = SharedDoc::new(peer(name));
    let updates: Rc<RefCell<Vec<DocUpdate>>> = Rc::default();
    let sink = Rc::clone(&updates);
    let sub = doc.subscribe_updates(move |u| sink.borrow_mut().push(u.clone()));
    (doc, updates, sub)
}

#[derive(Clone, Debug)]
enum Op {
    UpsertNode { id: u8, label: String },
    DeleteNode { id: u8 },
    UpsertEdge { id: u8, source: u8, target: u8 },
    DeleteEdge { id: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, "[a-z]{0,8}").prop_map(|(id, label)| Op::UpsertNode { id, label }),
        (0u8..6).prop_map(|id| Op::DeleteNode { id }),
        (0u8..6, 0u8..6, 0u8..6).prop_map(|(id, source, target)| Op::UpsertEdge {
            id,
            source,
            target
        }),
        (0u8..6).prop_map(|id| Op::DeleteEdge { id }),
    ]
}

fn run_ops(store: &GraphStore, ops: &[Op]) {
    for op in ops {
        match op {
            Op::UpsertNode { id, label } => {
                store.upsert_node(node(&format!("n{id}"), label));
            }
            Op::DeleteNode { id } => {
                store.delete_node(&node_id(&format!("n{id}")));
            }
            Op::UpsertEdge { id, source, target } => {
                store.upsert_edge(edge(
                    &format!("e{id}"),
                    &format!("n{source}"),
                    &format!("n{target}"),
                ));
            }
            Op::DeleteEdge { id } => {
                store.delete_edge(&edge_id(&format!("e{id}")));
            }
        }
    }
}

proptest! {
    #[test]
    fn peers_converge_under_arbitrary_delivery(
        ops_a in proptest::collection::vec(op_strategy(), 0..20),
        ops_b in proptest::collection::vec(op_strategy(), 0..20),
    ) {
        let (doc_a, updates_a, _sub_a) = recording_doc("alice");
        let (doc_b, updates_b, _sub_b) = recording_doc("bob");
        let store_a = GraphStore::new(doc_a.clone());
        let store_b = GraphStore::new(doc_b.clone());

        run_ops(&store_a, &ops_a);
        run_ops(&store_b, &ops_b);

        // Deliver in order to one side, reversed and duplicated to the
        // other; applied update sets are equal, delivery order is not.
        for update in updates_b.borrow().iter() {
            doc_a.apply_update(update);
        }
        for update in updates_a.borrow().iter().rev() {
            doc_b.apply_update(update);
            doc_b.apply_update(update);
        }

        prop_assert_eq!(doc_a.nodes(), doc_b.nodes());
        prop_assert_eq!(doc_a.edges(), doc_b.edges());
    }

    #[test]
    fn cascade_integrity_for_arbitrary_graphs(
        ops in proptest::collection::vec(op_strategy(), 0..30),
        victim in 0u8..6,
    ) {
        let store = GraphStore::new(SharedDoc::new(peer("solo")));
        run_ops(&store, &ops);

        let victim = node_id(&format!("n{victim}"));
        store.delete_node(&victim);

        for e in store.edges() {
            prop_assert_ne!(&e.source, &victim);
            prop_assert_ne!(&e.target, &victim);
        }
    }
}

#[test]
fn concurrent_field_edits_resolve_to_one_full_write() {
    // alice drags the node while bob edits its label; record-granularity
    // LWW means exactly one peer's whole record survives on both replicas.
    let doc_a = SharedDoc::new(peer("alice"));
    let doc_b = SharedDoc::new(peer("bob"));

    let base = node("n1", "base");
    let moved = NodeRecord {
        position: Position::new(120.0, 40.0),
        ..base.clone()
    };
    let relabeled = base.clone().with_label("renamed");

    let write_a = DocUpdate {
        ops: vec![UpdateOp::Node {
            key: "n1".into(),
            register: Register::live(moved.clone(), Stamp::new(WriteStamp::new(10, 0), peer("alice"))),
        }],
    };
    let write_b = DocUpdate {
        ops: vec![UpdateOp::Node {
            key: "n1".into(),
            register: Register::live(
                relabeled.clone(),
                Stamp::new(WriteStamp::new(10, 0), peer("bob")),
            ),
        }],
    };

    // Opposite delivery orders on the two replicas.
    doc_a.apply_update(&write_a);
    doc_a.apply_update(&write_b);
    doc_b.apply_update(&write_b);
    doc_b.apply_update(&write_a);

    assert_eq!(doc_a.nodes(), doc_b.nodes());
    let winner = &doc_a.nodes()[0];
    // bob wins the tiebreak; alice's drag is silently overwritten.
    assert_eq!(winner.attributes.label, "renamed");
    assert_eq!(winner.position, base.position);
}

#[test]
fn deletion_wins_against_older_concurrent_edit() {
    let doc_a = SharedDoc::new(peer("alice"));

    let create = DocUpdate {
        ops: vec![UpdateOp::Node {
            key: "n1".into(),
            register: Register::live(node("n1", "x"), Stamp::new(WriteStamp::new(5, 0), peer("bob"))),
        }],
    };
    let delete = DocUpdate {
        ops: vec![UpdateOp::Node {
            key: "n1".into(),
            register: Register::tombstone(Stamp::new(WriteStamp::new(6, 0), peer("carol"))),
        }],
    };

    // Tombstone delivered first; the older create must not resurrect.
    doc_a.apply_update(&delete);
    doc_a.apply_update(&create);

    assert!(doc_a.nodes().is_empty());
}
