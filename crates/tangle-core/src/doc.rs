//! Shared replicated document.
//!
//! Two named LWW maps (`nodes`, `edges`) behind one cheaply clonable handle.
//! No peer owns the document; every holder of a handle to the same logical
//! document reads and writes both maps without coordination, and concurrent
//! writes resolve by the registers' stamp order.
//!
//! Scheduling is single-threaded cooperative: mutations and observer
//! callbacks run on the same logical thread. Events are dispatched after the
//! internal borrow is released, so a callback may freely read the document
//! or start another transaction.
//!
//! The transport is out of scope. `transact` emits one `DocUpdate` per
//! batch; delivering those updates to other peers (in any order) and calling
//! `apply_update` there is the transport's whole job.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::crdt::Register;
use super::identity::{EdgeId, NodeId, PeerId};
use super::map::{KeyChange, ReplicatedMap};
use super::record::{EdgeRecord, NodeRecord};
use super::time::{Hlc, Stamp};

/// Name of one of the document's replicated maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapName {
    Nodes,
    Edges,
}

impl MapName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapName::Nodes => "nodes",
            MapName::Edges => "edges",
        }
    }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change came from, as seen by this replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Diff event for one map: the keys whose live view changed in one batch.
///
/// This is the whole observer contract. Consumers may rebuild their derived
/// state from scratch or patch it key by key; the engine promises nothing
/// beyond "these keys changed in this batch".
#[derive(Clone, Debug)]
pub struct MapEvent {
    pub map: MapName,
    pub origin: Origin,
    pub changes: Vec<KeyChange>,
}

/// One keyed register write inside a replication update.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "map", rename_all = "snake_case")]
pub enum UpdateOp {
    Node {
        key: String,
        register: Register<NodeRecord>,
    },
    Edge {
        key: String,
        register: Register<EdgeRecord>,
    },
}

impl UpdateOp {
    fn stamp(&self) -> &Stamp {
        match self {
            UpdateOp::Node { register, .. } => register.stamp(),
            UpdateOp::Edge { register, .. } => register.stamp(),
        }
    }
}

/// The unit of exchange between peers: everything one transaction wrote.
///
/// Applying an update is idempotent and order-insensitive with respect to
/// other updates; peers that have applied the same set of updates hold
/// identical map contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocUpdate {
    pub ops: Vec<UpdateOp>,
}

/// Mutation batch under construction. Ops apply in insertion order within
/// one observable unit.
#[derive(Default)]
pub struct Txn {
    ops: Vec<TxnOp>,
}

enum TxnOp {
    SetNode(NodeRecord),
    DeleteNode(NodeId),
    SetEdge(EdgeRecord),
    DeleteEdge(EdgeId),
}

impl Txn {
    /// Insert or fully replace a node entry.
    pub fn set_node(&mut self, record: NodeRecord) {
        self.ops.push(TxnOp::SetNode(record));
    }

    /// Remove a node entry. No-op if the key is not live.
    pub fn delete_node(&mut self, id: &NodeId) {
        self.ops.push(TxnOp::DeleteNode(id.clone()));
    }

    /// Insert or fully replace an edge entry.
    pub fn set_edge(&mut self, record: EdgeRecord) {
        self.ops.push(TxnOp::SetEdge(record));
    }

    /// Remove an edge entry. No-op if the key is not live.
    pub fn delete_edge(&mut self, id: &EdgeId) {
        self.ops.push(TxnOp::DeleteEdge(id.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

type Callback<E> = Rc<dyn Fn(&E)>;

struct Registry<E> {
    next_id: u64,
    entries: Vec<(u64, Callback<E>)>,
}

impl<E> Registry<E> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, callback: Callback<E>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<Callback<E>> {
        self.entries.iter().map(|(_, cb)| Rc::clone(cb)).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct DocInner {
    peer: PeerId,
    clock: Hlc,
    nodes: ReplicatedMap<NodeRecord>,
    edges: ReplicatedMap<EdgeRecord>,
    node_observers: Registry<MapEvent>,
    edge_observers: Registry<MapEvent>,
    update_observers: Registry<DocUpdate>,
}

impl DocInner {
    fn stamp(&mut self) -> Stamp {
        Stamp::new(self.clock.tick(), self.peer.clone())
    }
}

enum SubTarget {
    Map(MapName),
    Updates,
}

/// Observer handle. Dropping it unsubscribes; keep it alive for as long as
/// the callback should fire.
pub struct Subscription {
    doc: Weak<RefCell<DocInner>>,
    target: SubTarget,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.doc.upgrade() {
            let mut inner = inner.borrow_mut();
            match self.target {
                SubTarget::Map(MapName::Nodes) => inner.node_observers.remove(self.id),
                SubTarget::Map(MapName::Edges) => inner.edge_observers.remove(self.id),
                SubTarget::Updates => inner.update_observers.remove(self.id),
            }
        }
    }
}

/// Handle to a shared replicated document. Clones refer to the same
/// document; the handle is deliberately not `Send` - the engine's
/// concurrency model is single-threaded cooperative per peer.
#[derive(Clone)]
pub struct SharedDoc {
    inner: Rc<RefCell<DocInner>>,
}

impl SharedDoc {
    pub fn new(peer: PeerId) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocInner {
                peer,
                clock: Hlc::new(),
                nodes: ReplicatedMap::new(),
                edges: ReplicatedMap::new(),
                node_observers: Registry::new(),
                edge_observers: Registry::new(),
                update_observers: Registry::new(),
            })),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.inner.borrow().peer.clone()
    }

    /// Run a mutation batch. All ops are stamped from the document clock,
    /// applied in order as one observable unit, then broadcast: at most one
    /// `MapEvent` per touched map to map observers (local view first), and
    /// one `DocUpdate` to update subscribers (the transport).
    pub fn transact(&self, f: impl FnOnce(&mut Txn)) {
        let mut txn = Txn::default();
        f(&mut txn);
        self.commit(txn);
    }

    fn commit(&self, txn: Txn) {
        if txn.is_empty() {
            return;
        }
        let (events, update) = {
            let mut inner = self.inner.borrow_mut();
            let mut ops = Vec::new();
            let mut node_changes = Vec::new();
            let mut edge_changes = Vec::new();

            for op in txn.ops {
                match op {
                    TxnOp::SetNode(record) => {
                        let stamp = inner.stamp();
                        let key = record.id.as_str().to_string();
                        let register = Register::live(record, stamp);
                        ops.push(UpdateOp::Node {
                            key: key.clone(),
                            register: register.clone(),
                        });
                        node_changes.extend(inner.nodes.write(key, register));
                    }
                    TxnOp::DeleteNode(id) => {
                        if !inner.nodes.contains(id.as_str()) {
                            continue;
                        }
                        let stamp = inner.stamp();
                        let key = id.as_str().to_string();
                        let register = Register::tombstone(stamp);
                        ops.push(UpdateOp::Node {
                            key: key.clone(),
                            register: register.clone(),
                        });
                        node_changes.extend(inner.nodes.write(key, register));
                    }
                    TxnOp::SetEdge(record) => {
                        let stamp = inner.stamp();
                        let key = record.id.as_str().to_string();
                        let register = Register::live(record, stamp);
                        ops.push(UpdateOp::Edge {
                            key: key.clone(),
                            register: register.clone(),
                        });
                        edge_changes.extend(inner.edges.write(key, register));
                    }
                    TxnOp::DeleteEdge(id) => {
                        if !inner.edges.contains(id.as_str()) {
                            continue;
                        }
                        let stamp = inner.stamp();
                        let key = id.as_str().to_string();
                        let register = Register::tombstone(stamp);
                        ops.push(UpdateOp::Edge {
                            key: key.clone(),
                            register: register.clone(),
                        });
                        edge_changes.extend(inner.edges.write(key, register));
                    }
                }
            }

            let mut events = Vec::new();
            if !node_changes.is_empty() {
                events.push(MapEvent {
                    map: MapName::Nodes,
                    origin: Origin::Local,
                    changes: node_changes,
                });
            }
            if !edge_changes.is_empty() {
                events.push(MapEvent {
                    map: MapName::Edges,
                    origin: Origin::Local,
                    changes: edge_changes,
                });
            }
            let update = (!ops.is_empty()).then_some(DocUpdate { ops });
            (events, update)
        };

        self.dispatch(events, update);
    }

    /// Merge a remote batch. Per-key LWW; keys whose winning register did
    /// not change produce no event entry, and a fully stale update fires
    /// nothing. Remote stamps advance the local clock (HLC receive rule).
    pub fn apply_update(&self, update: &DocUpdate) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            let mut node_changes = Vec::new();
            let mut edge_changes = Vec::new();

            for op in &update.ops {
                inner.clock.observe(&op.stamp().at);
                match op {
                    UpdateOp::Node { key, register } => {
                        node_changes.extend(inner.nodes.merge(key.clone(), register.clone()));
                    }
                    UpdateOp::Edge { key, register } => {
                        edge_changes.extend(inner.edges.merge(key.clone(), register.clone()));
                    }
                }
            }

            let mut events = Vec::new();
            if !node_changes.is_empty() {
                events.push(MapEvent {
                    map: MapName::Nodes,
                    origin: Origin::Remote,
                    changes: node_changes,
                });
            }
            if !edge_changes.is_empty() {
                events.push(MapEvent {
                    map: MapName::Edges,
                    origin: Origin::Remote,
                    changes: edge_changes,
                });
            }
            events
        };

        // Applying a remote update never re-broadcasts; relay policy is the
        // transport's concern.
        self.dispatch(events, None);
    }

    fn dispatch(&self, events: Vec<MapEvent>, update: Option<DocUpdate>) {
        for event in &events {
            let observers = {
                let inner = self.inner.borrow();
                match event.map {
                    MapName::Nodes => inner.node_observers.snapshot(),
                    MapName::Edges => inner.edge_observers.snapshot(),
                }
            };
            for callback in observers {
                callback(event);
            }
        }
        if let Some(update) = update {
            let observers = self.inner.borrow().update_observers.snapshot();
            for callback in observers {
                callback(&update);
            }
        }
    }

    /// Subscribe to one map's diff events. Fires for local and remote
    /// changes alike, after the batch is fully applied.
    pub fn observe(&self, map: MapName, callback: impl Fn(&MapEvent) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            match map {
                MapName::Nodes => inner.node_observers.add(Rc::new(callback)),
                MapName::Edges => inner.edge_observers.add(Rc::new(callback)),
            }
        };
        Subscription {
            doc: Rc::downgrade(&self.inner),
            target: SubTarget::Map(map),
            id,
        }
    }

    /// Subscribe to outgoing replication updates (the transport hook).
    pub fn subscribe_updates(&self, callback: impl Fn(&DocUpdate) + 'static) -> Subscription {
        let id = self.inner.borrow_mut().update_observers.add(Rc::new(callback));
        Subscription {
            doc: Rc::downgrade(&self.inner),
            target: SubTarget::Updates,
            id,
        }
    }

    pub fn observer_count(&self, map: MapName) -> usize {
        let inner = self.inner.borrow();
        match map {
            MapName::Nodes => inner.node_observers.len(),
            MapName::Edges => inner.edge_observers.len(),
        }
    }

    /// Live nodes in key order.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.inner.borrow().nodes.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Live edges in key order.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.inner.borrow().edges.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn node(&self, id: &NodeId) -> Option<NodeRecord> {
        self.inner.borrow().nodes.get(id.as_str()).cloned()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<EdgeRecord> {
        self.inner.borrow().edges.get(id.as_str()).cloned()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.inner.borrow().nodes.contains(id.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.live_len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.live_len()
    }
}
