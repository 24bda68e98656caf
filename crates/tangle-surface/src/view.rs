//! View reconciliation.
//!
//! ViewSync bridges the replicated store and a rendering layer: it owns the
//! derived LocalViewState, rebuilds it on every map event (local or remote
//! origin alike - the replicated maps are the single source of truth, the
//! view is always a full re-materialization of them), and translates
//! interaction deltas from the rendering layer back into store calls.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tangle_core::{
    EdgeId, EdgeRecord, GraphStore, MapName, NodeAttributes, NodeId, NodeRecord, Position, Shape,
    Subscription,
};

use crate::collide;
use crate::layout::{self, Anchor, LayoutDirection, LayoutOptions, Rect};
use crate::mermaid;
use crate::snapshot::{GatewayError, SnapshotGateway};

/// Kind tag stamped on nodes and edges created through this surface.
pub const DEFAULT_KIND: &str = "tangle";

/// Errors produced at the interaction boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurfaceError {
    /// A connect gesture referenced a node that does not exist. Edges to
    /// nonexistent endpoints are rejected here rather than stored.
    #[error("connect references missing node `{id}`")]
    UnknownEndpoint { id: NodeId },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Interaction-level change reported by the rendering layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionDelta {
    /// A node moved. While `dragging`, collision resolution runs and every
    /// displaced neighbor is written back too.
    PositionDrag {
        id: NodeId,
        position: Position,
        dragging: bool,
    },
    RemoveNode { id: NodeId },
    RemoveEdge { id: EdgeId },
    /// Connect gesture between two existing nodes.
    Connect { source: NodeId, target: NodeId },
    /// Drop-to-create carrying a screen-to-graph-transformed position.
    DropCreate {
        position: Position,
        shape: Shape,
        kind: String,
    },
}

/// A node as the rendering layer consumes it: the shared record plus the
/// handle anchors implied by the last layout direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub record: NodeRecord,
    pub source_anchor: Anchor,
    pub target_anchor: Anchor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewEdge {
    pub record: EdgeRecord,
}

/// Derived, ephemeral view of the graph. Rebuilt wholesale on change,
/// never mutated in place.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalViewState {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

type FitCallback = Rc<dyn Fn(Rect)>;

/// Observer bridge between the store and one rendering surface.
///
/// Dropping the ViewSync drops both map subscriptions; no callbacks leak
/// past the rendering layer's lifetime.
pub struct ViewSync {
    store: GraphStore,
    options: LayoutOptions,
    view: Rc<RefCell<LocalViewState>>,
    orientation: Rc<RefCell<Option<LayoutDirection>>>,
    fit: Rc<RefCell<Option<FitCallback>>>,
    _node_sub: Subscription,
    _edge_sub: Subscription,
}

fn anchors_for(orientation: Option<LayoutDirection>) -> (Anchor, Anchor) {
    match orientation {
        Some(LayoutDirection::Horizontal) => (Anchor::Right, Anchor::Left),
        // Untouched canvases render like a vertical flow: out the bottom,
        // in the top.
        Some(LayoutDirection::Vertical) | None => (Anchor::Bottom, Anchor::Top),
    }
}

fn rebuild_nodes(
    store: &GraphStore,
    view: &Rc<RefCell<LocalViewState>>,
    orientation: &Rc<RefCell<Option<LayoutDirection>>>,
) {
    let (source_anchor, target_anchor) = anchors_for(*orientation.borrow());
    let nodes = store
        .nodes()
        .into_iter()
        .map(|record| ViewNode {
            record,
            source_anchor,
            target_anchor,
        })
        .collect();
    view.borrow_mut().nodes = nodes;
}

fn rebuild_edges(store: &GraphStore, view: &Rc<RefCell<LocalViewState>>) {
    let edges = store
        .edges()
        .into_iter()
        .map(|record| ViewEdge { record })
        .collect();
    view.borrow_mut().edges = edges;
}

impl ViewSync {
    pub fn mount(store: GraphStore) -> Self {
        Self::mount_with_options(store, LayoutOptions::default())
    }

    pub fn mount_with_options(store: GraphStore, options: LayoutOptions) -> Self {
        let view: Rc<RefCell<LocalViewState>> = Rc::default();
        let orientation: Rc<RefCell<Option<LayoutDirection>>> = Rc::default();

        rebuild_nodes(&store, &view, &orientation);
        rebuild_edges(&store, &view);

        let doc = store.doc().clone();
        let node_sub = {
            let store = store.clone();
            let view = Rc::clone(&view);
            let orientation = Rc::clone(&orientation);
            doc.observe(MapName::Nodes, move |_| {
                rebuild_nodes(&store, &view, &orientation);
            })
        };
        let edge_sub = {
            let store = store.clone();
            let view = Rc::clone(&view);
            doc.observe(MapName::Edges, move |_| {
                rebuild_edges(&store, &view);
            })
        };

        Self {
            store,
            options,
            view,
            orientation,
            fit: Rc::default(),
            _node_sub: node_sub,
            _edge_sub: edge_sub,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Immutable snapshot of the current view.
    pub fn view(&self) -> LocalViewState {
        self.view.borrow().clone()
    }

    /// Register the viewport-fit callback invoked after a layout run.
    pub fn on_fit(&self, callback: impl Fn(Rect) + 'static) {
        *self.fit.borrow_mut() = Some(Rc::new(callback));
    }

    /// Translate interaction deltas into store mutations.
    ///
    /// A drag tick writes back the dragged node plus every neighbor the
    /// collision resolver displaced - one upsert each, so replication
    /// volume scales with local density, not with the number of nodes the
    /// user actually moved.
    pub fn apply_deltas(
        &self,
        deltas: impl IntoIterator<Item = InteractionDelta>,
    ) -> Result<(), SurfaceError> {
        for delta in deltas {
            match delta {
                InteractionDelta::PositionDrag {
                    id,
                    position,
                    dragging,
                } => {
                    let Some(mut dragged) = self.store.node(&id) else {
                        continue;
                    };
                    dragged.position = position;

                    if dragging {
                        let mut working = self.store.nodes();
                        if let Some(entry) = working.iter_mut().find(|n| n.id == id) {
                            entry.position = position;
                        }
                        let displaced = collide::resolve(&working, &id);

                        self.store.upsert_node(dragged);
                        for (moved, new_position) in displaced {
                            if let Some(mut record) = self.store.node(&moved) {
                                record.position = new_position;
                                self.store.upsert_node(record);
                            }
                        }
                    } else {
                        self.store.upsert_node(dragged);
                    }
                }
                InteractionDelta::RemoveNode { id } => {
                    self.store.delete_node(&id);
                }
                InteractionDelta::RemoveEdge { id } => {
                    self.store.delete_edge(&id);
                }
                InteractionDelta::Connect { source, target } => {
                    for endpoint in [&source, &target] {
                        if !self.store.contains_node(endpoint) {
                            return Err(SurfaceError::UnknownEndpoint {
                                id: (*endpoint).clone(),
                            });
                        }
                    }
                    let id = EdgeId::connecting(&source, &target);
                    self.store
                        .upsert_edge(EdgeRecord::new(id, source, target, DEFAULT_KIND));
                }
                InteractionDelta::DropCreate {
                    position,
                    shape,
                    kind,
                } => {
                    let label = if shape == Shape::RoundedRectangle {
                        ""
                    } else {
                        "New Idea"
                    };
                    self.store.upsert_node(NodeRecord {
                        id: NodeId::generate(),
                        position,
                        kind,
                        attributes: NodeAttributes {
                            label: label.to_string(),
                            shape,
                            color: None,
                        },
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace a node's label. Whole-record write: a concurrent remote edit
    /// to any other field of the same record loses wholesale. Missing ids
    /// are ignored.
    pub fn set_node_label(&self, id: &NodeId, label: impl Into<String>) {
        if let Some(mut record) = self.store.node(id) {
            record.attributes.label = label.into();
            self.store.upsert_node(record);
        }
    }

    /// Replace a node's color and overwrite the color of every outgoing
    /// edge to match. Missing ids are ignored.
    pub fn set_node_color(&self, id: &NodeId, color: &str) {
        if let Some(mut record) = self.store.node(id) {
            record.attributes.color = Some(color.to_string());
            self.store.upsert_node(record);
            self.store.recolor_outgoing(id, color);
        }
    }

    /// Run the layered layout and write every computed position back into
    /// the store as one batch. This deliberately overwrites all manual
    /// positioning - an explicit user action, never background behavior.
    /// Afterwards the registered fit callback receives the layout bounds.
    pub fn run_layout(&self, direction: LayoutDirection) {
        let nodes = self.store.nodes();
        let edges = self.store.edges();
        let result = layout::layout(&nodes, &edges, direction, &self.options);

        *self.orientation.borrow_mut() = Some(direction);

        let mut positions: BTreeMap<String, Position> = result
            .nodes
            .iter()
            .map(|p| (p.id.to_string(), p.position))
            .collect();
        let count = positions.len();
        self.store.doc().transact(|txn| {
            for mut record in nodes {
                if let Some(position) = positions.remove(record.id.as_str()) {
                    record.position = position;
                    txn.set_node(record);
                }
            }
        });
        info!(nodes = count, direction = direction.as_flag(), "applied auto layout");

        let callback = self.fit.borrow().clone();
        if let Some(callback) = callback {
            callback(result.bounds);
        }
    }

    /// Deterministic mermaid text of the current view.
    pub fn export_mermaid(&self) -> String {
        let view = self.view.borrow();
        let nodes: Vec<NodeRecord> = view.nodes.iter().map(|n| n.record.clone()).collect();
        let edges: Vec<EdgeRecord> = view.edges.iter().map(|e| e.record.clone()).collect();
        mermaid::to_mermaid(&nodes, &edges)
    }

    /// One-shot snapshot capture handed to the persistence collaborator.
    /// Failure is recoverable and leaves graph state untouched.
    pub fn save_snapshot(&self, gateway: &mut dyn SnapshotGateway) -> Result<(), SurfaceError> {
        let snapshot = self.store.snapshot();
        gateway.persist(snapshot).map_err(|error| {
            warn!(%error, "snapshot persistence failed");
            SurfaceError::from(error)
        })
    }
}
