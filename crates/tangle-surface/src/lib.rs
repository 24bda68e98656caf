//! Rendering-surface half of the tangle engine.
//!
//! Everything a rendering layer talks to: the ViewSync reconciliation
//! bridge, the layered layout engine, drag-time collision resolution,
//! mermaid export, and the snapshot persistence boundary. All of it is
//! synchronous with respect to the local process; the only asynchronous
//! boundary is the replication transport behind `tangle_core::SharedDoc`.

#![forbid(unsafe_code)]

pub mod collide;
pub mod layout;
pub mod mermaid;
pub mod snapshot;
pub mod view;

pub use collide::{resolve, COLLISION_BUFFER, MIN_SEPARATION, NODE_DIAMETER};
pub use layout::{layout, Anchor, Layout, LayoutDirection, LayoutOptions, PlacedNode, Rect};
pub use mermaid::to_mermaid;
pub use snapshot::{GatewayError, SnapshotGateway};
pub use view::{
    InteractionDelta, LocalViewState, SurfaceError, ViewEdge, ViewNode, ViewSync, DEFAULT_KIND,
};
