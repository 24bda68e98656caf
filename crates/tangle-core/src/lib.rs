//! Core state types for tangle, a conflict-free collaborative mind-map
//! engine.
//!
//! Module hierarchy follows type dependency order:
//! - identity: PeerId, NodeId, EdgeId
//! - time: WriteStamp, Stamp, Hlc
//! - record: NodeRecord, EdgeRecord
//! - crdt: Register<T>
//! - map: ReplicatedMap<T>
//! - doc: SharedDoc, DocUpdate, MapEvent
//! - store: GraphStore, GraphSnapshot
//!
//! The shared document is the only shared mutable resource: every peer
//! holding a handle reads and writes both maps without coordination, and
//! concurrent writes converge via key-granularity last-writer-wins. Record
//! updates are whole-record replacements; there is deliberately no
//! field-level merge.

#![forbid(unsafe_code)]

pub mod crdt;
pub mod doc;
pub mod error;
pub mod identity;
pub mod map;
pub mod record;
pub mod store;
pub mod time;

pub use crdt::{Crdt, Register};
pub use doc::{DocUpdate, MapEvent, MapName, Origin, SharedDoc, Subscription, Txn, UpdateOp};
pub use error::{CoreError, InvalidId, InvalidShape};
pub use identity::{EdgeId, NodeId, PeerId};
pub use map::{ChangeKind, KeyChange, ReplicatedMap};
pub use record::{EdgeAttributes, EdgeRecord, NodeAttributes, NodeRecord, Position, Shape};
pub use store::{GraphSnapshot, GraphStore};
pub use time::{Hlc, Stamp, WallClock, WriteStamp};
