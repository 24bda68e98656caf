//! Snapshot persistence boundary.
//!
//! One-shot capture of the graph for an external persistence collaborator.
//! The engine guarantees the capture is self-consistent (no dangling edges
//! from node removals); everything past the trait boundary is someone
//! else's storage problem, and its failures must never corrupt graph state.

use thiserror::Error;

use tangle_core::GraphSnapshot;

/// Failure at the persistence boundary. Always recoverable: the local
/// graph remains fully usable after any of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("snapshot destination unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot rejected by destination: {0}")]
    Rejected(String),
}

/// External persistence collaborator.
pub trait SnapshotGateway {
    fn persist(&mut self, snapshot: GraphSnapshot) -> Result<(), GatewayError>;
}
