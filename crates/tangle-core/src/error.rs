//! Core errors (parsing and validation).
//!
//! These are bounded and stable: core errors represent domain/refusal states,
//! not library implementation details. Map mutations themselves never fail;
//! deleting or recoloring a missing key is a silent no-op by contract.

use thiserror::Error;

/// Invalid identifier.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("node id `{raw}` is invalid: {reason}")]
    Node { raw: String, reason: String },
    #[error("edge id `{raw}` is invalid: {reason}")]
    Edge { raw: String, reason: String },
    #[error("peer id `{raw}` is invalid: {reason}")]
    Peer { raw: String, reason: String },
}

/// Invalid shape tag string.
#[derive(Debug, Error, Clone)]
#[error("shape `{raw}` is invalid")]
pub struct InvalidShape {
    pub raw: String,
}

/// Canonical error enum for the core crate.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    InvalidShape(#[from] InvalidShape),
}
