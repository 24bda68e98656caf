//! CRDT primitives.
//!
//! The fundamental merge primitive for map entries. A deleted entry is a
//! tombstone register, not an absent key: deletion must replicate and win
//! against older concurrent writes exactly like any other write.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::time::Stamp;

/// A convergent replicated type.
///
/// Properties:
/// - Commutative: join(a, b) == join(b, a)
/// - Associative: join(join(a, b), c) == join(a, join(b, c))
/// - Idempotent: join(a, a) == a
pub trait Crdt: Sized {
    /// Merge two states into a new state that includes information from both.
    fn join(&self, other: &Self) -> Self;
}

/// Last-writer-wins register with tombstone deletion.
///
/// `value: None` is a tombstone. Higher stamp wins; the stamp's peer id
/// makes the order total, so the join is deterministic on every replica.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Register<T> {
    value: Option<T>,
    stamp: Stamp,
}

impl<T> Register<T> {
    pub fn live(value: T, stamp: Stamp) -> Self {
        Self {
            value: Some(value),
            stamp,
        }
    }

    pub fn tombstone(stamp: Stamp) -> Self {
        Self { value: None, stamp }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

impl<T: Clone> Crdt for Register<T> {
    fn join(&self, other: &Self) -> Self {
        if self.stamp >= other.stamp {
            self.clone()
        } else {
            other.clone()
        }
    }
}

#[cfg(test)]
pub mod laws {
    use super::*;

    /// Verify CRDT laws: associativity, commutativity, idempotence.
    pub fn check_crdt_laws<T: Crdt + PartialEq + Clone + Debug>(a: T, b: T, c: T) {
        // Idempotence
        assert_eq!(a.join(&a), a, "idempotence failed for {a:?}");

        // Commutativity
        assert_eq!(
            a.join(&b),
            b.join(&a),
            "commutativity failed for {a:?} and {b:?}"
        );

        // Associativity
        assert_eq!(
            a.join(&b).join(&c),
            a.join(&b.join(&c)),
            "associativity failed for {a:?}, {b:?}, {c:?}"
        );
    }
}
