//! Time primitives.
//!
//! HLC-style stamps for last-writer-wins ordering. Wall time alone is not
//! enough: the counter keeps writes within one millisecond ordered, and the
//! peer id gives a deterministic tiebreak across replicas.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::identity::PeerId;

/// Write timestamp - the ordering primitive.
///
/// (wall_ms, counter) forms a total order within a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStamp {
    pub wall_ms: u64,
    pub counter: u32,
}

impl WriteStamp {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }
}

impl PartialOrd for WriteStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WriteStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

/// Wall clock reading in milliseconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallClock(pub u64);

impl WallClock {
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(ms)
    }
}

/// Stamp = WriteStamp + attribution.
///
/// This is what LWW compares - includes the peer for deterministic tiebreak.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub at: WriteStamp,
    pub by: PeerId,
}

impl Stamp {
    pub fn new(at: WriteStamp, by: PeerId) -> Self {
        Self { at, by }
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then_with(|| self.by.cmp(&other.by))
    }
}

/// Hybrid logical clock for one document handle.
///
/// `tick` issues strictly increasing stamps; `observe` is the receive rule,
/// pulling the clock forward past any remote stamp so local writes made
/// after a merge are never ordered before what they causally follow.
#[derive(Clone, Debug)]
pub struct Hlc {
    last: WriteStamp,
}

impl Hlc {
    pub fn new() -> Self {
        Self {
            last: WriteStamp::new(0, 0),
        }
    }

    pub fn tick(&mut self) -> WriteStamp {
        let now = WallClock::now().0;
        if now > self.last.wall_ms {
            self.last = WriteStamp::new(now, 0);
        } else {
            self.last = WriteStamp::new(self.last.wall_ms, self.last.counter + 1);
        }
        self.last.clone()
    }

    pub fn observe(&mut self, remote: &WriteStamp) {
        if *remote > self.last {
            self.last = remote.clone();
        }
    }
}

impl Default for Hlc {
    fn default() -> Self {
        Self::new()
    }
}
