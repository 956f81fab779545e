//! Logical time: Lamport stamps, the per-document clock, and state vectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Lamport timestamp. Total order: counter first, replica id as the
/// tiebreaker, so concurrent writes from different replicas always have a
/// deterministic winner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Stamp {
    pub counter: u64,
    pub replica: u64,
}

impl Stamp {
    /// Sorts before every stamp a clock can produce.
    pub const ZERO: Stamp = Stamp {
        counter: 0,
        replica: 0,
    };
}

/// Per-document Lamport clock.
#[derive(Debug, Clone)]
pub struct LamportClock {
    replica: u64,
    counter: u64,
}

impl LamportClock {
    pub fn new(replica: u64) -> Self {
        Self {
            replica,
            counter: 0,
        }
    }

    pub fn replica(&self) -> u64 {
        self.replica
    }

    /// Advance and return a fresh stamp for a local operation.
    pub fn tick(&mut self) -> Stamp {
        self.counter += 1;
        Stamp {
            counter: self.counter,
            replica: self.replica,
        }
    }

    /// Fold in a remotely observed stamp so future local stamps sort after
    /// everything seen.
    pub fn observe(&mut self, stamp: Stamp) {
        self.counter = self.counter.max(stamp.counter);
    }
}

/// Compact description of "what this replica has": the highest counter seen
/// per replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateVector {
    entries: BTreeMap<u64, u64>,
}

impl StateVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stamp.
    pub fn observe(&mut self, stamp: Stamp) {
        let entry = self.entries.entry(stamp.replica).or_insert(0);
        *entry = (*entry).max(stamp.counter);
    }

    /// Whether a stamp is already covered.
    pub fn contains(&self, stamp: Stamp) -> bool {
        self.entries
            .get(&stamp.replica)
            .is_some_and(|max| *max >= stamp.counter)
    }

    /// Per-replica maximum of both vectors.
    pub fn merge(&mut self, other: &StateVector) {
        for (replica, counter) in &other.entries {
            let entry = self.entries.entry(*replica).or_insert(0);
            *entry = (*entry).max(*counter);
        }
    }

    /// Highest counter recorded for any replica. Local clocks fold this in
    /// after a merge so fresh stamps sort after everything the vector
    /// already claims.
    pub fn max_counter(&self) -> u64 {
        self.entries.values().copied().max().unwrap_or(0)
    }

    /// Sorted `(replica, counter)` pairs for the wire.
    pub fn to_pairs(&self) -> Vec<(u64, u64)> {
        self.entries.iter().map(|(r, c)| (*r, *c)).collect()
    }

    pub fn from_pairs(pairs: &[(u64, u64)]) -> Self {
        Self {
            entries: pairs.iter().copied().collect(),
        }
    }
}
