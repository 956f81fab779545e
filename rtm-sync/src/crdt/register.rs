//! Last-Writer-Wins registers.

use serde::{Deserialize, Serialize};

use super::stamp::Stamp;

/// A scalar cell with LWW merge: the greater stamp wins, so merges commute
/// and converge regardless of delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    value: T,
    stamp: Stamp,
}

impl<T: Clone> LwwRegister<T> {
    pub fn new(value: T, stamp: Stamp) -> Self {
        Self { value, stamp }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// Local assignment with a fresh stamp.
    pub fn set(&mut self, value: T, stamp: Stamp) {
        self.value = value;
        self.stamp = stamp;
    }

    /// Keep whichever write has the greater stamp. Returns true when the
    /// other side won.
    pub fn merge(&mut self, other: &LwwRegister<T>) -> bool {
        if other.stamp > self.stamp {
            self.value = other.value.clone();
            self.stamp = other.stamp;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(counter: u64, replica: u64) -> Stamp {
        Stamp { counter, replica }
    }

    #[test]
    fn later_write_wins() {
        let mut reg = LwwRegister::new("old", stamp(1, 1));
        assert!(reg.merge(&LwwRegister::new("new", stamp(2, 1))));
        assert_eq!(*reg.value(), "new");

        // An older write loses and reports no change.
        assert!(!reg.merge(&LwwRegister::new("stale", stamp(1, 9))));
        assert_eq!(*reg.value(), "new");
    }

    #[test]
    fn concurrent_writes_resolve_by_replica_id() {
        let mut a = LwwRegister::new("from-a", stamp(5, 1));
        let b = LwwRegister::new("from-b", stamp(5, 2));
        a.merge(&b);
        assert_eq!(*a.value(), "from-b");

        // Merging the other way is a no-op: same winner either way.
        let mut b2 = LwwRegister::new("from-b", stamp(5, 2));
        b2.merge(&LwwRegister::new("from-a", stamp(5, 1)));
        assert_eq!(*b2.value(), "from-b");
    }

    #[test]
    fn merge_is_idempotent() {
        let mut reg = LwwRegister::new(1, stamp(3, 1));
        let other = LwwRegister::new(2, stamp(4, 2));
        reg.merge(&other);
        let snapshot = reg.clone();
        reg.merge(&other);
        assert_eq!(reg, snapshot);
    }
}
