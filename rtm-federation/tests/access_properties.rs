//! Property-based tests for the authorization invariants: no privilege
//! escalation, bounded delegation, complete revocation.

use std::collections::BTreeSet;

use proptest::prelude::*;
use rtm_federation::{DelegationRole, TrustStore};

#[derive(Debug, Clone)]
enum Op {
    Grant(usize, usize, usize),
    Revoke(usize, usize, usize),
    Delegate(usize, usize, usize, usize),
}

const USERS: [&str; 3] = ["alice", "bob", "mallory"];
const REPOS: [&str; 3] = ["acme/base", "acme/radar", "acme/sync"];

fn role(idx: usize) -> DelegationRole {
    DelegationRole::ALL[idx % DelegationRole::ALL.len()]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize, 0..4usize).prop_map(|(u, r, p)| Op::Grant(u, r, p)),
        (0..3usize, 0..3usize, 0..4usize).prop_map(|(u, r, p)| Op::Revoke(u, r, p)),
        (0..3usize, 0..3usize, 0..3usize, 0..4usize)
            .prop_map(|(g, e, u, p)| Op::Delegate(g, e, u, p)),
    ]
}

/// Reference model: the set of grant tuples that SHOULD exist.
#[derive(Default)]
struct Model {
    grants: BTreeSet<(usize, usize, usize)>,
}

proptest! {
    #[test]
    fn invariants_hold_over_random_operation_sequences(
        ops in proptest::collection::vec(op_strategy(), 0..40)
    ) {
        let mut store = TrustStore::new();
        let mut model = Model::default();

        for op in &ops {
            match *op {
                Op::Grant(u, r, p) => {
                    store.grant(USERS[u], REPOS[r], role(p));
                    model.grants.insert((u, r, p % 4));
                }
                Op::Revoke(u, r, p) => {
                    store.revoke(USERS[u], REPOS[r], role(p));
                    // Complete revocation: the tuple is gone until regranted.
                    model.grants.remove(&(u, r, p % 4));
                    prop_assert!(!store.can_access(USERS[u], REPOS[r], role(p)));
                }
                Op::Delegate(g, e, u, p) => {
                    let had = model.grants.contains(&(u, g, p % 4));
                    let ok = store.delegate(REPOS[g], REPOS[e], USERS[u], role(p));
                    // Bounded delegation: success iff the user already held
                    // the role on the grantor.
                    prop_assert_eq!(ok, had);
                    if ok {
                        model.grants.insert((u, e, p % 4));
                    }
                }
            }

            // No privilege escalation, checked exhaustively after every
            // operation: can_access admits exactly the modeled grant set.
            for u in 0..USERS.len() {
                for r in 0..REPOS.len() {
                    for p in 0..DelegationRole::ALL.len() {
                        let expected = model.grants.contains(&(u, r, p));
                        let actual = store.can_access(USERS[u], REPOS[r], role(p));
                        prop_assert_eq!(actual, expected,
                            "mismatch for {}/{}/{:?}", USERS[u], REPOS[r], role(p));
                        // can_access and has_grant must agree.
                        prop_assert_eq!(
                            actual,
                            store.has_grant(USERS[u], REPOS[r], role(p))
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn grant_revoke_round_trip(u in 0..3usize, r in 0..3usize, p in 0..4usize) {
        let mut store = TrustStore::new();
        store.grant(USERS[u], REPOS[r], role(p));
        prop_assert!(store.can_access(USERS[u], REPOS[r], role(p)));
        store.revoke(USERS[u], REPOS[r], role(p));
        prop_assert!(!store.can_access(USERS[u], REPOS[r], role(p)));
    }

    #[test]
    fn delegation_without_grant_never_creates_access(
        g in 0..3usize, e in 0..3usize, u in 0..3usize, p in 0..4usize
    ) {
        let mut store = TrustStore::new();
        prop_assert!(!store.delegate(REPOS[g], REPOS[e], USERS[u], role(p)));
        prop_assert!(!store.can_access(USERS[u], REPOS[e], role(p)));
    }
}
