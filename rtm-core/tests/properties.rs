//! Property suite over randomly generated stores.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use rtm_core::{
    Priority, Requirement, RequirementStore, Status, TestOutcome, collect_coverage,
    fix_reciprocity, proposed_status, table, validate_schema,
};

fn gen_id(index: usize) -> String {
    format!("REQ-GEN-{:03}", index + 1)
}

/// A random store of `n` requirements whose dependencies only point at
/// higher-numbered ids, so the graph is acyclic by construction.
fn acyclic_store(n: usize, edge_bits: &[bool]) -> RequirementStore {
    let mut store = RequirementStore::new();
    let mut bit = 0;
    for i in 0..n {
        let mut req = Requirement::new(gen_id(i));
        req.category = "GEN".to_string();
        req.requirement_text = format!("generated {i}");
        for j in (i + 1)..n {
            if edge_bits.get(bit).copied().unwrap_or(false) {
                req.dependencies.insert(gen_id(j));
            }
            bit += 1;
        }
        store.add(req).unwrap();
    }
    store
}

proptest! {
    #[test]
    fn validator_output_is_deterministic(n in 1usize..8, bits in proptest::collection::vec(any::<bool>(), 0..64)) {
        let store = acyclic_store(n, &bits);
        prop_assert_eq!(validate_schema(&store), validate_schema(&store));
    }

    #[test]
    fn fix_reciprocity_leaves_no_repairable_issues(n in 1usize..8, bits in proptest::collection::vec(any::<bool>(), 0..64)) {
        let mut store = acyclic_store(n, &bits);
        fix_reciprocity(&mut store);
        let remaining = store.check_reciprocity();
        prop_assert!(remaining.iter().all(|issue| issue.is_dangling()),
            "non-dangling issues survived repair: {remaining:?}");
    }

    #[test]
    fn transitive_blocks_mirrors_transitive_dependencies(n in 2usize..8, bits in proptest::collection::vec(any::<bool>(), 0..64)) {
        let store = acyclic_store(n, &bits);
        let graph = store.graph();
        for i in 0..n {
            for j in 0..n {
                let a = gen_id(i);
                let b = gen_id(j);
                let forward = graph.transitive_dependencies(&a).contains(&b);
                let backward = graph.transitive_blocks(&b).contains(&a);
                prop_assert_eq!(forward, backward, "asymmetry between {} and {}", a, b);
            }
        }
    }

    #[test]
    fn topological_sort_is_a_consistent_permutation(n in 1usize..8, bits in proptest::collection::vec(any::<bool>(), 0..64)) {
        let store = acyclic_store(n, &bits);
        let graph = store.graph();
        let order = graph.topological_sort().expect("acyclic by construction");

        let mut sorted = order.clone();
        sorted.sort();
        let mut ids: Vec<String> = (0..n).map(gen_id).collect();
        ids.sort();
        prop_assert_eq!(sorted, ids);

        let index: BTreeMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        for id in order.iter() {
            for dep in graph.dependencies(id) {
                prop_assert!(index[dep.as_str()] < index[id.as_str()],
                    "dependency {} does not precede {}", dep, id);
            }
        }
    }

    #[test]
    fn record_row_round_trip(
        idx in 0usize..999,
        category in "[A-Z]{2,6}",
        text in "[ -~]{0,40}",
        notes in "[ -~]{0,40}",
        phase in proptest::option::of(1i64..9),
        effort in proptest::option::of(0u32..80),
        status_pick in 0usize..4,
        priority_pick in 0usize..4,
        dep_indices in proptest::collection::btree_set(0usize..50, 0..5),
    ) {
        let mut req = Requirement::new(format!("REQ-{category}-{idx:03}"));
        req.category = category;
        req.requirement_text = text;
        req.notes = notes;
        req.phase = phase;
        req.effort_weeks = effort.map(|e| f64::from(e) / 4.0);
        req.status = Status::ALL[status_pick];
        req.priority = Priority::ALL[priority_pick];
        req.dependencies = dep_indices.iter().map(|i| gen_id(*i)).collect();

        let row = table::record_to_row(&req);
        let back = table::record_from_row(&row);
        prop_assert_eq!(back, req);
    }

    #[test]
    fn all_passing_tests_propose_complete(passed in 1usize..20, skipped in 0usize..20, current_pick in 0usize..4) {
        let current = Status::ALL[current_pick];
        let mut outcomes: BTreeMap<String, TestOutcome> = BTreeMap::new();
        let mut markers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for i in 0..passed {
            let id = format!("t{i}");
            outcomes.insert(id.clone(), TestOutcome::Passed);
            markers.insert(id, ["REQ-GEN-001".to_string()].into_iter().collect());
        }
        for i in 0..skipped {
            let id = format!("s{i}");
            outcomes.insert(id.clone(), TestOutcome::Skipped);
            markers.insert(id, ["REQ-GEN-001".to_string()].into_iter().collect());
        }

        let coverage = collect_coverage(&outcomes, &markers);
        let proposal = proposed_status(current, &coverage["REQ-GEN-001"]);
        if current == Status::Complete {
            prop_assert_eq!(proposal, None);
        } else {
            prop_assert_eq!(proposal, Some(Status::Complete));
        }
    }
}
