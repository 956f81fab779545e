//! Test-outcome to requirement-status mapping.
//!
//! The engine consumes a plain mapping of test ids to outcomes plus the
//! test-to-requirement marker map; how those were collected (test framework
//! hooks, CI artifacts) is a collaborator concern. Proposing transitions and
//! committing them are separate steps, so a dry run falls out naturally.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::model::Status;
use crate::store::{RequirementPatch, RequirementStore};

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

/// Aggregated outcomes for one requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Contributing test ids, sorted.
    pub tests: Vec<String>,
}

impl RequirementCoverage {
    /// Total number of observed tests.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    fn record(&mut self, test_id: &str, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
        }
        self.tests.push(test_id.to_string());
    }
}

/// A proposed status change for one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub req_id: String,
    pub from: Status,
    pub to: Status,
}

/// Aggregate per-test outcomes into per-requirement coverage.
///
/// `markers` maps each test id to the requirement ids it verifies; tests
/// without an outcome entry are ignored, as are outcomes without markers.
pub fn collect_coverage(
    outcomes: &BTreeMap<String, TestOutcome>,
    markers: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, RequirementCoverage> {
    let mut coverage: BTreeMap<String, RequirementCoverage> = BTreeMap::new();

    for (test_id, outcome) in outcomes {
        let Some(req_ids) = markers.get(test_id) else {
            continue;
        };
        for req_id in req_ids {
            coverage
                .entry(req_id.clone())
                .or_default()
                .record(test_id, *outcome);
        }
    }

    for entry in coverage.values_mut() {
        entry.tests.sort();
        entry.tests.dedup();
    }
    coverage
}

/// The status a requirement should move to given its coverage, or `None`
/// when the observation does not justify a change.
///
/// Rules, applied in order:
/// - no observed tests: unchanged
/// - any failure while currently `COMPLETE`: regression to `PARTIAL`
/// - any failure otherwise: unchanged
/// - no failures and at least one pass: `COMPLETE`
/// - only skips: unchanged
pub fn proposed_status(current: Status, coverage: &RequirementCoverage) -> Option<Status> {
    if coverage.total() == 0 {
        return None;
    }
    if coverage.failed > 0 {
        return (current == Status::Complete).then_some(Status::Partial);
    }
    if coverage.passed > 0 {
        return (current != Status::Complete).then_some(Status::Complete);
    }
    // Skipped tests never trigger transitions.
    None
}

/// Compute the transitions a coverage run proposes for a store. Requirements
/// not present in the store are skipped with a warning.
pub fn proposed_transitions(
    store: &RequirementStore,
    coverage: &BTreeMap<String, RequirementCoverage>,
) -> Vec<StatusTransition> {
    let mut transitions = Vec::new();

    for (req_id, entry) in coverage {
        let Some(req) = store.lookup(req_id) else {
            warn!(req_id, "coverage references unknown requirement");
            continue;
        };
        if let Some(to) = proposed_status(req.status, entry) {
            transitions.push(StatusTransition {
                req_id: req_id.clone(),
                from: req.status,
                to,
            });
        }
    }

    transitions
}

/// Commit proposed transitions to the store. Ids that have disappeared since
/// the proposal are skipped. Returns the number of applied changes.
pub fn apply_transitions(store: &mut RequirementStore, transitions: &[StatusTransition]) -> usize {
    let mut applied = 0;
    for transition in transitions {
        match store.update(
            &transition.req_id,
            RequirementPatch::new().status(transition.to),
        ) {
            Ok(_) => {
                debug!(
                    req_id = %transition.req_id,
                    from = %transition.from,
                    to = %transition.to,
                    "applied coverage transition"
                );
                applied += 1;
            }
            Err(_) => {
                warn!(req_id = %transition.req_id, "skipping transition for missing requirement");
            }
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Requirement;

    fn outcomes(pairs: &[(&str, TestOutcome)]) -> BTreeMap<String, TestOutcome> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn markers(pairs: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        pairs
            .iter()
            .map(|(test, reqs)| {
                (
                    test.to_string(),
                    reqs.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn collect_aggregates_per_requirement() {
        let coverage = collect_coverage(
            &outcomes(&[
                ("t1", TestOutcome::Passed),
                ("t2", TestOutcome::Failed),
                ("t3", TestOutcome::Skipped),
            ]),
            &markers(&[
                ("t1", &["REQ-SW-001"]),
                ("t2", &["REQ-SW-001", "REQ-SW-002"]),
                ("t3", &["REQ-SW-002"]),
            ]),
        );

        let sw1 = &coverage["REQ-SW-001"];
        assert_eq!((sw1.passed, sw1.failed, sw1.skipped), (1, 1, 0));
        assert_eq!(sw1.total(), 2);
        assert_eq!(sw1.tests, vec!["t1".to_string(), "t2".to_string()]);

        let sw2 = &coverage["REQ-SW-002"];
        assert_eq!((sw2.passed, sw2.failed, sw2.skipped), (0, 1, 1));
    }

    #[test]
    fn unmarked_tests_are_ignored() {
        let coverage = collect_coverage(
            &outcomes(&[("t1", TestOutcome::Passed)]),
            &markers(&[]),
        );
        assert!(coverage.is_empty());
    }

    #[test]
    fn all_passing_proposes_complete() {
        let cov = RequirementCoverage {
            passed: 3,
            ..Default::default()
        };
        assert_eq!(proposed_status(Status::Missing, &cov), Some(Status::Complete));
        assert_eq!(
            proposed_status(Status::NotStarted, &cov),
            Some(Status::Complete)
        );
        // Already complete: nothing to do.
        assert_eq!(proposed_status(Status::Complete, &cov), None);
    }

    #[test]
    fn passes_with_skips_still_propose_complete() {
        let cov = RequirementCoverage {
            passed: 1,
            skipped: 4,
            ..Default::default()
        };
        assert_eq!(proposed_status(Status::Missing, &cov), Some(Status::Complete));
    }

    #[test]
    fn failure_regresses_only_complete() {
        let cov = RequirementCoverage {
            passed: 10,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(proposed_status(Status::Complete, &cov), Some(Status::Partial));
        assert_eq!(proposed_status(Status::Missing, &cov), None);
        assert_eq!(proposed_status(Status::Partial, &cov), None);
    }

    #[test]
    fn skip_only_and_empty_coverage_propose_nothing() {
        let skip_only = RequirementCoverage {
            skipped: 5,
            ..Default::default()
        };
        assert_eq!(proposed_status(Status::Missing, &skip_only), None);
        assert_eq!(proposed_status(Status::Missing, &RequirementCoverage::default()), None);
    }

    #[test]
    fn regression_round_trip_through_the_store() {
        let mut store = RequirementStore::new();
        let mut req = Requirement::new("REQ-SW-001");
        req.category = "SW".to_string();
        req.requirement_text = "tracked".to_string();
        store.add(req).unwrap();

        // First run: the single marked test passes.
        let coverage = collect_coverage(
            &outcomes(&[("t1", TestOutcome::Passed)]),
            &markers(&[("t1", &["REQ-SW-001"])]),
        );
        let transitions = proposed_transitions(&store, &coverage);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, Status::Complete);
        assert_eq!(apply_transitions(&mut store, &transitions), 1);
        assert_eq!(store.get("REQ-SW-001").unwrap().status, Status::Complete);

        // Second run: the same test fails; regression to PARTIAL.
        let coverage = collect_coverage(
            &outcomes(&[("t1", TestOutcome::Failed)]),
            &markers(&[("t1", &["REQ-SW-001"])]),
        );
        let transitions = proposed_transitions(&store, &coverage);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from, Status::Complete);
        assert_eq!(transitions[0].to, Status::Partial);
        apply_transitions(&mut store, &transitions);
        assert_eq!(store.get("REQ-SW-001").unwrap().status, Status::Partial);
    }

    #[test]
    fn apply_skips_missing_requirements() {
        let mut store = RequirementStore::new();
        let transitions = vec![StatusTransition {
            req_id: "REQ-GONE-001".to_string(),
            from: Status::Missing,
            to: Status::Complete,
        }];
        assert_eq!(apply_transitions(&mut store, &transitions), 0);
    }

    #[test]
    fn unknown_requirements_in_coverage_are_skipped() {
        let store = RequirementStore::new();
        let coverage = collect_coverage(
            &outcomes(&[("t1", TestOutcome::Passed)]),
            &markers(&[("t1", &["REQ-GONE-001"])]),
        );
        assert!(proposed_transitions(&store, &coverage).is_empty());
    }
}
