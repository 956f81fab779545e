//! Store-level validation: schema errors, dependency/blocks reciprocity,
//! and cycle warnings.
//!
//! All check functions are pure over the store and return diagnostic lists;
//! only [`fix_reciprocity`] mutates. Diagnostics are stable strings in store
//! order so they can be snapshot-tested.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::refs::{RequirementRef, looks_like_req_id};
use crate::store::RequirementStore;

/// What kind of reciprocity problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReciprocityKind {
    /// `other ∈ blocks(req)` but `req ∉ dependencies(other)`.
    MissingDependency,
    /// `other ∈ dependencies(req)` but `req ∉ blocks(other)`.
    MissingBlocks,
    /// `blocks(req)` names a requirement that does not exist.
    DanglingBlocks,
    /// `dependencies(req)` names a requirement that does not exist.
    DanglingDependency,
}

/// One reciprocity violation between two requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReciprocityIssue {
    pub req_id: String,
    pub other_id: String,
    pub kind: ReciprocityKind,
}

impl ReciprocityIssue {
    fn new(req_id: &str, other_id: &str, kind: ReciprocityKind) -> Self {
        Self {
            req_id: req_id.to_string(),
            other_id: other_id.to_string(),
            kind,
        }
    }

    /// Whether this issue is a dangling reference rather than a repairable
    /// asymmetry.
    pub fn is_dangling(&self) -> bool {
        matches!(
            self.kind,
            ReciprocityKind::DanglingBlocks | ReciprocityKind::DanglingDependency
        )
    }
}

impl fmt::Display for ReciprocityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ReciprocityKind::MissingDependency => write!(
                f,
                "{} blocks {} but {} does not list it as a dependency",
                self.req_id, self.other_id, self.other_id
            ),
            ReciprocityKind::MissingBlocks => write!(
                f,
                "{} depends on {} but {} does not list it in blocks",
                self.req_id, self.other_id, self.other_id
            ),
            ReciprocityKind::DanglingBlocks => write!(
                f,
                "{} blocks non-existent requirement {}",
                self.req_id, self.other_id
            ),
            ReciprocityKind::DanglingDependency => write!(
                f,
                "{} depends on non-existent requirement {}",
                self.req_id, self.other_id
            ),
        }
    }
}

/// Combined non-mutating validation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Schema-level errors.
    pub errors: Vec<String>,
    /// Cycle warnings.
    pub warnings: Vec<String>,
    /// Reciprocity violations.
    pub reciprocity: Vec<ReciprocityIssue>,
}

impl ValidationReport {
    /// Whether the store passed every check.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.reciprocity.is_empty()
    }
}

/// Schema-level validation: required fields, phase and effort ranges,
/// reference shapes, and dangling local references.
///
/// Enumerated-value membership for status and priority is enforced on raw
/// cells at the codec boundary (see `schema::core_schema`); records in a
/// store already carry well-formed enum values.
pub fn validate_schema(store: &RequirementStore) -> Vec<String> {
    let mut errors = Vec::new();

    for req in store.all() {
        let id = display_id(&req.req_id);

        if req.req_id.trim().is_empty() {
            errors.push(format!("{id}: missing required field 'req_id'"));
        } else if !looks_like_req_id(&req.req_id) {
            errors.push(format!(
                "{id}: malformed req_id (expected REQ-<CATEGORY>-<NNN>)"
            ));
        }
        if req.category.trim().is_empty() {
            errors.push(format!("{id}: missing required field 'category'"));
        }
        if req.requirement_text.trim().is_empty() {
            errors.push(format!("{id}: missing required field 'requirement_text'"));
        }
        if let Some(phase) = req.phase {
            if phase < 1 {
                errors.push(format!("{id}: phase must be >= 1 (got {phase})"));
            }
        }
        if let Some(effort) = req.effort_weeks {
            if effort < 0.0 {
                errors.push(format!("{id}: effort_weeks must be >= 0 (got {effort})"));
            }
        }

        for raw in &req.dependencies {
            check_reference(store, &id, raw, "dependency", &mut errors);
        }
        for raw in &req.blocks {
            check_reference(store, &id, raw, "blocks", &mut errors);
        }
    }

    errors
}

fn check_reference(
    store: &RequirementStore,
    id: &str,
    raw: &str,
    field: &str,
    errors: &mut Vec<String>,
) {
    let parsed = RequirementRef::parse(raw);
    if !parsed.is_local() {
        // Cross-repo references are verified by the federation layer.
        return;
    }
    if !looks_like_req_id(parsed.req_id()) {
        errors.push(format!("{id}: malformed {field} reference '{raw}'"));
    } else if !store.exists(parsed.req_id()) {
        let verb = if field == "dependency" {
            "depends on"
        } else {
            "blocks"
        };
        errors.push(format!("{id}: {verb} non-existent requirement {raw}"));
    }
}

fn display_id(req_id: &str) -> String {
    if req_id.trim().is_empty() {
        "<missing id>".to_string()
    } else {
        req_id.to_string()
    }
}

/// Check the dependency/blocks duality for every local reference.
pub fn check_reciprocity(store: &RequirementStore) -> Vec<ReciprocityIssue> {
    let mut issues = Vec::new();

    for req in store.all() {
        for raw in &req.blocks {
            let parsed = RequirementRef::parse(raw);
            if !parsed.is_local() {
                continue;
            }
            match store.lookup(parsed.req_id()) {
                None => issues.push(ReciprocityIssue::new(
                    &req.req_id,
                    raw,
                    ReciprocityKind::DanglingBlocks,
                )),
                Some(other) => {
                    if !other.dependencies.contains(&req.req_id) {
                        issues.push(ReciprocityIssue::new(
                            &req.req_id,
                            raw,
                            ReciprocityKind::MissingDependency,
                        ));
                    }
                }
            }
        }
        for raw in &req.dependencies {
            let parsed = RequirementRef::parse(raw);
            if !parsed.is_local() {
                continue;
            }
            match store.lookup(parsed.req_id()) {
                None => issues.push(ReciprocityIssue::new(
                    &req.req_id,
                    raw,
                    ReciprocityKind::DanglingDependency,
                )),
                Some(other) => {
                    if !other.blocks.contains(&req.req_id) {
                        issues.push(ReciprocityIssue::new(
                            &req.req_id,
                            raw,
                            ReciprocityKind::MissingBlocks,
                        ));
                    }
                }
            }
        }
    }

    issues
}

/// Re-establish the duality in place: wherever one side references an
/// existing counterpart, the missing inverse is added. Dangling references
/// are skipped. Returns the number of links added.
pub fn fix_reciprocity(store: &mut RequirementStore) -> usize {
    let issues = check_reciprocity(store);
    let mut fixed = 0;

    for issue in issues {
        let changed = match issue.kind {
            // A blocks B, so B must depend on A.
            ReciprocityKind::MissingDependency => store.link(&issue.other_id, &issue.req_id, true),
            // A depends on D, so D must block A.
            ReciprocityKind::MissingBlocks => store.link(&issue.other_id, &issue.req_id, false),
            ReciprocityKind::DanglingBlocks | ReciprocityKind::DanglingDependency => false,
        };
        if changed {
            fixed += 1;
        }
    }

    if fixed > 0 {
        debug!(fixed, "repaired reciprocity violations");
    }
    fixed
}

/// Wrap cycle detection into human-readable warnings, one per cycle, each
/// including an example path.
pub fn validate_cycles(store: &RequirementStore) -> Vec<String> {
    let graph = store.graph();
    graph
        .find_cycles()
        .into_iter()
        .map(|members| {
            let set: BTreeSet<String> = members.iter().cloned().collect();
            let path = graph.find_cycle_path(&set);
            format!(
                "circular dependency involving {} requirements: {}",
                set.len(),
                path.join(" -> ")
            )
        })
        .collect()
}

/// Schema + cycles + reciprocity, without mutating the store.
pub fn validate_all(store: &RequirementStore) -> ValidationReport {
    ValidationReport {
        errors: validate_schema(store),
        warnings: validate_cycles(store),
        reciprocity: check_reciprocity(store),
    }
}
