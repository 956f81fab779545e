//! Requirement records and their enumerated fields.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::refs::RequirementRef;
use crate::store::RequirementStore;

/// Completion status of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Complete,
    Partial,
    Missing,
    NotStarted,
}

impl Status {
    /// All members, in display order.
    pub const ALL: [Status; 4] = [
        Status::Complete,
        Status::Partial,
        Status::Missing,
        Status::NotStarted,
    ];

    /// Parse a persisted status value, normalizing separators and case.
    /// Unknown values fall back to `Missing` (the original tables contain
    /// free-hand entries; the schema validator flags them at the codec
    /// boundary).
    pub fn from_str_lossy(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "COMPLETE" => Self::Complete,
            "PARTIAL" => Self::Partial,
            "NOT_STARTED" => Self::NotStarted,
            _ => Self::Missing,
        }
    }

    /// Canonical persisted spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "COMPLETE",
            Self::Partial => "PARTIAL",
            Self::Missing => "MISSING",
            Self::NotStarted => "NOT_STARTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    P0,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All members, most urgent first.
    pub const ALL: [Priority; 4] = [Priority::P0, Priority::High, Priority::Medium, Priority::Low];

    /// Parse a persisted priority value. `CRITICAL` is a legacy spelling of
    /// `P0`; unknown values fall back to `Medium`.
    pub fn from_str_lossy(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "P0" | "CRITICAL" => Self::P0,
            "HIGH" => Self::High,
            "LOW" => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Canonical persisted spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single requirement row.
///
/// `dependencies` and `blocks` are unordered id sets with the reciprocity
/// invariant: `A ∈ blocks(B)` ⇔ `B ∈ dependencies(A)` for local references.
/// `extra` carries schema-extension columns that are not part of the core
/// twenty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub req_id: String,
    pub category: String,
    pub subcategory: String,
    pub requirement_text: String,
    pub target_value: String,
    pub test_module: String,
    pub test_function: String,
    pub validation_method: String,
    pub status: Status,
    pub priority: Priority,
    pub phase: Option<i64>,
    pub notes: String,
    pub effort_weeks: Option<f64>,
    pub dependencies: BTreeSet<String>,
    pub blocks: BTreeSet<String>,
    pub assignee: String,
    pub sprint: String,
    pub started_date: String,
    pub completed_date: String,
    pub requirement_file: String,
    pub external_id: String,
    pub extra: BTreeMap<String, String>,
}

impl Default for Status {
    fn default() -> Self {
        Self::Missing
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Requirement {
    /// Create a requirement with just an id; remaining fields take defaults.
    pub fn new(req_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            ..Self::default()
        }
    }

    /// Whether a verifying test is linked. The literal `MISSING` marks an
    /// intentionally absent link in legacy tables.
    pub fn has_test(&self) -> bool {
        !matches!(self.test_module.as_str(), "" | "MISSING")
            && !matches!(self.test_function.as_str(), "" | "MISSING")
    }

    /// Whether the requirement is fully complete.
    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// Whether any resolvable local dependency is incomplete.
    ///
    /// Cross-repo dependencies and dangling local references are skipped:
    /// what cannot be verified does not block.
    pub fn is_blocked(&self, store: &RequirementStore) -> bool {
        self.dependencies.iter().any(|raw| {
            let parsed = RequirementRef::parse(raw);
            if !parsed.is_local() {
                return false;
            }
            store
                .lookup(parsed.req_id())
                .is_some_and(|dep| dep.status != Status::Complete)
        })
    }
}
