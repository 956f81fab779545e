//! Grant delegations between repositories: roles, constraints, and the
//! authorization decision function.
//!
//! Decisions are pure: the evaluation time is passed in, never read
//! ambiently, so the same inputs always produce the same answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Roles that can be delegated between repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationRole {
    /// May see dependency structure and status.
    DependencyViewer,
    /// May read requirement details.
    RequirementReader,
    /// May modify requirements.
    RequirementEditor,
    /// May only see shadow/hash views.
    ShadowViewer,
}

impl DelegationRole {
    pub const ALL: [DelegationRole; 4] = [
        DelegationRole::DependencyViewer,
        DelegationRole::RequirementReader,
        DelegationRole::RequirementEditor,
        DelegationRole::ShadowViewer,
    ];

    /// Persisted spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependencyViewer => "dependency_viewer",
            Self::RequirementReader => "requirement_reader",
            Self::RequirementEditor => "requirement_editor",
            Self::ShadowViewer => "shadow_viewer",
        }
    }
}

/// Limits on what a delegation applies to.
///
/// Precedence, per decision: exclusions first, then the id-include set, then
/// the category-include set. Empty include sets admit everything not
/// excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantConstraint {
    /// Admit only these categories (empty: no category restriction).
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Admit only these requirement ids (empty: no id restriction).
    #[serde(default)]
    pub requirement_ids: BTreeSet<String>,
    /// Always deny these categories.
    #[serde(default)]
    pub exclude_categories: BTreeSet<String>,
    /// Hard expiry; `None` never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantConstraint {
    /// Unconstrained.
    pub fn any() -> Self {
        Self::default()
    }

    /// Constrain to a category set.
    pub fn for_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Constrain to explicit requirement ids.
    pub fn for_requirements<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requirement_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn excluding<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_categories
            .extend(categories.into_iter().map(Into::into));
        self
    }

    /// Whether the constraint has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Whether the constraint admits a requirement.
    pub fn allows_requirement(&self, req_id: &str, category: &str, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.exclude_categories.contains(category) {
            return false;
        }
        if !self.requirement_ids.is_empty() {
            return self.requirement_ids.contains(req_id);
        }
        if !self.categories.is_empty() {
            return self.categories.contains(category);
        }
        true
    }
}

/// Delegation of access from one repository to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDelegation {
    /// Repository granting access (`owner/repo`).
    pub grantor: String,
    /// Repository receiving access (`owner/repo`).
    pub grantee: String,
    /// Roles conveyed by this delegation.
    pub roles: BTreeSet<DelegationRole>,
    #[serde(default)]
    pub constraint: GrantConstraint,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    /// Deactivated delegations deny everything but are kept for audit.
    pub active: bool,
}

impl GrantDelegation {
    pub fn new(
        grantor: impl Into<String>,
        grantee: impl Into<String>,
        roles: impl IntoIterator<Item = DelegationRole>,
        constraint: GrantConstraint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            grantor: grantor.into(),
            grantee: grantee.into(),
            roles: roles.into_iter().collect(),
            constraint,
            created_at: now,
            created_by: String::new(),
            active: true,
        }
    }

    /// Active and unexpired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.constraint.is_expired(now)
    }

    pub fn has_role(&self, role: DelegationRole) -> bool {
        self.roles.contains(&role)
    }

    /// The authorization decision function: admit iff the delegation is
    /// valid, conveys the requested role, and its constraint admits the
    /// requirement.
    pub fn allows_access(
        &self,
        req_id: &str,
        category: &str,
        role: DelegationRole,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_valid(now)
            && self.has_role(role)
            && self.constraint.allows_requirement(req_id, category, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn delegation(constraint: GrantConstraint) -> GrantDelegation {
        GrantDelegation::new(
            "acme/base",
            "acme/radar",
            [DelegationRole::RequirementReader],
            constraint,
            Utc::now(),
        )
    }

    #[test]
    fn unconstrained_delegation_admits_matching_role() {
        let d = delegation(GrantConstraint::any());
        let now = Utc::now();
        assert!(d.allows_access("REQ-CORE-001", "CORE", DelegationRole::RequirementReader, now));
        assert!(!d.allows_access("REQ-CORE-001", "CORE", DelegationRole::RequirementEditor, now));
    }

    #[test]
    fn category_include_set_limits_access() {
        let d = delegation(GrantConstraint::for_categories(["CORE"]));
        let now = Utc::now();
        assert!(d.allows_access("REQ-CORE-001", "CORE", DelegationRole::RequirementReader, now));
        assert!(!d.allows_access("REQ-SEC-001", "SEC", DelegationRole::RequirementReader, now));
    }

    #[test]
    fn id_include_set_takes_precedence_over_categories() {
        let constraint = GrantConstraint {
            categories: ["CORE".to_string()].into_iter().collect(),
            requirement_ids: ["REQ-SEC-007".to_string()].into_iter().collect(),
            ..GrantConstraint::default()
        };
        let d = delegation(constraint);
        let now = Utc::now();
        // The id list governs: a CORE requirement not in it is denied...
        assert!(!d.allows_access("REQ-CORE-001", "CORE", DelegationRole::RequirementReader, now));
        // ...and the listed id is admitted even outside the category set.
        assert!(d.allows_access("REQ-SEC-007", "SEC", DelegationRole::RequirementReader, now));
    }

    #[test]
    fn exclusions_win_over_everything() {
        let constraint =
            GrantConstraint::for_requirements(["REQ-SEC-007"]).excluding(["SEC"]);
        let d = delegation(constraint);
        assert!(!d.allows_access(
            "REQ-SEC-007",
            "SEC",
            DelegationRole::RequirementReader,
            Utc::now()
        ));
    }

    #[test]
    fn expiry_denies_and_is_pure() {
        let now = Utc::now();
        let d = delegation(GrantConstraint::any().with_expiry(now + Duration::hours(1)));
        assert!(d.is_valid(now));
        assert!(d.allows_access("REQ-CORE-001", "CORE", DelegationRole::RequirementReader, now));

        let later = now + Duration::hours(2);
        assert!(!d.is_valid(later));
        assert!(!d.allows_access(
            "REQ-CORE-001",
            "CORE",
            DelegationRole::RequirementReader,
            later
        ));
    }

    #[test]
    fn inactive_delegation_denies() {
        let mut d = delegation(GrantConstraint::any());
        d.active = false;
        assert!(!d.allows_access(
            "REQ-CORE-001",
            "CORE",
            DelegationRole::RequirementReader,
            Utc::now()
        ));
    }

    #[test]
    fn serde_round_trip() {
        let d = delegation(GrantConstraint::for_categories(["CORE"]));
        let json = serde_json::to_string(&d).unwrap();
        let back: GrantDelegation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
