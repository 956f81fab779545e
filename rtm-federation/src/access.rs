//! Trust store: caller-owned access-control state.
//!
//! Holds user-level grants and repository-to-repository delegations, and
//! records every decision into its audit log. There is no process-wide
//! state: each consumer owns its `TrustStore`.
//!
//! Invariants maintained here and exercised by the property suite:
//! - no privilege escalation: `can_access` admits only what `has_grant`
//!   establishes;
//! - bounded delegation: delegating a role requires the user to already hold
//!   it on the grantor;
//! - complete revocation: after `revoke`, access is denied unless
//!   subsequently regranted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tracing::debug;

use crate::audit::{AuditEvent, AuditKind, AuditLog, AuditOutcome};
use crate::grant::{DelegationRole, GrantDelegation};

/// Outcome of a delegated-access decision, with the reason for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub admitted: bool,
    pub reason: String,
}

impl AccessDecision {
    fn admit(reason: impl Into<String>) -> Self {
        Self {
            admitted: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            admitted: false,
            reason: reason.into(),
        }
    }
}

/// Record of one user-level delegation, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub grantor: String,
    pub grantee: String,
    pub user: String,
    pub role: DelegationRole,
}

/// Access-control state for one federation participant.
#[derive(Debug, Default)]
pub struct TrustStore {
    // (user, repo, role)
    grants: BTreeSet<(String, String, DelegationRole)>,
    delegations: Vec<DelegationRecord>,
    repo_delegations: Vec<GrantDelegation>,
    audit: AuditLog,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // User-level grants
    // ---------------------------------------------------------------------

    /// Grant a role to a user on a repository.
    pub fn grant(&mut self, user: &str, repo: &str, role: DelegationRole) {
        self.grants
            .insert((user.to_string(), repo.to_string(), role));
        self.audit.record(AuditEvent::new(
            AuditKind::GrantCreate,
            user,
            repo,
            role.as_str(),
            AuditOutcome::Success,
        ));
        debug!(user, repo, role = role.as_str(), "granted");
    }

    /// Revoke a role from a user on a repository. Revocation is complete:
    /// the grant tuple is removed, so subsequent checks deny until a
    /// regrant.
    pub fn revoke(&mut self, user: &str, repo: &str, role: DelegationRole) {
        let removed = self
            .grants
            .remove(&(user.to_string(), repo.to_string(), role));
        if removed {
            self.audit.record(AuditEvent::new(
                AuditKind::GrantRevoke,
                user,
                repo,
                role.as_str(),
                AuditOutcome::Success,
            ));
            debug!(user, repo, role = role.as_str(), "revoked");
        }
    }

    /// Delegate a user's role from one repository to another.
    ///
    /// Bounded: succeeds only when the user already holds the role on the
    /// grantor. On success the user gains the role on the grantee.
    pub fn delegate(
        &mut self,
        grantor: &str,
        grantee: &str,
        user: &str,
        role: DelegationRole,
    ) -> bool {
        if !self.has_grant(user, grantor, role) {
            self.audit.record(
                AuditEvent::new(
                    AuditKind::GrantDelegate,
                    user,
                    grantee,
                    role.as_str(),
                    AuditOutcome::Denied,
                )
                .with_details(serde_json::json!({ "grantor": grantor })),
            );
            return false;
        }

        self.delegations.push(DelegationRecord {
            grantor: grantor.to_string(),
            grantee: grantee.to_string(),
            user: user.to_string(),
            role,
        });
        self.grants
            .insert((user.to_string(), grantee.to_string(), role));
        self.audit.record(
            AuditEvent::new(
                AuditKind::GrantDelegate,
                user,
                grantee,
                role.as_str(),
                AuditOutcome::Success,
            )
            .with_details(serde_json::json!({ "grantor": grantor })),
        );
        true
    }

    /// Whether a grant tuple exists.
    pub fn has_grant(&self, user: &str, repo: &str, role: DelegationRole) -> bool {
        self.grants
            .contains(&(user.to_string(), repo.to_string(), role))
    }

    /// The access check. Defined as exactly `has_grant`: an admission with
    /// no establishing grant would be a privilege escalation.
    pub fn can_access(&self, user: &str, repo: &str, role: DelegationRole) -> bool {
        self.has_grant(user, repo, role)
    }

    /// Delegations through which a grantee received roles.
    pub fn delegations_to(&self, grantee: &str) -> Vec<&DelegationRecord> {
        self.delegations
            .iter()
            .filter(|d| d.grantee == grantee)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Repository-level delegations
    // ---------------------------------------------------------------------

    /// Register a repository-to-repository delegation.
    pub fn add_delegation(&mut self, delegation: GrantDelegation) {
        self.audit.record(
            AuditEvent::new(
                AuditKind::GrantCreate,
                &delegation.grantor,
                &delegation.grantee,
                "delegate",
                AuditOutcome::Success,
            )
            .with_details(serde_json::json!({
                "roles": delegation.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            })),
        );
        self.repo_delegations.push(delegation);
    }

    /// Deactivate every delegation from `grantor` to `grantee`. Returns the
    /// number deactivated. Records stay in place for audit.
    pub fn revoke_delegations(&mut self, grantor: &str, grantee: &str) -> usize {
        let mut revoked = 0;
        for delegation in &mut self.repo_delegations {
            if delegation.active && delegation.grantor == grantor && delegation.grantee == grantee {
                delegation.active = false;
                revoked += 1;
            }
        }
        if revoked > 0 {
            self.audit.record(AuditEvent::new(
                AuditKind::GrantRevoke,
                grantor,
                grantee,
                "revoke_delegations",
                AuditOutcome::Success,
            ));
        }
        revoked
    }

    /// Decide whether `grantee` may act on a requirement with `role` through
    /// any registered delegation. Every decision is audited.
    pub fn decide(
        &mut self,
        grantee: &str,
        req_id: &str,
        category: &str,
        role: DelegationRole,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        let admitted_by = self.repo_delegations.iter().find(|d| {
            d.grantee == grantee && d.allows_access(req_id, category, role, now)
        });

        let decision = match admitted_by {
            Some(delegation) => AccessDecision::admit(format!(
                "delegation from {} admits {}",
                delegation.grantor, req_id
            )),
            None => AccessDecision::deny(format!(
                "no valid delegation to {grantee} admits {req_id} with {}",
                role.as_str()
            )),
        };

        self.audit.record(AuditEvent::new(
            if decision.admitted {
                AuditKind::AccessRead
            } else {
                AuditKind::AccessDenied
            },
            grantee,
            req_id,
            role.as_str(),
            if decision.admitted {
                AuditOutcome::Success
            } else {
                AuditOutcome::Denied
            },
        ));

        decision
    }

    /// The audit trail of every operation and decision.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
