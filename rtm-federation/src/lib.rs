//! Cross-repository federation for the RTM core.
//!
//! Provides the trust machinery for requirements that span repositories:
//!
//! - [`shadow`] — hash-anchored partial views of external requirements
//! - [`grant`] — delegations with roles, constraints, and expiry
//! - [`access`] — caller-owned trust store and decision function
//! - [`audit`] — append-only structured event trail
//!
//! Nothing here performs network or git I/O; synchronizing repositories is a
//! collaborator concern. This crate only answers "who may see what" and
//! keeps the evidence.

pub mod access;
pub mod audit;
pub mod grant;
pub mod shadow;

pub use access::{AccessDecision, DelegationRecord, TrustStore};
pub use audit::{AuditEvent, AuditKind, AuditLog, AuditOutcome, AuditQuery};
pub use grant::{DelegationRole, GrantConstraint, GrantDelegation};
pub use shadow::{ShadowRequirement, Visibility, content_hash};
