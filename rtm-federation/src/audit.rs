//! Append-only audit trail for federation activity.
//!
//! Every admission, denial, grant change, and sync action is a structured
//! immutable event. The log exposes no update or delete operation; queries
//! filter by kind, kind family, actor, and time window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Event classification, dotted by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditKind {
    #[serde(rename = "auth.login")]
    AuthLogin,
    #[serde(rename = "auth.logout")]
    AuthLogout,
    #[serde(rename = "auth.failure")]
    AuthFailure,
    #[serde(rename = "auth.token_refresh")]
    AuthTokenRefresh,
    #[serde(rename = "grant.create")]
    GrantCreate,
    #[serde(rename = "grant.revoke")]
    GrantRevoke,
    #[serde(rename = "grant.delegate")]
    GrantDelegate,
    #[serde(rename = "grant.expire")]
    GrantExpire,
    #[serde(rename = "access.read")]
    AccessRead,
    #[serde(rename = "access.write")]
    AccessWrite,
    #[serde(rename = "access.denied")]
    AccessDenied,
    #[serde(rename = "sync.push")]
    SyncPush,
    #[serde(rename = "sync.pull")]
    SyncPull,
    #[serde(rename = "sync.conflict")]
    SyncConflict,
}

impl AuditKind {
    /// Dotted name, e.g. `access.denied`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthLogin => "auth.login",
            Self::AuthLogout => "auth.logout",
            Self::AuthFailure => "auth.failure",
            Self::AuthTokenRefresh => "auth.token_refresh",
            Self::GrantCreate => "grant.create",
            Self::GrantRevoke => "grant.revoke",
            Self::GrantDelegate => "grant.delegate",
            Self::GrantExpire => "grant.expire",
            Self::AccessRead => "access.read",
            Self::AccessWrite => "access.write",
            Self::AccessDenied => "access.denied",
            Self::SyncPush => "sync.push",
            Self::SyncPull => "sync.pull",
            Self::SyncConflict => "sync.conflict",
        }
    }

    /// Family prefix before the dot (`auth`, `grant`, `access`, `sync`).
    pub fn family(&self) -> &'static str {
        self.as_str().split('.').next().expect("dotted name")
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Denied,
    Failure,
}

/// One immutable audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditKind,
    pub timestamp: DateTime<Utc>,
    /// Who acted (user or repository).
    pub actor: String,
    /// What was acted upon (requirement id, repo, document).
    pub resource: String,
    /// The attempted action, free-form.
    pub action: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    /// Build an event stamped now with a fresh id.
    pub fn new(
        kind: AuditKind,
        actor: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            actor: actor.into(),
            resource: resource.into(),
            action: action.into(),
            outcome,
            source_ip: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }
}

/// Filters for [`AuditLog::query`]. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub kind: Option<AuditKind>,
    /// Family prefix, e.g. `grant`.
    pub family: Option<String>,
    pub actor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: AuditKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if self.kind.is_some_and(|k| event.kind != k) {
            return false;
        }
        if self
            .family
            .as_deref()
            .is_some_and(|f| event.kind.family() != f)
        {
            return false;
        }
        if self.actor.as_deref().is_some_and(|a| event.actor != a) {
            return false;
        }
        if self.since.is_some_and(|t| event.timestamp < t) {
            return false;
        }
        if self.until.is_some_and(|t| event.timestamp > t) {
            return false;
        }
        true
    }
}

/// Append-only event log. Events are immutable once recorded; there is no
/// update or delete operation.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    events: Vec<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn record(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    /// Events matching a query, in record order.
    pub fn query(&self, query: &AuditQuery) -> Vec<&AuditEvent> {
        self.events.iter().filter(|e| query.matches(e)).collect()
    }

    /// All events in record order.
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
