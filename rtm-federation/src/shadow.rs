//! Shadow requirements: verifiable partial views of external-repository
//! requirements.
//!
//! A shadow carries a truncated SHA-256 content hash over
//! `id:status:description`. The hash is the verification anchor across
//! repositories: a consumer can confirm an external requirement is unchanged
//! without reading its full content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use rtm_core::{Requirement, Status};

/// Hex digits kept from the full SHA-256 digest.
const SHADOW_HASH_LEN: usize = 16;

/// How much of an external requirement is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Full access to requirement details.
    Full,
    /// Status, hash, and dependencies only.
    #[default]
    Shadow,
    /// Only the hash, for verification.
    HashOnly,
}

/// Partial view of a requirement in another repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRequirement {
    /// Identifier inside the owning repository.
    pub req_id: String,
    /// Owning repository as `owner/repo`.
    pub external_repo: String,
    /// Truncated SHA-256 over `id:status:description`, lowercase hex.
    pub shadow_hash: String,
    pub status: Status,
    pub visibility: Visibility,
    /// When the shadow was last verified against its source.
    pub verified_at: Option<DateTime<Utc>>,
    /// Dependency ids visible at this visibility level; empty for
    /// `HashOnly`.
    pub cached_dependencies: BTreeSet<String>,
}

/// Content hash of a full requirement, as anchored in shadows.
pub fn content_hash(req: &Requirement) -> String {
    let content = format!(
        "{}:{}:{}",
        req.req_id,
        req.status.as_str(),
        req.requirement_text
    );
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..SHADOW_HASH_LEN].to_string()
}

impl ShadowRequirement {
    /// Derive a shadow from a full record.
    ///
    /// `HashOnly` clears the cached dependency set; the timestamp records
    /// when this view was taken.
    pub fn from_requirement(
        req: &Requirement,
        external_repo: impl Into<String>,
        visibility: Visibility,
        now: DateTime<Utc>,
    ) -> Self {
        let cached_dependencies = if visibility == Visibility::HashOnly {
            BTreeSet::new()
        } else {
            req.dependencies.clone()
        };
        Self {
            req_id: req.req_id.clone(),
            external_repo: external_repo.into(),
            shadow_hash: content_hash(req),
            status: req.status,
            visibility,
            verified_at: Some(now),
            cached_dependencies,
        }
    }

    /// Whether full requirement details are accessible.
    pub fn is_accessible(&self) -> bool {
        self.visibility == Visibility::Full
    }

    /// Whether the shadow can be verified via its hash.
    pub fn is_verifiable(&self) -> bool {
        !self.shadow_hash.is_empty()
    }

    /// Full cross-repo reference string.
    pub fn full_ref(&self) -> String {
        format!("{}:{}", self.external_repo, self.req_id)
    }

    /// Re-derive the hash from a candidate record and compare. A match means
    /// the external requirement is unchanged since this shadow was taken.
    pub fn verify_against(&self, req: &Requirement) -> bool {
        self.shadow_hash == content_hash(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Requirement {
        let mut req = Requirement::new("REQ-SIG-001");
        req.category = "SIG".to_string();
        req.requirement_text = "Estimate angle of arrival".to_string();
        req.status = Status::Partial;
        req.dependencies.insert("REQ-HW-001".to_string());
        req
    }

    #[test]
    fn hash_is_sixteen_hex_digits_and_stable() {
        let req = sample();
        let hash = content_hash(&req);
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash(&req));
    }

    #[test]
    fn hash_covers_id_status_and_description() {
        let req = sample();
        let base = content_hash(&req);

        let mut changed_status = req.clone();
        changed_status.status = Status::Complete;
        assert_ne!(base, content_hash(&changed_status));

        let mut changed_text = req.clone();
        changed_text.requirement_text.push('!');
        assert_ne!(base, content_hash(&changed_text));

        // Fields outside the anchor do not perturb the hash.
        let mut changed_notes = req.clone();
        changed_notes.notes = "irrelevant".to_string();
        assert_eq!(base, content_hash(&changed_notes));
    }

    #[test]
    fn shadow_defaults_keep_dependencies() {
        let req = sample();
        let shadow =
            ShadowRequirement::from_requirement(&req, "acme/radar", Visibility::Shadow, Utc::now());
        assert_eq!(shadow.status, Status::Partial);
        assert!(shadow.cached_dependencies.contains("REQ-HW-001"));
        assert!(!shadow.is_accessible());
        assert!(shadow.is_verifiable());
        assert_eq!(shadow.full_ref(), "acme/radar:REQ-SIG-001");
    }

    #[test]
    fn hash_only_clears_cached_dependencies() {
        let req = sample();
        let shadow = ShadowRequirement::from_requirement(
            &req,
            "acme/radar",
            Visibility::HashOnly,
            Utc::now(),
        );
        assert!(shadow.cached_dependencies.is_empty());
        assert!(shadow.is_verifiable());
    }

    #[test]
    fn verification_detects_drift() {
        let req = sample();
        let shadow =
            ShadowRequirement::from_requirement(&req, "acme/radar", Visibility::Shadow, Utc::now());
        assert!(shadow.verify_against(&req));

        let mut drifted = req.clone();
        drifted.status = Status::Complete;
        assert!(!shadow.verify_against(&drifted));
    }

    #[test]
    fn serde_round_trip() {
        let req = sample();
        let shadow =
            ShadowRequirement::from_requirement(&req, "acme/radar", Visibility::Shadow, Utc::now());
        let json = serde_json::to_string(&shadow).unwrap();
        let back: ShadowRequirement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shadow);
    }
}
