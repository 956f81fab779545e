//! Requirement reference grammar.
//!
//! Every component that follows a dependency or blocks reference goes through
//! this module, so local (`REQ-CORE-001`) and cross-repository
//! (`acme/radar:REQ-CORE-001`) identifiers are handled uniformly.
//!
//! ```text
//! ref     := local | cross
//! local   := "REQ-" CATEGORY "-" DIGITS
//! cross   := OWNER "/" REPO ":" local
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

fn req_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^REQ-[A-Za-z]+-[0-9]+$").expect("valid regex"))
}

/// A parsed requirement reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum RequirementRef {
    /// Reference to a requirement in the same repository.
    Local {
        /// The requirement id, e.g. `REQ-CORE-001`.
        req_id: String,
    },
    /// Reference into another repository.
    CrossRepo {
        /// Owning repository as `owner/repo`.
        repo: String,
        /// The requirement id inside that repository.
        req_id: String,
    },
}

impl RequirementRef {
    /// Parse a reference string. Anything without a `owner/repo:` prefix is a
    /// local reference; the id shape itself is validated separately so that
    /// malformed ids can still be reported with context by the validator.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        // A cross-repo ref needs both the ':' separator and a '/' in the
        // repository part; a bare "word:REQ-X-1" without '/' stays local-ish
        // and is flagged by the validator as malformed.
        if let Some((repo, req_id)) = raw.split_once(':') {
            if repo.contains('/') {
                return Self::CrossRepo {
                    repo: repo.to_string(),
                    req_id: req_id.trim().to_string(),
                };
            }
        }
        Self::Local {
            req_id: raw.to_string(),
        }
    }

    /// Whether this reference resolves inside the local store.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// The requirement id without any repository qualifier.
    pub fn req_id(&self) -> &str {
        match self {
            Self::Local { req_id } | Self::CrossRepo { req_id, .. } => req_id,
        }
    }

    /// The owning repository for cross-repo references.
    pub fn repo(&self) -> Option<&str> {
        match self {
            Self::Local { .. } => None,
            Self::CrossRepo { repo, .. } => Some(repo),
        }
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { req_id } => write!(f, "{req_id}"),
            Self::CrossRepo { repo, req_id } => write!(f, "{repo}:{req_id}"),
        }
    }
}

/// Check whether a string has the canonical local id shape `REQ-<CAT>-<NNN>`.
pub fn looks_like_req_id(raw: &str) -> bool {
    req_id_pattern().is_match(raw)
}

/// Extract the category segment of a requirement id (`REQ-CORE-001` → `CORE`).
pub fn category_of(req_id: &str) -> Option<&str> {
    if !looks_like_req_id(req_id) {
        return None;
    }
    req_id.split('-').nth(1)
}

/// Parse a delimited id set as persisted in `dependencies`/`blocks` cells.
///
/// Splits on pipes and whitespace, trims, drops empty segments, and
/// de-duplicates. The empty string yields the empty set.
pub fn parse_id_set(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == '|' || c.is_whitespace())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical on-disk form of an id set: sorted ascending, pipe-joined.
pub fn join_id_set(ids: &BTreeSet<String>) -> String {
    ids.iter().cloned().collect::<Vec<_>>().join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_ref() {
        let r = RequirementRef::parse("REQ-CORE-001");
        assert!(r.is_local());
        assert_eq!(r.req_id(), "REQ-CORE-001");
        assert_eq!(r.repo(), None);
    }

    #[test]
    fn parses_cross_repo_ref() {
        let r = RequirementRef::parse("acme/radar:REQ-SIG-042");
        assert!(!r.is_local());
        assert_eq!(r.req_id(), "REQ-SIG-042");
        assert_eq!(r.repo(), Some("acme/radar"));
        assert_eq!(r.to_string(), "acme/radar:REQ-SIG-042");
    }

    #[test]
    fn colon_without_slash_stays_local() {
        let r = RequirementRef::parse("weird:REQ-SIG-042");
        assert!(r.is_local());
    }

    #[test]
    fn id_shape() {
        assert!(looks_like_req_id("REQ-CORE-001"));
        assert!(looks_like_req_id("REQ-a-9"));
        assert!(!looks_like_req_id("REQ-CORE-"));
        assert!(!looks_like_req_id("REQCORE-001"));
        assert!(!looks_like_req_id("REQ-CORE-001x"));
    }

    #[test]
    fn category_extraction() {
        assert_eq!(category_of("REQ-CORE-001"), Some("CORE"));
        assert_eq!(category_of("not-an-id"), None);
    }

    #[test]
    fn id_set_parsing_handles_pipes_spaces_and_duplicates() {
        assert!(parse_id_set("").is_empty());
        assert!(parse_id_set("   ").is_empty());

        let pipes = parse_id_set("REQ-A-1|REQ-B-2|REQ-C-3");
        assert_eq!(pipes.len(), 3);

        let spaces = parse_id_set("REQ-A-1 REQ-B-2  REQ-C-3");
        assert_eq!(spaces, pipes);

        let mixed = parse_id_set("  REQ-A-1 | REQ-B-2||REQ-A-1 ");
        assert_eq!(mixed.len(), 2);
    }

    #[test]
    fn id_set_joins_sorted() {
        let set = parse_id_set("REQ-Z-1|REQ-A-1|REQ-M-1");
        assert_eq!(join_id_set(&set), "REQ-A-1|REQ-M-1|REQ-Z-1");
    }
}
