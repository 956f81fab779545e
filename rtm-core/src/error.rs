//! Error taxonomy for the RTM core.
//!
//! Errors are classified by kind, not by origin. Diagnostics that are not
//! terminal (validator output, reciprocity issues) are returned as lists and
//! never surface through this type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the RTM core.
#[derive(Debug, Error)]
pub enum RtmError {
    /// Lookup of an unknown requirement id. The message lists up to five
    /// available ids so a collaborator can present a useful hint.
    #[error("requirement {id} not found (available: {})", format_available(available))]
    NotFound {
        /// The id that was requested.
        id: String,
        /// Up to five ids that do exist in the store.
        available: Vec<String>,
    },

    /// `add` of an id that is already present.
    #[error("requirement {0} already exists")]
    Duplicate(String),

    /// The tabular input could not be parsed. Load aborts.
    #[error("bad table {}: {message}{}", path.display(), format_line(line))]
    BadTable {
        /// File the codec was reading.
        path: PathBuf,
        /// 1-based line number when known.
        line: Option<u64>,
        /// What went wrong.
        message: String,
    },

    /// Authorization was denied or token handling failed.
    #[error("authorization denied: {0}")]
    Auth(String),

    /// A CRDT update could not be applied; the document stays usable.
    #[error("incompatible sync update: {0}")]
    Sync(String),

    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV-level failure that is not attributable to a specific line.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl RtmError {
    /// Build a `NotFound` from the requested id and the store's id listing.
    pub fn not_found(id: impl Into<String>, ids: impl IntoIterator<Item = String>) -> Self {
        Self::NotFound {
            id: id.into(),
            available: ids.into_iter().take(5).collect(),
        }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

fn format_line(line: &Option<u64>) -> String {
    match line {
        Some(n) => format!(" (line {n})"),
        None => String::new(),
    }
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, RtmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_at_most_five_ids() {
        let ids = (1..=8).map(|n| format!("REQ-SW-{n:03}"));
        let err = RtmError::not_found("REQ-SW-999", ids);
        let msg = err.to_string();
        assert!(msg.contains("REQ-SW-999"));
        assert!(msg.contains("REQ-SW-005"));
        assert!(!msg.contains("REQ-SW-006"));
    }

    #[test]
    fn not_found_with_empty_store() {
        let err = RtmError::not_found("REQ-SW-001", Vec::new());
        assert!(err.to_string().contains("available: none"));
    }

    #[test]
    fn bad_table_includes_line_number() {
        let err = RtmError::BadTable {
            path: PathBuf::from("docs/rtm.csv"),
            line: Some(7),
            message: "unbalanced quote".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("docs/rtm.csv"));
        assert!(msg.contains("line 7"));
    }
}
