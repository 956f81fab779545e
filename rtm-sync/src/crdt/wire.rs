//! Wire form of document state and deltas.
//!
//! Both full snapshots and deltas share one shape: collections are sorted
//! `Vec`s built from the document's ordered maps, so encoding the same
//! logical state always yields identical bytes. The payload is canonical
//! JSON; consumers treat it as opaque.

use serde::{Deserialize, Serialize};

use super::register::LwwRegister;
use super::stamp::Stamp;
use super::text::Atom;
use crate::document::{Claim, ScalarValue};

/// One scalar field register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireScalar {
    pub field: String,
    pub reg: LwwRegister<ScalarValue>,
}

/// One text field: its (filtered) atoms and tombstones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireText {
    pub field: String,
    pub atoms: Vec<WireAtom>,
    /// `(deleted atom id, delete stamp)` pairs.
    pub deletes: Vec<(Stamp, Stamp)>,
}

/// One text atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireAtom {
    pub id: Stamp,
    pub origin: Option<Stamp>,
    pub ch: char,
}

impl WireAtom {
    pub fn atom(&self) -> Atom {
        Atom {
            origin: self.origin,
            ch: self.ch,
        }
    }
}

/// One requirement entry. Fields absent from a delta are simply omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireRequirement {
    pub id: String,
    /// Presence register, when newer than the receiver's vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present: Option<LwwRegister<bool>>,
    pub scalars: Vec<WireScalar>,
    pub texts: Vec<WireText>,
}

/// One claim register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireClaim {
    pub id: String,
    pub reg: LwwRegister<Option<Claim>>,
}

/// Full snapshot or delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireDoc {
    /// Document schema version; the major component gates application.
    pub schema_version: String,
    /// Sender's state vector as sorted `(replica, counter)` pairs.
    pub vector: Vec<(u64, u64)>,
    pub requirements: Vec<WireRequirement>,
    pub metadata: Vec<WireScalar>,
    pub claims: Vec<WireClaim>,
}

/// Major component of a `major.minor` version string.
pub(crate) fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}
