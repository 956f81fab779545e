//! Replicated document form of the RTM store.
//!
//! Wraps a requirement collection in a conflict-free replicated document so
//! offline edits merge deterministically:
//!
//! - [`document`] — the document: LWW scalar fields, collaborative text for
//!   description and notes, presence tombstones, advisory claims, and the
//!   binary state/update contract
//! - [`crdt`] — the underlying primitives (Lamport stamps, LWW registers,
//!   RGA text, state vectors)
//! - [`offline`] — snapshot + pending-update persistence and the
//!   bootstrap-from-table path
//!
//! Transporting updates between replicas is a collaborator concern; this
//! crate only defines the bytes.

pub mod crdt;
pub mod document;
pub mod offline;

pub use crdt::{LamportClock, LwwRegister, Stamp, StateVector, TextCrdt};
pub use document::{Claim, RtmDocument, SCHEMA_VERSION, ScalarValue};
pub use offline::OfflineStore;
