//! The replicated document form of a requirement store.
//!
//! Three shared substructures, merged per the field policy:
//!
//! - `requirements`: per-id maps. Scalar fields (status, priority, dates,
//!   dependency/blocks strings, extras) are LWW registers; description and
//!   notes are character-level text CRDTs; a presence register tombstones
//!   removals.
//! - `metadata`: schema version, timestamps, owner (LWW).
//! - `claims`: per-id ephemeral leases (LWW over an optional claim).
//!
//! Dependency and blocks sets are pipe-joined sorted strings under
//! field-level LWW: replace-wins is explicit, concurrent element-wise
//! additions are not merged.
//!
//! Concurrent `apply_update` calls on one document must be serialized by the
//! caller; between documents, updates commute and converge.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tracing::debug;

use rtm_core::{
    Requirement, RequirementStore, Result, RtmError, Status, join_id_set, parse_id_set,
};

use crate::crdt::stamp::{LamportClock, Stamp, StateVector};
use crate::crdt::text::TextCrdt;
use crate::crdt::wire::{
    WireAtom, WireClaim, WireDoc, WireRequirement, WireScalar, WireText, major_version,
};
use crate::crdt::LwwRegister;

/// Version of the document format carried on every encoded state and
/// update. Readers refuse updates whose major component differs.
pub const SCHEMA_VERSION: &str = "1.0";

/// Fields stored as collaborative text rather than LWW scalars.
const TEXT_FIELDS: [&str; 2] = ["requirement_text", "notes"];

/// A scalar cell value in the replicated form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Flag(bool),
    Empty,
}

impl ScalarValue {
    fn as_text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            _ => "",
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(x) => Some(*x),
            _ => None,
        }
    }

    /// String form for extras round-tripping.
    fn to_cell(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Real(x) => x.to_string(),
            Self::Flag(b) => {
                if *b {
                    "True".to_string()
                } else {
                    "False".to_string()
                }
            }
            Self::Empty => String::new(),
        }
    }
}

/// An ephemeral edit lease on one requirement. Advisory: the document never
/// rejects writes for lack of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub user_id: String,
    /// Unix timestamp (seconds). At or past it the claim is absent.
    pub expires_at: i64,
}

/// Replicated state of one requirement.
#[derive(Debug, Clone, PartialEq)]
struct ReqCrdt {
    /// False means removed; the entry stays as a tombstone.
    present: LwwRegister<bool>,
    scalars: BTreeMap<String, LwwRegister<ScalarValue>>,
    texts: BTreeMap<String, TextCrdt>,
}

impl Default for ReqCrdt {
    fn default() -> Self {
        Self {
            present: LwwRegister::new(false, Stamp::ZERO),
            scalars: BTreeMap::new(),
            texts: BTreeMap::new(),
        }
    }
}

fn next_stamp(clock: &mut LamportClock, vector: &mut StateVector) -> Stamp {
    let stamp = clock.tick();
    vector.observe(stamp);
    stamp
}

/// The replicated document.
#[derive(Debug, Clone)]
pub struct RtmDocument {
    clock: LamportClock,
    vector: StateVector,
    requirements: BTreeMap<String, ReqCrdt>,
    metadata: BTreeMap<String, LwwRegister<ScalarValue>>,
    claims: BTreeMap<String, LwwRegister<Option<Claim>>>,
}

impl Default for RtmDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl RtmDocument {
    /// A fresh document with a random replica id and initialized metadata.
    pub fn new() -> Self {
        Self::with_replica(rand::random::<u64>())
    }

    /// A fresh document with an explicit replica id (deterministic tests).
    pub fn with_replica(replica: u64) -> Self {
        let mut doc = Self::shell(replica);
        let now = Utc::now().timestamp();
        doc.set_metadata("schema_version", ScalarValue::Text(SCHEMA_VERSION.to_string()));
        doc.set_metadata("created_at", ScalarValue::Integer(now));
        doc.set_metadata("last_modified", ScalarValue::Integer(now));
        doc
    }

    /// A document with no state at all, used when decoding a snapshot.
    fn shell(replica: u64) -> Self {
        Self {
            clock: LamportClock::new(replica),
            vector: StateVector::new(),
            requirements: BTreeMap::new(),
            metadata: BTreeMap::new(),
            claims: BTreeMap::new(),
        }
    }

    /// Rebuild a document from a previously encoded snapshot.
    pub fn from_state_bytes(bytes: &[u8]) -> Result<Self> {
        let mut doc = Self::shell(rand::random::<u64>());
        doc.apply_update(bytes)?;
        Ok(doc)
    }

    /// Replica id of this document instance.
    pub fn replica(&self) -> u64 {
        self.clock.replica()
    }

    // ---------------------------------------------------------------------
    // Requirement operations
    // ---------------------------------------------------------------------

    /// Add or overwrite a requirement. Scalar fields that did not change
    /// keep their stamps; text fields are diffed so untouched characters
    /// keep their identity.
    pub fn set_requirement(&mut self, req: &Requirement) {
        let fields = scalar_fields_of(req);
        let entry = self.requirements.entry(req.req_id.clone()).or_default();

        if !entry.present.value() {
            let stamp = next_stamp(&mut self.clock, &mut self.vector);
            entry.present.set(true, stamp);
        }

        for (field, value) in fields {
            let unchanged = entry
                .scalars
                .get(&field)
                .is_some_and(|reg| *reg.value() == value);
            if unchanged {
                continue;
            }
            let stamp = next_stamp(&mut self.clock, &mut self.vector);
            entry
                .scalars
                .entry(field)
                .and_modify(|reg| reg.set(value.clone(), stamp))
                .or_insert_with(|| LwwRegister::new(value, stamp));
        }

        for (field, content) in [
            ("requirement_text", req.requirement_text.as_str()),
            ("notes", req.notes.as_str()),
        ] {
            entry
                .texts
                .entry(field.to_string())
                .or_default()
                .set_text(content, &mut self.clock, &mut self.vector);
        }

        self.touch();
    }

    /// The requirement, unless absent or removed.
    pub fn get_requirement(&self, req_id: &str) -> Option<Requirement> {
        let entry = self.requirements.get(req_id)?;
        if !entry.present.value() {
            return None;
        }
        Some(requirement_from_entry(req_id, entry))
    }

    /// Tombstone a requirement. Returns false when it was not present.
    pub fn remove_requirement(&mut self, req_id: &str) -> bool {
        let Some(entry) = self.requirements.get_mut(req_id) else {
            return false;
        };
        if !entry.present.value() {
            return false;
        }
        let stamp = next_stamp(&mut self.clock, &mut self.vector);
        entry.present.set(false, stamp);
        self.touch();
        true
    }

    /// Ids of present requirements, ascending.
    pub fn list_requirements(&self) -> Vec<String> {
        self.requirements
            .iter()
            .filter(|(_, e)| *e.present.value())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// All present requirements.
    pub fn all_requirements(&self) -> Vec<Requirement> {
        self.requirements
            .iter()
            .filter(|(_, e)| *e.present.value())
            .map(|(id, e)| requirement_from_entry(id, e))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Store conversion
    // ---------------------------------------------------------------------

    /// Build a document from every record in a store.
    pub fn from_store(store: &RequirementStore) -> Self {
        let mut doc = Self::new();
        for req in store.all() {
            doc.set_requirement(req);
        }
        doc
    }

    /// Materialize the document as a store.
    pub fn to_store(&self) -> RequirementStore {
        RequirementStore::from_records(self.all_requirements())
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    fn set_metadata(&mut self, key: &str, value: ScalarValue) {
        let stamp = next_stamp(&mut self.clock, &mut self.vector);
        self.metadata
            .entry(key.to_string())
            .and_modify(|reg| reg.set(value.clone(), stamp))
            .or_insert_with(|| LwwRegister::new(value, stamp));
    }

    fn touch(&mut self) {
        self.set_metadata(
            "last_modified",
            ScalarValue::Integer(Utc::now().timestamp()),
        );
    }

    /// Document schema version.
    pub fn schema_version(&self) -> String {
        self.metadata
            .get("schema_version")
            .map(|reg| reg.value().as_text().to_string())
            .unwrap_or_else(|| SCHEMA_VERSION.to_string())
    }

    pub fn set_owner(&mut self, user_id: &str) {
        self.set_metadata("owner", ScalarValue::Text(user_id.to_string()));
    }

    pub fn owner(&self) -> Option<String> {
        self.metadata.get("owner").and_then(|reg| match reg.value() {
            ScalarValue::Text(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }

    // ---------------------------------------------------------------------
    // Claims
    // ---------------------------------------------------------------------

    /// Install or refresh an edit lease. Fails when another user holds an
    /// unexpired claim; refreshing one's own claim extends it.
    pub fn claim(&mut self, req_id: &str, user_id: &str, duration_secs: i64) -> bool {
        let now = Utc::now().timestamp();
        if let Some(reg) = self.claims.get(req_id) {
            if let Some(current) = reg.value() {
                if current.expires_at > now && current.user_id != user_id {
                    return false;
                }
            }
        }

        let claim = Claim {
            user_id: user_id.to_string(),
            expires_at: now + duration_secs,
        };
        let stamp = next_stamp(&mut self.clock, &mut self.vector);
        self.claims
            .entry(req_id.to_string())
            .and_modify(|reg| reg.set(Some(claim.clone()), stamp))
            .or_insert_with(|| LwwRegister::new(Some(claim), stamp));
        true
    }

    /// Release a lease; only the owner may.
    pub fn release(&mut self, req_id: &str, user_id: &str) -> bool {
        let owns = self
            .claims
            .get(req_id)
            .and_then(|reg| reg.value().as_ref())
            .is_some_and(|claim| claim.user_id == user_id);
        if !owns {
            return false;
        }
        let stamp = next_stamp(&mut self.clock, &mut self.vector);
        if let Some(reg) = self.claims.get_mut(req_id) {
            reg.set(None, stamp);
        }
        true
    }

    /// The current lease, treating expired leases as absent.
    pub fn get_claim(&self, req_id: &str) -> Option<Claim> {
        let now = Utc::now().timestamp();
        self.claims
            .get(req_id)
            .and_then(|reg| reg.value().clone())
            .filter(|claim| claim.expires_at > now)
    }

    // ---------------------------------------------------------------------
    // Wire contract
    // ---------------------------------------------------------------------

    /// Full snapshot.
    pub fn encode_state(&self) -> Vec<u8> {
        let wire = self.build_wire(None);
        serde_json::to_vec(&wire).expect("wire form serializes")
    }

    /// Compact "what I have" descriptor.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        serde_json::to_vec(&self.vector.to_pairs()).expect("vector serializes")
    }

    /// Delta containing everything the remote vector has not seen.
    pub fn encode_update_since(&self, remote_vector: &[u8]) -> Result<Vec<u8>> {
        let pairs: Vec<(u64, u64)> = serde_json::from_slice(remote_vector)
            .map_err(|e| RtmError::Sync(format!("malformed state vector: {e}")))?;
        let since = StateVector::from_pairs(&pairs);
        let wire = self.build_wire(Some(&since));
        Ok(serde_json::to_vec(&wire).expect("wire form serializes"))
    }

    /// Apply a snapshot or delta. Idempotent; updates commute. An update
    /// with a different major schema version is rejected and the document is
    /// left untouched.
    pub fn apply_update(&mut self, bytes: &[u8]) -> Result<()> {
        let wire: WireDoc = serde_json::from_slice(bytes)
            .map_err(|e| RtmError::Sync(format!("malformed update: {e}")))?;

        if major_version(&wire.schema_version) != major_version(SCHEMA_VERSION) {
            return Err(RtmError::Sync(format!(
                "schema version {} is incompatible with {}",
                wire.schema_version, SCHEMA_VERSION
            )));
        }

        for req in wire.requirements {
            let entry = self.requirements.entry(req.id).or_default();
            if let Some(present) = req.present {
                self.clock.observe(present.stamp());
                self.vector.observe(present.stamp());
                entry.present.merge(&present);
            }
            for WireScalar { field, reg } in req.scalars {
                self.clock.observe(reg.stamp());
                self.vector.observe(reg.stamp());
                match entry.scalars.get_mut(&field) {
                    Some(existing) => {
                        existing.merge(&reg);
                    }
                    None => {
                        entry.scalars.insert(field, reg);
                    }
                }
            }
            for WireText {
                field,
                atoms,
                deletes,
            } in req.texts
            {
                let text = entry.texts.entry(field).or_default();
                for atom in atoms {
                    self.clock.observe(atom.id);
                    self.vector.observe(atom.id);
                    text.merge_atom(atom.id, atom.atom());
                }
                for (target, stamp) in deletes {
                    self.clock.observe(stamp);
                    self.vector.observe(stamp);
                    text.merge_delete(target, stamp);
                }
            }
        }

        for WireScalar { field, reg } in wire.metadata {
            self.clock.observe(reg.stamp());
            self.vector.observe(reg.stamp());
            match self.metadata.get_mut(&field) {
                Some(existing) => {
                    existing.merge(&reg);
                }
                None => {
                    self.metadata.insert(field, reg);
                }
            }
        }

        for WireClaim { id, reg } in wire.claims {
            self.clock.observe(reg.stamp());
            self.vector.observe(reg.stamp());
            match self.claims.get_mut(&id) {
                Some(existing) => {
                    existing.merge(&reg);
                }
                None => {
                    self.claims.insert(id, reg);
                }
            }
        }

        let carried = StateVector::from_pairs(&wire.vector);
        self.vector.merge(&carried);
        self.clock.observe(Stamp {
            counter: self.vector.max_counter(),
            replica: 0,
        });

        debug!(replica = self.replica(), "applied update");
        Ok(())
    }

    fn build_wire(&self, since: Option<&StateVector>) -> WireDoc {
        let newer = |stamp: Stamp| since.is_none_or(|v| !v.contains(stamp));

        let mut requirements = Vec::new();
        for (id, entry) in &self.requirements {
            let present = newer(entry.present.stamp()).then(|| entry.present.clone());
            let scalars: Vec<WireScalar> = entry
                .scalars
                .iter()
                .filter(|(_, reg)| newer(reg.stamp()))
                .map(|(field, reg)| WireScalar {
                    field: field.clone(),
                    reg: reg.clone(),
                })
                .collect();
            let texts: Vec<WireText> = entry
                .texts
                .iter()
                .filter_map(|(field, text)| {
                    let atoms: Vec<WireAtom> = text
                        .atoms()
                        .iter()
                        .filter(|(atom_id, _)| newer(**atom_id))
                        .map(|(atom_id, atom)| WireAtom {
                            id: *atom_id,
                            origin: atom.origin,
                            ch: atom.ch,
                        })
                        .collect();
                    let deletes: Vec<(Stamp, Stamp)> = text
                        .deletes()
                        .iter()
                        .filter(|(_, stamp)| newer(**stamp))
                        .map(|(target, stamp)| (*target, *stamp))
                        .collect();
                    (!atoms.is_empty() || !deletes.is_empty()).then_some(WireText {
                        field: field.clone(),
                        atoms,
                        deletes,
                    })
                })
                .collect();

            if present.is_some() || !scalars.is_empty() || !texts.is_empty() {
                requirements.push(WireRequirement {
                    id: id.clone(),
                    present,
                    scalars,
                    texts,
                });
            }
        }

        let metadata: Vec<WireScalar> = self
            .metadata
            .iter()
            .filter(|(_, reg)| newer(reg.stamp()))
            .map(|(field, reg)| WireScalar {
                field: field.clone(),
                reg: reg.clone(),
            })
            .collect();

        let claims: Vec<WireClaim> = self
            .claims
            .iter()
            .filter(|(_, reg)| newer(reg.stamp()))
            .map(|(id, reg)| WireClaim {
                id: id.clone(),
                reg: reg.clone(),
            })
            .collect();

        WireDoc {
            schema_version: SCHEMA_VERSION.to_string(),
            vector: self.vector.to_pairs(),
            requirements,
            metadata,
            claims,
        }
    }
}

/// The LWW scalar projection of a record: everything except the text CRDT
/// fields, with extras appended.
fn scalar_fields_of(req: &Requirement) -> Vec<(String, ScalarValue)> {
    let text = |s: &str| ScalarValue::Text(s.to_string());
    let mut fields: Vec<(String, ScalarValue)> = vec![
        ("req_id".to_string(), text(&req.req_id)),
        ("category".to_string(), text(&req.category)),
        ("subcategory".to_string(), text(&req.subcategory)),
        ("target_value".to_string(), text(&req.target_value)),
        ("test_module".to_string(), text(&req.test_module)),
        ("test_function".to_string(), text(&req.test_function)),
        ("validation_method".to_string(), text(&req.validation_method)),
        ("status".to_string(), text(req.status.as_str())),
        ("priority".to_string(), text(req.priority.as_str())),
        (
            "phase".to_string(),
            req.phase.map_or(ScalarValue::Empty, ScalarValue::Integer),
        ),
        (
            "effort_weeks".to_string(),
            req.effort_weeks.map_or(ScalarValue::Empty, ScalarValue::Real),
        ),
        (
            "dependencies".to_string(),
            ScalarValue::Text(join_id_set(&req.dependencies)),
        ),
        ("blocks".to_string(), ScalarValue::Text(join_id_set(&req.blocks))),
        ("assignee".to_string(), text(&req.assignee)),
        ("sprint".to_string(), text(&req.sprint)),
        ("started_date".to_string(), text(&req.started_date)),
        ("completed_date".to_string(), text(&req.completed_date)),
        ("requirement_file".to_string(), text(&req.requirement_file)),
        ("external_id".to_string(), text(&req.external_id)),
    ];
    for (key, value) in &req.extra {
        fields.push((key.clone(), ScalarValue::Text(value.clone())));
    }
    fields
}

const SCALAR_FIELD_NAMES: [&str; 19] = [
    "req_id",
    "category",
    "subcategory",
    "target_value",
    "test_module",
    "test_function",
    "validation_method",
    "status",
    "priority",
    "phase",
    "effort_weeks",
    "dependencies",
    "blocks",
    "assignee",
    "sprint",
    "started_date",
    "completed_date",
    "requirement_file",
    "external_id",
];

fn requirement_from_entry(req_id: &str, entry: &ReqCrdt) -> Requirement {
    let scalar = |field: &str| entry.scalars.get(field).map(LwwRegister::value);
    let text_of = |field: &str| {
        entry
            .texts
            .get(field)
            .map(TextCrdt::text)
            .unwrap_or_default()
    };
    let string_of = |field: &str| scalar(field).map(|v| v.as_text().to_string()).unwrap_or_default();

    let mut req = Requirement::new(req_id);
    req.category = string_of("category");
    req.subcategory = string_of("subcategory");
    req.requirement_text = text_of("requirement_text");
    req.target_value = string_of("target_value");
    req.test_module = string_of("test_module");
    req.test_function = string_of("test_function");
    req.validation_method = string_of("validation_method");
    req.status = Status::from_str_lossy(&string_of("status"));
    req.priority = rtm_core::Priority::from_str_lossy(&string_of("priority"));
    req.phase = scalar("phase").and_then(ScalarValue::as_integer);
    req.notes = text_of("notes");
    req.effort_weeks = scalar("effort_weeks").and_then(ScalarValue::as_real);
    req.dependencies = parse_id_set(&string_of("dependencies"));
    req.blocks = parse_id_set(&string_of("blocks"));
    req.assignee = string_of("assignee");
    req.sprint = string_of("sprint");
    req.started_date = string_of("started_date");
    req.completed_date = string_of("completed_date");
    req.requirement_file = string_of("requirement_file");
    req.external_id = string_of("external_id");

    for (key, reg) in &entry.scalars {
        if !SCALAR_FIELD_NAMES.contains(&key.as_str()) && !TEXT_FIELDS.contains(&key.as_str()) {
            req.extra.insert(key.clone(), reg.value().to_cell());
        }
    }

    req
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> Requirement {
        let mut req = Requirement::new(id);
        req.category = "SW".to_string();
        req.requirement_text = "Track targets continuously".to_string();
        req.notes = "fast path".to_string();
        req.status = Status::Missing;
        req.phase = Some(2);
        req.effort_weeks = Some(1.25);
        req.dependencies = parse_id_set("REQ-HW-002|REQ-HW-001");
        req.extra.insert("scope_unit".to_string(), "True".to_string());
        req
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut doc = RtmDocument::with_replica(1);
        let req = sample("REQ-SW-001");
        doc.set_requirement(&req);

        let back = doc.get_requirement("REQ-SW-001").unwrap();
        assert_eq!(back, req);
        assert_eq!(doc.list_requirements(), vec!["REQ-SW-001".to_string()]);
    }

    #[test]
    fn remove_tombstones_and_reports_absence() {
        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));
        assert!(doc.remove_requirement("REQ-SW-001"));
        assert!(doc.get_requirement("REQ-SW-001").is_none());
        assert!(doc.list_requirements().is_empty());
        // Second removal is a no-op.
        assert!(!doc.remove_requirement("REQ-SW-001"));
        // A removed requirement can come back.
        doc.set_requirement(&sample("REQ-SW-001"));
        assert!(doc.get_requirement("REQ-SW-001").is_some());
    }

    #[test]
    fn store_round_trip_preserves_fields_sets_and_text() {
        let mut store = RequirementStore::new();
        store.add(sample("REQ-SW-001")).unwrap();
        store.add(sample("REQ-SW-002")).unwrap();

        let doc = RtmDocument::from_store(&store);
        let back = doc.to_store();

        assert_eq!(back.len(), 2);
        for req in store.all() {
            assert_eq!(back.get(&req.req_id).unwrap(), req);
        }
    }

    #[test]
    fn snapshot_round_trip() {
        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));
        doc.set_owner("alice");

        let restored = RtmDocument::from_state_bytes(&doc.encode_state()).unwrap();
        assert_eq!(
            restored.get_requirement("REQ-SW-001"),
            doc.get_requirement("REQ-SW-001")
        );
        assert_eq!(restored.owner(), Some("alice".to_string()));
        assert_eq!(restored.encode_state(), doc.encode_state());
    }

    #[test]
    fn incompatible_major_version_is_rejected_and_document_survives() {
        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));

        let mut bytes = doc.encode_state();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let bad = text.replace("\"schema_version\":\"1.0\"", "\"schema_version\":\"2.0\"");
        bytes = bad.into_bytes();

        let mut other = RtmDocument::with_replica(2);
        let err = other.apply_update(&bytes).unwrap_err();
        assert!(matches!(err, RtmError::Sync(_)));
        // Still usable.
        other.set_requirement(&sample("REQ-SW-009"));
        assert!(other.get_requirement("REQ-SW-009").is_some());
    }

    #[test]
    fn garbage_updates_are_sync_errors() {
        let mut doc = RtmDocument::with_replica(1);
        assert!(matches!(
            doc.apply_update(b"not json"),
            Err(RtmError::Sync(_))
        ));
    }

    #[test]
    fn claims_lifecycle() {
        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));

        assert!(doc.claim("REQ-SW-001", "alice", 1800));
        let claim = doc.get_claim("REQ-SW-001").unwrap();
        assert_eq!(claim.user_id, "alice");

        // A second user is rejected while the lease is live.
        assert!(!doc.claim("REQ-SW-001", "bob", 1800));
        // The owner refreshes.
        assert!(doc.claim("REQ-SW-001", "alice", 3600));

        // Only the owner releases.
        assert!(!doc.release("REQ-SW-001", "bob"));
        assert!(doc.release("REQ-SW-001", "alice"));
        assert!(doc.get_claim("REQ-SW-001").is_none());

        // Bob may claim now.
        assert!(doc.claim("REQ-SW-001", "bob", 1800));
    }

    #[test]
    fn expired_claims_are_absent_and_reclaimable() {
        let mut doc = RtmDocument::with_replica(1);
        doc.set_requirement(&sample("REQ-SW-001"));

        assert!(doc.claim("REQ-SW-001", "alice", -5));
        assert!(doc.get_claim("REQ-SW-001").is_none());
        assert!(doc.claim("REQ-SW-001", "bob", 1800));
        assert_eq!(doc.get_claim("REQ-SW-001").unwrap().user_id, "bob");
    }

    #[test]
    fn unchanged_scalar_writes_keep_their_stamps() {
        let mut doc = RtmDocument::with_replica(1);
        let req = sample("REQ-SW-001");
        doc.set_requirement(&req);
        let first = doc.encode_state();
        doc.set_requirement(&req);
        let second = doc.encode_state();
        // Identical content: only last_modified may differ.
        assert_eq!(
            doc.get_requirement("REQ-SW-001").unwrap(),
            req
        );
        assert_eq!(first.len(), second.len());
    }
}
