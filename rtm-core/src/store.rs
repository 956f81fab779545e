//! In-memory requirement collection with CRUD, filtering, and statistics.
//!
//! The store owns the records; the graph, validator, and coverage engines
//! borrow it read-only. The dependency graph is cached and invalidated
//! synchronously on any structural mutation (add, remove, or a change to a
//! dependency/blocks set).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, RtmError};
use crate::graph::DependencyGraph;
use crate::model::{Priority, Requirement, Status};
use crate::refs::parse_id_set;
use crate::table::{self, HeaderCase, TableFile};
use crate::validate::{self, ReciprocityIssue, ValidationReport};

/// A single field assignment for [`RequirementStore::update`].
///
/// Status and priority accept either the enum or its persisted string form;
/// dependency and blocks sets accept either a set or a pipe-delimited string.
/// Unknown keys land in the record's `extra` map.
#[derive(Debug, Clone, Default)]
pub struct RequirementPatch {
    fields: Vec<PatchField>,
}

#[derive(Debug, Clone)]
enum PatchField {
    Category(String),
    Subcategory(String),
    RequirementText(String),
    TargetValue(String),
    TestModule(String),
    TestFunction(String),
    ValidationMethod(String),
    Status(Status),
    Priority(Priority),
    Phase(Option<i64>),
    Notes(String),
    EffortWeeks(Option<f64>),
    Dependencies(BTreeSet<String>),
    Blocks(BTreeSet<String>),
    Assignee(String),
    Sprint(String),
    StartedDate(String),
    CompletedDate(String),
    RequirementFile(String),
    ExternalId(String),
    Extra(String, String),
}

impl RequirementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn category(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Category(value.into()));
        self
    }

    pub fn subcategory(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Subcategory(value.into()));
        self
    }

    pub fn requirement_text(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::RequirementText(value.into()));
        self
    }

    pub fn target_value(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::TargetValue(value.into()));
        self
    }

    pub fn test_module(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::TestModule(value.into()));
        self
    }

    pub fn test_function(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::TestFunction(value.into()));
        self
    }

    pub fn validation_method(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::ValidationMethod(value.into()));
        self
    }

    pub fn status(mut self, value: Status) -> Self {
        self.fields.push(PatchField::Status(value));
        self
    }

    /// Status from its persisted string form.
    pub fn status_str(self, value: &str) -> Self {
        self.status(Status::from_str_lossy(value))
    }

    pub fn priority(mut self, value: Priority) -> Self {
        self.fields.push(PatchField::Priority(value));
        self
    }

    /// Priority from its persisted string form.
    pub fn priority_str(self, value: &str) -> Self {
        self.priority(Priority::from_str_lossy(value))
    }

    pub fn phase(mut self, value: Option<i64>) -> Self {
        self.fields.push(PatchField::Phase(value));
        self
    }

    pub fn notes(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Notes(value.into()));
        self
    }

    pub fn effort_weeks(mut self, value: Option<f64>) -> Self {
        self.fields.push(PatchField::EffortWeeks(value));
        self
    }

    pub fn dependencies(mut self, value: BTreeSet<String>) -> Self {
        self.fields.push(PatchField::Dependencies(value));
        self
    }

    /// Dependencies from a pipe-delimited string.
    pub fn dependencies_str(self, value: &str) -> Self {
        self.dependencies(parse_id_set(value))
    }

    pub fn blocks(mut self, value: BTreeSet<String>) -> Self {
        self.fields.push(PatchField::Blocks(value));
        self
    }

    /// Blocks from a pipe-delimited string.
    pub fn blocks_str(self, value: &str) -> Self {
        self.blocks(parse_id_set(value))
    }

    pub fn assignee(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Assignee(value.into()));
        self
    }

    pub fn sprint(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Sprint(value.into()));
        self
    }

    pub fn started_date(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::StartedDate(value.into()));
        self
    }

    pub fn completed_date(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::CompletedDate(value.into()));
        self
    }

    pub fn requirement_file(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::RequirementFile(value.into()));
        self
    }

    pub fn external_id(mut self, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::ExternalId(value.into()));
        self
    }

    /// Set a schema-extension column.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(PatchField::Extra(key.into(), value.into()));
        self
    }
}

/// Conjunctive record filter. `None` criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub phase: Option<i64>,
    pub has_test: Option<bool>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, value: Status) -> Self {
        self.status = Some(value);
        self
    }

    pub fn priority(mut self, value: Priority) -> Self {
        self.priority = Some(value);
        self
    }

    pub fn category(mut self, value: impl Into<String>) -> Self {
        self.category = Some(value.into());
        self
    }

    pub fn subcategory(mut self, value: impl Into<String>) -> Self {
        self.subcategory = Some(value.into());
        self
    }

    pub fn phase(mut self, value: i64) -> Self {
        self.phase = Some(value);
        self
    }

    pub fn has_test(mut self, value: bool) -> Self {
        self.has_test = Some(value);
        self
    }

    fn matches(&self, req: &Requirement) -> bool {
        if self.status.is_some_and(|s| req.status != s) {
            return false;
        }
        if self.priority.is_some_and(|p| req.priority != p) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|c| req.category != c)
        {
            return false;
        }
        if self
            .subcategory
            .as_deref()
            .is_some_and(|c| req.subcategory != c)
        {
            return false;
        }
        if self.phase.is_some_and(|p| req.phase != Some(p)) {
            return false;
        }
        if self.has_test.is_some_and(|h| req.has_test() != h) {
            return false;
        }
        true
    }
}

/// Insertion-ordered collection of requirements.
pub struct RequirementStore {
    order: Vec<String>,
    records: HashMap<String, Requirement>,
    path: Option<PathBuf>,
    header_case: HeaderCase,
    // Derived-graph cache; rebuilt lazily, dropped on structural mutation.
    graph: RefCell<Option<Arc<DependencyGraph>>>,
}

impl std::fmt::Debug for RequirementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequirementStore")
            .field("records", &self.order.len())
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Default for RequirementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RequirementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            records: HashMap::new(),
            path: None,
            header_case: HeaderCase::Snake,
            graph: RefCell::new(None),
        }
    }

    /// Build a store from records in the given order. Later duplicates win,
    /// with a warning, matching legacy table behavior.
    pub fn from_records(records: Vec<Requirement>) -> Self {
        let mut store = Self::new();
        for req in records {
            if store.records.contains_key(&req.req_id) {
                warn!(req_id = %req.req_id, "duplicate id in input, keeping the later row");
                store.records.insert(req.req_id.clone(), req);
            } else {
                store.order.push(req.req_id.clone());
                store.records.insert(req.req_id.clone(), req);
            }
        }
        store
    }

    /// Load a store from a tabular file, remembering its path and header case
    /// for subsequent saves.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let TableFile {
            records,
            header_case,
        } = table::load_table(path)?;
        let mut store = Self::from_records(records);
        store.path = Some(path.to_path_buf());
        store.header_case = header_case;
        Ok(store)
    }

    /// Save to the path the store was loaded from.
    pub fn save(&self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| {
            RtmError::BadTable {
                path: PathBuf::new(),
                line: None,
                message: "store has no backing path; use save_as".to_string(),
            }
        })?;
        self.save_as(path)
    }

    /// Save to an explicit path, preserving the loaded header case.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let records: Vec<Requirement> = self.all().into_iter().cloned().collect();
        table::save_table(&records, path.as_ref(), self.header_case)
    }

    /// Path of the backing table, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Header case of the backing table.
    pub fn header_case(&self) -> HeaderCase {
        self.header_case
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pure lookup, `None` when absent.
    pub fn lookup(&self, req_id: &str) -> Option<&Requirement> {
        self.records.get(req_id)
    }

    /// Lookup that fails with [`RtmError::NotFound`], listing up to five
    /// available ids.
    pub fn get(&self, req_id: &str) -> Result<&Requirement> {
        self.records
            .get(req_id)
            .ok_or_else(|| RtmError::not_found(req_id, self.order.iter().cloned()))
    }

    pub fn exists(&self, req_id: &str) -> bool {
        self.records.contains_key(req_id)
    }

    /// Add a new record. Fails with [`RtmError::Duplicate`] when the id is
    /// already present.
    pub fn add(&mut self, req: Requirement) -> Result<()> {
        if self.records.contains_key(&req.req_id) {
            return Err(RtmError::Duplicate(req.req_id));
        }
        debug!(req_id = %req.req_id, "adding requirement");
        self.order.push(req.req_id.clone());
        self.records.insert(req.req_id.clone(), req);
        self.invalidate();
        Ok(())
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, req_id: &str) -> Result<Requirement> {
        match self.records.remove(req_id) {
            Some(req) => {
                self.order.retain(|id| id != req_id);
                self.invalidate();
                debug!(req_id, "removed requirement");
                Ok(req)
            }
            None => Err(RtmError::not_found(req_id, self.order.iter().cloned())),
        }
    }

    /// Apply a patch to an existing record. Invalidates derived caches only
    /// when a structural field (dependencies/blocks) changed.
    pub fn update(&mut self, req_id: &str, patch: RequirementPatch) -> Result<&Requirement> {
        if !self.records.contains_key(req_id) {
            return Err(RtmError::not_found(req_id, self.order.iter().cloned()));
        }
        let mut structural = false;
        let req = self.records.get_mut(req_id).expect("checked above");
        for field in patch.fields {
            match field {
                PatchField::Category(v) => req.category = v,
                PatchField::Subcategory(v) => req.subcategory = v,
                PatchField::RequirementText(v) => req.requirement_text = v,
                PatchField::TargetValue(v) => req.target_value = v,
                PatchField::TestModule(v) => req.test_module = v,
                PatchField::TestFunction(v) => req.test_function = v,
                PatchField::ValidationMethod(v) => req.validation_method = v,
                PatchField::Status(v) => req.status = v,
                PatchField::Priority(v) => req.priority = v,
                PatchField::Phase(v) => req.phase = v,
                PatchField::Notes(v) => req.notes = v,
                PatchField::EffortWeeks(v) => req.effort_weeks = v,
                PatchField::Dependencies(v) => {
                    structural = structural || req.dependencies != v;
                    req.dependencies = v;
                }
                PatchField::Blocks(v) => {
                    structural = structural || req.blocks != v;
                    req.blocks = v;
                }
                PatchField::Assignee(v) => req.assignee = v,
                PatchField::Sprint(v) => req.sprint = v,
                PatchField::StartedDate(v) => req.started_date = v,
                PatchField::CompletedDate(v) => req.completed_date = v,
                PatchField::RequirementFile(v) => req.requirement_file = v,
                PatchField::ExternalId(v) => req.external_id = v,
                PatchField::Extra(k, v) => {
                    req.extra.insert(k, v);
                }
            }
        }
        if structural {
            self.invalidate();
        }
        Ok(&self.records[req_id])
    }

    /// Direct mutation used by the reciprocity repair: add one side of the
    /// dependency/blocks duality. Returns true when the set changed.
    pub(crate) fn link(&mut self, req_id: &str, other: &str, as_dependency: bool) -> bool {
        let Some(req) = self.records.get_mut(req_id) else {
            return false;
        };
        let changed = if as_dependency {
            req.dependencies.insert(other.to_string())
        } else {
            req.blocks.insert(other.to_string())
        };
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Records matching the query, in insertion order.
    pub fn filter(&self, query: &FilterQuery) -> Vec<&Requirement> {
        self.all()
            .into_iter()
            .filter(|req| query.matches(req))
            .collect()
    }

    /// All records in insertion order.
    pub fn all(&self) -> Vec<&Requirement> {
        self.order
            .iter()
            .map(|id| &self.records[id])
            .collect()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Record count per status, zero-initialized for every member.
    pub fn status_counts(&self) -> BTreeMap<Status, usize> {
        let mut counts: BTreeMap<Status, usize> =
            Status::ALL.iter().map(|s| (*s, 0)).collect();
        for req in self.records.values() {
            *counts.entry(req.status).or_insert(0) += 1;
        }
        counts
    }

    /// Completion percentage: complete counts fully, partial counts half.
    pub fn completion_percentage(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let counts = self.status_counts();
        let complete = counts[&Status::Complete] as f64;
        let partial = counts[&Status::Partial] as f64;
        (complete + partial * 0.5) / self.records.len() as f64 * 100.0
    }

    /// The dependency graph, cached until the next structural mutation.
    pub fn graph(&self) -> Arc<DependencyGraph> {
        let mut cache = self.graph.borrow_mut();
        if let Some(graph) = cache.as_ref() {
            return Arc::clone(graph);
        }
        let graph = Arc::new(DependencyGraph::from_store(self, ""));
        *cache = Some(Arc::clone(&graph));
        graph
    }

    fn invalidate(&mut self) {
        self.graph.get_mut().take();
    }

    // Graph delegates.

    /// Strongly connected components with more than one member.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        self.graph().find_cycles()
    }

    /// Everything transitively blocked by a requirement.
    pub fn transitive_blocks(&self, req_id: &str) -> BTreeSet<String> {
        self.graph().transitive_blocks(req_id)
    }

    /// Requirements ranked by how much work they transitively block.
    pub fn critical_path(&self) -> Vec<String> {
        self.graph().critical_path()
    }

    // Validation delegates.

    /// Schema-level validation diagnostics.
    pub fn validate(&self) -> Vec<String> {
        validate::validate_schema(self)
    }

    /// Dependency/blocks duality violations.
    pub fn check_reciprocity(&self) -> Vec<ReciprocityIssue> {
        validate::check_reciprocity(self)
    }

    /// Repair the duality in place; returns the number of fixes.
    pub fn fix_reciprocity(&mut self) -> usize {
        validate::fix_reciprocity(self)
    }

    /// Schema + cycles + reciprocity, without mutating.
    pub fn validate_all(&self) -> ValidationReport {
        validate::validate_all(self)
    }
}
