//! Requirements traceability matrix core.
//!
//! A persisted, schema-validated store of engineering requirements with typed
//! relations, plus the engines that operate on it:
//!
//! - [`store`] — insertion-ordered record collection with CRUD, filtering,
//!   and statistics
//! - [`table`] — the CSV codec (header-case detection, canonical form,
//!   atomic writes)
//! - [`schema`] — column declarations and row validation
//! - [`graph`] — cycle detection, reachability, topological order, critical
//!   path, cross-repo edges
//! - [`validate`] — schema errors, reciprocity, cycle warnings, repair
//! - [`coverage`] — test outcomes to status transitions
//! - [`health`] — composed check suites
//! - [`refs`] — the requirement reference grammar
//! - [`config`] — options recognized by the core
//!
//! The CLI, web UI, git orchestration, login flow, and external-system
//! adapters are collaborators: they consume this surface and are not part of
//! the core.

pub mod config;
pub mod coverage;
pub mod error;
pub mod graph;
pub mod health;
pub mod model;
pub mod refs;
pub mod schema;
pub mod store;
pub mod table;
pub mod validate;

pub use config::{ConflictResolution, RtmConfig, SyncSettings, load_config};
pub use coverage::{
    RequirementCoverage, StatusTransition, TestOutcome, apply_transitions, collect_coverage,
    proposed_status, proposed_transitions,
};
pub use error::{Result, RtmError};
pub use graph::{CrossRepoEdge, DependencyGraph, EdgeKind, GraphStats};
pub use health::{Check, CheckStatus, HealthContext, HealthReport, HealthRunner, HealthStatus};
pub use model::{Priority, Requirement, Status};
pub use refs::{RequirementRef, category_of, join_id_set, looks_like_req_id, parse_id_set};
pub use schema::{Column, ColumnType, Schema, builtin_schema, core_schema, taxonomy_schema};
pub use store::{FilterQuery, RequirementPatch, RequirementStore};
pub use table::{HeaderCase, TableFile, load_table, save_table};
pub use validate::{
    ReciprocityIssue, ReciprocityKind, ValidationReport, check_reciprocity, fix_reciprocity,
    validate_all, validate_cycles, validate_schema,
};
