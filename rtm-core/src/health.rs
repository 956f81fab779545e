//! Health aggregation: a fixed, ordered suite of named checks composed into
//! one categorized report.
//!
//! Checks return `anyhow::Result<Check>`; an `Err` (or a panic) becomes a
//! fail-blocking result and never aborts the suite, so a broken check still
//! yields a complete report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use crate::coverage::RequirementCoverage;
use crate::model::Status;
use crate::store::RequirementStore;

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skip,
}

/// Overall report status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One named check outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub blocking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Check {
    pub fn pass(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    pub fn warn(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    pub fn skip(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Skip, message)
    }

    fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            blocking: true,
            details: None,
        }
    }

    /// Mark this check advisory: its failure degrades but never blocks.
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Complete health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<Check>,
    /// Count per check result, zero-initialized for every member.
    pub summary: BTreeMap<String, usize>,
}

impl HealthReport {
    /// Aggregate a finished check list.
    ///
    /// `UNHEALTHY` when any blocking check failed, else `DEGRADED` when any
    /// check warned, else `HEALTHY`. Strict mode elevates `DEGRADED` to
    /// `UNHEALTHY`.
    pub fn aggregate(checks: Vec<Check>, strict: bool) -> Self {
        let mut summary: BTreeMap<String, usize> = ["pass", "warn", "fail", "skip"]
            .iter()
            .map(|k| (k.to_string(), 0))
            .collect();
        for check in &checks {
            let key = match check.status {
                CheckStatus::Pass => "pass",
                CheckStatus::Warn => "warn",
                CheckStatus::Fail => "fail",
                CheckStatus::Skip => "skip",
            };
            *summary.get_mut(key).expect("summary key") += 1;
        }

        let blocking_failure = checks
            .iter()
            .any(|c| c.blocking && c.status == CheckStatus::Fail);
        let warned = checks.iter().any(|c| {
            c.status == CheckStatus::Warn || (!c.blocking && c.status == CheckStatus::Fail)
        });

        let status = if blocking_failure {
            HealthStatus::Unhealthy
        } else if warned {
            if strict {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            }
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            checks,
            summary,
        }
    }
}

/// Read-only inputs shared by the built-in checks.
pub struct HealthContext<'a> {
    pub store: &'a RequirementStore,
    /// Coverage from the most recent test run, when available.
    pub coverage: Option<&'a BTreeMap<String, RequirementCoverage>>,
}

/// A named check in the suite.
pub struct NamedCheck<'a> {
    pub name: &'static str,
    pub run: Box<dyn Fn(&HealthContext<'_>) -> anyhow::Result<Check> + 'a>,
}

/// Runs an ordered list of checks and aggregates the outcome.
pub struct HealthRunner<'a> {
    checks: Vec<NamedCheck<'a>>,
    strict: bool,
}

impl<'a> HealthRunner<'a> {
    /// An empty runner; add checks with [`HealthRunner::check`].
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            strict: false,
        }
    }

    /// The standard suite over a store.
    pub fn standard() -> Self {
        Self::new()
            .check("store_loaded", check_store_loaded)
            .check("schema_valid", check_schema_valid)
            .check("reciprocity", check_reciprocity_clean)
            .check("cycles", check_no_cycles)
            .check("test_linkage", check_test_linkage)
            .check("completion", check_completion)
    }

    /// Append a named check.
    pub fn check(
        mut self,
        name: &'static str,
        run: impl Fn(&HealthContext<'_>) -> anyhow::Result<Check> + 'a,
    ) -> Self {
        self.checks.push(NamedCheck {
            name,
            run: Box::new(run),
        });
        self
    }

    /// Elevate `DEGRADED` to `UNHEALTHY`.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Execute every check in order. Panics and errors become fail-blocking
    /// results; the suite always completes.
    pub fn run(&self, ctx: &HealthContext<'_>) -> HealthReport {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let outcome = catch_unwind(AssertUnwindSafe(|| (check.run)(ctx)));
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => Check::fail(check.name, format!("check error: {err:#}")),
                Err(_) => Check::fail(check.name, "check panicked"),
            };
            debug!(name = check.name, status = ?result.status, "health check finished");
            results.push(result);
        }
        HealthReport::aggregate(results, self.strict)
    }
}

impl Default for HealthRunner<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_store_loaded(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    if ctx.store.is_empty() {
        Ok(Check::fail("store_loaded", "store contains no requirements"))
    } else {
        Ok(
            Check::pass(
                "store_loaded",
                format!("{} requirements loaded", ctx.store.len()),
            )
            .with_details(serde_json::json!({ "requirement_count": ctx.store.len() })),
        )
    }
}

fn check_schema_valid(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    let errors = ctx.store.validate();
    if errors.is_empty() {
        Ok(Check::pass("schema_valid", "no schema errors"))
    } else {
        Ok(
            Check::fail("schema_valid", format!("{} schema errors", errors.len()))
                .with_details(serde_json::json!({ "errors": errors })),
        )
    }
}

fn check_reciprocity_clean(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    let issues = ctx.store.check_reciprocity();
    if issues.is_empty() {
        Ok(Check::pass("reciprocity", "dependencies and blocks agree"))
    } else {
        let rendered: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        Ok(Check::warn(
            "reciprocity",
            format!("{} reciprocity violations", issues.len()),
        )
        .with_details(serde_json::json!({ "violations": rendered }))
        .non_blocking())
    }
}

fn check_no_cycles(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    let cycles = ctx.store.find_cycles();
    if cycles.is_empty() {
        Ok(Check::pass("cycles", "dependency graph is acyclic"))
    } else {
        Ok(Check::warn(
            "cycles",
            format!("{} dependency cycles", cycles.len()),
        )
        .with_details(serde_json::json!({ "cycles": cycles }))
        .non_blocking())
    }
}

fn check_test_linkage(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    let untested: Vec<&str> = ctx
        .store
        .all()
        .into_iter()
        .filter(|r| !r.has_test() && r.status != Status::NotStarted)
        .map(|r| r.req_id.as_str())
        .collect();
    if untested.is_empty() {
        Ok(Check::pass("test_linkage", "every active requirement names a test"))
    } else {
        Ok(Check::warn(
            "test_linkage",
            format!("{} requirements without a linked test", untested.len()),
        )
        .with_details(serde_json::json!({ "untested": untested }))
        .non_blocking())
    }
}

fn check_completion(ctx: &HealthContext<'_>) -> anyhow::Result<Check> {
    let pct = ctx.store.completion_percentage();
    let verified = ctx
        .coverage
        .map(|cov| cov.values().filter(|c| c.failed == 0 && c.passed > 0).count());
    let mut details = serde_json::json!({ "completion_percentage": pct });
    if let Some(verified) = verified {
        details["verified_requirements"] = serde_json::json!(verified);
    }
    Ok(
        Check::pass("completion", format!("{pct:.1}% complete"))
            .with_details(details)
            .non_blocking(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Requirement;

    fn populated_store() -> RequirementStore {
        let mut store = RequirementStore::new();
        let mut req = Requirement::new("REQ-SW-001");
        req.category = "SW".to_string();
        req.requirement_text = "tracked".to_string();
        req.test_module = "tests/test_sw.rs".to_string();
        req.test_function = "resolves_targets".to_string();
        store.add(req).unwrap();
        store
    }

    #[test]
    fn healthy_store_reports_healthy() {
        let store = populated_store();
        let ctx = HealthContext {
            store: &store,
            coverage: None,
        };
        let report = HealthRunner::standard().run(&ctx);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.checks.len(), 6);
        assert_eq!(report.summary["fail"], 0);
    }

    #[test]
    fn empty_store_is_unhealthy() {
        let store = RequirementStore::new();
        let ctx = HealthContext {
            store: &store,
            coverage: None,
        };
        let report = HealthRunner::standard().run(&ctx);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn warnings_degrade_and_strict_elevates() {
        let mut store = populated_store();
        let mut other = Requirement::new("REQ-SW-002");
        other.category = "SW".to_string();
        other.requirement_text = "other".to_string();
        other.test_module = "tests/test_sw.rs".to_string();
        other.test_function = "other_case".to_string();
        other.blocks.insert("REQ-SW-001".to_string());
        store.add(other).unwrap();

        let ctx = HealthContext {
            store: &store,
            coverage: None,
        };
        let report = HealthRunner::standard().run(&ctx);
        assert_eq!(report.status, HealthStatus::Degraded);

        let strict = HealthRunner::standard().strict(true).run(&ctx);
        assert_eq!(strict.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn erroring_and_panicking_checks_become_blocking_failures() {
        let store = populated_store();
        let ctx = HealthContext {
            store: &store,
            coverage: None,
        };
        let report = HealthRunner::new()
            .check("explodes", |_| anyhow::bail!("boom"))
            .check("panics", |_| panic!("unexpected"))
            .check("fine", |_| Ok(Check::pass("fine", "ok")))
            .run(&ctx);

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks[0].status, CheckStatus::Fail);
        assert!(report.checks[0].message.contains("boom"));
        assert_eq!(report.checks[1].status, CheckStatus::Fail);
        assert_eq!(report.checks[2].status, CheckStatus::Pass);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let store = populated_store();
        let ctx = HealthContext {
            store: &store,
            coverage: None,
        };
        let a = HealthRunner::standard().run(&ctx);
        let b = HealthRunner::standard().run(&ctx);
        assert_eq!(a, b);
    }

    #[test]
    fn report_serializes_with_summary() {
        let report = HealthReport::aggregate(
            vec![
                Check::pass("a", "ok"),
                Check::warn("b", "meh").non_blocking(),
            ],
            false,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["summary"]["pass"], 1);
        assert_eq!(json["summary"]["warn"], 1);
    }
}
