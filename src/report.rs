//! Per-resource status and the run report
//!
//! Every resource in the graph receives exactly one terminal
//! [`ResourceStatus`] per run. The [`Report`] accumulates them in
//! evaluation order and is sealed when the transaction finishes: aggregate
//! metrics and the overall run status are computed once, and nothing is
//! mutable afterward. The whole tree serializes with serde for out-of-scope
//! reporting sinks.

use catalog::{PropertyChange, ResourceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one resource in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Current state already matched desired state
    Unchanged,
    /// Changes were applied successfully
    Changed,
    /// Reconciliation raised; error captured, run continued
    Failed,
    /// Never attempted: an ancestor failed
    FailedDependency,
    /// Never attempted: excluded by the tag filter
    Skipped,
    /// Out of sync, but noop was in effect; diff recorded, nothing applied
    Noop,
}

impl Outcome {
    /// Failures propagate to dependents; skips do not
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::FailedDependency)
    }

    /// Whether the resource's current state differed from desired
    pub fn is_out_of_sync(self) -> bool {
        matches!(self, Self::Changed | Self::Noop)
    }
}

/// One resource's record for one run; never mutated once recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub resource: ResourceRef,
    pub outcome: Outcome,
    /// Property-level diff (applied, or merely recorded under noop/failure)
    pub changes: Vec<PropertyChange>,
    /// Sources of refresh events delivered before this resource ran
    pub refreshed_by: Vec<ResourceRef>,
    /// Captured error message for `Failed`
    pub error: Option<String>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    /// Position in the evaluation sequence, starting at zero
    pub sequence: u64,
}

/// Overall disposition of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Unchanged,
    Changed,
    Failed,
}

/// Aggregate counts over all resource statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub total: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failed_dependencies: usize,
    pub skipped: usize,
    pub noop: usize,
    /// Resources whose current state differed from desired (changed + noop)
    pub out_of_sync: usize,
}

impl ReportMetrics {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Changed => self.changed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::FailedDependency => self.failed_dependencies += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Noop => self.noop += 1,
        }
        if outcome.is_out_of_sync() {
            self.out_of_sync += 1;
        }
    }
}

/// The structured record of one transaction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    host: String,
    started: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    status: RunStatus,
    statuses: Vec<ResourceStatus>,
    metrics: ReportMetrics,
}

impl Report {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            started: Utc::now(),
            finished: None,
            status: RunStatus::Unchanged,
            statuses: Vec::new(),
            metrics: ReportMetrics::default(),
        }
    }

    pub(crate) fn add(&mut self, status: ResourceStatus) {
        debug_assert!(self.finished.is_none(), "report already sealed");
        self.statuses.push(status);
    }

    /// Seal the report: stamp the end time, compute metrics and run status
    pub(crate) fn finish(&mut self) {
        let mut metrics = ReportMetrics::default();
        for status in &self.statuses {
            metrics.record(status.outcome);
        }
        self.status = if metrics.failed + metrics.failed_dependencies > 0 {
            RunStatus::Failed
        } else if metrics.out_of_sync > 0 {
            RunStatus::Changed
        } else {
            RunStatus::Unchanged
        };
        self.metrics = metrics;
        self.finished = Some(Utc::now());
    }

    /// Host identity the catalog was applied to
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// End time; `None` only while the transaction is still running
    pub fn finished(&self) -> Option<DateTime<Utc>> {
        self.finished
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// All resource statuses, in evaluation order
    pub fn statuses(&self) -> &[ResourceStatus] {
        &self.statuses
    }

    pub fn metrics(&self) -> &ReportMetrics {
        &self.metrics
    }

    /// Look up one resource's status
    pub fn status_of(&self, resource: &ResourceRef) -> Option<&ResourceStatus> {
        self.statuses.iter().find(|s| &s.resource == resource)
    }
}
