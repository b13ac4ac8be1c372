//! Transaction - the graph walk
//!
//! A transaction takes a catalog, builds the relationship graph (any
//! duplicate, dangling reference, or cycle aborts here, before anything is
//! touched), then drains the graph: repeatedly pick the ready node with the
//! lowest priority key, reconcile it, record its status, and unblock its
//! dependents. Failures are local; the resource is marked `Failed`, its
//! dependents downgrade to `FailedDependency`, and the walk continues.
//! The walk is strictly sequential: one resource finishes before the next
//! is selected.

use crate::error::Result;
use crate::event::Event;
use crate::graph::{EdgeKind, NodeId, RelationshipGraph};
use crate::prioritize::{OrderingPolicy, Prioritizer, PriorityKey};
use crate::report::{Outcome, Report, ResourceStatus};
use catalog::{compute_diff, Catalog, PropertyChange, Reconciler, Resource, ResourceRef};
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Run configuration, threaded explicitly; there is no ambient state
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Compute and record diffs everywhere, apply nothing
    pub noop: bool,
    /// Tie-breaking policy for mutually unordered resources
    pub ordering: OrderingPolicy,
    /// When set, only resources carrying at least one of these tags are
    /// applied; the rest are recorded as skipped
    pub tags: Option<Vec<String>>,
    /// Schedule purely by priority, ignoring edges and failure propagation
    pub ignore_dependencies: bool,
}

/// One catalog application
pub struct Transaction {
    graph: RelationshipGraph,
    prioritizer: Prioritizer,
    options: Options,
    host: String,
}

/// Result of reconciling a single resource, before timing is attached
struct Evaluation {
    outcome: Outcome,
    changes: Vec<PropertyChange>,
    refreshed_by: Vec<ResourceRef>,
    error: Option<String>,
}

impl Evaluation {
    fn failed(error: String, refreshed_by: Vec<ResourceRef>) -> Self {
        Self {
            outcome: Outcome::Failed,
            changes: Vec::new(),
            refreshed_by,
            error: Some(error),
        }
    }
}

impl Transaction {
    /// Build the graph and prioritizer for a catalog
    ///
    /// Fatal construction errors (duplicate resource, missing reference,
    /// dependency cycle) surface here; `run` itself cannot fail.
    pub fn new(catalog: &Catalog, options: Options) -> Result<Self> {
        let graph = RelationshipGraph::build(catalog)?;
        let prioritizer = Prioritizer::new(options.ordering, graph.len());
        Ok(Self {
            graph,
            prioritizer,
            options,
            host: catalog.name().to_string(),
        })
    }

    /// The graph this transaction will walk
    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// Drain the graph, reconciling each resource exactly once
    pub fn run(&mut self, reconciler: &dyn Reconciler) -> Report {
        let n = self.graph.len();
        let mut report = Report::new(self.host.clone());
        let mut resolved: Vec<Option<Outcome>> = vec![None; n];
        let mut remaining: Vec<usize> = (0..n)
            .map(|id| {
                if self.options.ignore_dependencies {
                    0
                } else {
                    self.graph.in_degree(id)
                }
            })
            .collect();
        let mut pending_refresh: Vec<Vec<ResourceRef>> = vec![Vec::new(); n];

        let mut ready: BinaryHeap<Reverse<(PriorityKey, NodeId)>> = BinaryHeap::new();
        for id in 0..n {
            if remaining[id] == 0 {
                let key = self.prioritizer.priority_for(id, self.graph.node(id));
                ready.push(Reverse((key, id)));
            }
        }

        let mut sequence = 0u64;
        while let Some(Reverse((_, id))) = ready.pop() {
            let started = Utc::now();
            let refresh_sources = std::mem::take(&mut pending_refresh[id]);

            let dependency_failed = !self.options.ignore_dependencies
                && self
                    .graph
                    .dependencies_of(id)
                    .iter()
                    .any(|&dep| resolved[dep].is_some_and(Outcome::is_failure));

            let evaluation = if dependency_failed {
                log::debug!("{}: dependency failed, not applying", self.graph.node(id).id);
                Evaluation {
                    outcome: Outcome::FailedDependency,
                    changes: Vec::new(),
                    refreshed_by: Vec::new(),
                    error: None,
                }
            } else if self.filtered_out(self.graph.node(id)) {
                Evaluation {
                    outcome: Outcome::Skipped,
                    changes: Vec::new(),
                    refreshed_by: Vec::new(),
                    error: None,
                }
            } else {
                evaluate(&self.options, reconciler, self.graph.node(id), refresh_sources)
            };

            let rref = self.graph.node(id).id.clone();
            log::debug!("{rref}: {:?}", evaluation.outcome);

            // Fan changes out along notification edges; targets are only
            // dequeued after all their predecessors resolve, so delivery
            // happens-before the target's own evaluation.
            if evaluation.outcome == Outcome::Changed {
                let event = Event {
                    source: rref.clone(),
                    outcome: evaluation.outcome,
                };
                for edge in self.graph.edges_from(id) {
                    if edge.kind == EdgeKind::Notification {
                        log::debug!(
                            "scheduling refresh of {} from {}",
                            self.graph.node(edge.target).id,
                            event.source
                        );
                        pending_refresh[edge.target].push(event.source.clone());
                    }
                }
            }

            resolved[id] = Some(evaluation.outcome);
            report.add(ResourceStatus {
                resource: rref,
                outcome: evaluation.outcome,
                changes: evaluation.changes,
                refreshed_by: evaluation.refreshed_by,
                error: evaluation.error,
                started,
                finished: Utc::now(),
                sequence,
            });
            sequence += 1;

            if !self.options.ignore_dependencies {
                for &succ in self.graph.dependents_of(id) {
                    remaining[succ] -= 1;
                    if remaining[succ] == 0 {
                        let key = self.prioritizer.priority_for(succ, self.graph.node(succ));
                        ready.push(Reverse((key, succ)));
                    }
                }
            }
        }

        report.finish();
        report
    }

    fn filtered_out(&self, resource: &Resource) -> bool {
        match &self.options.tags {
            Some(tags) => !tags.iter().any(|tag| resource.tagged(tag)),
            None => false,
        }
    }
}

/// Build and run a transaction in one call
pub fn apply(catalog: &Catalog, reconciler: &dyn Reconciler, options: Options) -> Result<Report> {
    let mut transaction = Transaction::new(catalog, options)?;
    Ok(transaction.run(reconciler))
}

/// Reconcile one resource: deliver pending refreshes, probe current state,
/// diff against desired, and apply unless noop is in effect
///
/// Under noop (global or per-resource) the reconciler is only ever probed:
/// refreshes are recorded in `refreshed_by` without being delivered, and
/// `apply` is never reached.
fn evaluate(
    options: &Options,
    reconciler: &dyn Reconciler,
    resource: &Resource,
    refresh_sources: Vec<ResourceRef>,
) -> Evaluation {
    let noop = options.noop || resource.noop;
    let mut refreshed_by = Vec::new();
    for source in refresh_sources {
        refreshed_by.push(source.clone());
        if noop {
            log::debug!("{}: noop, not refreshing from {source}", resource.id);
            continue;
        }
        if let Err(err) = reconciler.refresh(resource) {
            log::warn!("{}: refresh from {source} failed: {err}", resource.id);
            return Evaluation::failed(format!("refresh failed: {err}"), refreshed_by);
        }
    }

    let current = match reconciler.current_state(resource) {
        Ok(current) => current,
        Err(err) => {
            log::warn!("{}: state probe failed: {err}", resource.id);
            return Evaluation::failed(err.to_string(), refreshed_by);
        }
    };

    let changes = compute_diff(&current, &resource.properties);
    if changes.is_empty() {
        return Evaluation {
            outcome: Outcome::Unchanged,
            changes,
            refreshed_by,
            error: None,
        };
    }

    if noop {
        return Evaluation {
            outcome: Outcome::Noop,
            changes,
            refreshed_by,
            error: None,
        };
    }

    match reconciler.apply(resource, &changes) {
        Ok(()) => Evaluation {
            outcome: Outcome::Changed,
            changes,
            refreshed_by,
            error: None,
        },
        Err(err) => {
            log::warn!("{}: apply failed: {err}", resource.id);
            Evaluation {
                outcome: Outcome::Failed,
                changes,
                refreshed_by,
                error: Some(err.to_string()),
            }
        }
    }
}
