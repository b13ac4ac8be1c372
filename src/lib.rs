//! # Converge
//!
//! A resource graph transaction engine: take a compiled catalog of typed,
//! named resources with ordering relationships, build a dependency graph,
//! and drain it in order, reconciling each resource through a pluggable
//! interface and recording every outcome in a structured report.
//!
//! ## Core concepts
//!
//! - **Catalog** (from the `catalog` crate): the compiled input - resources,
//!   relationship metaparameters, containment, stages
//! - **RelationshipGraph**: arena-backed directed graph of resources and
//!   typed edges; rejects duplicates, dangling references, and cycles
//!   before anything runs
//! - **Prioritizer**: policy-selectable tie-breaking among mutually
//!   unordered resources (manifest order, title hash, random)
//! - **Transaction**: the priority-ordered topological drain - reconcile,
//!   propagate failures, deliver refresh events, honor noop
//! - **Report**: per-resource statuses plus aggregate metrics, sealed at
//!   the end of the run
//! - **Scheduler**: cooperative periodic driver for agent-style repeated
//!   runs, with splay
//!
//! ## Example
//!
//! ```
//! use catalog::{Catalog, PropertyChange, PropertyMap, Reconciler, Resource};
//! use converge::{apply, Options, Outcome};
//!
//! struct InMemory;
//!
//! impl Reconciler for InMemory {
//!     fn current_state(&self, _resource: &Resource) -> anyhow::Result<PropertyMap> {
//!         Ok(PropertyMap::new()) // nothing exists yet
//!     }
//!
//!     fn apply(&self, _resource: &Resource, _changes: &[PropertyChange]) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut catalog = Catalog::new("web01");
//! catalog.add(Resource::new("Package", "nginx").with_property("ensure", "installed"));
//! catalog.add(
//!     Resource::new("Service", "nginx")
//!         .with_property("ensure", "running")
//!         .require(("Package", "nginx")),
//! );
//!
//! let report = apply(&catalog, &InMemory, Options::default())?;
//! assert!(report.statuses().iter().all(|s| s.outcome == Outcome::Changed));
//! # Ok::<(), converge::Error>(())
//! ```

pub mod error;
pub mod event;
pub mod graph;
pub mod prioritize;
pub mod report;
pub mod scheduler;
pub mod transaction;

pub use error::{Error, Result};
pub use event::Event;
pub use graph::{Edge, EdgeKind, NodeId, RelationshipGraph};
pub use prioritize::{OrderingPolicy, Prioritizer, PriorityKey};
pub use report::{Outcome, Report, ReportMetrics, ResourceStatus, RunStatus};
pub use scheduler::{Job, JobControl, Scheduler};
pub use transaction::{apply, Options, Transaction};
