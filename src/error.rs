//! Error types for the engine
//!
//! Everything here is fatal and pre-run: these errors surface while the
//! relationship graph is being built, before any reconciler is invoked.
//! Reconciliation failures during a run are not errors in this sense; they
//! are recorded per resource in the report and never abort the walk.

use catalog::ResourceRef;
use thiserror::Error;

/// Errors that can occur while building a relationship graph
#[derive(Error, Debug)]
pub enum Error {
    /// Two resources in the catalog share the same `(type, title)`
    #[error("duplicate resource {resource} in catalog")]
    DuplicateResource { resource: ResourceRef },

    /// The dependency graph contains at least one cycle
    #[error("{}", render_cycles(.cycles))]
    CycleDetected { cycles: Vec<Vec<ResourceRef>> },

    /// A relationship metaparameter references a resource that is not in
    /// the catalog (or is virtual and was never realized)
    #[error("{from} references missing resource {to}")]
    MissingResource { from: ResourceRef, to: ResourceRef },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Render cycles as `(A[x] => B[y] => A[x])`, one per line
///
/// Cycle members arrive sorted so the message is stable across runs.
fn render_cycles(cycles: &[Vec<ResourceRef>]) -> String {
    let rendered: Vec<String> = cycles
        .iter()
        .map(|cycle| {
            let mut path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            if let Some(first) = path.first().cloned() {
                path.push(first);
            }
            format!("({})", path.join(" => "))
        })
        .collect();
    format!(
        "found {} dependency cycle{}: {}",
        cycles.len(),
        if cycles.len() == 1 { "" } else { "s" },
        rendered.join(", ")
    )
}
