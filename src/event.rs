//! In-transaction refresh events
//!
//! When an applied resource's outcome is `Changed`, the transaction emits
//! an event and fans it out along notification edges, enqueuing a refresh
//! on each target. Events are plain values consumed synchronously within
//! the same run; nothing is retained afterward and there are no callback
//! chains.

use crate::report::Outcome;
use catalog::ResourceRef;
use serde::{Deserialize, Serialize};

/// A state-change notification from one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The resource that changed
    pub source: ResourceRef,
    /// Its outcome (always `Changed` for events the engine emits)
    pub outcome: Outcome,
}
