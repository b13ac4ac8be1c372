//! Reconciliation seam
//!
//! The engine never talks to package managers, service managers, or
//! filesystems itself. It asks a [`Reconciler`] what a resource's current
//! state is, computes the diff against the desired state, and hands the
//! changes back for application. One reconciler serves a whole run,
//! dispatching internally on the resource type.

use crate::resource::Resource;
use crate::types::{PropertyChange, PropertyMap};
use anyhow::Result;

/// Capability interface for probing and changing system state
///
/// Implementations dispatch on `resource.id.rtype` to whatever actually
/// manages that kind of state. Errors are local to the resource being
/// reconciled: the engine records them and carries on.
pub trait Reconciler: Send + Sync {
    /// Probe the current state of the resource
    ///
    /// Only properties relevant to the resource's desired state need to be
    /// reported; anything absent is treated as unset.
    fn current_state(&self, resource: &Resource) -> Result<PropertyMap>;

    /// Apply the given changes to move the resource to its desired state
    fn apply(&self, resource: &Resource, changes: &[PropertyChange]) -> Result<()>;

    /// React to a refresh event from a notifying dependency
    ///
    /// Typically "restart the service". Invoked before the resource's own
    /// reconciliation step. The default does nothing.
    fn refresh(&self, resource: &Resource) -> Result<()> {
        let _ = resource;
        Ok(())
    }
}
