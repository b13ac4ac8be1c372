//! # Catalog
//!
//! Data model for declarative resource management: typed resources with
//! desired properties, relationship metaparameters, containment, stages,
//! and the reconciliation seam the execution engine drives.
//!
//! A catalog is the compiled input to one transaction run. It knows nothing
//! about graphs or ordering; it records what was declared, in declaration
//! order, and leaves validation to the engine that consumes it.
//!
//! ## Example
//!
//! ```
//! use catalog::{Catalog, Resource, ResourceRef};
//!
//! let mut catalog = Catalog::new("web01.example.com");
//! catalog.add(
//!     Resource::new("Package", "nginx").with_property("ensure", "installed"),
//! );
//! catalog.add(
//!     Resource::new("Service", "nginx")
//!         .with_property("ensure", "running")
//!         .subscribe(ResourceRef::new("Package", "nginx")),
//! );
//!
//! assert_eq!(catalog.len(), 2);
//! ```

mod catalog;
mod error;
mod reconcile;
mod resource;
mod types;

pub use catalog::{Catalog, DEFAULT_STAGE};
pub use error::{Error, Result};
pub use reconcile::Reconciler;
pub use resource::{Resource, ResourceRef, SourceLocation};
pub use types::{compute_diff, PropertyChange, PropertyMap, PropertyValue};
