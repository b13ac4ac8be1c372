//! Error types for the catalog crate

use crate::resource::ResourceRef;
use thiserror::Error;

/// Errors that can occur while assembling a catalog
#[derive(Error, Debug)]
pub enum Error {
    /// Stage assignment referenced a stage that was never declared
    #[error("unknown stage '{stage}' for resource {resource}")]
    UnknownStage { stage: String, resource: ResourceRef },

    /// Stage assignment referenced a resource not in the catalog
    #[error("unknown resource {resource}")]
    UnknownResource { resource: ResourceRef },
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;
