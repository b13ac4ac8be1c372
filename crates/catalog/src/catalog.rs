//! Catalog - the compiled input to a transaction
//!
//! A catalog is a plain container: resources in declaration order, the
//! container path each was declared in, and stage assignments. It performs
//! no graph validation itself; duplicate identities and dependency cycles
//! are detected when the relationship graph is built from it.

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceRef};

/// The default stage every resource belongs to unless reassigned
pub const DEFAULT_STAGE: &str = "main";

/// A compiled set of resources for one run
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    resources: Vec<Resource>,
    containers: Vec<Vec<String>>,
    stage_of: Vec<String>,
    stages: Vec<String>,
}

impl Catalog {
    /// Create an empty catalog for the named host
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            containers: Vec::new(),
            stage_of: Vec::new(),
            stages: vec![DEFAULT_STAGE.to_string()],
        }
    }

    /// Host identity this catalog was compiled for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a top-level resource
    pub fn add(&mut self, resource: Resource) {
        self.add_in(&[], resource);
    }

    /// Add a resource declared inside a container (class/definition) path
    ///
    /// Resources sharing a container path are implicitly ordered by
    /// declaration order when the relationship graph is built.
    pub fn add_in(&mut self, container: &[&str], resource: Resource) {
        self.resources.push(resource);
        self.containers
            .push(container.iter().map(ToString::to_string).collect());
        self.stage_of.push(DEFAULT_STAGE.to_string());
    }

    /// Declare a stage; stages are totally ordered by declaration order,
    /// with the default stage first
    pub fn declare_stage(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.stages.contains(&name) {
            self.stages.push(name);
        }
    }

    /// Assign a resource to a declared stage
    pub fn assign_stage(&mut self, resource: &ResourceRef, stage: &str) -> Result<()> {
        if !self.stages.iter().any(|s| s == stage) {
            return Err(Error::UnknownStage {
                stage: stage.to_string(),
                resource: resource.clone(),
            });
        }
        let index = self
            .resources
            .iter()
            .position(|r| &r.id == resource)
            .ok_or_else(|| Error::UnknownResource {
                resource: resource.clone(),
            })?;
        self.stage_of[index] = stage.to_string();
        Ok(())
    }

    /// All resources, in declaration order (including virtual ones)
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Container path of the resource at `index`
    pub fn container_of(&self, index: usize) -> &[String] {
        &self.containers[index]
    }

    /// Stage of the resource at `index`
    pub fn stage_of(&self, index: usize) -> &str {
        &self.stage_of[index]
    }

    /// Declared stages, in order
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
