//! Resource model
//!
//! A resource is a single managed unit of state ("this package", "this
//! service"), identified by `(type, title)`. Resources carry their desired
//! properties, tags, relationship metaparameters, and an optional source
//! location. They are immutable once placed into a catalog for a run.

use crate::types::{PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identity of a resource within a catalog: `(type, title)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type, e.g. "Package"
    pub rtype: String,
    /// Resource title, e.g. "nginx"
    pub title: String,
}

impl ResourceRef {
    pub fn new(rtype: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            rtype: rtype.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.rtype, self.title)
    }
}

impl From<(&str, &str)> for ResourceRef {
    fn from((rtype, title): (&str, &str)) -> Self {
        Self::new(rtype, title)
    }
}

/// Where a resource was declared (advisory, for error messages and reports)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// A single managed unit of state
///
/// Built with chained constructors:
///
/// ```
/// use catalog::{Resource, ResourceRef};
///
/// let service = Resource::new("Service", "nginx")
///     .with_property("ensure", "running")
///     .subscribe(ResourceRef::new("Package", "nginx"))
///     .with_tag("web");
///
/// assert!(service.tagged("service"));
/// assert!(service.tagged("web"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Identity; must be unique within a catalog
    pub id: ResourceRef,
    /// Desired state
    pub properties: PropertyMap,
    /// Tags, used for run filtering; always contains the lowercased type
    /// and title
    pub tags: BTreeSet<String>,
    /// Declaration site, if known
    pub source: Option<SourceLocation>,
    /// Per-resource noop override: never apply, only report
    pub noop: bool,
    /// Virtual resources are carried by the catalog but not applied
    pub virtual_resource: bool,
    /// Apply the listed resources before this one
    pub require: Vec<ResourceRef>,
    /// Apply this resource before the listed ones
    pub before: Vec<ResourceRef>,
    /// Like `before`, and refresh the targets when this resource changes
    pub notify: Vec<ResourceRef>,
    /// Like `require`, and refresh this resource when a source changes
    pub subscribe: Vec<ResourceRef>,
}

impl Resource {
    /// Create a resource, auto-tagged with its lowercased type and title
    pub fn new(rtype: impl Into<String>, title: impl Into<String>) -> Self {
        let id = ResourceRef::new(rtype, title);
        let mut tags = BTreeSet::new();
        tags.insert(id.rtype.to_lowercase());
        tags.insert(id.title.to_lowercase());
        Self {
            id,
            properties: PropertyMap::new(),
            tags,
            source: None,
            noop: false,
            virtual_resource: false,
            require: Vec::new(),
            before: Vec::new(),
            notify: Vec::new(),
            subscribe: Vec::new(),
        }
    }

    /// Set a desired property
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into().to_lowercase());
        self
    }

    /// Record the declaration site
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Mark this resource noop: diffs are computed and reported, never applied
    pub fn noop(mut self) -> Self {
        self.noop = true;
        self
    }

    /// Mark this resource virtual: carried by the catalog, not applied
    pub fn virtual_resource(mut self) -> Self {
        self.virtual_resource = true;
        self
    }

    /// Require `other` to be applied before this resource
    pub fn require(mut self, other: impl Into<ResourceRef>) -> Self {
        self.require.push(other.into());
        self
    }

    /// Apply this resource before `other`
    pub fn before(mut self, other: impl Into<ResourceRef>) -> Self {
        self.before.push(other.into());
        self
    }

    /// Apply this resource before `other`, refreshing it on change
    pub fn notify(mut self, other: impl Into<ResourceRef>) -> Self {
        self.notify.push(other.into());
        self
    }

    /// Require `other`, and refresh this resource when it changes
    pub fn subscribe(mut self, other: impl Into<ResourceRef>) -> Self {
        self.subscribe.push(other.into());
        self
    }

    /// Check for a tag, case-insensitively
    pub fn tagged(&self, tag: &str) -> bool {
        self.tags.contains(&tag.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ref_display() {
        assert_eq!(ResourceRef::new("Package", "nginx").to_string(), "Package[nginx]");
    }

    #[test]
    fn resources_are_auto_tagged() {
        let resource = Resource::new("Package", "Nginx");
        assert!(resource.tagged("package"));
        assert!(resource.tagged("nginx"));
        assert!(resource.tagged("PACKAGE"));
        assert!(!resource.tagged("service"));
    }

    #[test]
    fn builder_collects_relationships() {
        let resource = Resource::new("Service", "nginx")
            .require(("Package", "nginx"))
            .subscribe(("File", "/etc/nginx/nginx.conf"))
            .with_property("ensure", "running")
            .at("site.pp", 42);

        assert_eq!(resource.require, vec![ResourceRef::new("Package", "nginx")]);
        assert_eq!(
            resource.subscribe,
            vec![ResourceRef::new("File", "/etc/nginx/nginx.conf")]
        );
        assert_eq!(
            resource.source,
            Some(SourceLocation {
                file: "site.pp".into(),
                line: 42
            })
        );
        assert!(!resource.noop);
    }
}
