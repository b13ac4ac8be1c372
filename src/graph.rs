//! Relationship graph
//!
//! A directed graph of resource nodes and typed edges, built once per
//! transaction from a catalog. Resources live in an arena indexed by
//! [`NodeId`]; edges are `(source, target, kind)` tuples in adjacency lists.
//! There are no parent/child object references and no ownership cycles.
//!
//! Edge direction is normalized at build time: an edge always means "source
//! applies before target", regardless of which side declared the
//! relationship (`require` and `subscribe` are flipped, `before` and
//! `notify` kept as declared).

use crate::error::{Error, Result};
use catalog::{Catalog, Resource, ResourceRef};
use std::collections::{BTreeMap, BTreeSet};

/// Index of a resource node in the graph arena
pub type NodeId = usize;

/// What an edge demands of the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Apply source before target
    Ordering,
    /// Apply source before target, and refresh target if source changes
    Notification,
}

/// A directed relationship between two resource nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// The dependency graph for one run
#[derive(Debug)]
pub struct RelationshipGraph {
    nodes: Vec<Resource>,
    index: BTreeMap<ResourceRef, NodeId>,
    out: Vec<Vec<Edge>>,
    /// Distinct predecessor nodes, per node
    deps: Vec<Vec<NodeId>>,
    /// Distinct successor nodes, per node
    dependents: Vec<Vec<NodeId>>,
}

impl RelationshipGraph {
    /// Build the graph from a catalog
    ///
    /// Nodes are the catalog's realized (non-virtual) resources in
    /// declaration order. Edges come from explicit metaparameters,
    /// containment declaration order, and stage ordering. Duplicate
    /// identities, dangling references, and dependency cycles are fatal;
    /// nothing is ever applied from an invalid graph.
    pub fn build(catalog: &Catalog) -> Result<Self> {
        let mut nodes: Vec<Resource> = Vec::new();
        let mut index: BTreeMap<ResourceRef, NodeId> = BTreeMap::new();
        // Maps node id back to catalog position, for container/stage lookup
        let mut catalog_pos: Vec<usize> = Vec::new();

        for (pos, resource) in catalog.resources().iter().enumerate() {
            if resource.virtual_resource {
                log::debug!("{}: virtual, not realized", resource.id);
                continue;
            }
            let id = nodes.len();
            if index.insert(resource.id.clone(), id).is_some() {
                return Err(Error::DuplicateResource {
                    resource: resource.id.clone(),
                });
            }
            nodes.push(resource.clone());
            catalog_pos.push(pos);
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut seen: BTreeSet<(NodeId, NodeId, EdgeKind)> = BTreeSet::new();
        let mut explicit: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();

        let resolve = |from: &Resource, to: &ResourceRef| -> Result<NodeId> {
            index.get(to).copied().ok_or_else(|| Error::MissingResource {
                from: from.id.clone(),
                to: to.clone(),
            })
        };
        let mut add_edge = |source: NodeId, target: NodeId, kind: EdgeKind| {
            if seen.insert((source, target, kind)) {
                edges.push(Edge {
                    source,
                    target,
                    kind,
                });
            }
        };

        // Explicit metaparameters, normalized to forward edges
        for (id, resource) in nodes.iter().enumerate() {
            for target in &resource.before {
                let target = resolve(resource, target)?;
                add_edge(id, target, EdgeKind::Ordering);
                explicit.insert((id, target));
            }
            for source in &resource.require {
                let source = resolve(resource, source)?;
                add_edge(source, id, EdgeKind::Ordering);
                explicit.insert((source, id));
            }
            for target in &resource.notify {
                let target = resolve(resource, target)?;
                add_edge(id, target, EdgeKind::Notification);
                explicit.insert((id, target));
            }
            for source in &resource.subscribe {
                let source = resolve(resource, source)?;
                add_edge(source, id, EdgeKind::Notification);
                explicit.insert((source, id));
            }
        }

        // Containment: consecutive children of the same container apply in
        // declaration order. A child is either a direct resource or a
        // nested container, which occupies its first-declared position and
        // carries its whole subtree, so nested declarations stay ordered
        // within the parent. Explicit edges between a pair win over the
        // implicit sibling edge.
        enum ContainerItem<'a> {
            Node(NodeId),
            Child(&'a [String]),
        }
        let mut subtree: BTreeMap<&[String], Vec<NodeId>> = BTreeMap::new();
        let mut items: BTreeMap<&[String], Vec<ContainerItem>> = BTreeMap::new();
        let mut seen_children: BTreeSet<&[String]> = BTreeSet::new();
        for (id, &pos) in catalog_pos.iter().enumerate() {
            let path = catalog.container_of(pos);
            for depth in 1..=path.len() {
                subtree.entry(&path[..depth]).or_default().push(id);
            }
            if path.is_empty() {
                continue;
            }
            items.entry(path).or_default().push(ContainerItem::Node(id));
            for depth in 1..path.len() {
                let child = &path[..depth + 1];
                if seen_children.insert(child) {
                    items
                        .entry(&path[..depth])
                        .or_default()
                        .push(ContainerItem::Child(child));
                }
            }
        }
        for sequence in items.values() {
            for pair in sequence.windows(2) {
                let sources: &[NodeId] = match &pair[0] {
                    ContainerItem::Node(id) => std::slice::from_ref(id),
                    ContainerItem::Child(prefix) => &subtree[prefix],
                };
                let targets: &[NodeId] = match &pair[1] {
                    ContainerItem::Node(id) => std::slice::from_ref(id),
                    ContainerItem::Child(prefix) => &subtree[prefix],
                };
                for &a in sources {
                    for &b in targets {
                        if !explicit.contains(&(a, b)) && !explicit.contains(&(b, a)) {
                            add_edge(a, b, EdgeKind::Ordering);
                        }
                    }
                }
            }
        }

        // Stages: every resource of stage N applies before every resource
        // of stage N+1. Stages with no resources are skipped over so the
        // ordering still chains across them.
        let mut by_stage: Vec<Vec<NodeId>> = vec![Vec::new(); catalog.stages().len()];
        for (id, &pos) in catalog_pos.iter().enumerate() {
            let stage = catalog.stage_of(pos);
            if let Some(slot) = catalog.stages().iter().position(|s| s == stage) {
                by_stage[slot].push(id);
            }
        }
        let populated: Vec<&Vec<NodeId>> = by_stage.iter().filter(|m| !m.is_empty()).collect();
        for pair in populated.windows(2) {
            for &earlier in pair[0] {
                for &later in pair[1] {
                    add_edge(earlier, later, EdgeKind::Ordering);
                }
            }
        }

        // Adjacency and distinct neighbor sets
        let n = nodes.len();
        let mut out: Vec<Vec<Edge>> = vec![Vec::new(); n];
        let mut deps: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n];
        let mut dependents: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n];
        for edge in &edges {
            out[edge.source].push(*edge);
            deps[edge.target].insert(edge.source);
            dependents[edge.source].insert(edge.target);
        }

        let graph = Self {
            nodes,
            index,
            out,
            deps: deps.into_iter().map(|s| s.into_iter().collect()).collect(),
            dependents: dependents
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
        };

        let cycles = graph.find_cycles();
        if !cycles.is_empty() {
            return Err(Error::CycleDetected { cycles });
        }

        log::debug!(
            "built relationship graph: {} resources, {} edges",
            graph.nodes.len(),
            edges.len()
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The resource at a node
    pub fn node(&self, id: NodeId) -> &Resource {
        &self.nodes[id]
    }

    /// Node ids in declaration order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// Look up a node by resource identity
    pub fn resolve(&self, resource: &ResourceRef) -> Option<NodeId> {
        self.index.get(resource).copied()
    }

    /// Outgoing edges of a node
    pub fn edges_from(&self, id: NodeId) -> &[Edge] {
        &self.out[id]
    }

    /// Distinct predecessor nodes (resources that must apply first)
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        &self.deps[id]
    }

    /// Distinct successor nodes (resources waiting on this one)
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        &self.dependents[id]
    }

    /// Number of distinct predecessors
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.deps[id].len()
    }

    /// Find all dependency cycles via strongly connected components
    ///
    /// Iterative Tarjan with an explicit frame stack; single-node
    /// components only count when the node references itself. Cycle
    /// membership and the set of cycles are sorted so failure output is
    /// stable.
    fn find_cycles(&self) -> Vec<Vec<ResourceRef>> {
        let n = self.nodes.len();
        let mut order: Vec<Option<usize>> = vec![None; n];
        let mut lowlink: Vec<usize> = vec![0; n];
        let mut on_stack: Vec<bool> = vec![false; n];
        let mut stack: Vec<NodeId> = Vec::new();
        let mut counter = 0usize;
        let mut sccs: Vec<Vec<NodeId>> = Vec::new();

        // frame = (node, next child cursor)
        let mut frames: Vec<(NodeId, usize)> = Vec::new();

        for root in 0..n {
            if order[root].is_some() {
                continue;
            }
            frames.push((root, 0));
            while let Some(&mut (v, ref mut cursor)) = frames.last_mut() {
                if order[v].is_none() {
                    order[v] = Some(counter);
                    lowlink[v] = counter;
                    counter += 1;
                    stack.push(v);
                    on_stack[v] = true;
                }
                if let Some(edge) = self.out[v].get(*cursor) {
                    *cursor += 1;
                    let w = edge.target;
                    if order[w].is_none() {
                        frames.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(order[w].unwrap_or(0));
                    }
                } else {
                    if lowlink[v] == order[v].unwrap_or(0) {
                        let mut component = Vec::new();
                        loop {
                            let top = match stack.pop() {
                                Some(top) => top,
                                None => break,
                            };
                            on_stack[top] = false;
                            component.push(top);
                            if top == v {
                                break;
                            }
                        }
                        sccs.push(component);
                    }
                    frames.pop();
                    if let Some(&mut (parent, _)) = frames.last_mut() {
                        lowlink[parent] = lowlink[parent].min(lowlink[v]);
                    }
                }
            }
        }

        let mut cycles: Vec<Vec<ResourceRef>> = sccs
            .into_iter()
            .filter(|component| component.len() > 1 || self.self_referential(component[0]))
            .map(|component| {
                let mut members: Vec<ResourceRef> = component
                    .into_iter()
                    .map(|id| self.nodes[id].id.clone())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn self_referential(&self, id: NodeId) -> bool {
        self.out[id].iter().any(|edge| edge.target == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Resource;

    fn catalog_of(resources: Vec<Resource>) -> Catalog {
        let mut catalog = Catalog::new("test");
        for resource in resources {
            catalog.add(resource);
        }
        catalog
    }

    #[test]
    fn builds_nodes_in_declaration_order() {
        let graph = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("Package", "nginx"),
            Resource::new("Service", "nginx"),
        ]))
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.node(0).id, ResourceRef::new("Package", "nginx"));
        assert_eq!(graph.node(1).id, ResourceRef::new("Service", "nginx"));
    }

    #[test]
    fn rejects_duplicate_identity() {
        let result = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("Package", "nginx"),
            Resource::new("Package", "nginx"),
        ]));
        assert!(matches!(result, Err(Error::DuplicateResource { .. })));
    }

    #[test]
    fn rejects_dangling_reference() {
        let result = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("Service", "nginx").require(("Package", "nginx")),
        ]));
        assert!(matches!(result, Err(Error::MissingResource { .. })));
    }

    #[test]
    fn require_and_before_normalize_to_the_same_edge() {
        // B requires A, and A is also declared before B: one edge
        let graph = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("File", "a").before(("File", "b")),
            Resource::new("File", "b").require(("File", "a")),
        ]))
        .unwrap();

        let a = graph.resolve(&ResourceRef::new("File", "a")).unwrap();
        let b = graph.resolve(&ResourceRef::new("File", "b")).unwrap();
        assert_eq!(graph.edges_from(a).len(), 1);
        assert_eq!(graph.edges_from(a)[0].target, b);
        assert_eq!(graph.in_degree(b), 1);
        assert_eq!(graph.dependencies_of(b), [a]);
    }

    #[test]
    fn subscribe_creates_notification_edge_from_source() {
        let graph = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("File", "conf"),
            Resource::new("Service", "nginx").subscribe(("File", "conf")),
        ]))
        .unwrap();

        let conf = graph.resolve(&ResourceRef::new("File", "conf")).unwrap();
        let edges = graph.edges_from(conf);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Notification);
    }

    #[test]
    fn detects_cycle_before_anything_runs() {
        let result = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("File", "a").require(("File", "b")),
            Resource::new("File", "b").require(("File", "a")),
        ]));

        match result {
            Err(Error::CycleDetected { cycles }) => {
                assert_eq!(cycles.len(), 1);
                assert_eq!(
                    cycles[0],
                    vec![ResourceRef::new("File", "a"), ResourceRef::new("File", "b")]
                );
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let result = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("File", "a").require(("File", "a")),
        ]));
        assert!(matches!(result, Err(Error::CycleDetected { .. })));
    }

    #[test]
    fn containment_orders_siblings_by_declaration() {
        let mut catalog = Catalog::new("test");
        catalog.add_in(&["nginx"], Resource::new("Package", "nginx"));
        catalog.add_in(&["nginx"], Resource::new("File", "conf"));
        catalog.add_in(&["nginx"], Resource::new("Service", "nginx"));
        catalog.add(Resource::new("File", "unrelated"));

        let graph = RelationshipGraph::build(&catalog).unwrap();
        let package = graph.resolve(&ResourceRef::new("Package", "nginx")).unwrap();
        let conf = graph.resolve(&ResourceRef::new("File", "conf")).unwrap();
        let service = graph.resolve(&ResourceRef::new("Service", "nginx")).unwrap();
        let unrelated = graph.resolve(&ResourceRef::new("File", "unrelated")).unwrap();

        assert_eq!(graph.dependencies_of(conf), [package]);
        assert_eq!(graph.dependencies_of(service), [conf]);
        // Top-level resources get no implicit ordering
        assert_eq!(graph.in_degree(unrelated), 0);
    }

    #[test]
    fn nested_container_stays_inside_parent_ordering() {
        let mut catalog = Catalog::new("test");
        catalog.add_in(&["web"], Resource::new("Package", "nginx"));
        catalog.add_in(&["web", "conf"], Resource::new("File", "a"));
        catalog.add_in(&["web", "conf"], Resource::new("File", "b"));
        catalog.add_in(&["web"], Resource::new("Service", "nginx"));

        let graph = RelationshipGraph::build(&catalog).unwrap();
        let package = graph.resolve(&ResourceRef::new("Package", "nginx")).unwrap();
        let a = graph.resolve(&ResourceRef::new("File", "a")).unwrap();
        let b = graph.resolve(&ResourceRef::new("File", "b")).unwrap();
        let service = graph.resolve(&ResourceRef::new("Service", "nginx")).unwrap();

        // The nested container sits between package and service: all of its
        // members apply after the package and before the service
        assert_eq!(graph.dependencies_of(a), [package]);
        assert_eq!(graph.dependencies_of(b), [package, a]);
        assert_eq!(graph.dependencies_of(service), [a, b]);
    }

    #[test]
    fn explicit_relationship_overrides_containment() {
        // Declaration order says a -> b, but b is explicitly before a
        let mut catalog = Catalog::new("test");
        catalog.add_in(&["c"], Resource::new("File", "a").require(("File", "b")));
        catalog.add_in(&["c"], Resource::new("File", "b"));

        let graph = RelationshipGraph::build(&catalog).unwrap();
        let a = graph.resolve(&ResourceRef::new("File", "a")).unwrap();
        let b = graph.resolve(&ResourceRef::new("File", "b")).unwrap();

        // Only the explicit edge b -> a survives; no containment a -> b
        assert_eq!(graph.dependencies_of(a), [b]);
        assert_eq!(graph.in_degree(b), 0);
    }

    #[test]
    fn stages_order_across_empty_stages() {
        let mut catalog = Catalog::new("test");
        catalog.declare_stage("middle");
        catalog.declare_stage("last");
        catalog.add(Resource::new("File", "early"));
        catalog.add(Resource::new("File", "late"));
        catalog
            .assign_stage(&ResourceRef::new("File", "late"), "last")
            .unwrap();

        let graph = RelationshipGraph::build(&catalog).unwrap();
        let early = graph.resolve(&ResourceRef::new("File", "early")).unwrap();
        let late = graph.resolve(&ResourceRef::new("File", "late")).unwrap();

        // "middle" has no resources; main still chains to "last"
        assert_eq!(graph.dependencies_of(late), [early]);
    }

    #[test]
    fn virtual_resources_are_not_realized() {
        let graph = RelationshipGraph::build(&catalog_of(vec![
            Resource::new("File", "real"),
            Resource::new("File", "ghost").virtual_resource(),
        ]))
        .unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.resolve(&ResourceRef::new("File", "ghost")).is_none());
    }
}
