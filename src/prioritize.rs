//! Ordering strategies for unconstrained resources
//!
//! Dependency edges dictate order wherever they exist. Among resources with
//! no path between them, the transaction breaks ties with a priority key,
//! and the policy picking that key is configurable: reproduce manifest
//! order, decorrelate from it with a title hash, or randomize every run to
//! flush out hidden ordering assumptions.

use crate::graph::NodeId;
use catalog::Resource;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tie-breaking policy for mutually unordered resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Catalog declaration order; stable and reproducible across runs
    #[default]
    ManifestOrder,
    /// BLAKE3 digest of `Type[title]`; deterministic per resource but
    /// decorrelated from declaration order
    TitleHash,
    /// Fresh random keys every run; intentionally non-reproducible
    Random,
}

/// Opaque, totally ordered priority key
///
/// Compares by digest first, declaration sequence second, so two resources
/// never compare equal even on a digest collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    digest: [u8; 16],
    sequence: u64,
}

/// Assigns and caches priority keys for one run
///
/// Keys are computed once per resource on first request; the cache is
/// write-once, read-many.
#[derive(Debug)]
pub struct Prioritizer {
    policy: OrderingPolicy,
    cache: Vec<Option<PriorityKey>>,
}

impl Prioritizer {
    pub fn new(policy: OrderingPolicy, capacity: usize) -> Self {
        Self {
            policy,
            cache: vec![None; capacity],
        }
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    /// The priority key for a node, computed on first request
    pub fn priority_for(&mut self, id: NodeId, resource: &Resource) -> PriorityKey {
        if let Some(key) = self.cache[id] {
            return key;
        }
        let digest = match self.policy {
            OrderingPolicy::ManifestOrder => [0u8; 16],
            OrderingPolicy::TitleHash => {
                let hash = blake3::hash(resource.id.to_string().as_bytes());
                let mut digest = [0u8; 16];
                digest.copy_from_slice(&hash.as_bytes()[..16]);
                digest
            }
            OrderingPolicy::Random => *Uuid::new_v4().as_bytes(),
        };
        let key = PriorityKey {
            digest,
            sequence: id as u64,
        };
        self.cache[id] = Some(key);
        key
    }
}
