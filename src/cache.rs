//! Atom cache backed by DashMap.
//!
//! Nodes are keyed by a structured [`NodeKey`] so that, per connector, at
//! most one `Arc<Node>` exists for a given `(kind, name)`. Links are never
//! deduplicated by content; the registry only records them by [`AtomId`] so
//! they can be counted and looked up again.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::atom::{AtomId, Link, Node, NodeKind};

/// Composite cache key for a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Outcome of a node lookup-or-insert.
#[derive(Debug, Clone)]
pub enum Cached {
    /// The key was already present; nothing new was built.
    Hit(Arc<Node>),
    /// A fresh node was built and inserted.
    Inserted(Arc<Node>),
}

impl Cached {
    pub fn node(&self) -> &Arc<Node> {
        match self {
            Cached::Hit(n) | Cached::Inserted(n) => n,
        }
    }

    pub fn into_node(self) -> Arc<Node> {
        match self {
            Cached::Hit(n) | Cached::Inserted(n) => n,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Cached::Hit(_))
    }
}

/// Concurrent node cache and link registry.
#[derive(Debug, Default)]
pub struct AtomCache {
    nodes: DashMap<NodeKey, Arc<Node>>,
    links: DashMap<AtomId, Arc<Link>>,
}

impl AtomCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, building and inserting a node with `build` on a miss.
    ///
    /// The entry lock is held while `build` runs, so two racing callers for
    /// the same key observe exactly one insertion.
    pub fn get_or_insert_with<E>(
        &self,
        key: NodeKey,
        build: impl FnOnce(&NodeKey) -> Result<Node, E>,
    ) -> Result<Cached, E> {
        match self.nodes.entry(key) {
            Entry::Occupied(entry) => Ok(Cached::Hit(Arc::clone(entry.get()))),
            Entry::Vacant(entry) => {
                let node = Arc::new(build(entry.key())?);
                entry.insert(Arc::clone(&node));
                Ok(Cached::Inserted(node))
            }
        }
    }

    pub fn get(&self, key: &NodeKey) -> Option<Arc<Node>> {
        self.nodes.get(key).map(|n| Arc::clone(n.value()))
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Every cached node with this name, ordered by kind.
    pub fn nodes_named(&self, name: &str) -> Vec<Arc<Node>> {
        let mut found: Vec<Arc<Node>> = self
            .nodes
            .iter()
            .filter(|e| e.key().name == name)
            .map(|e| Arc::clone(e.value()))
            .collect();
        found.sort_by_key(|n| n.kind);
        found
    }

    pub fn register_link(&self, link: Arc<Link>) {
        self.links.insert(link.id, link);
    }

    pub fn link(&self, id: AtomId) -> Option<Arc<Link>> {
        self.links.get(&id).map(|l| Arc::clone(l.value()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Snapshot of all cached nodes ordered by ID (creation order).
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        let mut all: Vec<Arc<Node>> = self.nodes.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by_key(|n| n.id);
        all
    }
}
