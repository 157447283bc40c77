//! Owned in-memory representation of the registry tree.
//!
//! Children live in an insertion-ordered map owned by their parent. There are
//! no parent pointers: walking down from the root along the URI's prefixes is
//! the only way to reach a node.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use lds_core::{Node, NodeType, PropertyValue, Uri};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub uri: Uri,
    pub node_type: NodeType,
    pub ttl: Option<u32>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub children: IndexMap<Uri, Entry>,
}

impl Entry {
    /// Take ownership of a validated node record and its subtree.
    pub fn from_node(node: Node) -> Self {
        let children = node
            .children
            .into_iter()
            .map(|child| (child.uri.clone(), Entry::from_node(child)))
            .collect();
        Self {
            uri: node.uri,
            node_type: node.node_type,
            ttl: node.ttl,
            properties: node.properties,
            children,
        }
    }

    /// Copy out this entry with descendants up to `depth` levels
    /// (`None` for the whole subtree).
    pub fn to_node(&self, depth: Option<usize>) -> Node {
        let children = match depth {
            Some(0) => Vec::new(),
            _ => {
                let next = depth.map(|d| d - 1);
                self.children.values().map(|c| c.to_node(next)).collect()
            }
        };
        Node {
            uri: self.uri.clone(),
            node_type: self.node_type,
            properties: self.properties.clone(),
            children,
            ttl: self.ttl,
        }
    }

    pub fn subtree_len(&self) -> usize {
        1 + self.children.values().map(Entry::subtree_len).sum::<usize>()
    }

    /// A resource is a node typed RESOURCE or one addressed by a resource
    /// segment.
    pub fn is_resource(&self) -> bool {
        self.node_type == NodeType::Resource || self.uri.resource().is_some()
    }

    /// Push the URIs of every resource below this entry, depth first in
    /// insertion order.
    pub fn collect_resources(&self, out: &mut Vec<Uri>) {
        for child in self.children.values() {
            if child.is_resource() {
                out.push(child.uri.clone());
            }
            child.collect_resources(out);
        }
    }
}

/// A single-root tree. The root is the authority.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    pub root: Entry,
}

impl Tree {
    pub fn new(root: Entry) -> Self {
        Self { root }
    }

    pub fn authority(&self) -> &Uri {
        &self.root.uri
    }

    pub fn get(&self, uri: &Uri) -> Option<&Entry> {
        if !self.root.uri.contains(uri) {
            return None;
        }
        let mut entry = &self.root;
        for depth in 2..=uri.depth() {
            entry = entry.children.get(&uri.prefix(depth))?;
        }
        Some(entry)
    }

    pub fn get_mut(&mut self, uri: &Uri) -> Option<&mut Entry> {
        if !self.root.uri.contains(uri) {
            return None;
        }
        let mut entry = &mut self.root;
        for depth in 2..=uri.depth() {
            entry = entry.children.get_mut(&uri.prefix(depth))?;
        }
        Some(entry)
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.get(uri).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.root.subtree_len()
    }
}
