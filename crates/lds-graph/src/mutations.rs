//! Write operations on the registry graph.
//!
//! Every mutation validates its whole input before touching the tree, so a
//! failed call leaves the graph exactly as it was. Successful calls record one
//! [`NodeChange`] per affected node; an inserted subtree is reported once, at
//! its top.

use std::collections::HashSet;

use lds_core::{ChangeKind, CoreError, Node, NodeChange, NodeType, PropertyValue, Ttl, Uri};

use crate::store::{GraphError, GraphStore, Result};
use crate::tree::{Entry, Tree};

impl GraphStore {
    // ── Bootstrap ────────────────────────────────────────────────

    /// Replace whatever is loaded with a fresh single-root graph for
    /// `authority`.
    pub fn init(&self, authority: &str) -> Result<()> {
        let root = Uri::root(authority)?;
        tracing::info!(authority = %root, "Initializing empty registry");
        self.replace(Tree::new(Entry::from_node(Node::new(root, NodeType::Authority))));
        Ok(())
    }

    /// Replace whatever is loaded with the graph serialized in `snapshot`.
    /// The snapshot's root becomes the authority. Observers are not notified.
    pub fn import(&self, snapshot: &str) -> Result<()> {
        let root: Node = serde_json::from_str(snapshot)?;
        if !root.uri.is_root() {
            return Err(GraphError::InvalidArgument(format!(
                "snapshot root {} is not an authority",
                root.uri
            )));
        }
        root.validate()?;

        let tree = Tree::new(Entry::from_node(root));
        tracing::info!(
            authority = %tree.authority(),
            nodes = tree.node_count(),
            "Imported registry snapshot"
        );
        self.replace(tree);
        Ok(())
    }

    // ── Node Upserts ─────────────────────────────────────────────

    /// Create or update the node at `node.uri`.
    ///
    /// An existing node gets the new type, the TTL unless `ttl` is
    /// [`Ttl::Unchanged`], and the supplied properties merged over its own.
    /// Its existing children are left alone; supplied children it does not
    /// have yet are attached. A new node is attached with its whole supplied
    /// subtree under its parent, which must already exist.
    pub fn update_node(&self, node: Node, ttl: Ttl) -> Result<()> {
        node.validate()?;

        self.write(|tree, changes| {
            if let Some(entry) = tree.get_mut(&node.uri) {
                merge_into(entry, node, ttl, changes);
                return Ok(());
            }

            let parent = node
                .uri
                .parent()
                .ok_or_else(|| GraphError::not_found(&node.uri))?;
            let holder = tree
                .get_mut(&parent)
                .ok_or_else(|| GraphError::not_found(&parent))?;

            let uri = node.uri.clone();
            let mut entry = Entry::from_node(node);
            if let Ttl::Set(value) = ttl {
                entry.ttl = Some(value);
            }
            holder.children.insert(uri.clone(), entry);

            tracing::debug!(uri = %uri, "Node created");
            changes.push(NodeChange::new(uri, ChangeKind::NodeAdded));
            Ok(())
        })
    }

    /// Set one property on an existing node, replacing any previous value.
    pub fn update_property(&self, uri: &Uri, name: &str, value: PropertyValue) -> Result<()> {
        if name.is_empty() {
            return Err(GraphError::InvalidArgument(
                "property name must not be empty".to_string(),
            ));
        }

        self.write(|tree, changes| {
            let entry = tree.get_mut(uri).ok_or_else(|| GraphError::not_found(uri))?;
            entry.properties.insert(name.to_string(), value);

            tracing::debug!(uri = %uri, property = name, "Property updated");
            changes.push(NodeChange::new(
                uri.clone(),
                ChangeKind::PropertyUpdated {
                    name: name.to_string(),
                },
            ));
            Ok(())
        })
    }

    // ── Batch Operations ─────────────────────────────────────────

    /// Attach `nodes` (with their subtrees) as direct children of `parent`.
    ///
    /// All or nothing: a missing parent, a collision with an existing child,
    /// a duplicate within the batch, or a malformed node fails the whole call.
    pub fn add_nodes(&self, parent: &Uri, nodes: Vec<Node>) -> Result<()> {
        let mut batch = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if node.uri.parent().as_ref() != Some(parent) {
                return Err(CoreError::NotADirectChild {
                    parent: parent.to_string(),
                    child: node.uri.to_string(),
                }
                .into());
            }
            node.validate()?;
            if !batch.insert(&node.uri) {
                return Err(GraphError::already_exists(&node.uri));
            }
        }

        self.write(|tree, changes| {
            let holder = tree
                .get_mut(parent)
                .ok_or_else(|| GraphError::not_found(parent))?;
            if let Some(existing) = nodes.iter().find(|n| holder.children.contains_key(&n.uri)) {
                return Err(GraphError::already_exists(&existing.uri));
            }

            tracing::debug!(parent = %parent, count = nodes.len(), "Adding nodes");
            for node in nodes {
                changes.push(NodeChange::new(node.uri.clone(), ChangeKind::NodeAdded));
                holder.children.insert(node.uri.clone(), Entry::from_node(node));
            }
            Ok(())
        })
    }

    /// Remove each named node and its subtree. URIs that are not in the graph
    /// are skipped. The root cannot be deleted.
    pub fn delete_nodes(&self, uris: &[Uri]) -> Result<()> {
        self.write(|tree, changes| {
            if let Some(root) = uris.iter().find(|uri| *uri == tree.authority()) {
                return Err(GraphError::InvalidArgument(format!(
                    "cannot delete the root node {root}"
                )));
            }

            for uri in uris {
                let Some(parent) = uri.parent() else {
                    continue;
                };
                let Some(holder) = tree.get_mut(&parent) else {
                    continue;
                };
                if let Some(removed) = holder.children.shift_remove(uri) {
                    tracing::debug!(uri = %uri, nodes = removed.subtree_len(), "Subtree removed");
                    changes.push(NodeChange::new(uri.clone(), ChangeKind::NodeRemoved));
                }
            }
            Ok(())
        })
    }
}

fn merge_into(entry: &mut Entry, node: Node, ttl: Ttl, changes: &mut Vec<NodeChange>) {
    entry.node_type = node.node_type;
    if let Ttl::Set(value) = ttl {
        entry.ttl = Some(value);
    }
    entry.properties.extend(node.properties);

    tracing::debug!(uri = %node.uri, "Node updated");
    changes.push(NodeChange::new(node.uri, ChangeKind::NodeUpdated));

    for child in node.children {
        if entry.children.contains_key(&child.uri) {
            continue;
        }
        changes.push(NodeChange::new(child.uri.clone(), ChangeKind::NodeAdded));
        entry.children.insert(child.uri.clone(), Entry::from_node(child));
    }
}
