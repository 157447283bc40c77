//! The shared graph store: lock, lifecycle, and change reporting.

use std::sync::Arc;

use parking_lot::RwLock;

use lds_core::{CoreError, NodeChange, UCode, Uri};

use crate::tree::Tree;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Database not initialized")]
    NotInitialized,

    #[error("Node not found: {uri}")]
    NotFound { uri: String },

    #[error("Node already exists: {uri}")]
    AlreadyExists { uri: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn not_found(uri: &Uri) -> Self {
        Self::NotFound {
            uri: uri.to_string(),
        }
    }

    pub(crate) fn already_exists(uri: &Uri) -> Self {
        Self::AlreadyExists {
            uri: uri.to_string(),
        }
    }

    /// Status code reported to callers for this error.
    pub fn code(&self) -> UCode {
        match self {
            Self::NotInitialized => UCode::FailedPrecondition,
            Self::NotFound { .. } => UCode::NotFound,
            Self::AlreadyExists { .. } => UCode::AlreadyExists,
            Self::InvalidArgument(_) | Self::Snapshot(_) => UCode::InvalidArgument,
            Self::Core(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Receives the changes of every committed mutation.
///
/// Called after the write lock is released, so implementations may read the
/// store. Never called with an empty slice.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, changes: &[NodeChange]);
}

/// Thread-safe registry graph.
///
/// Readers run concurrently; a mutation holds the write lock for the
/// duration of its in-memory work only. The lock is task-fair, so a steady
/// stream of readers cannot starve a writer. Share it behind an `Arc`.
pub struct GraphStore {
    tree: RwLock<Option<Tree>>,
    listener: Option<Arc<dyn ChangeListener>>,
}

impl GraphStore {
    /// An empty, uninitialized store. Every operation fails with
    /// [`GraphError::NotInitialized`] until `init` or `import` succeeds.
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(None),
            listener: None,
        }
    }

    /// An empty store that reports committed changes to `listener`.
    pub fn with_listener(listener: Arc<dyn ChangeListener>) -> Self {
        Self {
            tree: RwLock::new(None),
            listener: Some(listener),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.read().is_some()
    }

    /// Run `f` against the tree under the read lock.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Tree) -> Result<T>) -> Result<T> {
        let guard = self.tree.read();
        let tree = guard.as_ref().ok_or(GraphError::NotInitialized)?;
        f(tree)
    }

    /// Run `f` against the tree under the write lock, then report whatever
    /// changes it recorded. `f` must validate before it mutates: an error
    /// return is assumed to leave the tree untouched.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut Tree, &mut Vec<NodeChange>) -> Result<T>,
    ) -> Result<T> {
        let mut changes = Vec::new();
        let out = {
            let mut guard = self.tree.write();
            let tree = guard.as_mut().ok_or(GraphError::NotInitialized)?;
            f(tree, &mut changes)?
        };
        self.emit(&changes);
        Ok(out)
    }

    /// Swap in a whole new tree. Used by bootstrap and import, which do not
    /// report changes.
    pub(crate) fn replace(&self, tree: Tree) {
        *self.tree.write() = Some(tree);
    }

    fn emit(&self, changes: &[NodeChange]) {
        if changes.is_empty() {
            return;
        }
        if let Some(listener) = &self.listener {
            listener.on_change(changes);
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lds_core::{Node, NodeType};

    #[test]
    fn uninitialized_store_fails_precondition() {
        let store = GraphStore::new();
        assert!(!store.is_initialized());
        let err = store.lookup_uri(&Uri::parse("a").unwrap()).unwrap_err();
        assert!(matches!(err, GraphError::NotInitialized));
        assert_eq!(err.code(), UCode::FailedPrecondition);

        let node = Node::new(Uri::parse("a/e").unwrap(), NodeType::Entity);
        let err = store.update_node(node, lds_core::Ttl::Unchanged).unwrap_err();
        assert_eq!(err.code(), UCode::FailedPrecondition);
    }

    #[test]
    fn error_codes() {
        let uri = Uri::parse("a/e").unwrap();
        assert_eq!(GraphError::not_found(&uri).code(), UCode::NotFound);
        assert_eq!(GraphError::already_exists(&uri).code(), UCode::AlreadyExists);
        assert_eq!(
            GraphError::from(CoreError::DuplicateNode {
                uri: uri.to_string()
            })
            .code(),
            UCode::AlreadyExists
        );
        assert_eq!(GraphError::not_found(&uri).to_string(), "Node not found: //a/e");
    }
}
