//! Bridges committed graph changes to observer outboxes.

use std::sync::Arc;

use lds_core::{ChangeKind, NodeChange};
use lds_graph::ChangeListener;

use crate::observer::ObserverRegistry;

/// Graph change listener that fans changes out to watching observers.
///
/// Runs after the graph's write lock is released. Watches on a removed
/// subtree are dropped only after the removal itself has been queued, so the
/// watcher still hears about it.
pub struct Notifier {
    observers: Arc<ObserverRegistry>,
}

impl Notifier {
    pub fn new(observers: Arc<ObserverRegistry>) -> Self {
        Self { observers }
    }
}

impl ChangeListener for Notifier {
    fn on_change(&self, changes: &[NodeChange]) {
        let queued = self.observers.dispatch(changes);
        if queued > 0 {
            tracing::debug!(changes = changes.len(), queued, "Queued notifications");
        }

        for change in changes {
            if change.kind == ChangeKind::NodeRemoved {
                self.observers.forget_subtree(&change.uri);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use lds_core::{Node, NodeType, Notification, ObserverId, Uri};
    use lds_graph::GraphStore;

    use super::*;
    use crate::transport::{NotificationSink, TransportError};

    #[derive(Default)]
    struct Collect(Mutex<Vec<Notification>>);

    #[async_trait]
    impl NotificationSink for Collect {
        async fn deliver(&self, n: &Notification) -> Result<(), TransportError> {
            self.0.lock().push(n.clone());
            Ok(())
        }
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[tokio::test]
    async fn removal_is_delivered_before_watch_is_dropped() {
        let sink = Arc::new(Collect::default());
        let observers = Arc::new(ObserverRegistry::new(sink.clone()));
        let store = GraphStore::with_listener(Arc::new(Notifier::new(observers.clone())));
        store.init("a").unwrap();
        store
            .add_nodes(&uri("a"), vec![Node::new(uri("a/e"), NodeType::Entity)])
            .unwrap();

        let observer = ObserverId::new("//a/listener");
        observers.register(&observer, &[uri("a/e")]).unwrap();
        store.delete_nodes(&[uri("a/e")]).unwrap();

        for _ in 0..100 {
            if !sink.0.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let delivered = sink.0.lock().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, ChangeKind::NodeRemoved);
        assert_eq!(observers.observer_count(), 0);
    }
}
