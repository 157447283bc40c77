//! Observer registry: who watches which paths, and the per-observer outbox.
//!
//! Each observer with at least one watch owns an unbounded channel drained by
//! its own delivery task, which forwards notifications to the
//! [`NotificationSink`]. Queuing never blocks, so a slow or failing observer
//! cannot hold up a mutation or any other observer.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use lds_core::{NodeChange, Notification, ObserverId, Uri};

use crate::error::{Result, ServiceError};
use crate::transport::NotificationSink;

#[derive(Default)]
struct Watches {
    by_uri: HashMap<Uri, BTreeSet<ObserverId>>,
    by_observer: HashMap<ObserverId, BTreeSet<Uri>>,
    outboxes: HashMap<ObserverId, mpsc::UnboundedSender<Notification>>,
}

impl Watches {
    fn remove(&mut self, observer: &ObserverId, uri: &Uri) -> bool {
        let Some(uris) = self.by_observer.get_mut(observer) else {
            return false;
        };
        let removed = uris.remove(uri);
        if uris.is_empty() {
            self.by_observer.remove(observer);
            // Dropping the sender ends the delivery task once it drains.
            self.outboxes.remove(observer);
        }

        if let Some(observers) = self.by_uri.get_mut(uri) {
            observers.remove(observer);
            if observers.is_empty() {
                self.by_uri.remove(uri);
            }
        }
        removed
    }
}

/// Thread-safe registry of watches. Its lock is independent of the graph lock.
pub struct ObserverRegistry {
    sink: Arc<dyn NotificationSink>,
    watches: RwLock<Watches>,
    /// Notifications queued but not yet handed to the sink.
    pending: Arc<AtomicUsize>,
}

impl ObserverRegistry {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            watches: RwLock::new(Watches::default()),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ── Registration ─────────────────────────────────────────────

    /// Watch each of `uris` on behalf of `observer`. The URIs need not exist
    /// in the graph yet.
    ///
    /// Must be called within a tokio runtime: the first watch of an observer
    /// spawns its delivery task.
    pub fn register(&self, observer: &ObserverId, uris: &[Uri]) -> Result<()> {
        validate(observer, uris)?;

        let mut watches = self.watches.write();
        if !watches.outboxes.contains_key(observer) {
            let outbox = spawn_delivery(
                Arc::clone(&self.sink),
                Arc::clone(&self.pending),
                observer.clone(),
            );
            watches.outboxes.insert(observer.clone(), outbox);
        }
        for uri in uris {
            watches
                .by_uri
                .entry(uri.clone())
                .or_default()
                .insert(observer.clone());
            watches
                .by_observer
                .entry(observer.clone())
                .or_default()
                .insert(uri.clone());
        }

        tracing::info!(observer = %observer, count = uris.len(), "Observer registered");
        Ok(())
    }

    /// Stop watching `uris`. Watches that do not exist are ignored.
    pub fn unregister(&self, observer: &ObserverId, uris: &[Uri]) -> Result<()> {
        validate(observer, uris)?;

        let mut watches = self.watches.write();
        let removed = uris.iter().filter(|uri| watches.remove(observer, uri)).count();

        tracing::info!(observer = %observer, removed, "Observer unregistered");
        Ok(())
    }

    /// Drop every watch on `root` or below it.
    pub fn forget_subtree(&self, root: &Uri) {
        let mut watches = self.watches.write();
        let doomed: Vec<(ObserverId, Uri)> = watches
            .by_uri
            .iter()
            .filter(|(uri, _)| root.contains(uri))
            .flat_map(|(uri, observers)| observers.iter().map(|o| (o.clone(), uri.clone())))
            .collect();

        for (observer, uri) in &doomed {
            watches.remove(observer, uri);
        }
        if !doomed.is_empty() {
            tracing::debug!(root = %root, watches = doomed.len(), "Dropped watches on removed subtree");
        }
    }

    // ── Fan-out ──────────────────────────────────────────────────

    /// Observers affected by a change at `changed`: those watching it, an
    /// ancestor of it, or a node below it.
    pub fn watchers_of(&self, changed: &Uri) -> BTreeSet<ObserverId> {
        let watches = self.watches.read();
        watches
            .by_uri
            .iter()
            .filter(|(watched, _)| watched.contains(changed) || changed.is_ancestor_of(watched))
            .flat_map(|(_, observers)| observers.iter().cloned())
            .collect()
    }

    /// Queue one notification per affected observer for each change.
    /// Returns the number queued.
    pub fn dispatch(&self, changes: &[NodeChange]) -> usize {
        let mut queued = 0;
        for change in changes {
            let observers = self.watchers_of(&change.uri);
            let watches = self.watches.read();
            for observer in observers {
                let Some(outbox) = watches.outboxes.get(&observer) else {
                    continue;
                };
                self.pending.fetch_add(1, Ordering::SeqCst);
                if outbox.send(Notification::new(observer.clone(), change)).is_ok() {
                    queued += 1;
                } else {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    tracing::warn!(observer = %observer, "Delivery task gone, notification dropped");
                }
            }
        }
        queued
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn observer_count(&self) -> usize {
        self.watches.read().by_observer.len()
    }

    /// Notifications queued but not yet delivered (or failed) to the sink.
    /// Closed outboxes still count until their delivery task drains them.
    pub fn pending_deliveries(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// URIs currently watched by `observer`.
    pub fn watched_by(&self, observer: &ObserverId) -> Vec<Uri> {
        self.watches
            .read()
            .by_observer
            .get(observer)
            .map(|uris| uris.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every watch and close every outbox.
    pub fn shutdown(&self) {
        let mut watches = self.watches.write();
        let observers = watches.outboxes.len();
        *watches = Watches::default();
        tracing::info!(
            observers,
            pending = self.pending_deliveries(),
            "Observer registry shut down"
        );
    }
}

fn validate(observer: &ObserverId, uris: &[Uri]) -> Result<()> {
    if observer.as_str().is_empty() {
        return Err(ServiceError::required("observer"));
    }
    if uris.is_empty() {
        return Err(ServiceError::required("uris"));
    }
    Ok(())
}

fn spawn_delivery(
    sink: Arc<dyn NotificationSink>,
    pending: Arc<AtomicUsize>,
    observer: ObserverId,
) -> mpsc::UnboundedSender<Notification> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            if let Err(e) = sink.deliver(&notification).await {
                tracing::warn!(
                    observer = %observer,
                    uri = %notification.uri,
                    error = %e,
                    "Notification delivery failed"
                );
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        }
        tracing::debug!(observer = %observer, "Delivery task finished");
    });
    tx
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use lds_core::ChangeKind;

    use super::*;
    use crate::transport::TransportError;

    struct NullSink;

    #[async_trait]
    impl NotificationSink for NullSink {
        async fn deliver(&self, _: &Notification) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    fn registry() -> ObserverRegistry {
        ObserverRegistry::new(Arc::new(NullSink))
    }

    #[tokio::test]
    async fn watch_scope_covers_ancestors_and_descendants() {
        let registry = registry();
        let observer = ObserverId::new("//a/listener");
        registry.register(&observer, &[uri("a/e")]).unwrap();

        assert!(registry.watchers_of(&uri("a/e")).contains(&observer));
        assert!(registry.watchers_of(&uri("a/e/1")).contains(&observer));
        assert!(registry.watchers_of(&uri("a")).contains(&observer));
        assert!(registry.watchers_of(&uri("a/other")).is_empty());
    }

    #[tokio::test]
    async fn overlapping_watches_yield_one_notification() {
        let registry = registry();
        let observer = ObserverId::new("//a/listener");
        registry
            .register(&observer, &[uri("a"), uri("a/e"), uri("a/e/1")])
            .unwrap();

        let change = NodeChange::new(uri("a/e/1"), ChangeKind::NodeUpdated);
        assert_eq!(registry.dispatch(&[change]), 1);
    }

    #[tokio::test]
    async fn pending_count_drains_to_zero() {
        let registry = registry();
        let observer = ObserverId::new("//a/listener");
        registry.register(&observer, &[uri("a")]).unwrap();

        let changes = [
            NodeChange::new(uri("a/e"), ChangeKind::NodeAdded),
            NodeChange::new(uri("a/f"), ChangeKind::NodeAdded),
        ];
        assert_eq!(registry.dispatch(&changes), 2);

        for _ in 0..100 {
            if registry.pending_deliveries() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.pending_deliveries(), 0);
    }

    #[tokio::test]
    async fn last_unregister_drops_observer() {
        let registry = registry();
        let observer = ObserverId::new("//a/listener");
        registry.register(&observer, &[uri("a/e"), uri("a/f")]).unwrap();
        registry.unregister(&observer, &[uri("a/e"), uri("a/missing")]).unwrap();
        assert_eq!(registry.watched_by(&observer), vec![uri("a/f")]);

        registry.unregister(&observer, &[uri("a/f")]).unwrap();
        assert_eq!(registry.observer_count(), 0);
        let change = NodeChange::new(uri("a/f"), ChangeKind::NodeRemoved);
        assert_eq!(registry.dispatch(&[change]), 0);
    }

    #[tokio::test]
    async fn forget_subtree_drops_nested_watches_only() {
        let registry = registry();
        let observer = ObserverId::new("//a/listener");
        registry
            .register(&observer, &[uri("a"), uri("a/e"), uri("a/e/1")])
            .unwrap();

        registry.forget_subtree(&uri("a/e"));
        assert_eq!(registry.watched_by(&observer), vec![uri("a")]);
    }

    #[tokio::test]
    async fn empty_arguments_are_rejected() {
        let registry = registry();
        let err = registry.register(&ObserverId::new(""), &[uri("a")]).unwrap_err();
        assert_eq!(err.code(), lds_core::UCode::InvalidArgument);
        let err = registry.unregister(&ObserverId::new("x"), &[]).unwrap_err();
        assert_eq!(err.code(), lds_core::UCode::InvalidArgument);
    }
}
