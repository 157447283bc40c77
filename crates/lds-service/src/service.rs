//! Service lifecycle: connect, load, register methods, serve, shut down.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};

use lds_core::{Method, RequestMessage, Response};
use lds_graph::GraphStore;
use lds_snapshot::{Checksum, SnapshotStore};

use crate::config::DiscoveryConfig;
use crate::error::{Result, ServiceError};
use crate::handler::RequestHandler;
use crate::loader::{self, InitOutcome};
use crate::notifier::Notifier;
use crate::observer::ObserverRegistry;
use crate::persist::PersistenceCoordinator;
use crate::transport::{NotificationSink, Transport, TransportError};

#[derive(Debug, Clone, Copy)]
enum Registration {
    Register,
    Unregister,
}

impl Registration {
    async fn apply<T: Transport>(
        self,
        transport: &T,
        method: Method,
    ) -> std::result::Result<(), TransportError> {
        match self {
            Self::Register => transport.register_method(method).await,
            Self::Unregister => transport.unregister_method(method).await,
        }
    }
}

/// A running discovery service bound to one transport.
pub struct DiscoveryService<T> {
    config: DiscoveryConfig,
    transport: Arc<T>,
    graph: Arc<GraphStore>,
    observers: Arc<ObserverRegistry>,
    persistence: Arc<PersistenceCoordinator>,
    handler: RequestHandler,
    registered: Mutex<BTreeSet<Method>>,
    outcome: InitOutcome,
}

impl<T> DiscoveryService<T>
where
    T: Transport + NotificationSink + 'static,
{
    /// Connect the transport, load the graph, and register every method.
    ///
    /// Failing to connect aborts startup. Everything after that degrades
    /// instead: a graph that cannot be loaded leaves the service answering
    /// FAILED_PRECONDITION, and methods that fail to register are logged.
    pub async fn start(
        config: DiscoveryConfig,
        transport: Arc<T>,
        store: Arc<dyn SnapshotStore>,
        checksum: Arc<dyn Checksum>,
    ) -> Result<Self> {
        transport.connect().await.map_err(ServiceError::Connect)?;
        tracing::info!("Transport connected");

        let sink: Arc<dyn NotificationSink> = transport.clone();
        let observers = Arc::new(ObserverRegistry::new(sink));
        let graph = Arc::new(GraphStore::with_listener(Arc::new(Notifier::new(
            observers.clone(),
        ))));
        let persistence = Arc::new(PersistenceCoordinator::new(
            graph.clone(),
            store,
            checksum,
            config.snapshot_name.clone(),
        ));

        let outcome = loader::initialize(&graph, &persistence, &config).await;
        tracing::info!(outcome = %outcome, "Registry initialization finished");

        let handler = RequestHandler::new(graph.clone(), observers.clone(), persistence.clone());
        let service = Self {
            config,
            transport,
            graph,
            observers,
            persistence,
            handler,
            registered: Mutex::new(BTreeSet::new()),
            outcome,
        };

        if service.transport.is_connected() {
            let registered = service
                .for_each_method(Registration::Register, Method::ALL.to_vec())
                .await;
            tracing::info!(registered = registered.len(), "Methods registered");
            service.registered.lock().extend(registered);
        } else {
            tracing::warn!("Transport reports disconnected, skipping method registration");
        }

        Ok(service)
    }

    /// Route one inbound request. Returns `None` for methods this service has
    /// not registered.
    pub async fn handle_request(&self, message: RequestMessage) -> Option<Response> {
        if !self.registered.lock().contains(&message.method) {
            tracing::debug!(method = %message.method, "Ignoring request for unregistered method");
            return None;
        }
        Some(self.handler.handle(message).await)
    }

    /// Unregister methods, disconnect, and close observer channels.
    pub async fn shutdown(&self) {
        let methods: Vec<Method> = self.registered.lock().iter().copied().collect();
        let unregistered = self
            .for_each_method(Registration::Unregister, methods)
            .await;
        {
            let mut registered = self.registered.lock();
            for method in &unregistered {
                registered.remove(method);
            }
        }

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(error = %e, "Transport disconnect failed");
        }
        self.observers.shutdown();
        tracing::info!("Discovery service stopped");
    }

    /// Run `op` for every method concurrently, bounded by the registration
    /// timeout. Returns the methods for which it succeeded.
    async fn for_each_method(&self, op: Registration, methods: Vec<Method>) -> Vec<Method> {
        let mut tasks = JoinSet::new();
        for method in methods {
            let transport = Arc::clone(&self.transport);
            tasks.spawn(async move { (method, op.apply(transport.as_ref(), method).await) });
        }

        let mut succeeded = Vec::new();
        let limit = Duration::from_millis(self.config.registration_timeout_ms);
        let drained = timeout(limit, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((method, Ok(()))) => succeeded.push(method),
                    Ok((method, Err(e))) => {
                        tracing::warn!(
                            method = %method,
                            op = ?op,
                            error = %e,
                            "Method registration call failed"
                        );
                    }
                    Err(e) => tracing::error!(op = ?op, error = %e, "Registration task panicked"),
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                op = ?op,
                pending = tasks.len(),
                timeout_ms = self.config.registration_timeout_ms,
                "Method registration timed out"
            );
        }
        succeeded
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn outcome(&self) -> InitOutcome {
        self.outcome
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    pub fn persistence(&self) -> &Arc<PersistenceCoordinator> {
        &self.persistence
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn registered_methods(&self) -> Vec<Method> {
        self.registered.lock().iter().copied().collect()
    }
}
