//! Shared fakes for lds-service integration tests.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use lds_core::{Method, Notification, RequestMessage, Response};
use lds_service::{DiscoveryConfig, DiscoveryService, NotificationSink, Transport, TransportError};
use lds_snapshot::{Blake3Checksum, FileSnapshotStore, SnapshotError, SnapshotStore};

/// Transport that records every call and can be told to misbehave.
#[derive(Default)]
pub struct MockTransport {
    pub fail_connect: bool,
    pub report_disconnected: bool,
    pub reject: BTreeSet<Method>,
    pub connected: AtomicBool,
    pub registered: Mutex<BTreeSet<Method>>,
    pub unregistered: Mutex<BTreeSet<Method>>,
    pub delivered: Mutex<Vec<Notification>>,
}

impl MockTransport {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.fail_connect {
            return Err(TransportError::Rejected {
                reason: "no route".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.report_disconnected
    }

    async fn register_method(&self, method: Method) -> Result<(), TransportError> {
        if self.reject.contains(&method) {
            return Err(TransportError::Rejected {
                reason: format!("{method} is taken"),
            });
        }
        self.registered.lock().insert(method);
        Ok(())
    }

    async fn unregister_method(&self, method: Method) -> Result<(), TransportError> {
        self.unregistered.lock().insert(method);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MockTransport {
    async fn deliver(&self, notification: &Notification) -> Result<(), TransportError> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

/// Snapshot store whose writes always fail.
#[derive(Default)]
pub struct FailingStore;

impl SnapshotStore for FailingStore {
    fn save(&self, _name: &str, _contents: &str) -> Result<(), SnapshotError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
    }

    fn load(&self, _name: &str) -> Result<Option<String>, SnapshotError> {
        Ok(None)
    }
}

pub fn config(authority: &str) -> DiscoveryConfig {
    DiscoveryConfig {
        authority: authority.to_string(),
        registration_timeout_ms: 1000,
        ..DiscoveryConfig::default()
    }
}

pub async fn start_in(
    dir: &Path,
    config: DiscoveryConfig,
    transport: MockTransport,
) -> DiscoveryService<MockTransport> {
    let store = FileSnapshotStore::new(dir).unwrap();
    DiscoveryService::start(
        config,
        Arc::new(transport),
        Arc::new(store),
        Arc::new(Blake3Checksum),
    )
    .await
    .unwrap()
}

pub async fn call(
    service: &DiscoveryService<MockTransport>,
    method: Method,
    payload: Value,
) -> Response {
    service
        .handle_request(RequestMessage::new(method, payload))
        .await
        .expect("method should be registered")
}

/// Poll until `check` holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Wait until every queued notification has reached the transport.
pub async fn settled(service: &DiscoveryService<MockTransport>) -> bool {
    eventually(|| service.observers().pending_deliveries() == 0).await
}
