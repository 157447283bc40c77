//! The RPC transport boundary.
//!
//! The service never talks to a socket itself. It is handed something that can
//! connect, register the method names it answers, and push notifications to
//! observers; requests arrive through [`crate::DiscoveryService::handle_request`].

use async_trait::async_trait;

use lds_core::{Method, Notification};

/// Errors reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport disconnected")]
    Disconnected,

    #[error("Transport rejected the call: {reason}")]
    Rejected { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection and method registration.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Start routing requests for `method` to this service.
    async fn register_method(&self, method: Method) -> Result<(), TransportError>;

    async fn unregister_method(&self, method: Method) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Outbound delivery of observer notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), TransportError>;
}
