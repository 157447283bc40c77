//! lds-service: the local discovery service.
//!
//! Wires the graph store to a transport: decodes and answers requests, keeps
//! a checksummed snapshot of the graph on disk after every mutation, and fans
//! graph changes out to registered observers.

pub mod config;
pub mod error;
pub mod handler;
pub mod loader;
pub mod notifier;
pub mod observer;
pub mod persist;
pub mod service;
pub mod stdio;
pub mod transport;

pub use config::DiscoveryConfig;
pub use error::{Result, ServiceError};
pub use handler::RequestHandler;
pub use loader::InitOutcome;
pub use notifier::Notifier;
pub use observer::ObserverRegistry;
pub use persist::PersistenceCoordinator;
pub use service::DiscoveryService;
pub use transport::{NotificationSink, Transport, TransportError};
