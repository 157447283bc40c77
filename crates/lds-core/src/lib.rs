//! lds-core: Shared types, status codes, and messages for the local discovery service.
//!
//! This crate provides the foundational types used across all LDS components:
//! - Hierarchical node addresses (`Uri`) and the registry node record
//! - Typed property values and the TTL update marker
//! - The closed set of status codes every response carries
//! - Typed request/response messages for the nine RPC methods
//! - Change notifications delivered to observers

pub mod error;
pub mod events;
pub mod messages;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use events::{ChangeKind, EventId, NodeChange, Notification, ObserverId};
pub use messages::{Method, Request, RequestMessage, Response};
pub use status::{UCode, UStatus};
pub use types::{Node, NodeType, PropertyValue, Ttl, Uri};
