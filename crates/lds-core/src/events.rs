//! Change events emitted by the graph store and delivered to observers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Uri;

/// Unique identifier for a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an external party that watches registry paths.
///
/// Opaque to the registry; usually the observer's own URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(pub String);

impl ObserverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeKind {
    /// The node (and any subtree supplied with it) was created.
    NodeAdded,
    /// Type, TTL, or properties replaced by an update.
    NodeUpdated,
    /// The node and its subtree were deleted.
    NodeRemoved,
    /// A single property was set.
    PropertyUpdated { name: String },
}

/// One committed change to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChange {
    pub uri: Uri,
    pub kind: ChangeKind,
}

impl NodeChange {
    pub fn new(uri: Uri, kind: ChangeKind) -> Self {
        Self { uri, kind }
    }
}

/// A change event addressed to one observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EventId,
    pub observer: ObserverId,
    pub uri: Uri,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(observer: ObserverId, change: &NodeChange) -> Self {
        Self {
            id: EventId::new(),
            observer,
            uri: change.uri.clone(),
            kind: change.kind.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kind_tags() {
        let kind = ChangeKind::PropertyUpdated {
            name: "color".to_string(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, r#"{"change":"property_updated","name":"color"}"#);
    }

    #[test]
    fn notification_serialization_roundtrip() {
        let change = NodeChange::new(Uri::parse("a/e").unwrap(), ChangeKind::NodeRemoved);
        let notification = Notification::new(ObserverId::new("//a/listener"), &change);

        let json = serde_json::to_string(&notification).unwrap();
        let deserialized: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, notification);
        assert!(json.contains("\"uri\":\"//a/e\""));
    }
}
