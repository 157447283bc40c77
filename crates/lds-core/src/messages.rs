//! Typed request and response messages for the nine discovery methods.
//!
//! Payloads travel as JSON. Every request field has a default so that a
//! structurally valid but empty payload decodes and is then rejected by
//! validation; anything with the wrong shape fails to decode at all.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{UCode, UStatus};
use crate::types::{Node, PropertyValue, Ttl, Uri};

/// Status message for a payload that does not decode as the method's request.
pub const UNEXPECTED_PAYLOAD: &str = "Unexpected payload";

// ── Methods ───────────────────────────────────────────────────────

/// The closed set of RPC methods the service answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    LookupUri,
    FindNodes,
    FindNodeProperties,
    UpdateNode,
    UpdateProperty,
    AddNodes,
    DeleteNodes,
    RegisterForNotifications,
    UnregisterForNotifications,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::LookupUri,
        Method::FindNodes,
        Method::FindNodeProperties,
        Method::UpdateNode,
        Method::UpdateProperty,
        Method::AddNodes,
        Method::DeleteNodes,
        Method::RegisterForNotifications,
        Method::UnregisterForNotifications,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LookupUri => "LookupUri",
            Self::FindNodes => "FindNodes",
            Self::FindNodeProperties => "FindNodeProperties",
            Self::UpdateNode => "UpdateNode",
            Self::UpdateProperty => "UpdateProperty",
            Self::AddNodes => "AddNodes",
            Self::DeleteNodes => "DeleteNodes",
            Self::RegisterForNotifications => "RegisterForNotifications",
            Self::UnregisterForNotifications => "UnregisterForNotifications",
        }
    }

    /// Whether a successful call changes the graph (and so triggers a snapshot).
    pub fn mutates_graph(self) -> bool {
        matches!(
            self,
            Self::UpdateNode | Self::UpdateProperty | Self::AddNodes | Self::DeleteNodes
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Requests ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupUriRequest {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FindNodesRequest {
    pub uri: String,
    /// Levels of descendants to return; negative means unlimited.
    pub depth: i32,
}

impl Default for FindNodesRequest {
    fn default() -> Self {
        Self {
            uri: String::new(),
            depth: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FindNodePropertiesRequest {
    pub uri: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateNodeRequest {
    pub node: Option<Node>,
    /// `-1` leaves the stored TTL unchanged.
    pub ttl: i64,
}

impl Default for UpdateNodeRequest {
    fn default() -> Self {
        Self {
            node: None,
            ttl: Ttl::UNCHANGED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdatePropertyRequest {
    pub uri: String,
    pub property: String,
    pub value: Option<PropertyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddNodesRequest {
    pub parent_uri: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteNodesRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObserverInfo {
    pub uri: String,
}

/// Shared by RegisterForNotifications and UnregisterForNotifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsRequest {
    pub observer: Option<ObserverInfo>,
    pub uris: Vec<String>,
}

/// A decoded request, one variant per method.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    LookupUri(LookupUriRequest),
    FindNodes(FindNodesRequest),
    FindNodeProperties(FindNodePropertiesRequest),
    UpdateNode(UpdateNodeRequest),
    UpdateProperty(UpdatePropertyRequest),
    AddNodes(AddNodesRequest),
    DeleteNodes(DeleteNodesRequest),
    RegisterForNotifications(NotificationsRequest),
    UnregisterForNotifications(NotificationsRequest),
}

impl Request {
    /// Decode a JSON payload as the request type of `method`.
    pub fn decode(method: Method, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match method {
            Method::LookupUri => Self::LookupUri(serde_json::from_value(payload)?),
            Method::FindNodes => Self::FindNodes(serde_json::from_value(payload)?),
            Method::FindNodeProperties => Self::FindNodeProperties(serde_json::from_value(payload)?),
            Method::UpdateNode => Self::UpdateNode(serde_json::from_value(payload)?),
            Method::UpdateProperty => Self::UpdateProperty(serde_json::from_value(payload)?),
            Method::AddNodes => Self::AddNodes(serde_json::from_value(payload)?),
            Method::DeleteNodes => Self::DeleteNodes(serde_json::from_value(payload)?),
            Method::RegisterForNotifications => {
                Self::RegisterForNotifications(serde_json::from_value(payload)?)
            }
            Method::UnregisterForNotifications => {
                Self::UnregisterForNotifications(serde_json::from_value(payload)?)
            }
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Self::LookupUri(_) => Method::LookupUri,
            Self::FindNodes(_) => Method::FindNodes,
            Self::FindNodeProperties(_) => Method::FindNodeProperties,
            Self::UpdateNode(_) => Method::UpdateNode,
            Self::UpdateProperty(_) => Method::UpdateProperty,
            Self::AddNodes(_) => Method::AddNodes,
            Self::DeleteNodes(_) => Method::DeleteNodes,
            Self::RegisterForNotifications(_) => Method::RegisterForNotifications,
            Self::UnregisterForNotifications(_) => Method::UnregisterForNotifications,
        }
    }
}

/// A raw request as handed over by the transport: method plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub method: Method,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RequestMessage {
    pub fn new(method: Method, payload: serde_json::Value) -> Self {
        Self { method, payload }
    }
}

// ── Responses ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupUriResponse {
    pub status: UStatus,
    #[serde(default)]
    pub uris: Vec<Uri>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindNodesResponse {
    pub status: UStatus,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindNodePropertiesResponse {
    pub status: UStatus,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// The typed response for each method. Methods without a result body answer
/// with a bare status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    LookupUri(LookupUriResponse),
    FindNodes(FindNodesResponse),
    FindNodeProperties(FindNodePropertiesResponse),
    UpdateNode(UStatus),
    UpdateProperty(UStatus),
    AddNodes(UStatus),
    DeleteNodes(UStatus),
    RegisterForNotifications(UStatus),
    UnregisterForNotifications(UStatus),
}

impl Response {
    /// The response `method` sends when the call fails with `status`.
    pub fn failure(method: Method, status: UStatus) -> Self {
        match method {
            Method::LookupUri => Self::LookupUri(LookupUriResponse {
                status,
                uris: Vec::new(),
            }),
            Method::FindNodes => Self::FindNodes(FindNodesResponse {
                status,
                nodes: Vec::new(),
            }),
            Method::FindNodeProperties => Self::FindNodeProperties(FindNodePropertiesResponse {
                status,
                properties: BTreeMap::new(),
            }),
            Method::UpdateNode => Self::UpdateNode(status),
            Method::UpdateProperty => Self::UpdateProperty(status),
            Method::AddNodes => Self::AddNodes(status),
            Method::DeleteNodes => Self::DeleteNodes(status),
            Method::RegisterForNotifications => Self::RegisterForNotifications(status),
            Method::UnregisterForNotifications => Self::UnregisterForNotifications(status),
        }
    }

    /// Shorthand for a failure response with a code and message.
    pub fn error(method: Method, code: UCode, message: impl Into<String>) -> Self {
        Self::failure(method, UStatus::error(code, message))
    }

    pub fn method(&self) -> Method {
        match self {
            Self::LookupUri(_) => Method::LookupUri,
            Self::FindNodes(_) => Method::FindNodes,
            Self::FindNodeProperties(_) => Method::FindNodeProperties,
            Self::UpdateNode(_) => Method::UpdateNode,
            Self::UpdateProperty(_) => Method::UpdateProperty,
            Self::AddNodes(_) => Method::AddNodes,
            Self::DeleteNodes(_) => Method::DeleteNodes,
            Self::RegisterForNotifications(_) => Method::RegisterForNotifications,
            Self::UnregisterForNotifications(_) => Method::UnregisterForNotifications,
        }
    }

    pub fn status(&self) -> &UStatus {
        match self {
            Self::LookupUri(r) => &r.status,
            Self::FindNodes(r) => &r.status,
            Self::FindNodeProperties(r) => &r.status,
            Self::UpdateNode(s)
            | Self::UpdateProperty(s)
            | Self::AddNodes(s)
            | Self::DeleteNodes(s)
            | Self::RegisterForNotifications(s)
            | Self::UnregisterForNotifications(s) => s,
        }
    }

    pub fn code(&self) -> UCode {
        self.status().code
    }
}
