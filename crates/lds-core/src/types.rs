//! Core domain types for the discovery registry.
//!
//! These types describe nodes in the registry tree. The same `Node` record is
//! returned by queries, accepted by mutations, and written to the snapshot.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum depth of a [`Uri`]: authority, entity, version, resource.
pub const MAX_URI_SEGMENTS: usize = 4;

// ── Uri ───────────────────────────────────────────────────────────

/// Hierarchical address of a node.
///
/// Textual form is `//authority/entity/version/resource`; every segment after
/// the authority is optional. The leading `//` may be omitted when parsing.
/// A node's parent is never stored: it is the URI with the last segment removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    segments: Vec<String>,
}

impl Uri {
    /// Parse and validate a textual URI.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let path = raw.strip_prefix("//").unwrap_or(raw);
        if path.is_empty() {
            return Err(invalid(raw, "uri is empty"));
        }

        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if segments.len() > MAX_URI_SEGMENTS {
            return Err(invalid(raw, "too many segments"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(invalid(raw, "empty segment"));
            }
            if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(invalid(raw, "segment contains whitespace or control characters"));
            }
        }

        Ok(Self { segments })
    }

    /// The URI of an authority (a registry root).
    pub fn root(authority: &str) -> Result<Self, CoreError> {
        let uri = Self::parse(authority)?;
        if uri.depth() != 1 {
            return Err(invalid(authority, "authority must be a single segment"));
        }
        Ok(uri)
    }

    /// Number of segments, 1 for an authority.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn authority(&self) -> &str {
        &self.segments[0]
    }

    pub fn resource(&self) -> Option<&str> {
        self.segments.get(3).map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.depth() == 1
    }

    /// The parent URI, or `None` for an authority.
    pub fn parent(&self) -> Option<Uri> {
        if self.is_root() {
            return None;
        }
        Some(self.prefix(self.depth() - 1))
    }

    /// The ancestor (or self) made of the first `depth` segments.
    ///
    /// `depth` is clamped to `1..=self.depth()`.
    pub fn prefix(&self, depth: usize) -> Uri {
        let depth = depth.clamp(1, self.depth());
        Self {
            segments: self.segments[..depth].to_vec(),
        }
    }

    /// True if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Uri) -> bool {
        self.depth() < other.depth() && other.segments.starts_with(&self.segments)
    }

    /// True if `other` is `self` or lies in the subtree below `self`.
    pub fn contains(&self, other: &Uri) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

fn invalid(raw: &str, reason: &'static str) -> CoreError {
    CoreError::InvalidUri {
        uri: raw.to_string(),
        reason,
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}", self.segments.join("/"))
    }
}

impl FromStr for Uri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.to_string()
    }
}

// ── Node Types ────────────────────────────────────────────────────

/// What a node represents in the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// No declared type. Never stored in the graph.
    #[default]
    Unspecified,
    Authority,
    Device,
    Entity,
    Version,
    Topic,
    Method,
    Resource,
}

impl NodeType {
    pub fn is_specified(self) -> bool {
        self != Self::Unspecified
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

// ── TTL ───────────────────────────────────────────────────────────

/// TTL supplied with a node update.
///
/// On the wire `-1` means "leave the stored TTL alone"; `0` is a real value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
    #[default]
    Unchanged,
    Set(u32),
}

impl Ttl {
    /// Wire value meaning "no change".
    pub const UNCHANGED: i64 = -1;

    pub fn from_wire(raw: i64) -> Result<Self, CoreError> {
        if raw == Self::UNCHANGED {
            return Ok(Self::Unchanged);
        }
        u32::try_from(raw)
            .map(Self::Set)
            .map_err(|_| CoreError::InvalidTtl(raw))
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A registry node together with (part of) its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    pub uri: Uri,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl Node {
    pub fn new(uri: Uri, node_type: NodeType) -> Self {
        Self {
            uri,
            node_type,
            properties: BTreeMap::new(),
            children: Vec::new(),
            ttl: None,
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Find a node in this subtree by URI.
    pub fn find(&self, uri: &Uri) -> Option<&Node> {
        if &self.uri == uri {
            return Some(self);
        }
        if !self.uri.is_ancestor_of(uri) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(uri))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Check the structural invariants of this subtree: every node is typed,
    /// only a root is an authority, every child is a direct child of its
    /// holder, and siblings are unique.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.node_type.is_specified() {
            return Err(CoreError::MissingType {
                uri: self.uri.to_string(),
            });
        }
        if self.uri.is_root() != (self.node_type == NodeType::Authority) {
            return Err(CoreError::MisplacedAuthority {
                uri: self.uri.to_string(),
                node_type: self.node_type,
            });
        }

        let mut seen = HashSet::with_capacity(self.children.len());
        for child in &self.children {
            if child.uri.parent().as_ref() != Some(&self.uri) {
                return Err(CoreError::NotADirectChild {
                    parent: self.uri.to_string(),
                    child: child.uri.to_string(),
                });
            }
            if !seen.insert(&child.uri) {
                return Err(CoreError::DuplicateNode {
                    uri: child.uri.to_string(),
                });
            }
            child.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn uri_parse_accepts_optional_authority_prefix() {
        assert_eq!(uri("//vcu.vin/body.cabin_climate"), uri("vcu.vin/body.cabin_climate"));
        assert_eq!(uri("vcu.vin/body.cabin_climate").to_string(), "//vcu.vin/body.cabin_climate");
    }

    #[test]
    fn uri_segments() {
        let u = uri("//vcu.vin/body.cabin_climate/1/door.front_left#Door");
        assert_eq!(u.authority(), "vcu.vin");
        assert_eq!(u.resource(), Some("door.front_left#Door"));
        assert_eq!(u.parent(), Some(uri("vcu.vin/body.cabin_climate/1")));
        assert_eq!(uri("vcu.vin/body.cabin_climate").resource(), None);
        assert_eq!(u.depth(), 4);
    }

    #[test]
    fn uri_rejects_malformed() {
        for raw in ["", "//", "a//b", "a/b/", "a/b c", "a/b/c/d/e", "a/\tb"] {
            assert!(
                matches!(Uri::parse(raw), Err(CoreError::InvalidUri { .. })),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn uri_parent_is_derived() {
        let u = uri("a/e/1");
        assert_eq!(u.parent(), Some(uri("a/e")));
        assert_eq!(uri("a").parent(), None);
    }

    #[test]
    fn uri_ancestry() {
        let a = uri("a");
        let e = uri("a/e");
        let other = uri("a/ex");
        assert!(a.is_ancestor_of(&e));
        assert!(!e.is_ancestor_of(&e));
        assert!(e.contains(&e));
        assert!(!e.contains(&other));
        assert!(!e.is_ancestor_of(&a));
    }

    #[test]
    fn uri_root_requires_single_segment() {
        assert!(Uri::root("vcu.vin").is_ok());
        assert!(Uri::root("vcu.vin/x").is_err());
    }

    #[test]
    fn uri_serializes_as_string() {
        let json = serde_json::to_string(&uri("a/e")).unwrap();
        assert_eq!(json, "\"//a/e\"");
        let bad: Result<Uri, _> = serde_json::from_str("\"a//e\"");
        assert!(bad.is_err());
    }

    #[test]
    fn ttl_unchanged_is_distinct_from_zero() {
        assert_eq!(Ttl::from_wire(-1).unwrap(), Ttl::Unchanged);
        assert_eq!(Ttl::from_wire(0).unwrap(), Ttl::Set(0));
        assert_eq!(Ttl::from_wire(300).unwrap(), Ttl::Set(300));
        assert_eq!(Ttl::from_wire(-2), Err(CoreError::InvalidTtl(-2)));
    }

    #[test]
    fn property_value_is_externally_tagged() {
        let json = serde_json::to_string(&PropertyValue::from("red")).unwrap();
        assert_eq!(json, r#"{"string":"red"}"#);
        let v: PropertyValue = serde_json::from_str(r#"{"integer":2024}"#).unwrap();
        assert_eq!(v, PropertyValue::Integer(2024));
    }

    #[test]
    fn node_validate_rejects_foreign_child() {
        let node = Node::new(uri("a/e"), NodeType::Entity)
            .with_child(Node::new(uri("a/other/1"), NodeType::Version));
        assert!(matches!(
            node.validate(),
            Err(CoreError::NotADirectChild { .. })
        ));
    }

    #[test]
    fn node_validate_rejects_untyped_descendant() {
        let node = Node::new(uri("a/e"), NodeType::Entity)
            .with_child(Node::new(uri("a/e/1"), NodeType::Unspecified));
        assert_eq!(
            node.validate(),
            Err(CoreError::MissingType {
                uri: "//a/e/1".to_string()
            })
        );
    }

    #[test]
    fn node_validate_rejects_duplicate_siblings() {
        let node = Node::new(uri("a/e"), NodeType::Entity)
            .with_child(Node::new(uri("a/e/1"), NodeType::Version))
            .with_child(Node::new(uri("a/e/1"), NodeType::Version));
        assert_eq!(node.validate().unwrap_err().code(), crate::UCode::AlreadyExists);
    }

    #[test]
    fn node_find_and_len() {
        let node = Node::new(uri("a"), NodeType::Authority).with_child(
            Node::new(uri("a/e"), NodeType::Entity)
                .with_child(Node::new(uri("a/e/1"), NodeType::Version)),
        );
        assert_eq!(node.subtree_len(), 3);
        assert_eq!(node.find(&uri("a/e/1")).map(|n| n.node_type), Some(NodeType::Version));
        assert!(node.find(&uri("a/x")).is_none());
    }

    #[test]
    fn node_rejects_unknown_fields() {
        let json = r#"{"uri":"a","type":"AUTHORITY","colour":"red"}"#;
        assert!(serde_json::from_str::<Node>(json).is_err());
    }
}
