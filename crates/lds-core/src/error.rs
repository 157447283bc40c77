use thiserror::Error;

use crate::status::UCode;
use crate::types::NodeType;

/// Validation errors for core types: malformed URIs, TTLs, and node trees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    #[error("Invalid ttl {0}: expected -1 (unchanged) or a non-negative value")]
    InvalidTtl(i64),

    #[error("Node {uri} has no declared type")]
    MissingType { uri: String },

    #[error("Node {child} is not a direct child of {parent}")]
    NotADirectChild { parent: String, child: String },

    #[error("Duplicate node: {uri}")]
    DuplicateNode { uri: String },

    #[error("Node {uri} cannot have type {node_type:?}: the root and only the root is an authority")]
    MisplacedAuthority { uri: String, node_type: NodeType },
}

impl CoreError {
    /// Status code reported to callers for this error.
    pub fn code(&self) -> UCode {
        match self {
            Self::DuplicateNode { .. } => UCode::AlreadyExists,
            Self::InvalidUri { .. }
            | Self::InvalidTtl(_)
            | Self::MissingType { .. }
            | Self::NotADirectChild { .. }
            | Self::MisplacedAuthority { .. } => UCode::InvalidArgument,
        }
    }
}
