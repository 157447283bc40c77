//! lds-snapshot: Checksummed persistence of the registry graph.
//!
//! The whole graph is written as one snapshot after every committed mutation
//! and read back once at startup. Each snapshot is sealed with a content hash
//! over its format version, authority, and graph; a snapshot whose hash does
//! not match is rejected on read.

pub mod hash;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lds_core::Node;

pub use hash::{Blake3Checksum, Checksum};
pub use store::{FileSnapshotStore, SnapshotStore};

/// Version of the envelope layout written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from snapshot encoding, verification, and storage.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Integrity check failed for snapshot of {authority}: stored hash does not match content")]
    IntegrityViolation { authority: String },

    #[error("Unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot authority {envelope} does not match graph root {root}")]
    AuthorityMismatch { envelope: String, root: String },

    #[error("Invalid snapshot name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

// ── Envelope ─────────────────────────────────────────────────────

/// A sealed, self-verifying copy of the whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    /// The root authority, as written in the graph's root URI.
    pub authority: String,
    pub written_at: DateTime<Utc>,
    /// Hex checksum of `format_version`, `authority` and `graph`.
    pub content_hash: String,
    pub graph: Node,
}

/// Hashable view of a snapshot (excludes `content_hash` and `written_at`).
#[derive(Serialize)]
struct HashableSnapshot<'a> {
    format_version: u32,
    authority: &'a str,
    graph: &'a Node,
}

impl Snapshot {
    /// Seal `graph` (the root node with its full subtree).
    pub fn seal(graph: Node, checksum: &dyn Checksum) -> Result<Self> {
        let mut snapshot = Self {
            format_version: FORMAT_VERSION,
            authority: graph.uri.authority().to_string(),
            written_at: Utc::now(),
            content_hash: String::new(),
            graph,
        };
        snapshot.content_hash = checksum.generate_hash(&snapshot.hashable_bytes()?);
        Ok(snapshot)
    }

    /// Seal a graph given in its exported text form.
    pub fn from_export(export: &str, checksum: &dyn Checksum) -> Result<Self> {
        Self::seal(serde_json::from_str(export)?, checksum)
    }

    fn hashable_bytes(&self) -> Result<Vec<u8>> {
        let hashable = HashableSnapshot {
            format_version: self.format_version,
            authority: &self.authority,
            graph: &self.graph,
        };
        Ok(serde_json::to_vec(&hashable)?)
    }

    /// Check the version, the authority and the content hash.
    pub fn verify(&self, checksum: &dyn Checksum) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.format_version));
        }
        if self.graph.uri.authority() != self.authority || !self.graph.uri.is_root() {
            return Err(SnapshotError::AuthorityMismatch {
                envelope: self.authority.clone(),
                root: self.graph.uri.to_string(),
            });
        }

        if !checksum.verify_hash(&self.hashable_bytes()?, &self.content_hash) {
            return Err(SnapshotError::IntegrityViolation {
                authority: self.authority.clone(),
            });
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify a stored snapshot.
    pub fn decode(text: &str, checksum: &dyn Checksum) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        snapshot.verify(checksum)?;
        Ok(snapshot)
    }

    /// The graph in the text form the graph store imports.
    pub fn graph_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.graph)?)
    }
}
