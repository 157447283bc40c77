//! Error types for the lds-service crate.

use thiserror::Error;

use lds_core::{CoreError, UCode, UStatus};
use lds_graph::GraphError;
use lds_snapshot::SnapshotError;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to connect transport: {0}")]
    Connect(#[source] TransportError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unexpected payload")]
    UnexpectedPayload,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// A missing or empty required request field.
    pub fn required(field: &str) -> Self {
        Self::InvalidArgument(format!("{field} is required"))
    }

    /// Status code reported to callers for this error.
    pub fn code(&self) -> UCode {
        match self {
            Self::Graph(e) => e.code(),
            Self::Core(e) => e.code(),
            Self::InvalidArgument(_) | Self::UnexpectedPayload => UCode::InvalidArgument,
            Self::Connect(_) => UCode::FailedPrecondition,
            Self::Snapshot(_) => UCode::FailedPrecondition,
            Self::Config(_) => UCode::FailedPrecondition,
            Self::Io(_) => UCode::FailedPrecondition,
            Self::Join(_) => UCode::FailedPrecondition,
        }
    }

    pub fn to_status(&self) -> UStatus {
        UStatus::error(self.code(), self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
