//! Status codes carried by every response.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of outcomes a request can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UCode {
    Ok,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
}

impl fmt::Display for UCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
        };
        f.write_str(name)
    }
}

/// A status code with an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UStatus {
    pub code: UCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UStatus {
    pub fn ok() -> Self {
        Self {
            code: UCode::Ok,
            message: None,
        }
    }

    pub fn error(code: UCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == UCode::Ok
    }
}

impl Default for UStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for UStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}
