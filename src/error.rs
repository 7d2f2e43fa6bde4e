//! Error types for the CSI core
//!
//! Provides structured error types for configuration resolution, bounded
//! command execution and the journalled object lifecycle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the CSI core
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("cluster configuration {path} is unreadable: {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    #[error("cluster configuration for {cluster_id} is malformed: {reason}")]
    MalformedRecord { cluster_id: String, reason: String },

    #[error("cluster ID ({cluster_id}) not found in {path}")]
    ClusterNotFound { cluster_id: String, path: PathBuf },

    // =========================================================================
    // Command Execution Errors
    // =========================================================================
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{program} timed out after {elapsed:?}")]
    Timeout { program: String, elapsed: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("{program} failed with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    // =========================================================================
    // Journal Errors
    // =========================================================================
    #[error("request {request_name} is {state}, cannot {operation}")]
    InvalidState {
        request_name: String,
        state: String,
        operation: String,
    },

    #[error("no journal entry for request {request_name}")]
    EntryNotFound { request_name: String },

    #[error("journal failure for {request_name}: {reason}")]
    Journal { request_name: String, reason: String },

    #[error("invalid CSI identifier {id}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take when an operation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Retry with exponential backoff
    RetryWithBackoff,
    /// Retry after a specific duration
    RetryAfter(Duration),
    /// Don't retry, operator intervention or a different request is needed
    NoRetry,
}

/// Status an upper protocol layer should report for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    DeadlineExceeded,
    Aborted,
    Unavailable,
    Internal,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Backend outcomes - retry, possibly with a longer deadline
            Error::Timeout { .. } | Error::CommandFailed { .. } | Error::Journal { .. } => {
                ErrorAction::RetryWithBackoff
            }

            // Another request owns the name right now
            Error::InvalidState { state, .. } if state == "provisional" => {
                ErrorAction::RetryAfter(Duration::from_secs(5))
            }

            Error::ConfigUnreadable { .. }
            | Error::MalformedRecord { .. }
            | Error::ClusterNotFound { .. }
            | Error::SpawnFailed { .. }
            | Error::InvalidState { .. }
            | Error::InvalidIdentifier { .. }
            | Error::Cancelled { .. } => ErrorAction::NoRetry,

            _ => ErrorAction::RetryWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRetry)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Journal { .. })
    }

    /// Map to the status the protocol layer should surface
    pub fn status(&self) -> ProtocolStatus {
        match self {
            Error::ClusterNotFound { .. } | Error::EntryNotFound { .. } => ProtocolStatus::NotFound,
            Error::InvalidIdentifier { .. } => ProtocolStatus::InvalidArgument,
            Error::MalformedRecord { .. } | Error::ConfigUnreadable { .. } => {
                ProtocolStatus::FailedPrecondition
            }
            Error::InvalidState { .. } => ProtocolStatus::Aborted,
            Error::Timeout { .. } => ProtocolStatus::DeadlineExceeded,
            Error::Cancelled { .. } => ProtocolStatus::Aborted,
            Error::Journal { .. } => ProtocolStatus::Unavailable,
            _ => ProtocolStatus::Internal,
        }
    }
}

/// Result type alias for the CSI core
pub type Result<T> = std::result::Result<T, Error>;
