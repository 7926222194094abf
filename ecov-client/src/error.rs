//! Client error types
//!
//! Every operation returns a [`SyncError`]; presentation code only ever sees
//! the [`UserFacingError`] derived from it.

use crate::services::AuditError;
use crate::store::{StoreError, StoreErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Rejected before any backend was contacted
    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The optimistic entry was removed again
    #[error("Create of {id} rolled back: {source}")]
    RolledBack {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("{0} is still being saved")]
    Pending(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Collection {0} has not been loaded")]
    NotReady(&'static str),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Identity error: {0}")]
    Identity(String),
}

impl From<ecov_common::Error> for SyncError {
    fn from(e: ecov_common::Error) -> Self {
        match e {
            ecov_common::Error::InvalidInput(msg) => SyncError::Invalid(msg),
            ecov_common::Error::NotFound(msg) => SyncError::NotFound(msg),
            ecov_common::Error::Config(msg) => SyncError::Identity(msg),
            other => SyncError::Store(StoreError::storage(other.to_string())),
        }
    }
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) | SyncError::RolledBack { source: e, .. } => e.is_retryable(),
            SyncError::Audit(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn to_user_facing(&self) -> UserFacingError {
        match self {
            SyncError::Invalid(msg) => UserFacingError::new("INVALID_INPUT", msg.clone(), false),
            SyncError::Store(e) | SyncError::RolledBack { source: e, .. } => store_user_facing(e),
            SyncError::Pending(_) => UserFacingError::new(
                "PENDING",
                "This item is still being saved. Wait a moment before editing it.",
                false,
            ),
            SyncError::NotFound(_) => UserFacingError::new(
                "NOT_FOUND",
                "That item no longer exists. Refresh the list.",
                false,
            ),
            SyncError::NotReady(_) => UserFacingError::new(
                "NOT_READY",
                "Your data is still loading. Try again once it appears.",
                false,
            ),
            SyncError::Audit(e) => UserFacingError::new(e.code(), e.user_message(), e.is_retryable()),
            SyncError::Identity(_) => UserFacingError::new(
                "IDENTITY",
                "Could not determine who is signed in. Sign in again.",
                false,
            ),
        }
    }
}

fn store_user_facing(e: &StoreError) -> UserFacingError {
    match e.kind {
        StoreErrorKind::Network => UserFacingError::new(
            "NETWORK_ERROR",
            "Could not reach the server. Check your connection and retry.",
            true,
        ),
        StoreErrorKind::Auth => UserFacingError::new(
            "AUTH",
            "Your session is not authorized. Sign in again.",
            false,
        ),
        StoreErrorKind::ServerError => UserFacingError::new(
            "SERVER_ERROR",
            "The server could not save your change. Please retry.",
            true,
        ),
        StoreErrorKind::NotFound => UserFacingError::new(
            "NOT_FOUND",
            "That item no longer exists. Refresh the list.",
            false,
        ),
        StoreErrorKind::Storage => UserFacingError::new(
            "STORAGE",
            "Could not access local storage. Check free disk space and permissions.",
            false,
        ),
    }
}

/// Error as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl UserFacingError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl std::fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.retryable {
            write!(f, "{} (retry available)", self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl From<&SyncError> for UserFacingError {
    fn from(e: &SyncError) -> Self {
        e.to_user_facing()
    }
}
