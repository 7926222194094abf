//! Entity persistence
//!
//! One [`EntityStore`] trait with two production backends:
//! - [`LocalStore`]: anonymous use, the whole collection kept as one JSON
//!   array in the profile database
//! - [`HttpRemoteStore`]: signed-in use, a REST document store filtered by
//!   owner
//!
//! [`MemoryRemoteStore`] stands in for the document store offline and in
//! tests. The backend is chosen once per collection reload, by identity.

mod entities;
mod local;
mod memory;
mod remote;

pub use entities::{validate_payload, PortfolioPatch, ReportPatch};
pub use local::LocalStore;
pub use memory::MemoryRemoteStore;
pub use remote::{build_http_client, HttpRemoteStore};

use crate::session::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A record kept in a synced collection
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Partial update; serializes to the fields it changes
    type Patch: Clone + Send + Sync + Serialize + 'static;

    /// Remote collection path segment
    const COLLECTION: &'static str;
    /// Local storage key
    const LOCAL_KEY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn owner_id(&self) -> Option<&str>;
    fn set_owner_id(&mut self, owner_id: Option<String>);

    /// List order after every reload: newest first
    fn created(&self) -> DateTime<Utc>;

    /// Order of the recently-updated view
    fn last_modified(&self) -> DateTime<Utc> {
        self.created()
    }

    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Reject records that must never enter a collection
    fn validate(&self) -> ecov_common::Result<()>;
}

/// Which backend a store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Remote,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Transport failure or timeout
    Network,
    /// Missing or rejected credentials
    Auth,
    ServerError,
    NotFound,
    /// Local database failure
    Storage,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, Some(404), message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Storage, None, message)
    }

    /// Map an HTTP status from the document store
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => StoreErrorKind::Auth,
            404 => StoreErrorKind::NotFound,
            _ => StoreErrorKind::ServerError,
        };
        Self::new(kind, Some(status), message)
    }

    /// Network failures and server errors may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Network | StoreErrorKind::ServerError)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => StoreError::from_status(status.as_u16(), e.to_string()),
            None => StoreError::new(StoreErrorKind::Network, None, e.to_string()),
        }
    }
}

impl From<ecov_common::Error> for StoreError {
    fn from(e: ecov_common::Error) -> Self {
        match e {
            ecov_common::Error::NotFound(msg) => StoreError::not_found(msg),
            other => StoreError::storage(other.to_string()),
        }
    }
}

/// Persistence backend for one entity type
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    fn backend(&self) -> Backend;

    /// Every entity visible to `owner_id` (all of them for the local store)
    async fn query(&self, owner_id: Option<&str>) -> Result<Vec<E>, StoreError>;

    /// Persist a new entity; the returned copy carries the confirmed id
    async fn insert(&self, entity: &E) -> Result<E, StoreError>;

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<(), StoreError>;

    /// Idempotent: deleting a missing id succeeds
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Opens the document-store view for a signed-in identity
pub type RemoteConnector<E> = Arc<dyn Fn(&Identity) -> Arc<dyn EntityStore<E>> + Send + Sync>;

/// Connector for an HTTP document store at `base_url`
pub fn http_connector<E: Entity>(
    http: reqwest::Client,
    base_url: impl Into<String>,
) -> RemoteConnector<E> {
    let base_url = base_url.into();
    Arc::new(move |identity: &Identity| {
        Arc::new(HttpRemoteStore::<E>::new(
            http.clone(),
            base_url.clone(),
            identity.token.clone(),
        )) as Arc<dyn EntityStore<E>>
    })
}

/// Connector sharing one in-memory document store between identities
pub fn memory_connector<E: Entity>(store: MemoryRemoteStore<E>) -> RemoteConnector<E> {
    Arc::new(move |identity: &Identity| {
        Arc::new(store.for_identity(identity)) as Arc<dyn EntityStore<E>>
    })
}
