//! ecov-client library interface
//!
//! Reports and portfolios are kept in synced collections that follow the
//! signed-in identity: the profile database when anonymous, the document
//! store when signed in. Audit requests go through the [`desk::AuditDesk`].

pub mod collection;
pub mod desk;
pub mod error;
pub mod portfolios;
pub mod services;
pub mod session;
pub mod store;

pub use crate::error::{SyncError, UserFacingError};

use chrono::{DateTime, Utc};
use collection::SyncedCollection;
use desk::AuditDesk;
use ecov_common::{Portfolio, Report};
use portfolios::PortfolioBook;
use services::{AuditService, InputLimits};
use session::{Identity, IdentityProvider, IdentitySession};
use sqlx::SqlitePool;
use std::sync::Arc;
use store::{LocalStore, MemoryRemoteStore, RemoteConnector, StoreError};

/// Document-store connectors for both entity types
#[derive(Clone)]
pub struct RemoteStores {
    pub reports: RemoteConnector<Report>,
    pub portfolios: RemoteConnector<Portfolio>,
}

impl RemoteStores {
    /// REST document store at `base_url`
    pub fn http(base_url: &str) -> Result<Self, StoreError> {
        let http = store::build_http_client()?;
        Ok(Self {
            reports: store::http_connector(http.clone(), base_url),
            portfolios: store::http_connector(http, base_url),
        })
    }

    /// Fresh in-process document store
    pub fn memory() -> Self {
        Self::from_memory(MemoryRemoteStore::new(), MemoryRemoteStore::new())
    }

    pub fn from_memory(
        reports: MemoryRemoteStore<Report>,
        portfolios: MemoryRemoteStore<Portfolio>,
    ) -> Self {
        Self {
            reports: store::memory_connector(reports),
            portfolios: store::memory_connector(portfolios),
        }
    }
}

/// Everything a front end needs, wired to one identity session
#[derive(Clone)]
pub struct ClientState {
    pub db: SqlitePool,
    pub session: Arc<IdentitySession>,
    pub reports: Arc<SyncedCollection<Report>>,
    pub portfolios: Arc<PortfolioBook>,
    pub desk: Arc<AuditDesk>,
    pub startup_time: DateTime<Utc>,
}

impl ClientState {
    /// Build the collections and register them with a new session
    ///
    /// Nothing is loaded until [`ClientState::start`] resolves the identity.
    pub async fn new(
        db: SqlitePool,
        audit: Arc<dyn AuditService>,
        remote: RemoteStores,
        limits: InputLimits,
    ) -> Self {
        let reports = Arc::new(SyncedCollection::new(
            Arc::new(LocalStore::<Report>::new(db.clone())),
            remote.reports,
        ));
        let portfolio_collection = Arc::new(SyncedCollection::new(
            Arc::new(LocalStore::<Portfolio>::new(db.clone())),
            remote.portfolios,
        ));
        let desk = Arc::new(AuditDesk::new(audit, Arc::clone(&reports), limits));

        let session = Arc::new(IdentitySession::new());
        session.register(reports.clone()).await;
        session.register(portfolio_collection.clone()).await;
        session.register(desk.clone()).await;

        Self {
            db,
            session,
            reports,
            portfolios: Arc::new(PortfolioBook::new(portfolio_collection)),
            desk,
            startup_time: Utc::now(),
        }
    }

    /// Resolve the initial identity and load both collections for it
    pub async fn start(&self, provider: &dyn IdentityProvider) -> Result<Option<Identity>, SyncError> {
        self.session.start(provider).await
    }
}
