//! Signed-in identity and the collections that follow it
//!
//! The current identity is an observable value. Every change reloads each
//! registered subscriber in registration order, so collections always show
//! the data of the identity that is signed in now. Any change of user after
//! the initial resolution (sign-in, sign-out, or a switch to another user)
//! also clears transient selection, error and retry state.

use crate::error::SyncError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

pub const ENV_UID: &str = "ECOV_UID";
pub const ENV_TOKEN: &str = "ECOV_TOKEN";

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    /// Bearer token for the document store
    pub token: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Resolves who is signed in at startup
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>, SyncError>;
}

/// Identity fixed at construction (command line or environment)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identity: Option<Identity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    /// Explicit values win over `ECOV_UID` / `ECOV_TOKEN`; a blank uid means
    /// anonymous
    pub fn from_args_or_env(uid: Option<String>, token: Option<String>) -> Self {
        let uid = uid
            .or_else(|| std::env::var(ENV_UID).ok())
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let token = token
            .or_else(|| std::env::var(ENV_TOKEN).ok())
            .filter(|t| !t.trim().is_empty());

        Self {
            identity: uid.map(|uid| Identity {
                uid,
                display_name: None,
                token,
            }),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, SyncError> {
        Ok(self.identity.clone())
    }
}

/// Something that follows the signed-in identity
#[async_trait]
pub trait Reloadable: Send + Sync {
    fn name(&self) -> &str;

    /// Reload for `identity` (anonymous when `None`)
    async fn reload(&self, identity: Option<&Identity>) -> Result<(), SyncError>;

    /// Drop selections and error banners
    async fn clear_transient(&self);
}

pub struct IdentitySession {
    current: watch::Sender<Option<Identity>>,
    subscribers: RwLock<Vec<Arc<dyn Reloadable>>>,
    /// Serializes identity changes so reload rounds never interleave
    change_lock: Mutex<bool>,
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySession {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            subscribers: RwLock::new(Vec::new()),
            change_lock: Mutex::new(false),
        }
    }

    pub async fn register(&self, subscriber: Arc<dyn Reloadable>) {
        self.subscribers.write().await.push(subscriber);
    }

    /// Observe identity changes
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    pub async fn is_resolved(&self) -> bool {
        *self.change_lock.lock().await
    }

    /// Resolve the initial identity, then run the first reload
    pub async fn start(&self, provider: &dyn IdentityProvider) -> Result<Option<Identity>, SyncError> {
        let identity = provider.current_identity().await?;
        self.change(identity.clone(), true).await?;
        Ok(identity)
    }

    pub async fn sign_in(&self, identity: Identity) -> Result<(), SyncError> {
        self.change(Some(identity), false).await
    }

    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.change(None, false).await
    }

    async fn change(&self, identity: Option<Identity>, initial: bool) -> Result<(), SyncError> {
        let mut resolved = self.change_lock.lock().await;

        let previous = self.current();
        let same_user = previous.as_ref().map(|i| &i.uid) == identity.as_ref().map(|i| &i.uid);
        if *resolved && !initial && same_user {
            // Token refresh for the same user: no reload
            self.current.send_replace(identity);
            return Ok(());
        }

        let subscribers = self.subscribers.read().await.clone();

        if *resolved && !same_user {
            info!("User changed; clearing selections");
            for subscriber in &subscribers {
                subscriber.clear_transient().await;
            }
        }

        self.current.send_replace(identity.clone());
        *resolved = true;

        match &identity {
            Some(i) => info!(uid = %i.uid, "Identity changed; reloading collections"),
            None => info!("Anonymous session; reloading collections"),
        }

        let mut first_error = None;
        for subscriber in &subscribers {
            if let Err(e) = subscriber.reload(identity.as_ref()).await {
                warn!(subscriber = subscriber.name(), error = %e, "Reload failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
