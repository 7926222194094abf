//! In-memory collection synchronized with a persistence backend
//!
//! Mutations apply to memory first and are then persisted:
//! - create inserts an optimistic `Pending` entry at the front, committed in
//!   place on success and removed again on failure
//! - update keeps the in-memory edit even if persistence fails
//! - delete removes from memory immediately; the failure is reported only
//!
//! The list lock is never held across a store call. Each reload bumps an
//! epoch so responses to operations issued before the reload are dropped.

use crate::error::{SyncError, UserFacingError};
use crate::session::{Identity, Reloadable};
use crate::store::{Backend, Entity, EntityStore, RemoteConnector};
use async_trait::async_trait;
use ecov_common::uuid_utils;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Uninitialized,
    Loading,
    Ready,
}

/// Persistence lifecycle of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Shown optimistically, not yet confirmed
    Pending,
    Committed,
    /// Persistence failed; never kept in the list
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct Tracked<E> {
    pub entity: E,
    pub status: EntryStatus,
}

struct ActiveBackend<E: Entity> {
    store: Arc<dyn EntityStore<E>>,
    owner_id: Option<String>,
}

impl<E: Entity> Clone for ActiveBackend<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            owner_id: self.owner_id.clone(),
        }
    }
}

struct Inner<E: Entity> {
    state: CollectionState,
    epoch: u64,
    backend: Option<ActiveBackend<E>>,
    entries: Vec<Tracked<E>>,
    active: Option<String>,
    error: Option<UserFacingError>,
}

impl<E: Entity> Inner<E> {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|t| t.entity.id() == id)
    }

    fn ready_backend(&self, name: &'static str) -> Result<ActiveBackend<E>, SyncError> {
        match (&self.state, &self.backend) {
            (CollectionState::Ready, Some(backend)) => Ok(backend.clone()),
            _ => Err(SyncError::NotReady(name)),
        }
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        self.error = Some(err.to_user_facing());
        err
    }
}

pub struct SyncedCollection<E: Entity> {
    name: &'static str,
    local: Arc<dyn EntityStore<E>>,
    remote: RemoteConnector<E>,
    inner: RwLock<Inner<E>>,
}

impl<E: Entity> SyncedCollection<E> {
    pub fn new(local: Arc<dyn EntityStore<E>>, remote: RemoteConnector<E>) -> Self {
        Self {
            name: E::COLLECTION,
            local,
            remote,
            inner: RwLock::new(Inner {
                state: CollectionState::Uninitialized,
                epoch: 0,
                backend: None,
                entries: Vec::new(),
                active: None,
                error: None,
            }),
        }
    }

    /// Replace the list with what the identity's backend holds
    ///
    /// The document store is used iff an identity is present; that choice
    /// holds until the next reload.
    pub async fn load(&self, identity: Option<&Identity>) -> Result<usize, SyncError> {
        let (epoch, backend) = {
            let mut inner = self.inner.write().await;
            inner.epoch += 1;
            inner.state = CollectionState::Loading;
            inner.error = None;
            inner.entries.clear();
            inner.backend = None;

            let backend = match identity {
                Some(identity) => ActiveBackend {
                    store: (self.remote)(identity),
                    owner_id: Some(identity.uid.clone()),
                },
                None => ActiveBackend {
                    store: Arc::clone(&self.local),
                    owner_id: None,
                },
            };
            (inner.epoch, backend)
        };

        debug!(
            collection = self.name,
            backend = %backend.store.backend(),
            epoch,
            "Reloading collection"
        );
        let result = backend.store.query(backend.owner_id.as_deref()).await;

        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!(collection = self.name, epoch, "Superseded reload result dropped");
            return Ok(inner.entries.len());
        }

        inner.backend = Some(backend);
        inner.state = CollectionState::Ready;
        match result {
            Ok(mut entities) => {
                entities.sort_by(|a, b| b.created().cmp(&a.created()));
                inner.entries = entities
                    .into_iter()
                    .map(|entity| Tracked {
                        entity,
                        status: EntryStatus::Committed,
                    })
                    .collect();
                if let Some(active) = inner.active.clone() {
                    if inner.position(&active).is_none() {
                        inner.active = None;
                    }
                }
                info!(collection = self.name, count = inner.entries.len(), "Collection loaded");
                Ok(inner.entries.len())
            }
            Err(e) => {
                inner.active = None;
                warn!(collection = self.name, error = %e, "Collection load failed");
                Err(inner.fail(SyncError::Store(e)))
            }
        }
    }

    /// Add a new entity at the front and persist it
    ///
    /// The collection assigns the id and the owner. Returns the persisted
    /// copy (whose id may have been reassigned by the backend).
    pub async fn create(&self, mut entity: E) -> Result<E, SyncError> {
        let (epoch, backend, client_id) = {
            let mut inner = self.inner.write().await;
            inner.error = None;
            let backend = match inner.ready_backend(self.name) {
                Ok(b) => b,
                Err(e) => return Err(inner.fail(e)),
            };

            entity.set_id(uuid_utils::generate_id());
            entity.set_owner_id(backend.owner_id.clone());
            if let Err(e) = entity.validate() {
                return Err(inner.fail(e.into()));
            }

            let client_id = entity.id().to_string();
            inner.entries.insert(
                0,
                Tracked {
                    entity: entity.clone(),
                    status: EntryStatus::Pending,
                },
            );
            (inner.epoch, backend, client_id)
        };

        let result = backend.store.insert(&entity).await;

        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!(collection = self.name, id = %client_id, "Create confirmed after reload; dropped");
            return result.map_err(SyncError::Store);
        }

        match result {
            Ok(persisted) => {
                let Some(index) = inner.position(&client_id) else {
                    // Deleted while pending: remove the copy the backend now holds
                    drop(inner);
                    info!(collection = self.name, id = %persisted.id(), "Entry deleted while saving; removing");
                    if let Err(e) = backend.store.delete(persisted.id()).await {
                        let mut inner = self.inner.write().await;
                        return Err(inner.fail(SyncError::Store(e)));
                    }
                    return Ok(persisted);
                };

                if persisted.id() != client_id {
                    debug!(collection = self.name, client_id = %client_id, id = %persisted.id(), "Remapping id");
                    if inner.active.as_deref() == Some(client_id.as_str()) {
                        inner.active = Some(persisted.id().to_string());
                    }
                }
                inner.entries[index] = Tracked {
                    entity: persisted.clone(),
                    status: EntryStatus::Committed,
                };
                info!(collection = self.name, id = %persisted.id(), backend = %backend.store.backend(), "Created");
                Ok(persisted)
            }
            Err(e) => {
                if let Some(index) = inner.position(&client_id) {
                    inner.entries.remove(index);
                }
                if inner.active.as_deref() == Some(client_id.as_str()) {
                    inner.active = None;
                }
                warn!(
                    collection = self.name,
                    id = %client_id,
                    status = ?EntryStatus::RolledBack,
                    error = %e,
                    "Create failed; entry rolled back"
                );
                Err(inner.fail(SyncError::RolledBack {
                    id: client_id,
                    source: e,
                }))
            }
        }
    }

    /// Apply a patch in memory, then persist it
    pub async fn update(&self, id: &str, patch: E::Patch) -> Result<E, SyncError> {
        self.update_with(id, move |_| Ok(patch)).await
    }

    /// Derive a patch from the current entity and apply it
    ///
    /// `build` runs under the list lock, so patches computed from the
    /// current state apply in issuance order.
    pub async fn update_with<F>(&self, id: &str, build: F) -> Result<E, SyncError>
    where
        F: FnOnce(&E) -> Result<E::Patch, SyncError> + Send,
    {
        let (epoch, backend, patch, updated) = {
            let mut inner = self.inner.write().await;
            inner.error = None;
            let backend = match inner.ready_backend(self.name) {
                Ok(b) => b,
                Err(e) => return Err(inner.fail(e)),
            };
            let Some(index) = inner.position(id) else {
                return Err(inner.fail(SyncError::NotFound(format!("{} {}", self.name, id))));
            };
            if inner.entries[index].status == EntryStatus::Pending {
                return Err(inner.fail(SyncError::Pending(id.to_string())));
            }

            let patch = match build(&inner.entries[index].entity) {
                Ok(p) => p,
                Err(e) => return Err(inner.fail(e)),
            };
            let mut updated = inner.entries[index].entity.clone();
            updated.apply_patch(&patch);
            if let Err(e) = updated.validate() {
                return Err(inner.fail(e.into()));
            }
            inner.entries[index].entity = updated.clone();
            (inner.epoch, backend, patch, updated)
        };

        let result = backend.store.update(id, &patch).await;

        if let Err(e) = result {
            let mut inner = self.inner.write().await;
            warn!(collection = self.name, id = %id, error = %e, "Update not persisted; keeping local edit");
            if inner.epoch != epoch {
                return Err(SyncError::Store(e));
            }
            return Err(inner.fail(SyncError::Store(e)));
        }
        debug!(collection = self.name, id = %id, "Updated");
        Ok(updated)
    }

    /// Remove an entity; removing an absent id is a no-op
    ///
    /// When the active entity is removed the new first entity becomes
    /// active (none if the list is now empty).
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let (epoch, backend, was_pending) = {
            let mut inner = self.inner.write().await;
            inner.error = None;
            let backend = match inner.ready_backend(self.name) {
                Ok(b) => b,
                Err(e) => return Err(inner.fail(e)),
            };
            let Some(index) = inner.position(id) else {
                debug!(collection = self.name, id = %id, "Delete of absent entry ignored");
                return Ok(());
            };
            let removed = inner.entries.remove(index);
            if inner.active.as_deref() == Some(id) {
                inner.active = inner.entries.first().map(|t| t.entity.id().to_string());
            }
            (inner.epoch, backend, removed.status == EntryStatus::Pending)
        };

        if was_pending {
            // The pending create removes the backend copy once it lands
            return Ok(());
        }

        if let Err(e) = backend.store.delete(id).await {
            warn!(collection = self.name, id = %id, error = %e, "Delete not persisted");
            let mut inner = self.inner.write().await;
            if inner.epoch != epoch {
                return Err(SyncError::Store(e));
            }
            return Err(inner.fail(SyncError::Store(e)));
        }
        info!(collection = self.name, id = %id, "Deleted");
        Ok(())
    }

    pub async fn select(&self, id: &str) -> Result<E, SyncError> {
        let mut inner = self.inner.write().await;
        let Some(index) = inner.position(id) else {
            return Err(SyncError::NotFound(format!("{} {}", self.name, id)));
        };
        inner.active = Some(id.to_string());
        Ok(inner.entries[index].entity.clone())
    }

    pub async fn clear_selection(&self) {
        self.inner.write().await.active = None;
    }

    pub async fn active(&self) -> Option<E> {
        let inner = self.inner.read().await;
        let id = inner.active.as_deref()?;
        inner.position(id).map(|i| inner.entries[i].entity.clone())
    }

    pub async fn active_id(&self) -> Option<String> {
        self.inner.read().await.active.clone()
    }

    pub async fn get(&self, id: &str) -> Option<E> {
        let inner = self.inner.read().await;
        inner.position(id).map(|i| inner.entries[i].entity.clone())
    }

    pub async fn status_of(&self, id: &str) -> Option<EntryStatus> {
        let inner = self.inner.read().await;
        inner.position(id).map(|i| inner.entries[i].status)
    }

    /// Entities in display order
    pub async fn entities(&self) -> Vec<E> {
        let inner = self.inner.read().await;
        inner.entries.iter().map(|t| t.entity.clone()).collect()
    }

    pub async fn entries(&self) -> Vec<Tracked<E>> {
        self.inner.read().await.entries.clone()
    }

    /// The `limit` most recently modified entities
    pub async fn recent(&self, limit: usize) -> Vec<E> {
        let mut entities = self.entities().await;
        entities.sort_by(|a, b| b.last_modified().cmp(&a.last_modified()));
        entities.truncate(limit);
        entities
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn state(&self) -> CollectionState {
        self.inner.read().await.state
    }

    pub async fn backend(&self) -> Option<Backend> {
        let inner = self.inner.read().await;
        inner.backend.as_ref().map(|b| b.store.backend())
    }

    /// Error from the most recent operation, if it failed
    pub async fn error(&self) -> Option<UserFacingError> {
        self.inner.read().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.inner.write().await.error = None;
    }
}

#[async_trait]
impl<E: Entity> Reloadable for SyncedCollection<E> {
    fn name(&self) -> &str {
        self.name
    }

    async fn reload(&self, identity: Option<&Identity>) -> Result<(), SyncError> {
        self.load(identity).await.map(|_| ())
    }

    async fn clear_transient(&self) {
        let mut inner = self.inner.write().await;
        inner.active = None;
        inner.error = None;
    }
}
