//! Anonymous-mode store backed by the profile database
//!
//! The whole collection lives under one key as a JSON array. Every write is
//! a read-modify-write of that array, serialized through a mutex so that
//! overlapping operations cannot drop each other's changes.

use super::{Backend, Entity, EntityStore, StoreError};
use async_trait::async_trait;
use ecov_common::db::{get_item, set_item};
use sqlx::SqlitePool;
use std::marker::PhantomData;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct LocalStore<E: Entity> {
    db: SqlitePool,
    write_lock: Mutex<()>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> LocalStore<E> {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            _entity: PhantomData,
        }
    }

    /// Stored collection; a missing or unreadable value reads as empty
    async fn load(&self) -> Result<Vec<E>, StoreError> {
        let Some(raw) = get_item(&self.db, E::LOCAL_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<E>>(&raw) {
            Ok(entities) => Ok(entities),
            Err(e) => {
                warn!(
                    key = E::LOCAL_KEY,
                    error = %e,
                    "Discarding malformed local collection; it will be overwritten on next write"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, entities: &[E]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entities)
            .map_err(|e| StoreError::storage(format!("Failed to encode {}: {}", E::LOCAL_KEY, e)))?;
        set_item(&self.db, E::LOCAL_KEY, &raw).await?;
        debug!(key = E::LOCAL_KEY, count = entities.len(), "Local collection written");
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for LocalStore<E> {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn query(&self, _owner_id: Option<&str>) -> Result<Vec<E>, StoreError> {
        self.load().await
    }

    async fn insert(&self, entity: &E) -> Result<E, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entities = self.load().await?;
        entities.retain(|e| e.id() != entity.id());
        entities.insert(0, entity.clone());
        self.save(&entities).await?;
        Ok(entity.clone())
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entities = self.load().await?;
        let Some(entity) = entities.iter_mut().find(|e| e.id() == id) else {
            return Err(StoreError::not_found(format!(
                "{} {} is not in local storage",
                E::COLLECTION,
                id
            )));
        };
        entity.apply_patch(patch);
        self.save(&entities).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entities = self.load().await?;
        let before = entities.len();
        entities.retain(|e| e.id() != id);
        if entities.len() == before {
            return Ok(());
        }
        self.save(&entities).await
    }
}
