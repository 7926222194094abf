//! In-process document store
//!
//! Behaves like the HTTP document store: owner-filtered queries,
//! backend-assigned ids (optional), idempotent delete, and no access
//! without a signed-in identity.

use super::{Backend, Entity, EntityStore, StoreError, StoreErrorKind};
use crate::session::Identity;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct MemoryRemoteStore<E: Entity> {
    documents: Arc<RwLock<Vec<E>>>,
    assign_ids: bool,
    owner: Option<String>,
}

impl<E: Entity> Default for MemoryRemoteStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> MemoryRemoteStore<E> {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            assign_ids: false,
            owner: None,
        }
    }

    /// Replace client ids with store-generated ones on insert
    pub fn with_assigned_ids(mut self) -> Self {
        self.assign_ids = true;
        self
    }

    /// View of the same documents authorized as `identity`
    pub fn for_identity(&self, identity: &Identity) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            assign_ids: self.assign_ids,
            owner: Some(identity.uid.clone()),
        }
    }

    /// Every document regardless of owner
    pub async fn documents(&self) -> Vec<E> {
        self.documents.read().await.clone()
    }

    fn authorized_owner(&self) -> Result<&str, StoreError> {
        self.owner.as_deref().ok_or_else(|| {
            StoreError::new(StoreErrorKind::Auth, Some(401), "Document store requires a signed-in user")
        })
    }

    fn check_owner(&self, entity: &E) -> Result<(), StoreError> {
        let owner = self.authorized_owner()?;
        if entity.owner_id() != Some(owner) {
            return Err(StoreError::new(
                StoreErrorKind::Auth,
                Some(403),
                format!("{} {} belongs to another user", E::COLLECTION, entity.id()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryRemoteStore<E> {
    fn backend(&self) -> Backend {
        Backend::Remote
    }

    async fn query(&self, owner_id: Option<&str>) -> Result<Vec<E>, StoreError> {
        let authorized = self.authorized_owner()?;
        let owner = owner_id.unwrap_or(authorized);
        if owner != authorized {
            return Err(StoreError::new(
                StoreErrorKind::Auth,
                Some(403),
                "Cross-owner queries are not allowed",
            ));
        }
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|d| d.owner_id() == Some(owner))
            .cloned()
            .collect())
    }

    async fn insert(&self, entity: &E) -> Result<E, StoreError> {
        self.check_owner(entity)?;
        let mut persisted = entity.clone();
        if self.assign_ids {
            persisted.set_id(format!("doc-{}", ecov_common::uuid_utils::generate_id()));
        }
        let mut documents = self.documents.write().await;
        documents.retain(|d| d.id() != persisted.id());
        documents.push(persisted.clone());
        Ok(persisted)
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let Some(document) = documents.iter_mut().find(|d| d.id() == id) else {
            return Err(StoreError::not_found(format!("{} {} not found", E::COLLECTION, id)));
        };
        self.check_owner(document)?;
        document.apply_patch(patch);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        if let Some(document) = documents.iter().find(|d| d.id() == id) {
            self.check_owner(document)?;
        }
        documents.retain(|d| d.id() != id);
        Ok(())
    }
}
