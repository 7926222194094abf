//! Signed-in store: REST document store
//!
//! - `GET    {base}/{collection}?uid={owner}` → array of documents
//! - `POST   {base}/{collection}` → `{"id": "..."}`
//! - `PATCH  {base}/{collection}/{id}` with the changed fields
//! - `DELETE {base}/{collection}/{id}` (404 counts as deleted)

use super::{Backend, Entity, EntityStore, StoreError, StoreErrorKind};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    id: Option<String>,
}

pub struct HttpRemoteStore<E: Entity> {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    _entity: PhantomData<fn() -> E>,
}

/// Shared HTTP client for document-store requests
pub fn build_http_client() -> Result<reqwest::Client, StoreError> {
    reqwest::Client::builder()
        .user_agent(concat!("EcoVerifier/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| StoreError::new(StoreErrorKind::Network, None, e.to_string()))
}

impl<E: Entity> HttpRemoteStore<E> {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            _entity: PhantomData,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, E::COLLECTION)
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    fn request(&self, method: Method, url: String) -> Result<RequestBuilder, StoreError> {
        let mut req = self.http.request(method, url);
        if let Some(token) = self.token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| StoreError::new(StoreErrorKind::Auth, None, e.to_string()))?;
            req = req.header(AUTHORIZATION, value);
        }
        Ok(req)
    }

    async fn map_error(resp: Response) -> StoreError {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        StoreError::from_status(
            status.as_u16(),
            if text.is_empty() {
                status.to_string()
            } else {
                text
            },
        )
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for HttpRemoteStore<E> {
    fn backend(&self) -> Backend {
        Backend::Remote
    }

    async fn query(&self, owner_id: Option<&str>) -> Result<Vec<E>, StoreError> {
        let owner = owner_id.ok_or_else(|| {
            StoreError::new(StoreErrorKind::Auth, None, "Document store requires a signed-in user")
        })?;

        debug!(collection = E::COLLECTION, owner = %owner, "Querying document store");
        let resp = self
            .request(Method::GET, self.collection_url())?
            .query(&[("uid", owner)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp).await);
        }
        resp.json::<Vec<E>>().await.map_err(|e| {
            StoreError::new(StoreErrorKind::ServerError, None, format!("Malformed document list: {e}"))
        })
    }

    async fn insert(&self, entity: &E) -> Result<E, StoreError> {
        let resp = self
            .request(Method::POST, self.collection_url())?
            .json(entity)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp).await);
        }

        let confirmed: InsertResponse = resp.json().await.map_err(|e| {
            StoreError::new(StoreErrorKind::ServerError, None, format!("Malformed insert response: {e}"))
        })?;

        let mut persisted = entity.clone();
        if let Some(id) = confirmed.id.filter(|id| !id.is_empty()) {
            if id != entity.id() {
                debug!(client_id = %entity.id(), backend_id = %id, "Document store assigned a new id");
            }
            persisted.set_id(id);
        }
        Ok(persisted)
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<(), StoreError> {
        let resp = self
            .request(Method::PATCH, self.document_url(id))?
            .json(patch)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::map_error(resp).await);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let resp = self
            .request(Method::DELETE, self.document_url(id))?
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        Err(Self::map_error(resp).await)
    }
}
