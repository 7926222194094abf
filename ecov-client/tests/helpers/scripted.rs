//! Controllable stand-ins for the store and the audit API

use async_trait::async_trait;
use ecov_client::services::{AuditError, AuditService};
use ecov_client::session::Identity;
use ecov_client::store::{
    Backend, Entity, EntityStore, RemoteConnector, StoreError, StoreErrorKind,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Store wrapper that can fail or hold individual operations
pub struct FlakyStore<E: Entity> {
    inner: Arc<dyn EntityStore<E>>,
    pub fail_query: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    /// While set, inserts wait for `release_insert`
    pub hold_insert: AtomicBool,
    release: Notify,
    pub store_calls: AtomicUsize,
}

impl<E: Entity> FlakyStore<E> {
    pub fn new(inner: Arc<dyn EntityStore<E>>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_query: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            hold_insert: AtomicBool::new(false),
            release: Notify::new(),
            store_calls: AtomicUsize::new(0),
        })
    }

    pub fn release_insert(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Connector handing out this store for every identity
    pub fn connector(self: &Arc<Self>) -> RemoteConnector<E> {
        let store = Arc::clone(self);
        Arc::new(move |_: &Identity| Arc::clone(&store) as Arc<dyn EntityStore<E>>)
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::new(
                StoreErrorKind::Network,
                None,
                format!("{what} failed: connection reset"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for FlakyStore<E> {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    async fn query(&self, owner_id: Option<&str>) -> Result<Vec<E>, StoreError> {
        self.check(&self.fail_query, "query")?;
        self.inner.query(owner_id).await
    }

    async fn insert(&self, entity: &E) -> Result<E, StoreError> {
        if self.hold_insert.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.check(&self.fail_insert, "insert")?;
        self.inner.insert(entity).await
    }

    async fn update(&self, id: &str, patch: &E::Patch) -> Result<(), StoreError> {
        self.check(&self.fail_update, "update")?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check(&self.fail_delete, "delete")?;
        self.inner.delete(id).await
    }
}

struct Script {
    gate: Option<Arc<Notify>>,
    results: VecDeque<Result<Value, AuditError>>,
}

/// Audit service answering from per-input scripts
#[derive(Default)]
pub struct ScriptedAudit {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAudit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue results for `input`; the last one repeats
    pub fn on(&self, input: &str, results: Vec<Result<Value, AuditError>>) {
        self.scripts.lock().unwrap().insert(
            input.to_string(),
            Script {
                gate: None,
                results: results.into(),
            },
        );
    }

    /// Like `on`, but every response waits for the returned gate
    pub fn on_gated(&self, input: &str, result: Result<Value, AuditError>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.scripts.lock().unwrap().insert(
            input.to_string(),
            Script {
                gate: Some(Arc::clone(&gate)),
                results: VecDeque::from([result]),
            },
        );
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, input: &str) -> Result<Value, AuditError> {
        let (gate, result) = {
            self.calls.lock().unwrap().push(input.to_string());
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(input) {
                Some(script) => {
                    let result = if script.results.len() > 1 {
                        script.results.pop_front()
                    } else {
                        script.results.front().cloned()
                    };
                    (
                        script.gate.clone(),
                        result.unwrap_or_else(|| Err(AuditError::Network("no script".to_string()))),
                    )
                }
                None => (None, Err(AuditError::Network("no script".to_string()))),
            }
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

#[async_trait]
impl AuditService for ScriptedAudit {
    async fn generate_audit(&self, company: &str) -> Result<Value, AuditError> {
        self.respond(company).await
    }

    async fn check_claim(&self, claim: &str) -> Result<Value, AuditError> {
        self.respond(claim).await
    }

    async fn health(&self) -> Result<u16, AuditError> {
        Ok(200)
    }
}
