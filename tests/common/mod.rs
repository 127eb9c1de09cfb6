//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wsfgate::{
    AccessEngine, AccessGrant, Config, Crud, GrantStore, LmdbGrantStore, Result, SparqlStore,
    StoreRequest, StoreResponse, WsfError,
};

pub const DATASET: &str = "http://ex.org/datasets/d1/";
pub const OTHER: &str = "http://ex.org/datasets/d2/";
pub const WSF_GRAPH: &str = "http://localhost/wsf/";
pub const SPARQL_WS: &str = "http://localhost/wsf/ws/sparql/";
pub const CREATE_WS: &str = "http://localhost/wsf/ws/crud/create/";

/// A fresh grant store; keep the directory alive for the test's duration
pub fn store() -> (TempDir, Arc<LmdbGrantStore>) {
    let dir = TempDir::new().unwrap();
    let store = LmdbGrantStore::open(dir.path()).unwrap();
    (dir, Arc::new(store))
}

pub fn engine(store: &Arc<LmdbGrantStore>) -> AccessEngine<LmdbGrantStore> {
    AccessEngine::new(Arc::clone(store), &Config::default())
}

pub fn grant(store: &LmdbGrantStore, identity: &str, dataset: &str, crud: Crud) -> AccessGrant {
    grant_for(store, identity, dataset, crud, &[])
}

pub fn grant_for(
    store: &LmdbGrantStore,
    identity: &str,
    dataset: &str,
    crud: Crud,
    services: &[&str],
) -> AccessGrant {
    let id = wsfgate::derive_grant_id(WSF_GRAPH, identity, dataset);
    let g = AccessGrant::new(&id, identity, dataset, crud).restricted_to(services.iter().copied());
    store.put_grant(&g).unwrap();
    g
}

pub fn read_only() -> Crud {
    Crud::new(false, true, false, false)
}

/// Grant store that is down
pub struct FailingStore;

#[async_trait]
impl GrantStore for FailingStore {
    async fn query_grants(&self, _: &str, _: &str) -> Result<Vec<AccessGrant>> {
        Err(WsfError::Storage("connection refused".into()))
    }
    async fn query_web_service_access(&self, _: &str) -> Result<BTreeSet<String>> {
        Err(WsfError::Storage("connection refused".into()))
    }
    async fn grants_for_identity(&self, _: &str) -> Result<Vec<AccessGrant>> {
        Err(WsfError::Storage("connection refused".into()))
    }
    async fn grants_on_dataset(&self, _: &str) -> Result<Vec<AccessGrant>> {
        Err(WsfError::Storage("connection refused".into()))
    }
    async fn web_services(&self) -> Result<BTreeSet<String>> {
        Err(WsfError::Storage("connection refused".into()))
    }
}

/// Grant store that never answers in time; would allow everything if it did
pub struct SlowStore(pub Duration);

#[async_trait]
impl GrantStore for SlowStore {
    async fn query_grants(&self, dataset: &str, identity: &str) -> Result<Vec<AccessGrant>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![AccessGrant::new("slow", identity, dataset, Crud::ALL)])
    }
    async fn query_web_service_access(&self, _: &str) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }
    async fn grants_for_identity(&self, _: &str) -> Result<Vec<AccessGrant>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![])
    }
    async fn grants_on_dataset(&self, _: &str) -> Result<Vec<AccessGrant>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![])
    }
    async fn web_services(&self) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }
}

/// Triple store double that records what it is asked
pub struct RecordingStore {
    pub calls: AtomicUsize,
    pub last: Mutex<Option<StoreRequest>>,
    pub status: u16,
    pub body: String,
}

impl RecordingStore {
    pub fn answering(status: u16, body: &str) -> Arc<Self> {
        Arc::new(RecordingStore {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            status,
            body: body.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<StoreRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl SparqlStore for RecordingStore {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        Ok(StoreResponse {
            status: self.status,
            content_type: "application/sparql-results+xml".into(),
            body: self.body.clone(),
        })
    }
}
