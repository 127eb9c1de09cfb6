//! Access decision engine
//!
//! A request is authorized when *any* stored grant for the identity, or for
//! the public wildcard, allows the operation on the dataset through the
//! calling web service. There is no precedence between grants.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::constants::WILDCARD_IDENTITY;
use crate::error::{Result, WsfError};
use crate::grant::{AccessGrant, Operation};
use crate::identity::RequestIdentity;
use crate::store::GrantStore;

/// Evaluates access grants read fresh from a [`GrantStore`] on every call
pub struct AccessEngine<S: GrantStore + ?Sized = dyn GrantStore> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: GrantStore + ?Sized> Clone for AccessEngine<S> {
    fn clone(&self) -> Self {
        AccessEngine { store: Arc::clone(&self.store), timeout: self.timeout }
    }
}

impl<S: GrantStore + ?Sized> AccessEngine<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self::with_timeout(store, config.store_timeout())
    }

    pub fn with_timeout(store: Arc<S>, timeout: Duration) -> Self {
        AccessEngine { store, timeout }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Bound a store read by the configured timeout; every store failure is infrastructure
    pub(crate) async fn bounded<T>(&self, read: impl Future<Output = Result<T>>) -> Result<T> {
        let r = match tokio::time::timeout(self.timeout, read).await {
            Ok(r) => r.map_err(|e| match e {
                WsfError::StoreUnavailable(_) => e,
                other => WsfError::StoreUnavailable(other.to_string()),
            }),
            Err(elapsed) => Err(elapsed.into()),
        };
        if let Err(e) = &r {
            error!(error = %e, "grant store read failed");
        }
        r
    }

    /// Grants on `dataset` held by `identity` or by the public wildcard
    async fn candidate_grants(&self, identity: &str, dataset: &str) -> Result<Vec<AccessGrant>> {
        if identity == WILDCARD_IDENTITY {
            return self.bounded(self.store.fetch_grants(dataset, WILDCARD_IDENTITY)).await;
        }
        let (mut own, public) = try_join(
            self.bounded(self.store.fetch_grants(dataset, identity)),
            self.bounded(self.store.fetch_grants(dataset, WILDCARD_IDENTITY)),
        )
        .await?;
        own.extend(public);
        Ok(own)
    }

    /// Whether `identity` may perform `op` on `graph` through `web_service`
    pub async fn is_allowed(
        &self,
        identity: &str,
        graph: &str,
        op: Operation,
        web_service: &str,
    ) -> Result<bool> {
        let grants = self.candidate_grants(identity, graph).await?;
        let allowed = grants.iter().any(|g| g.authorizes(op, web_service));
        debug!(identity, graph, %op, web_service, grants = grants.len(), allowed, "access decision");
        Ok(allowed)
    }

    /// Like [`AccessEngine::is_allowed`] but a refusal is an error carrying the audit detail
    pub async fn check(
        &self,
        identity: &str,
        graph: &str,
        op: Operation,
        web_service: &str,
    ) -> Result<()> {
        if self.is_allowed(identity, graph, op, web_service).await? {
            Ok(())
        } else {
            warn!(identity, graph, %op, web_service, "access denied");
            Err(WsfError::Denied {
                identity: identity.to_string(),
                graph: graph.to_string(),
                operation: op,
            })
        }
    }

    /// Both the acting identity and, when it differs, the requester must pass.
    ///
    /// This is the check every record-targeting endpoint runs before its side effects.
    pub async fn check_both(
        &self,
        who: &RequestIdentity,
        graph: &str,
        op: Operation,
        web_service: &str,
    ) -> Result<()> {
        if !who.is_delegated() {
            return self.check(who.registered(), graph, op, web_service).await;
        }
        try_join(
            self.check(who.requester(), graph, op, web_service),
            self.check(who.registered(), graph, op, web_service),
        )
        .await
        .map(|_| ())
    }

    /// A dataset is visible when a direct or wildcard grant sets any CRUD flag on it
    pub async fn is_visible(&self, identity: &str, dataset: &str) -> Result<bool> {
        let grants = self.candidate_grants(identity, dataset).await?;
        Ok(grants.iter().any(|g| g.crud.any()))
    }

    /// Every dataset visible to `identity`
    pub async fn visible_datasets(&self, identity: &str) -> Result<BTreeSet<String>> {
        let own = self.bounded(self.store.grants_for_identity(identity));
        let public = self.bounded(self.store.grants_for_identity(WILDCARD_IDENTITY));
        let (own, public) = try_join(own, public).await?;
        Ok(own
            .into_iter()
            .chain(public)
            .filter(|g| g.crud.any())
            .map(|g| g.dataset)
            .collect())
    }
}
