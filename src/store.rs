//! Read-only view over persisted access grants

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::grant::AccessGrant;

/// Source of access-control records.
///
/// Implementations return grants exactly as stored; identity matching beyond
/// string equality (wildcard handling, delegation) is the engine's job.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Grant rows for `dataset` registered to exactly `identity`.
    /// `web_service_access` may be left empty by implementations that keep it
    /// in a separate relation; see [`GrantStore::fetch_grants`].
    async fn query_grants(&self, dataset: &str, identity: &str) -> Result<Vec<AccessGrant>>;

    /// Web-service endpoints a grant is restricted to
    async fn query_web_service_access(&self, grant_id: &str) -> Result<BTreeSet<String>>;

    /// Grants for `dataset` and `identity` with their endpoint restrictions filled in.
    ///
    /// The default costs one extra read per grant; stores that can join the
    /// two relations should override it.
    async fn fetch_grants(&self, dataset: &str, identity: &str) -> Result<Vec<AccessGrant>> {
        let mut grants = self.query_grants(dataset, identity).await?;
        for g in grants.iter_mut() {
            g.web_service_access = self.query_web_service_access(&g.id).await?;
        }
        Ok(grants)
    }

    /// Every grant registered to `identity`, across datasets, with endpoint restrictions
    async fn grants_for_identity(&self, identity: &str) -> Result<Vec<AccessGrant>>;

    /// Every grant on `dataset`, across identities, with endpoint restrictions
    async fn grants_on_dataset(&self, dataset: &str) -> Result<Vec<AccessGrant>>;

    /// Web-service endpoints registered to the network
    async fn web_services(&self) -> Result<BTreeSet<String>>;
}
