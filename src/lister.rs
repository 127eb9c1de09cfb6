//! Listing flows: datasets, web services and access records
//!
//! `dataset` and `access_user` only ever show the caller its own view and
//! need no further check. `ws` and `access_dataset` expose network-wide
//! records, so the requester must hold Read on the network graph.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::access::AccessEngine;
use crate::config::Config;
use crate::constants::WILDCARD_IDENTITY;
use crate::error::{Result, WsfError};
use crate::grant::{AccessGrant, Operation};
use crate::identity::RequestIdentity;
use crate::store::GrantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Datasets visible to the registered identity
    Dataset,
    /// Access records of the registered identity, public ones included
    AccessUser,
    /// Web services registered to the network
    #[serde(rename = "ws")]
    WebServices,
    /// Every access record on one dataset
    AccessDataset,
}

impl ListingMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.to_ascii_lowercase().as_str() {
            "" | "dataset" => Ok(ListingMode::Dataset),
            "access_user" => Ok(ListingMode::AccessUser),
            "ws" => Ok(ListingMode::WebServices),
            "access_dataset" => Ok(ListingMode::AccessDataset),
            _ => Err(WsfError::UnknownListingMode(mode.to_string())),
        }
    }

    /// Whether the mode lists records beyond the caller's own
    pub fn needs_admin(self) -> bool {
        matches!(self, ListingMode::WebServices | ListingMode::AccessDataset)
    }
}

impl FromStr for ListingMode {
    type Err = WsfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum Listing {
    Datasets(BTreeSet<String>),
    WebServices(BTreeSet<String>),
    Accesses(Vec<AccessGrant>),
}

pub struct AuthLister<G: GrantStore + ?Sized = dyn GrantStore> {
    engine: AccessEngine<G>,
    wsf_graph: String,
    ws_uri: String,
}

impl<G: GrantStore + ?Sized> AuthLister<G> {
    pub fn new(engine: AccessEngine<G>, config: &Config) -> Self {
        AuthLister {
            engine,
            wsf_graph: config.wsf_graph.clone(),
            ws_uri: config.auth_lister_ws_uri(),
        }
    }

    pub async fn list(&self, mode: ListingMode, dataset: &str, who: &RequestIdentity) -> Result<Listing> {
        if mode == ListingMode::AccessDataset && dataset.is_empty() {
            return Err(WsfError::NoTargetDataset);
        }
        if mode.needs_admin() {
            self.engine
                .check(who.requester(), &self.wsf_graph, Operation::Read, &self.ws_uri)
                .await?;
        }
        debug!(?mode, identity = who.registered(), "listing");

        let store = self.engine.store();
        let listing = match mode {
            ListingMode::Dataset => Listing::Datasets(self.engine.visible_datasets(who.registered()).await?),
            ListingMode::WebServices => Listing::WebServices(self.engine.bounded(store.web_services()).await?),
            ListingMode::AccessDataset => {
                Listing::Accesses(self.engine.bounded(store.grants_on_dataset(dataset)).await?)
            }
            ListingMode::AccessUser => {
                let mut grants = self.engine.bounded(store.grants_for_identity(who.registered())).await?;
                if who.registered() != WILDCARD_IDENTITY {
                    let public = self.engine.bounded(store.grants_for_identity(WILDCARD_IDENTITY)).await?;
                    grants.extend(public.into_iter().filter(|g| g.crud.any()));
                }
                Listing::Accesses(grants)
            }
        };
        Ok(listing)
    }
}
