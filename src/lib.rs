//! wsfgate - Access decisions and SPARQL gating for a web-service network
//!
//! A requester may perform an operation on a dataset when any stored grant
//! for its identity, or for the public wildcard `0.0.0.0`, allows it through
//! the calling web service. SPARQL queries are scanned for every graph they
//! read and each one is checked for both the acting and the requesting
//! identity before the query reaches the triple store.

pub mod access;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gatekeeper;
pub mod grant;
pub mod identity;
pub mod keys;
pub mod lister;
pub mod sparql;
pub mod store;

#[cfg(feature = "server")]
pub mod http_store;
#[cfg(feature = "server")]
pub mod server;

pub use access::AccessEngine;
pub use config::Config;
pub use constants::*;
pub use db::LmdbGrantStore;
pub use error::{ErrorKind, ErrorLevel, ErrorReport, Result, WsfError};
pub use gatekeeper::{
    Admitted, GateState, Gatekeeper, ResultFormat, SparqlRequest, SparqlStore, StoreRequest,
    StoreResponse,
};
pub use grant::{derive_grant_id, AccessGrant, Crud, Operation};
pub use identity::{access_target, resolve, split_delegated, RequestIdentity};
pub use lister::{AuthLister, Listing, ListingMode};
pub use sparql::{GraphExtractor, PatternExtractor, QueryShape};
pub use store::GrantStore;

#[cfg(feature = "server")]
pub use http_store::HttpSparqlStore;
#[cfg(feature = "server")]
pub use server::{router, AppState};
