//! Network configuration, built once at start and passed to each component

use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::constants::DEFAULT_MAX_LIMIT;
use crate::error::{Result, WsfError};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Base URL web-service URIs are derived from
    #[serde(default = "default_base_url")]
    pub wsf_base_url: String,
    /// Graph holding the network's own description and access records
    #[serde(default = "default_wsf_graph")]
    pub wsf_graph: String,
    /// SPARQL endpoint of the triple store queries are forwarded to
    #[serde(default = "default_sparql_endpoint")]
    pub sparql_endpoint: String,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8890
}
fn default_db_path() -> String {
    "./data/wsfgate.mdb".into()
}
fn default_base_url() -> String {
    "http://localhost".into()
}
fn default_wsf_graph() -> String {
    "http://localhost/wsf/".into()
}
fn default_sparql_endpoint() -> String {
    "http://localhost:8890/sparql".into()
}
fn default_store_timeout_ms() -> u64 {
    5000
}
fn default_max_limit() -> u32 {
    DEFAULT_MAX_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            wsf_base_url: default_base_url(),
            wsf_graph: default_wsf_graph(),
            sparql_endpoint: default_sparql_endpoint(),
            store_timeout_ms: default_store_timeout_ms(),
            max_limit: default_max_limit(),
        }
    }
}

impl Config {
    /// Merge `wsfgate.toml` with `WSFGATE_*` environment variables
    pub fn load() -> Result<Self> {
        Figment::new()
            .merge(Toml::file("wsfgate.toml"))
            .merge(Env::prefixed("WSFGATE_"))
            .extract()
            .map_err(|e| WsfError::Configuration(e.to_string()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    fn ws_uri(&self, path: &str) -> String {
        format!("{}/wsf/ws/{}", self.wsf_base_url.trim_end_matches('/'), path)
    }

    pub fn sparql_ws_uri(&self) -> String {
        self.ws_uri("sparql/")
    }

    pub fn auth_lister_ws_uri(&self) -> String {
        self.ws_uri("auth/lister/")
    }

    pub fn auth_registrar_ws_uri(&self) -> String {
        self.ws_uri("auth/registrar/access/")
    }

    pub fn auth_validator_ws_uri(&self) -> String {
        self.ws_uri("auth/validator/")
    }
}
