//! Triple store reached over its HTTP `/sparql` endpoint

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, WsfError};
use crate::gatekeeper::{SparqlStore, StoreRequest, StoreResponse};

pub struct HttpSparqlStore {
    client: Client,
    endpoint: String,
}

impl HttpSparqlStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.store_timeout())
            .build()
            .map_err(|e| WsfError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.sparql_endpoint.clone(),
        })
    }
}

#[async_trait]
impl SparqlStore for HttpSparqlStore {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("default-graph-uri", request.default_graph.as_str()),
                ("query", request.query.as_str()),
                ("format", request.format.as_str()),
            ])
            .send()
            .await
            .map_err(|e| WsfError::StoreUnavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| WsfError::StoreUnavailable(e.to_string()))?;
        debug!(status, %content_type, bytes = body.len(), "triple store answered");

        Ok(StoreResponse { status, content_type, body })
    }
}
