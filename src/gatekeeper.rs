//! SPARQL query gatekeeper
//!
//! Every query moves through
//! `Received → PrologParsed → Classified → GraphsExtracted → AccessChecked`
//! and ends either `Forwarded` to the triple store or `Rejected` with the
//! first failing guard's error. Nothing reaches the store before every
//! referenced graph passed the access check for both request identities.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::access::AccessEngine;
use crate::config::Config;
use crate::error::{ErrorKind, ErrorReport, Result, WsfError};
use crate::grant::Operation;
use crate::identity::{access_target, RequestIdentity};
use crate::sparql::{GraphExtractor, PatternExtractor, QueryShape};
use crate::store::GrantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateState {
    Received,
    PrologParsed,
    Classified,
    GraphsExtracted,
    AccessChecked,
    Forwarded,
    Rejected,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A query as received by the SPARQL endpoint
#[derive(Debug, Clone, Default)]
pub struct SparqlRequest {
    pub query: String,
    /// Default graph; may be empty when the query names its own sources
    pub dataset: String,
    pub limit: Option<u32>,
    pub offset: u32,
    /// May be empty or use the `self` convention
    pub registered_ip: String,
    pub requester_ip: String,
    /// Mime type negotiated with the client
    pub mime: String,
}

/// What is sent to the triple store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub default_graph: String,
    pub query: String,
    /// Store result format; empty lets the store choose
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl StoreResponse {
    /// WS-SPARQL-301 when a successful answer carries no records
    pub fn notice(&self, webservice: &str) -> Option<ErrorReport> {
        (self.status == 200 && self.body.trim().is_empty()).then(|| {
            ErrorReport::notice(
                "WS-SPARQL-301",
                webservice,
                "No instance records found",
                "No instance records found for this query",
            )
        })
    }
}

/// Executes queries that passed the gate
#[async_trait]
pub trait SparqlStore: Send + Sync {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse>;
}

/// Format requested from the store for a client mime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultFormat {
    /// Store answers in the client's mime directly
    PassThrough(String),
    /// Store answers in SPARQL results XML; converted downstream
    ResultsXml,
    StoreDefault,
}

impl ResultFormat {
    pub const RESULTS_XML: &'static str = "application/sparql-results+xml";

    pub fn negotiate(mime: &str, shape: &QueryShape) -> Self {
        match mime {
            "application/sparql-results+json" | "application/sparql-results+xml" | "text/html" => {
                ResultFormat::PassThrough(mime.to_string())
            }
            _ if shape.is_describe || shape.is_construct => ResultFormat::PassThrough(mime.to_string()),
            "text/xml" | "application/json" | "application/rdf+xml" | "application/rdf+n3" => {
                ResultFormat::ResultsXml
            }
            _ => ResultFormat::StoreDefault,
        }
    }

    pub fn as_param(&self) -> &str {
        match self {
            ResultFormat::PassThrough(m) => m,
            ResultFormat::ResultsXml => Self::RESULTS_XML,
            ResultFormat::StoreDefault => "",
        }
    }
}

/// A query that cleared every guard and may be forwarded
#[derive(Debug, Clone)]
pub struct Admitted {
    pub shape: QueryShape,
    /// Access-checked graphs, reification graphs mapped to their dataset
    pub checked: BTreeSet<String>,
    pub format: ResultFormat,
}

pub struct Gatekeeper<S: SparqlStore + ?Sized = dyn SparqlStore, G: GrantStore + ?Sized = dyn GrantStore> {
    engine: AccessEngine<G>,
    store: Arc<S>,
    extractor: Arc<dyn GraphExtractor>,
    ws_uri: String,
    max_limit: u32,
}

fn transition(state: GateState) {
    debug!(%state, "sparql gate");
}

fn reject(e: WsfError) -> WsfError {
    match e.kind() {
        ErrorKind::Fatal => error!(state = %GateState::Rejected, error = %e, "sparql gate"),
        _ => warn!(state = %GateState::Rejected, error = %e, "sparql gate"),
    }
    e
}

impl<S: SparqlStore + ?Sized, G: GrantStore + ?Sized> Gatekeeper<S, G> {
    pub fn new(engine: AccessEngine<G>, store: Arc<S>, config: &Config) -> Self {
        Gatekeeper {
            engine,
            store,
            extractor: Arc::new(PatternExtractor::new()),
            ws_uri: config.sparql_ws_uri(),
            max_limit: config.max_limit,
        }
    }

    /// Swap the query scanner
    pub fn with_extractor(mut self, extractor: Arc<dyn GraphExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Run every guard and the access checks without contacting the triple store
    pub async fn admit(&self, req: &SparqlRequest) -> Result<Admitted> {
        transition(GateState::Received);
        if req.query.trim().is_empty() {
            return Err(reject(WsfError::NoQuery));
        }
        if let Some(limit) = req.limit {
            if limit > self.max_limit {
                return Err(reject(WsfError::LimitTooLarge { requested: limit, max: self.max_limit }));
            }
        }

        let shape = self.extractor.extract(&req.query);
        transition(GateState::PrologParsed);
        debug!(prefixes = shape.declared_prefixes.len(), "prolog parsed");

        transition(GateState::Classified);
        if shape.is_mutating {
            return Err(reject(WsfError::MutationNotPermitted));
        }
        if shape.is_unbounded_graph() {
            return Err(reject(WsfError::UnboundedGraphClause));
        }

        let mut checked = shape.access_targets();
        if !req.dataset.is_empty() {
            checked.insert(access_target(&req.dataset).to_string());
        }
        transition(GateState::GraphsExtracted);
        if checked.is_empty() {
            return Err(reject(WsfError::NoDataset));
        }
        debug!(graphs = ?checked, "graphs extracted");

        let who = RequestIdentity::new(&req.registered_ip, &req.requester_ip);
        try_join_all(
            checked
                .iter()
                .map(|g| self.engine.check_both(&who, g, Operation::Read, &self.ws_uri)),
        )
        .await
        .map_err(reject)?;
        transition(GateState::AccessChecked);

        let format = ResultFormat::negotiate(&req.mime, &shape);
        Ok(Admitted { shape, checked, format })
    }

    /// Admit the query and forward it verbatim to the triple store
    pub async fn process(&self, req: &SparqlRequest) -> Result<StoreResponse> {
        let admitted = self.admit(req).await?;
        let request = StoreRequest {
            default_graph: req.dataset.clone(),
            query: req.query.clone(),
            format: admitted.format.as_param().to_string(),
        };
        let response = self.store.execute(request).await.map_err(reject)?;
        if response.status != 200 {
            return Err(reject(WsfError::UpstreamError {
                status: response.status,
                body: response.body,
            }));
        }
        transition(GateState::Forwarded);
        Ok(response)
    }
}
