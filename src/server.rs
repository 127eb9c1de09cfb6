//! REST surface over the access engine, lister, registrar and SPARQL gate
//!
//! The requester identity is always the peer address of the connection;
//! callers may only name a registered identity on top of it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::AccessEngine;
use crate::config::Config;
use crate::constants::names_to_caps;
use crate::db::LmdbGrantStore;
use crate::error::{ErrorReport, WsfError};
use crate::gatekeeper::{Gatekeeper, SparqlRequest, SparqlStore};
use crate::grant::{derive_grant_id, AccessGrant, Crud, Operation};
use crate::identity::{resolve, RequestIdentity};
use crate::lister::{AuthLister, Listing, ListingMode};

// ============================================================================
// State
// ============================================================================

pub struct AppState {
    config: Config,
    grants: Arc<LmdbGrantStore>,
    engine: AccessEngine<LmdbGrantStore>,
    lister: AuthLister<LmdbGrantStore>,
    gate: Gatekeeper<dyn SparqlStore, LmdbGrantStore>,
}

impl AppState {
    pub fn new(config: Config, grants: Arc<LmdbGrantStore>, sparql: Arc<dyn SparqlStore>) -> Self {
        let engine = AccessEngine::new(Arc::clone(&grants), &config);
        AppState {
            lister: AuthLister::new(engine.clone(), &config),
            gate: Gatekeeper::new(engine.clone(), sparql, &config),
            engine,
            grants,
            config,
        }
    }
}

type Shared = Arc<AppState>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorReport>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    fn err(report: ErrorReport) -> Self {
        Self { success: false, data: None, error: Some(report) }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn failure<T>(e: WsfError, webservice: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::err(e.report(webservice))))
}

#[derive(Deserialize)]
struct ValidateReq {
    #[serde(default)]
    registered_ip: String,
    dataset: String,
    operation: Operation,
    ws: String,
}

#[derive(Serialize)]
struct ValidateRes {
    identity: String,
    allowed: bool,
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    mode: String,
    #[serde(default)]
    dataset: String,
    #[serde(default)]
    registered_ip: String,
}

#[derive(Deserialize)]
struct SparqlReq {
    query: String,
    #[serde(default)]
    dataset: String,
    limit: Option<u32>,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    registered_ip: String,
}

#[derive(Deserialize)]
struct RegisterAccessReq {
    /// Derived from identity and dataset when absent
    id: Option<String>,
    registered_ip: String,
    dataset: String,
    #[serde(default)]
    crud: Vec<String>,
    #[serde(default)]
    ws_uris: Vec<String>,
}

#[derive(Deserialize)]
struct AccessIdQuery {
    id: String,
}

#[derive(Deserialize)]
struct RegisterWsReq {
    uri: String,
}

#[derive(Serialize)]
struct HealthRes {
    status: String,
    version: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn post_validate(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<ValidateReq>,
) -> ApiResult<ValidateRes> {
    let ws = state.config.auth_validator_ws_uri();
    let who = RequestIdentity::new(&req.registered_ip, &peer.ip().to_string());
    state
        .engine
        .check_both(&who, &req.dataset, req.operation, &req.ws)
        .await
        .map_err(|e| failure(e, &ws))?;
    Ok(Json(ApiResponse::ok(ValidateRes {
        identity: who.registered().to_string(),
        allowed: true,
    })))
}

async fn get_listing(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Listing> {
    let ws = state.config.auth_lister_ws_uri();
    let mode = ListingMode::parse(&q.mode).map_err(|e| failure(e, &ws))?;
    let who = RequestIdentity::new(&q.registered_ip, &peer.ip().to_string());
    let listing = state
        .lister
        .list(mode, &q.dataset, &who)
        .await
        .map_err(|e| failure(e, &ws))?;
    Ok(Json(ApiResponse::ok(listing)))
}

async fn post_sparql(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SparqlReq>,
) -> Response {
    let ws = state.config.sparql_ws_uri();
    let mime = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_default();
    let request = SparqlRequest {
        query: req.query,
        dataset: req.dataset,
        limit: req.limit,
        offset: req.offset,
        registered_ip: req.registered_ip,
        requester_ip: peer.ip().to_string(),
        mime,
    };
    match state.gate.process(&request).await {
        Ok(res) => match res.notice(&ws) {
            Some(notice) => Json(ApiResponse::<()> { success: true, data: None, error: Some(notice) })
                .into_response(),
            None => ([(header::CONTENT_TYPE, res.content_type)], res.body).into_response(),
        },
        Err(e) => failure::<()>(e, &ws).into_response(),
    }
}

/// Registrar writes need the matching operation on the network graph
async fn check_registrar(state: &AppState, peer: &SocketAddr, op: Operation) -> Result<(), WsfError> {
    let ws = state.config.auth_registrar_ws_uri();
    state
        .engine
        .check(&peer.ip().to_string(), &state.config.wsf_graph, op, &ws)
        .await
}

async fn post_access(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterAccessReq>,
) -> ApiResult<AccessGrant> {
    let ws = state.config.auth_registrar_ws_uri();
    check_registrar(&state, &peer, Operation::Create)
        .await
        .map_err(|e| failure(e, &ws))?;

    let identity = resolve(&req.registered_ip, &peer.ip().to_string());
    let id = req
        .id
        .unwrap_or_else(|| derive_grant_id(&state.config.wsf_graph, &identity, &req.dataset));
    let names: Vec<&str> = req.crud.iter().map(String::as_str).collect();
    let crud = Crud::from_mask(names_to_caps(&names));
    let grant = AccessGrant::new(&id, &identity, &req.dataset, crud).restricted_to(req.ws_uris);
    state.grants.put_grant(&grant).map_err(|e| failure(e, &ws))?;
    info!(grant = %grant.id, identity = %grant.registered_identity, "access registered");
    Ok(Json(ApiResponse::ok(grant)))
}

async fn delete_access(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(q): Query<AccessIdQuery>,
) -> ApiResult<bool> {
    let ws = state.config.auth_registrar_ws_uri();
    check_registrar(&state, &peer, Operation::Delete)
        .await
        .map_err(|e| failure(e, &ws))?;
    let removed = state.grants.delete_grant(&q.id).map_err(|e| failure(e, &ws))?;
    info!(grant = %q.id, removed, "access deleted");
    Ok(Json(ApiResponse::ok(removed)))
}

async fn post_ws(
    State(state): State<Shared>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterWsReq>,
) -> ApiResult<String> {
    let ws = state.config.auth_registrar_ws_uri();
    check_registrar(&state, &peer, Operation::Create)
        .await
        .map_err(|e| failure(e, &ws))?;
    state.grants.register_web_service(&req.uri).map_err(|e| failure(e, &ws))?;
    info!(uri = %req.uri, "web service registered");
    Ok(Json(ApiResponse::ok(req.uri)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/validator", post(post_validate))
        .route("/auth/lister", get(get_listing))
        .route("/auth/registrar/access", post(post_access).delete(delete_access))
        .route("/auth/registrar/ws", post(post_ws))
        .route("/sparql", post(post_sparql))
        .with_state(Arc::new(state))
}
