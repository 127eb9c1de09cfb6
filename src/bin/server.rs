//! wsfgate REST API Server
//!
//! Run with: cargo run --features server --bin wsfgate-server
//!
//! Endpoints:
//!   GET    /health                  - Liveness
//!   POST   /auth/validator          - Check an operation on a dataset
//!   GET    /auth/lister             - List datasets, web services or accesses
//!   POST   /auth/registrar/access   - Create or replace an access record
//!   DELETE /auth/registrar/access   - Delete an access record
//!   POST   /auth/registrar/ws       - Register a web service
//!   POST   /sparql                  - Gate and forward a SPARQL query

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsfgate::{router, AppState, Config, HttpSparqlStore, LmdbGrantStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wsfgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(path = %config.db_path, "opening grant store");
    let grants = Arc::new(LmdbGrantStore::open(&config.db_path)?);
    let sparql = Arc::new(HttpSparqlStore::new(&config)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = router(AppState::new(config, grants, sparql))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("wsfgate server running at http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
