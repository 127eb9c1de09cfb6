//! SPARQL gate tests
//!
//! Guards run before any access check; access checks run before the triple
//! store is contacted.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use wsfgate::{
    AccessEngine, Config, Crud, ErrorLevel, Gatekeeper, LmdbGrantStore, SparqlRequest, WsfError,
    WILDCARD_IDENTITY,
};

const PEER: &str = "10.0.0.1";

fn gate(
    store: &Arc<LmdbGrantStore>,
    triples: &Arc<RecordingStore>,
) -> Gatekeeper<RecordingStore, LmdbGrantStore> {
    Gatekeeper::new(engine(store), Arc::clone(triples), &Config::default())
}

fn select(query: &str) -> SparqlRequest {
    SparqlRequest {
        query: query.to_string(),
        requester_ip: PEER.to_string(),
        mime: "application/sparql-results+xml".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn readable_query_is_forwarded_verbatim() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "<sparql/>");
    let gate = gate(&store, &triples);

    let q = format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}");
    let res = gate.process(&select(&q)).await.unwrap();
    assert_eq!(res.body, "<sparql/>");

    let sent = triples.last().unwrap();
    assert_eq!(sent.query, q);
    assert_eq!(sent.format, "application/sparql-results+xml");
    assert_eq!(sent.default_graph, "");
}

#[tokio::test]
async fn unreadable_graph_is_denied_before_the_store() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let q = format!("SELECT * FROM <{DATASET}> FROM <{OTHER}> WHERE {{ ?s ?p ?o }}");
    let err = gate.process(&select(&q)).await.unwrap_err();
    assert!(matches!(err, WsfError::Denied { ref graph, .. } if graph == OTHER));
    assert_eq!(triples.calls(), 0);
}

#[tokio::test]
async fn mutating_query_never_reaches_the_store() {
    let (_dir, store) = store();
    grant(&store, WILDCARD_IDENTITY, DATASET, Crud::ALL);
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    for q in [
        "INSERT DATA { <a> <b> <c> }",
        "PREFIX ex: <http://ex.org/>\ndelete where { ?s ?p ?o }",
        "DROP GRAPH <http://ex.org/datasets/d1/>",
        "WITH <http://ex.org/datasets/d1/> DELETE { ?s ?p ?o } WHERE { ?s ?p ?o }",
    ] {
        let mut req = select(q);
        req.dataset = DATASET.to_string();
        let err = gate.process(&req).await.unwrap_err();
        assert!(matches!(err, WsfError::MutationNotPermitted), "{q}");
        assert_eq!(err.report(SPARQL_WS).id, "WS-SPARQL-203");
    }
    assert_eq!(triples.calls(), 0);
}

#[tokio::test]
async fn unbounded_graph_clause_is_rejected() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let mut req = select("SELECT * WHERE { GRAPH ?g { ?s ?p ?o } }");
    req.dataset = DATASET.to_string();
    let err = gate.process(&req).await.unwrap_err();
    assert!(matches!(err, WsfError::UnboundedGraphClause));
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn graph_clause_bounded_by_from_named_passes() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "ok");
    let gate = gate(&store, &triples);

    let q = format!("SELECT * FROM NAMED <{DATASET}> WHERE {{ GRAPH ?g {{ ?s ?p ?o }} }}");
    let admitted = gate.admit(&select(&q)).await.unwrap();
    assert!(admitted.checked.contains(DATASET));
    gate.process(&select(&q)).await.unwrap();
    assert_eq!(triples.calls(), 1);
}

#[tokio::test]
async fn prefixed_from_is_resolved_and_checked() {
    let (_dir, store) = store();
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let q = "PREFIX ds: <http://ex.org/datasets/> SELECT * FROM ds:d1/ WHERE { ?s ?p ?o }";
    let err = gate.process(&select(q)).await.unwrap_err();
    assert!(matches!(err, WsfError::Denied { ref graph, .. } if graph == DATASET));

    grant(&store, PEER, DATASET, read_only());
    let admitted = gate.admit(&select(q)).await.unwrap();
    assert_eq!(admitted.checked.into_iter().collect::<Vec<_>>(), vec![DATASET.to_string()]);
}

#[tokio::test]
async fn reification_graph_is_checked_through_its_dataset() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let q = format!("SELECT * FROM <{DATASET}reification/> WHERE {{ ?s ?p ?o }}");
    let admitted = gate.admit(&select(&q)).await.unwrap();
    assert!(admitted.checked.contains(DATASET));
    assert!(admitted.shape.referenced_graphs.contains(&format!("{DATASET}reification/")));
}

#[tokio::test]
async fn dataset_parameter_is_access_checked() {
    let (_dir, store) = store();
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let mut req = select("SELECT * WHERE { ?s ?p ?o }");
    req.dataset = OTHER.to_string();
    let err = gate.process(&req).await.unwrap_err();
    assert!(matches!(err, WsfError::Denied { ref graph, .. } if graph == OTHER));

    grant(&store, PEER, OTHER, read_only());
    gate.process(&req).await.unwrap();
    assert_eq!(triples.last().unwrap().default_graph, OTHER);
}

#[tokio::test]
async fn empty_query_and_missing_target_are_bad_requests() {
    let (_dir, store) = store();
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let err = gate.process(&select("   ")).await.unwrap_err();
    assert!(matches!(err, WsfError::NoQuery));

    let err = gate.process(&select("SELECT * WHERE { ?s ?p ?o }")).await.unwrap_err();
    assert!(matches!(err, WsfError::NoDataset));
    assert_eq!(err.report(SPARQL_WS).id, "WS-SPARQL-201");
}

#[tokio::test]
async fn oversized_limit_is_rejected() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let mut req = select("SELECT * WHERE { ?s ?p ?o }");
    req.dataset = DATASET.to_string();
    req.limit = Some(2001);
    let err = gate.process(&req).await.unwrap_err();
    assert!(matches!(err, WsfError::LimitTooLarge { requested: 2001, max: 2000 }));

    req.limit = Some(2000);
    gate.process(&req).await.unwrap();
}

#[tokio::test]
async fn delegated_query_needs_both_identities() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let mut req = select(&format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}"));
    req.registered_ip = "self::bob".to_string();
    let err = gate.process(&req).await.unwrap_err();
    assert!(matches!(err, WsfError::Denied { ref identity, .. } if identity == "10.0.0.1::bob"));

    grant(&store, "10.0.0.1::bob", DATASET, read_only());
    gate.process(&req).await.unwrap();
}

#[tokio::test]
async fn store_error_carries_its_body() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(500, "Virtuoso 37000 Error SP030");
    let gate = gate(&store, &triples);

    let q = format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}");
    let err = gate.process(&select(&q)).await.unwrap_err();
    assert!(matches!(err, WsfError::UpstreamError { status: 500, .. }));
    let report = err.report(SPARQL_WS);
    assert_eq!(report.id, "WS-SPARQL-300");
    assert_eq!(report.debug_info, "Virtuoso 37000 Error SP030");
}

#[tokio::test]
async fn empty_answer_carries_a_notice() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let q = format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}");

    let empty = RecordingStore::answering(200, "  \n");
    let res = gate(&store, &empty).process(&select(&q)).await.unwrap();
    let notice = res.notice(SPARQL_WS).unwrap();
    assert_eq!(notice.id, "WS-SPARQL-301");
    assert_eq!(notice.level, ErrorLevel::Notice);
    assert_eq!(notice.webservice, SPARQL_WS);

    let full = RecordingStore::answering(200, "<sparql/>");
    let res = gate(&store, &full).process(&select(&q)).await.unwrap();
    assert!(res.notice(SPARQL_WS).is_none());
}

#[tokio::test]
async fn grant_store_outage_is_not_a_denial() {
    let triples = RecordingStore::answering(200, "");
    let engine = AccessEngine::with_timeout(Arc::new(FailingStore), Duration::from_secs(1));
    let gate: Gatekeeper<RecordingStore, FailingStore> =
        Gatekeeper::new(engine, Arc::clone(&triples), &Config::default());

    let q = format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}");
    let err = gate.process(&select(&q)).await.unwrap_err();
    assert!(matches!(err, WsfError::StoreUnavailable(_)));
    assert_eq!(triples.calls(), 0);
}

#[tokio::test]
async fn construct_keeps_the_client_mime() {
    let (_dir, store) = store();
    grant(&store, PEER, DATASET, read_only());
    let triples = RecordingStore::answering(200, "");
    let gate = gate(&store, &triples);

    let mut req = select(&format!("CONSTRUCT {{ ?s ?p ?o }} FROM <{DATASET}> WHERE {{ ?s ?p ?o }}"));
    req.mime = "application/rdf+xml".to_string();
    gate.process(&req).await.unwrap();
    assert_eq!(triples.last().unwrap().format, "application/rdf+xml");

    let mut req = select(&format!("SELECT * FROM <{DATASET}> WHERE {{ ?s ?p ?o }}"));
    req.mime = "application/json".to_string();
    gate.process(&req).await.unwrap();
    assert_eq!(triples.last().unwrap().format, "application/sparql-results+xml");
}
