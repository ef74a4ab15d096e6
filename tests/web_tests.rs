//! API tests
//!
//! Requests go straight to the router with `oneshot`; no socket is opened.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use key_solver::web::server::{api_router, create_router};
use key_solver::KeyCatalog;

fn router() -> Router {
    api_router(KeyCatalog::load_embedded().unwrap())
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_list_keys() {
    let request = Request::builder()
        .uri("/api/keys")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);
    assert_eq!(json["multi_access"][0]["id"], "demo-eucalypts");
    assert_eq!(json["dichotomous"][0]["id"], "1903");
}

#[tokio::test]
async fn test_multi_session_starts_with_all_taxa() {
    let (status, json) = send(
        router(),
        post_json("/api/multi/demo-eucalypts/session", &serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining"]["total"], 6);
    assert_eq!(json["outcome"]["status"], "candidates");
    let relevant = json["relevant_characters"].as_array().unwrap();
    assert_eq!(relevant.len(), 4);
    // Grouping characters are never offered
    assert!(relevant.iter().all(|c| c["id"] != "plant"));
}

#[tokio::test]
async fn test_multi_session_replays_selections() {
    let body = serde_json::json!({
        "selections": [
            {"character": "habit", "state": "habit-tree"},
            {"character": "bark", "state": "bark-smooth"},
            {"character": "operculum", "state": "operculum-beaked"}
        ]
    });
    let (status, json) = send(
        router(),
        post_json("/api/multi/demo-eucalypts/session", &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["steps"],
        serde_json::json!([
            {"eliminated": 2, "remaining": 4},
            {"eliminated": 1, "remaining": 3},
            {"eliminated": 2, "remaining": 1}
        ])
    );
    assert_eq!(json["outcome"]["status"], "identified");
    assert_eq!(json["outcome"]["taxon"]["id"], "t1");
    assert_eq!(json["selections"][0]["value"], "tree with a single trunk");
    assert!(json["relevant_characters"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_session_reselection_never_restores_taxa() {
    let body = serde_json::json!({
        "selections": [
            {"character": "habit", "state": "habit-tree"},
            {"character": "habit", "state": "habit-mallee"}
        ]
    });
    let (status, json) = send(
        router(),
        post_json("/api/multi/demo-eucalypts/session", &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["steps"],
        serde_json::json!([
            {"eliminated": 2, "remaining": 4},
            {"eliminated": 4, "remaining": 0}
        ])
    );
    assert_eq!(json["outcome"]["status"], "no_match");
}

#[tokio::test]
async fn test_multi_session_numeric_selection() {
    let body = serde_json::json!({
        "selections": [{"character": "leaf-length", "numeric": 55}]
    });
    let (status, json) = send(
        router(),
        post_json("/api/multi/demo-eucalypts/session", &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["taxon"]["name"], "Eucalyptus viridis");
}

#[tokio::test]
async fn test_multi_session_errors() {
    let (status, json) = send(
        router(),
        post_json("/api/multi/a..b/session", &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "invalid_key_id");

    let (status, json) = send(
        router(),
        post_json("/api/multi/missing/session", &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_type"], "key_not_found");
    assert!(json["details"].is_null());
}

#[tokio::test]
async fn test_navigate_follows_linked_key() {
    let body = serde_json::json!({"steps": [{"choose": 0}]});
    let (status, json) = send(router(), post_json("/api/dichotomous/1903/navigate", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["header"]["key_id"], "42");
    assert_eq!(json["header"]["depth"], 2);
    assert_eq!(json["trail"], serde_json::json!(["1903", "42"]));
    assert_eq!(json["last_step"]["transition"], "key_transition");
    assert_eq!(json["last_step"]["item"]["name"], "Myrtaceae");
    assert_eq!(json["options"].as_array().unwrap().len(), 2);
    assert_eq!(json["dead_end"], false);
}

#[tokio::test]
async fn test_navigate_back_out_of_linked_key() {
    let body = serde_json::json!({"steps": [{"choose": 0}, "back"]});
    let (status, json) = send(router(), post_json("/api/dichotomous/1903/navigate", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["header"]["key_id"], "1903");
    assert_eq!(json["last_step"]["back"], "left_key");
    assert_eq!(json["last_step"]["returned_to"], "1903");
}

#[tokio::test]
async fn test_navigate_errors() {
    let body = serde_json::json!({"steps": [{"choose": 9}]});
    let (status, json) = send(router(), post_json("/api/dichotomous/1903/navigate", &body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error_type"], "invalid_step");

    let (status, json) = send(
        router(),
        post_json("/api/dichotomous/999/navigate", &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_type"], "key_not_found");

    let steps = vec![serde_json::json!("back"); 1001];
    let (status, json) = send(
        router(),
        post_json("/api/dichotomous/1903/navigate", &serde_json::json!({"steps": steps})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "too_many_steps");
}

#[tokio::test]
async fn test_full_router_sets_security_headers() {
    let addr = SocketAddr::from(([127, 0, 0, 1], 40000));
    let app = create_router(KeyCatalog::load_embedded().unwrap())
        .unwrap()
        .layer(MockConnectInfo(addr));

    let request = Request::builder()
        .uri("/api/keys")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}
