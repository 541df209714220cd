//! Integration tests for the HTTP server.
//!
//! Drives the router through `tower::ServiceExt::oneshot` on top of the
//! in-memory store: registration, organizer authorization, match play and
//! error reporting.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tourney::{
    InMemoryStore, TournamentManager,
    lifecycle::{ChannelBindings, EngineSettings},
};
use tourney_server::api::{AppState, create_router, middleware::ORGANIZER_ROLE_HEADER};
use tower::ServiceExt; // For `oneshot` method

const ORGANIZER: &str = "organizer";

fn settings(organizer_roles: &[&str]) -> EngineSettings {
    EngineSettings {
        channels: ChannelBindings {
            battle_channels: vec!["battle-1".to_string()],
            ..ChannelBindings::default()
        },
        organizer_roles: organizer_roles.iter().map(|r| r.to_string()).collect(),
        ..EngineSettings::default()
    }
}

/// Helper to create test server with a current tournament
async fn create_test_server(organizer_roles: &[&str]) -> (axum::Router, Arc<TournamentManager>) {
    let manager = Arc::new(
        TournamentManager::new(Arc::new(InMemoryStore::new()), settings(organizer_roles)).unwrap(),
    );
    manager.ensure_current("Test Cup", 0).await.unwrap();

    let app = create_router(AppState {
        manager: Arc::clone(&manager),
        organizer_routes: true,
    });
    (app, manager)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn organizer_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(ORGANIZER_ROLE_HEADER, ORGANIZER)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register(app: &axum::Router, participant_id: &str) -> StatusCode {
    let (status, _) = send(
        app,
        post_json(
            "/api/v1/tournaments/current/participants",
            json!({ "participant_id": participant_id }),
        ),
    )
    .await;
    status
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tournaments"]["active_count"], 1);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_and_snapshot() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    assert_eq!(register(&app, "u1").await, StatusCode::CREATED);
    assert_eq!(register(&app, "u1").await, StatusCode::CONFLICT);

    let request = Request::builder()
        .uri("/api/v1/tournaments/current")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "registration");
    assert_eq!(body["participants"][0]["id"], "u1");
    assert_eq!(body["participants"][0]["display_name"], "u1");
}

#[tokio::test]
async fn test_unregister() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;
    register(&app, "u1").await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/tournaments/current/participants/u1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/tournaments/current/participants/u1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "registration failed: not registered");
}

#[tokio::test]
async fn test_unknown_tournament() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let request = Request::builder()
        .uri("/api/v1/tournaments/t_missing")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "tournament not found: t_missing");
}

// ============================================================================
// Organizer Authorization Tests
// ============================================================================

#[tokio::test]
async fn test_organizer_role_required() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/tournaments/current/registration/close", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Organizer role required");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tournaments/current/registration/close")
        .header(ORGANIZER_ROLE_HEADER, "member")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_organizer_roles_is_a_configuration_error() {
    let (app, _) = create_test_server(&[]).await;

    let (status, body) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/end", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["error"],
        "configuration error: no organizer roles configured"
    );
}

#[tokio::test]
async fn test_create_tournament_becomes_current() {
    let (app, manager) = create_test_server(&[ORGANIZER]).await;

    let (status, body) = send(
        &app,
        organizer_post(
            "/api/v1/tournaments",
            json!({ "name": "Finals", "max_participants": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        manager.current_tournament_id().await.unwrap(),
        body["id"].as_str().unwrap()
    );

    register(&app, "u1").await;
    register(&app, "u2").await;
    assert_eq!(register(&app, "u3").await, StatusCode::CONFLICT);

    let request = Request::builder()
        .uri("/api/v1/tournaments")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, request).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

// ============================================================================
// Match Play Tests
// ============================================================================

#[tokio::test]
async fn test_match_flow() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;
    for id in ["u1", "u2", "u3"] {
        register(&app, id).await;
    }

    let (status, plan) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/registration/close", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["main_size"], 2);
    assert_eq!(plan["prelim_players"], 2);

    // Late registrations are refused once the bracket exists
    assert_eq!(register(&app, "u4").await, StatusCode::CONFLICT);

    let (status, fixtures) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/rounds/0/fixtures", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fixtures[0]["match_id"], "P1");
    assert_eq!(fixtures[0]["channel_id"], "battle-1");

    let (status, m) = send(
        &app,
        post_json(
            "/api/v1/tournaments/current/channels/battle-1/posts",
            json!({ "participant_id": "u2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(m["state"]["reply_count"], 1);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/tournaments/current/matches/P1/posts",
            json!({ "participant_id": "u2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "not your turn, wait for your opponent to reply"
    );

    let (status, body) = send(
        &app,
        organizer_post(
            "/api/v1/tournaments/current/matches/P1/end",
            json!({ "winner": "p3" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid winner 'p3' (use p1 or p2)");

    let (status, _) = send(
        &app,
        organizer_post(
            "/api/v1/tournaments/current/matches/P1/end",
            json!({ "winner": "p2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The final now has both players; settle it by vote
    let (status, _) = send(
        &app,
        organizer_post(
            "/api/v1/tournaments/current/matches/R1M1/vote?duration_secs=3600",
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, tally) = send(
        &app,
        post_json(
            "/api/v1/tournaments/current/matches/R1M1/votes",
            json!({ "voter_id": "fan", "choice": "p2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tally["p2"], 1);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/tournaments/current/matches/R1M1/votes",
            json!({ "voter_id": "fan", "choice": "p1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/end", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["champion"], Value::Null);

    let (status, _) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/end", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_close_with_too_few_participants() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;
    register(&app, "u1").await;

    let (status, body) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/registration/close", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "bracket build failed: not enough participants: need at least 2, have 1"
    );
}

// ============================================================================
// Settings Tests
// ============================================================================

fn organizer_put(uri: &str, role: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .header(ORGANIZER_ROLE_HEADER, role)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_organizer_roles_can_be_replaced() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let (status, body) = send(
        &app,
        organizer_put(
            "/api/v1/settings/organizer-roles",
            ORGANIZER,
            json!({ "roles": ["referee", " "] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organizer_roles"], json!(["referee"]));

    // The old role no longer passes
    let (status, _) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/registration/close", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/api/v1/settings")
        .header(ORGANIZER_ROLE_HEADER, "referee")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"]["battle_channels"], json!(["battle-1"]));
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;

    let (status, body) = send(
        &app,
        organizer_put(
            "/api/v1/settings/organizer-roles",
            ORGANIZER,
            json!({ "roles": [] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "configuration error: invalid configuration for organizer_roles: at least one role is required"
    );

    let (status, _) = send(
        &app,
        organizer_put(
            "/api/v1/settings/channels/lobby",
            ORGANIZER,
            json!({ "channel_id": "x" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Roles survived the rejected update
    let (status, _) = send(
        &app,
        organizer_put(
            "/api/v1/settings/channels/announce",
            ORGANIZER,
            json!({ "channel_id": "news" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rebound_battle_channel_is_used_for_fixtures() {
    let (app, _) = create_test_server(&[ORGANIZER]).await;
    for id in ["u1", "u2"] {
        register(&app, id).await;
    }

    let (status, _) = send(
        &app,
        organizer_put(
            "/api/v1/settings/battle-channels",
            ORGANIZER,
            json!({ "channels": ["arena"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send(
        &app,
        organizer_post("/api/v1/tournaments/current/registration/close", json!({})),
    )
    .await;
    let (status, fixtures) = send(
        &app,
        organizer_post("/api/v1/tournaments/current/rounds/0/fixtures", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fixtures[0]["channel_id"], "arena");
}
