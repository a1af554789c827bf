//! Integration tests for upstream delegation.
//!
//! When `PULSEBOARD_UPSTREAM_URL` is configured, team creation, the gig
//! board, and mentor booking are forwarded to the upstream verbatim and the
//! local store is never touched for those calls. Everything else (check-ins,
//! points, judging, the leaderboard) stays local regardless.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulseboard_server::config::Config;
use pulseboard_server::routes::{create_router, AppState};

// ============================================================================
// Test Helpers
// ============================================================================

fn delegating_state(upstream_url: &str, token: Option<&str>) -> AppState {
    let config = Config {
        port: 0,
        upstream_url: Some(upstream_url.to_string()),
        upstream_token: token.map(String::from),
        cors_origins: Vec::new(),
    };
    AppState::new(config).expect("should build upstream client")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Delegated Calls
// ============================================================================

/// Team creation is forwarded with the bearer token and the upstream body is
/// returned unmodified; the local roster stays empty.
#[tokio::test]
async fn team_create_is_forwarded_and_local_store_is_untouched() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/teams/create"))
        .and(header("Authorization", "Bearer sekrit"))
        .and(body_json(json!({ "team_name": "Rocket" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "remote-42",
            "name": "Rocket",
            "members": []
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = create_router(delegating_state(&upstream.uri(), Some("sekrit")));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/teams/create",
            json!({ "team_name": "Rocket" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let team = response_json(response).await;
    assert_eq!(team["id"], "remote-42");

    // The delegated call never wrote to the local roster.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/teams")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let teams = response_json(response).await;
    assert_eq!(teams.as_array().unwrap().len(), 0);
}

/// The gig board round-trips through the upstream in both directions.
#[tokio::test]
async fn gigs_are_listed_and_posted_through_the_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gigs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "g1", "title": "Food run" }
        ])))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/gigs"))
        .and(body_json(json!({
            "title": "Chair setup",
            "description": "Main hall",
            "reward_points": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "g2" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = create_router(delegating_state(&upstream.uri(), None));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/gigs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let gigs = response_json(response).await;
    assert_eq!(gigs[0]["id"], "g1");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/gigs",
            json!({ "title": "Chair setup", "description": "Main hall" }),
        ))
        .await
        .unwrap();
    assert_eq!(response_json(response).await["id"], "g2");
}

/// Mentor bookings are forwarded verbatim.
#[tokio::test]
async fn mentor_booking_is_forwarded() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mentors/book"))
        .and(body_json(json!({
            "mentor_id": "m1",
            "slot": "10:00",
            "team_id": "t1"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "booking_id": "b-9" })),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let app = create_router(delegating_state(&upstream.uri(), None));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/mentors/book",
            json!({ "mentor_id": "m1", "slot": "10:00", "team_id": "t1" }),
        ))
        .await
        .unwrap();
    let booking = response_json(response).await;
    assert_eq!(booking["booking_id"], "b-9");
}

// ============================================================================
// Upstream Failures
// ============================================================================

/// Upstream failures surface as 502 with the upstream error code.
#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/teams/create"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&upstream)
        .await;

    let app = create_router(delegating_state(&upstream.uri(), None));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/teams/create",
            json!({ "team_name": "Rocket" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = response_json(response).await;
    assert_eq!(error["code"], "upstream");
}

/// An unreachable upstream also maps to 502 rather than hanging or panicking.
#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    // Port 1 is never listening.
    let app = create_router(delegating_state("http://127.0.0.1:1", None));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/teams/create",
            json!({ "team_name": "Rocket" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// ============================================================================
// Local-Only Endpoints
// ============================================================================

/// Check-ins, awards, and the leaderboard never hit the upstream, even when
/// delegation is configured.
#[tokio::test]
async fn points_flow_stays_local_when_delegation_is_configured() {
    // No mocks mounted: any forwarded call would 404 and fail the asserts.
    let upstream = MockServer::start().await;
    let state = delegating_state(&upstream.uri(), None);
    let app = create_router(state.clone());

    // Teams go upstream, so seed the roster directly.
    let team = state
        .store
        .write()
        .await
        .create_team("Rocket".to_string());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/checkin",
            json!({ "team_id": team.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/leaderboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let rows = response_json(response).await;
    assert_eq!(rows[0]["points"], 5);
}
