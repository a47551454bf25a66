// Copyright 2025 SessionScope (https://github.com/sessionscope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

// Integration tests for the ingestion gateway: the full router with
// real stores, a filesystem blob store, and the offline embedding
// provider.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use sessionscope_index::DeterministicEmbeddingProvider;
use sessionscope_server::api::AppState;
use sessionscope_server::auth::ApiKeyService;
use sessionscope_server::build_router;
use sessionscope_storage::{
    EventStore, FsObjectStore, KeyStore, MetricStore, ReplayStore, SessionStore,
};

fn test_state(dir: &std::path::Path) -> AppState {
    let keys = Arc::new(KeyStore::new());
    AppState {
        sessions: Arc::new(SessionStore::new()),
        events: Arc::new(EventStore::new()),
        metrics: Arc::new(MetricStore::new()),
        keys: keys.clone(),
        replays: Arc::new(ReplayStore::new(FsObjectStore::new(dir))),
        key_service: Arc::new(ApiKeyService::new(
            b"integration-test-secret".to_vec(),
            [9u8; 32],
            keys,
        )),
        embedder: Arc::new(DeterministicEmbeddingProvider::default()),
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn issue_key(app: &Router, team_id: i64) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/generate-api-key",
        None,
        Some(json!({ "teamId": team_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["apiKey"].as_str().unwrap().to_string()
}

async fn mint_session(app: &Router, key: &str) -> String {
    let (status, body) = send(app, "GET", "/generate-user-uuid", Some(key), None).await;
    assert_eq!(status, StatusCode::OK);
    let user = body["uuid"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        "GET",
        &format!("/generate-session-uuid?userUUID={user}"),
        Some(key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["uuid"].as_str().unwrap().to_string()
}

async fn capture(app: &Router, key: &str, session: &str, event_type: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/capture-event",
        Some(key),
        Some(json!({ "sessionUUID": session, "type": event_type })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_full_ingestion_and_replay_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;

    // Session minting with tags (JSON array in the query string).
    let (status, body) = send(&app, "GET", "/generate-user-uuid", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
    let user = body["uuid"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/generate-session-uuid?userUUID={user}&tags=%5B%22checkout%22%5D"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session = body["uuid"].as_str().unwrap().to_string();

    capture(&app, &key, &session, "Click").await;

    // Two replay appends, then an end-session beacon carrying the key
    // in the body and the final residue.
    let (status, _) = send(
        &app,
        "POST",
        "/append-replay-events",
        Some(&key),
        Some(json!({ "sessionUUID": session, "events": [{"seq": 1}, {"seq": 2}] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/end-session",
        None,
        Some(json!({
            "sessionUUID": session,
            "replayEvents": [{"seq": 3}],
            "hasBeenRecordingReplay": true,
            "apiKey": key,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The archived replay decompresses to the exact event sequence.
    let (status, replay) = send(
        &app,
        "GET",
        &format!("/sessions/{session}/replay"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        replay,
        json!([{"seq": 1}, {"seq": 2}, {"seq": 3}])
    );

    // The session shows up in the team listing with its tag.
    let (status, listing) = send(&app, "GET", "/sessions", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["sessions"][0]["tags"], json!(["checkout"]));
}

#[tokio::test]
async fn test_authentication_is_required_and_exact() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;

    // No key at all.
    let (status, _) = send(&app, "GET", "/generate-user-uuid", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A single-character mutation of a valid key.
    let mut mutated = key.clone().into_bytes();
    mutated[0] = if mutated[0] == b'0' { b'1' } else { b'0' };
    let mutated = String::from_utf8(mutated).unwrap();
    let (status, _) = send(&app, "GET", "/generate-user-uuid", Some(&mutated), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The real key works.
    let (status, _) = send(&app, "GET", "/generate-user-uuid", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cross_team_session_writes_are_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key_a = issue_key(&app, 1).await;
    let key_b = issue_key(&app, 2).await;

    let session_a = mint_session(&app, &key_a).await;

    // Team B holds a perfectly valid key, but team A's session is off
    // limits: events, replay data, and metric event logging all fail
    // closed before any side effect.
    let (status, _) = send(
        &app,
        "POST",
        "/capture-event",
        Some(&key_b),
        Some(json!({ "sessionUUID": session_a, "type": "Click" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/append-replay-events",
        Some(&key_b),
        Some(json!({ "sessionUUID": session_a, "events": [{"seq": 1}] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Nothing was recorded for the session.
    let (status, events) = send(
        &app,
        "GET",
        &format!("/sessions/{session_a}/events"),
        Some(&key_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events, json!([]));
}

#[tokio::test]
async fn test_validation_rejects_oversized_and_malformed_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;
    let session = mint_session(&app, &key).await;

    let (status, _) = send(
        &app,
        "POST",
        "/capture-event",
        Some(&key),
        Some(json!({ "sessionUUID": "not-a-uuid", "type": "Click" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/capture-event",
        Some(&key),
        Some(json!({ "sessionUUID": session, "type": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/capture-event",
        Some(&key),
        Some(json!({ "sessionUUID": session, "type": "Click", "payload": "x".repeat(501) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metric_updates_require_a_preexisting_metric() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let metrics = state.metrics.clone();
    let events = state.events.clone();
    let app = build_router(state);
    let key = issue_key(&app, 1).await;
    let session = mint_session(&app, &key).await;

    // Unknown metric: 404, and it is NOT created.
    let (status, _) = send(
        &app,
        "POST",
        "/update-metric",
        Some(&key),
        Some(json!({ "name": "signups", "delta": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(metrics.get(1, "signups").is_none());

    // Exactly one of delta/value.
    let (status, _) = send(
        &app,
        "POST",
        "/update-metric",
        Some(&key),
        Some(json!({ "name": "signups" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        "POST",
        "/update-metric",
        Some(&key),
        Some(json!({ "name": "signups", "delta": 1.0, "value": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Provisioned metric: delta applies, and the referencing session
    // gets a Metric-{name} event.
    metrics.insert(1, "signups", 10.0);
    let (status, _) = send(
        &app,
        "POST",
        "/update-metric",
        Some(&key),
        Some(json!({
            "name": "signups",
            "delta": 2.5,
            "sessionUUID": session,
            "reason": "newsletter CTA",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics.get(1, "signups").unwrap().value, 12.5);

    let session_uuid = session.parse().unwrap();
    let logged = events.session_events(session_uuid);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].event_type, "Metric-signups");
}

#[tokio::test]
async fn test_similarity_ranks_matching_sessions_first() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;

    let session_a = mint_session(&app, &key).await;
    let session_b = mint_session(&app, &key).await;
    let session_c = mint_session(&app, &key).await;

    for event_type in ["click", "click", "page_view"] {
        capture(&app, &key, &session_a, event_type).await;
    }
    for event_type in ["click", "page_view", "page_view"] {
        capture(&app, &key, &session_b, event_type).await;
    }
    for event_type in ["purchase", "purchase"] {
        capture(&app, &key, &session_c, event_type).await;
    }

    let (status, body) = send(
        &app,
        "POST",
        "/similarity",
        None,
        Some(json!({ "sessionUUID": session_a, "teamId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // B (shared click/page_view mix) ranks strictly above C.
    assert_eq!(results[0]["uuid"], json!(session_b));
    assert_eq!(results[1]["uuid"], json!(session_c));
    assert!(results[0]["similarity"].as_f64() > results[1]["similarity"].as_f64());
    // The query session is excluded, and no vector is ever echoed.
    assert!(results.iter().all(|r| r["uuid"] != json!(session_a.clone())));
    assert!(results.iter().all(|r| r.get("vector").is_none()));
}

#[tokio::test]
async fn test_similarity_rejects_raw_vectors_and_respects_limit() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;
    let session = mint_session(&app, &key).await;
    capture(&app, &key, &session, "click").await;

    let (status, _) = send(
        &app,
        "POST",
        "/similarity",
        None,
        Some(json!({ "sessionUUID": session, "teamId": 1, "vector": [0.1, 0.2] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An eventless query session has nothing to hash.
    let empty_session = mint_session(&app, &key).await;
    let (status, _) = send(
        &app,
        "POST",
        "/similarity",
        None,
        Some(json!({ "sessionUUID": empty_session, "teamId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Limit bounds the result count.
    let other = mint_session(&app, &key).await;
    capture(&app, &key, &other, "click").await;
    let third = mint_session(&app, &key).await;
    capture(&app, &key, &third, "click").await;

    let (status, body) = send(
        &app,
        "POST",
        "/similarity",
        None,
        Some(json!({ "sessionUUID": session, "teamId": 1, "limit": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_vectorize_persists_an_embedding_for_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;

    let session_a = mint_session(&app, &key).await;
    let session_b = mint_session(&app, &key).await;
    capture(&app, &key, &session_a, "click").await;
    capture(&app, &key, &session_b, "click").await;

    let (status, _) = send(
        &app,
        "POST",
        "/vectorize",
        None,
        Some(json!({ "sessionUUID": session_a, "teamId": 1, "vector": [1.0] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/vectorize",
        None,
        Some(json!({ "sessionUUID": session_b, "teamId": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["vectorStored"], true);

    // Embedding mode: session B is the only candidate with a persisted
    // vector; querying from A vectorizes A on the fly and finds B.
    let (status, body) = send(
        &app,
        "POST",
        "/similarity",
        None,
        Some(json!({ "sessionUUID": session_a, "teamId": 1, "mode": "embedding" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["uuid"], json!(session_b));
}

#[tokio::test]
async fn test_identify_user_links_and_404s() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));
    let key = issue_key(&app, 1).await;

    let (_, body) = send(&app, "GET", "/generate-user-uuid", Some(&key), None).await;
    let user = body["uuid"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/identify-user",
        Some(&key),
        Some(json!({ "userUUID": user, "identifier": "user@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/identify-user",
        Some(&key),
        Some(json!({
            "userUUID": "8a39a0ce-1111-4ef0-9536-usurped00000",
            "identifier": "x",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/identify-user",
        Some(&key),
        Some(json!({
            "userUUID": uuid::Uuid::new_v4().to_string(),
            "identifier": "x",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
