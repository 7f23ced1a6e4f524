//! CareClient flows over a scripted transport.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde_json::json;

use carelink::api::{NewSession, SignIn};
use carelink::auth::{MemoryTokenStore, TokenStore};
use carelink::domain::{Role, SessionStatus};
use carelink::{CareClient, Governor, GovernorError};
use common::{governor_with, test_config, tokens, Reply, ScriptedTransport};

fn session_json(status: &str) -> serde_json::Value {
    json!({
        "id": "s-1",
        "therapist_id": "t-1",
        "client_id": "c-1",
        "scheduled_at": "2026-03-02T09:00:00Z",
        "duration_minutes": 50,
        "status": status,
    })
}

fn profile_json() -> serde_json::Value {
    json!({
        "id": "u-1",
        "email": "ada@example.com",
        "full_name": "Ada Lovelace",
        "role": "individual",
    })
}

fn client(transport: Arc<ScriptedTransport>) -> (CareClient, Arc<MemoryTokenStore>) {
    let (governor, store) = governor_with(&test_config(), transport);
    (CareClient::new(governor), store)
}

#[tokio::test]
async fn test_sign_in_stores_tokens() {
    let transport = ScriptedTransport::new(Reply::Json(200, profile_json()));
    transport.push(Reply::Json(
        200,
        json!({
            "user": profile_json(),
            "access_token": "access-1",
            "refresh_token": "refresh-1",
        }),
    ));
    let (client, store) = client(transport.clone());

    let session = client
        .sign_in(&SignIn {
            email: "ada@example.com".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap();

    assert_eq!(session.user.role, Role::Individual);
    assert_eq!(store.load(), Some(tokens()));
    assert!(client.is_signed_in());

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/auth/signin");
    assert_eq!(requests[0].bearer, None);
    assert_eq!(
        requests[0].body,
        Some(json!({ "email": "ada@example.com", "password": "correct horse" }))
    );

    // Later calls carry the new access token.
    let profile = client.profile(None).await.unwrap();
    assert_eq!(profile.full_name, "Ada Lovelace");
    let requests = transport.requests();
    assert_eq!(requests[1].path, "/profiles/me");
    assert_eq!(requests[1].bearer.as_deref(), Some("access-1"));
}

#[tokio::test]
async fn test_invalid_credentials_never_reach_network() {
    let transport = ScriptedTransport::new(Reply::Json(200, json!({})));
    let (client, _) = client(transport.clone());

    let err = client
        .sign_in(&SignIn {
            email: "not-an-email".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GovernorError::InvalidRequest(_)));

    let err = client
        .sign_in(&SignIn {
            email: "ada@example.com".into(),
            password: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GovernorError::InvalidRequest(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_refresh_requires_stored_tokens() {
    let transport = ScriptedTransport::new(Reply::Json(
        200,
        json!({ "access_token": "access-2", "refresh_token": "refresh-2" }),
    ));
    let (client, store) = client(transport.clone());

    assert_eq!(client.refresh().await.unwrap_err(), GovernorError::AuthRequired);
    assert_eq!(transport.calls(), 0);

    store.store(&tokens()).unwrap();
    let refreshed = client.refresh().await.unwrap();
    assert_eq!(refreshed.access_token, "access-2");
    assert_eq!(store.load(), Some(refreshed));

    let request = &transport.requests()[0];
    assert_eq!(request.path, "/auth/refresh");
    assert_eq!(request.body, Some(json!({ "refresh_token": "refresh-1" })));
}

#[tokio::test]
async fn test_sign_out_clears_tokens_even_when_server_fails() {
    let transport = ScriptedTransport::new(Reply::Json(503, json!({ "message": "maintenance" })));
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens()));
    let governor = Governor::new(&test_config(), transport.clone(), store.clone() as Arc<dyn TokenStore>);
    let client = CareClient::new(governor);

    client.sign_out().await.unwrap();
    assert!(store.load().is_none());
    assert_eq!(transport.calls_to("/auth/signout"), 1);

    // Signed out already: nothing to tell the server.
    client.sign_out().await.unwrap();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_illegal_transition_rejected_locally() {
    let transport = ScriptedTransport::new(Reply::Json(200, session_json("completed")));
    let (client, _) = client(transport.clone());

    let err = client.cancel_session("s-1").await.unwrap_err();
    assert!(matches!(err, GovernorError::InvalidRequest(_)));

    // Only the read happened; no PATCH was sent.
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].path, "/sessions/s-1");
}

#[tokio::test]
async fn test_cancel_session_patches_status() {
    let transport = ScriptedTransport::new(Reply::Json(200, session_json("cancelled")));
    transport.push(Reply::Json(200, session_json("scheduled")));
    let (client, _) = client(transport.clone());

    let updated = client.cancel_session("s-1").await.unwrap();
    assert_eq!(updated.status, SessionStatus::Cancelled);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, Method::PATCH);
    assert_eq!(requests[1].path, "/sessions/s-1");
    assert_eq!(requests[1].body, Some(json!({ "status": "cancelled" })));
}

#[tokio::test]
async fn test_status_update_reads_fresh_state() {
    let transport = ScriptedTransport::new(Reply::Json(200, session_json("completed")));
    transport.push(Reply::Json(200, session_json("scheduled")));
    let (client, _) = client(transport.clone());

    // Warm the cache with a scheduled session.
    client.session("s-1").await.unwrap();

    // The backend has since completed it; the stale cache must not be trusted.
    let err = client.complete_session("s-1").await.unwrap_err();
    assert!(matches!(err, GovernorError::InvalidRequest(_)));
    assert_eq!(transport.calls_to("/sessions/s-1"), 2);
}

#[tokio::test]
async fn test_book_session_surfaces_conflict() {
    let transport = ScriptedTransport::new(Reply::Json(
        409,
        json!({ "message": "therapist already booked", "details": { "session_id": "s-0" } }),
    ));
    let (client, _) = client(transport.clone());

    let request = NewSession {
        therapist_id: "t-1".into(),
        scheduled_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        duration_minutes: 50,
        notes: None,
    };
    match client.book_session(&request).await {
        Err(GovernorError::Http { status, details, .. }) => {
            assert_eq!(status.as_u16(), 409);
            assert_eq!(details, Some(json!({ "session_id": "s-0" })));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let zero = NewSession {
        duration_minutes: 0,
        ..request
    };
    assert!(matches!(
        client.book_session(&zero).await,
        Err(GovernorError::InvalidRequest(_))
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let transport = ScriptedTransport::new(Reply::Json(200, json!({ "unexpected": true })));
    let (client, _) = client(transport);

    assert!(matches!(
        client.sessions().await,
        Err(GovernorError::Decode(_))
    ));
}
