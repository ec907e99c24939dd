//! REST surface: outbound call initiation and session retrieval.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{build_state, Action, RecordingCallControl, RecordingDialogue};
use std::sync::Arc;
use switchboard_db::session_upsert;
use switchboard_server::app;
use switchboard_types::{InitiateConfig, Session};
use tower::ServiceExt;

fn initiate(phone: &str) -> InitiateConfig {
    InitiateConfig {
        phone_number: phone.to_string(),
        bot_name: "Ava".to_string(),
        bot_company: "Contoso".to_string(),
        lang: "en-US".to_string(),
        agent_phone_number: None,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn outbound_call_creates_session_and_places_the_call() {
    let call_control = Arc::new(RecordingCallControl::default());
    let state = build_state(
        call_control.clone(),
        Arc::new(RecordingDialogue::default()),
        false,
    );

    let body = serde_json::to_string(&initiate("+15558881111")).expect("body");
    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/call")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["initiate"]["phone_number"], "+15558881111");
    assert!(
        json.get("callback_secret").is_none(),
        "the secret never leaves the server"
    );

    let actions = call_control.recorded();
    assert_eq!(actions.len(), 1);
    assert!(matches!(
        &actions[0],
        Action::CreateCall { phone_number, .. } if phone_number == "+15558881111"
    ));
}

#[tokio::test]
async fn malformed_initiate_body_is_a_validation_error() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/call")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"bot_name": "Ava"}"#))
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "Validation error");
    assert!(json["error"]["details"]
        .as_array()
        .is_some_and(|details| !details.is_empty()));
}

#[tokio::test]
async fn session_is_fetchable_by_id_and_by_phone_number() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let session = Session::new(initiate("+15551234567"));
    {
        let conn = state.pool.get().expect("conn");
        session_upsert(&conn, &session).expect("seed session");
    }

    let by_id = app(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/call/{}", session.id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(by_id.status(), StatusCode::OK);
    assert_eq!(body_json(by_id).await["id"], session.id.to_string());

    let by_phone = app(state.clone())
        .oneshot(
            Request::builder()
                .uri("/call/+15551234567")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(by_phone.status(), StatusCode::OK);
    assert_eq!(body_json(by_phone).await["id"], session.id.to_string());
}

#[tokio::test]
async fn unknown_session_returns_not_found_envelope() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/call/+15550001111")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json["error"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("not found")));
}

#[tokio::test]
async fn list_requires_a_phone_number() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/call")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_returns_sessions_newest_first() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    {
        let conn = state.pool.get().expect("conn");
        let mut older = Session::new(initiate("+15551234567"));
        older.created_at = chrono::Utc::now() - chrono::Duration::hours(5);
        session_upsert(&conn, &older).expect("seed older");
        session_upsert(&conn, &Session::new(initiate("+15551234567"))).expect("seed newer");
    }

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/call?phone_number=%2B15551234567")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let list = json.as_array().expect("list body");
    assert_eq!(list.len(), 2);
}
