//! Callback endpoint behavior: authorization, batch dispatch, persistence.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{build_state, Action, RecordingCallControl, RecordingDialogue};
use std::sync::Arc;
use switchboard_db::{session_get, session_upsert};
use switchboard_server::{app, AppState};
use switchboard_types::{InitiateConfig, Session};
use tower::ServiceExt;
use uuid::Uuid;

fn initiate(phone: &str) -> InitiateConfig {
    InitiateConfig {
        phone_number: phone.to_string(),
        bot_name: "Ava".to_string(),
        bot_company: "Contoso".to_string(),
        lang: "en-US".to_string(),
        agent_phone_number: Some("+15550009999".to_string()),
    }
}

fn seed_session(state: &AppState) -> Session {
    let session = Session::new(initiate("+15551234567"));
    let conn = state.pool.get().expect("conn");
    session_upsert(&conn, &session).expect("seed session");
    session
}

fn callback_request(session: &Session, secret: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!(
            "/communication/callback/{}/{}",
            session.id, secret
        ))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

#[tokio::test]
async fn batch_applies_each_event_and_persists_per_event() {
    let call_control = Arc::new(RecordingCallControl::default());
    let dialogue = Arc::new(RecordingDialogue::default());
    let state = build_state(call_control.clone(), dialogue.clone(), false);
    let session = seed_session(&state);

    // Count persists with a trigger: INSERT OR REPLACE fires the insert
    // trigger once per write.
    {
        let conn = state.pool.get().expect("conn");
        conn.execute_batch(
            "CREATE TABLE persist_log (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE TRIGGER count_session_writes AFTER INSERT ON sessions
             BEGIN INSERT INTO persist_log (id) VALUES (NULL); END;",
        )
        .expect("trigger setup");
    }

    let body = r#"[
        {"type": "Microsoft.Communication.CallConnected",
         "data": {"callConnectionId": "conn-1", "serverCallId": "srv-1"}},
        {"type": "Microsoft.Communication.PlayFailed",
         "data": {"callConnectionId": "conn-1",
                  "resultInformation": {"subCode": 8535, "message": "bad format"}}}
    ]"#;

    let response = app(state.clone())
        .oneshot(callback_request(&session, &session.callback_secret, body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Both events applied to the session
    let conn = state.pool.get().expect("conn");
    let stored = session_get(&conn, session.id)
        .expect("get should succeed")
        .expect("session should exist");
    assert_eq!(stored.connection_id.as_deref(), Some("conn-1"));

    // The connected handler started media streaming
    assert!(call_control.recorded().contains(&Action::StartMediaStreaming {
        connection_id: "conn-1".to_string()
    }));

    // The play-failed handler reached the dialogue collaborator
    assert!(dialogue
        .recorded()
        .contains(&"play_failed:Some(8535)".to_string()));

    // Persisted exactly once per event, never batched
    let persists: i64 = conn
        .query_row("SELECT COUNT(*) FROM persist_log", [], |row| row.get(0))
        .expect("count persists");
    assert_eq!(persists, 2);
}

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let session = seed_session(&state);

    let body = r#"[{"type": "Microsoft.Communication.CallConnected", "data": {"callConnectionId": "c"}}]"#;
    let response = app(state.clone())
        .oneshot(callback_request(&session, "0000000000000000", body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("error envelope");
    assert_eq!(json["error"]["message"], "Secret does not match");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );

    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/communication/callback/{}/abcdefgh12345678",
            Uuid::new_v4()
        ))
        .header("content-type", "application/json")
        .body(Body::from(
            r#"[{"type": "Microsoft.Communication.CallConnected", "data": {}}]"#,
        ))
        .expect("request should build");

    let response = app(state)
        .oneshot(request)
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_array_body_is_a_validation_error() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let session = seed_session(&state);

    let response = app(state.clone())
        .oneshot(callback_request(
            &session,
            &session.callback_secret,
            r#"{"type": "Microsoft.Communication.CallConnected"}"#,
        ))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("error envelope");
    assert_eq!(json["error"]["details"][0], "Events must be a list");
}

#[tokio::test]
async fn missing_bearer_token_is_unauthorized_when_validation_is_on() {
    let state = build_state(
        Arc::new(RecordingCallControl::default()),
        Arc::new(RecordingDialogue::default()),
        true,
    );
    let session = seed_session(&state);

    let body = r#"[{"type": "Microsoft.Communication.CallConnected", "data": {}}]"#;
    let response = app(state.clone())
        .oneshot(callback_request(&session, &session.callback_secret, body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unrecognized_event_kind_is_not_fatal() {
    let call_control = Arc::new(RecordingCallControl::default());
    let state = build_state(
        call_control.clone(),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let session = seed_session(&state);

    let body = r#"[{"type": "Vendor.Future.EventKind", "data": {"callConnectionId": "conn-7"}}]"#;
    let response = app(state.clone())
        .oneshot(callback_request(&session, &session.callback_secret, body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Connection id is still recorded even for ignored kinds
    let conn = state.pool.get().expect("conn");
    let stored = session_get(&conn, session.id)
        .expect("get should succeed")
        .expect("session should exist");
    assert_eq!(stored.connection_id.as_deref(), Some("conn-7"));
    assert!(call_control.recorded().is_empty());
}

#[tokio::test]
async fn goodbye_play_completion_ends_the_call_and_enqueues_post() {
    let call_control = Arc::new(RecordingCallControl::default());
    let state = build_state(
        call_control.clone(),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let mut session = Session::new(initiate("+15551234567"));
    session.connection_id = Some("conn-1".to_string());
    {
        let conn = state.pool.get().expect("conn");
        session_upsert(&conn, &session).expect("seed session");
    }

    let body = r#"[{"type": "Microsoft.Communication.PlayCompleted",
                    "data": {"callConnectionId": "conn-1",
                             "operationContext": "[\"goodbye\"]"}}]"#;
    let response = app(state.clone())
        .oneshot(callback_request(&session, &session.callback_secret, body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let conn = state.pool.get().expect("conn");
    let stored = session_get(&conn, session.id)
        .expect("get should succeed")
        .expect("session should exist");
    assert!(!stored.in_progress, "call should be closed");

    assert!(call_control.recorded().contains(&Action::Hangup {
        connection_id: "conn-1".to_string()
    }));

    // Post-processing job carries the bare session id
    let queued = state
        .queues
        .post
        .receive()
        .await
        .expect("post job should be enqueued");
    assert_eq!(queued.content, session.id.to_string());
}

#[tokio::test]
async fn connect_agent_play_completion_transfers_the_call() {
    let call_control = Arc::new(RecordingCallControl::default());
    let state = build_state(
        call_control.clone(),
        Arc::new(RecordingDialogue::default()),
        false,
    );
    let mut session = Session::new(initiate("+15551234567"));
    session.connection_id = Some("conn-1".to_string());
    {
        let conn = state.pool.get().expect("conn");
        session_upsert(&conn, &session).expect("seed session");
    }

    let body = r#"[{"type": "Microsoft.Communication.PlayCompleted",
                    "data": {"callConnectionId": "conn-1",
                             "operationContext": "[\"connect_agent\"]"}}]"#;
    let response = app(state.clone())
        .oneshot(callback_request(&session, &session.callback_secret, body))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(call_control.recorded().contains(&Action::Transfer {
        connection_id: "conn-1".to_string(),
        target: "+15550009999".to_string()
    }));
}
