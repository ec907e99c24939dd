//! REST API for sessions: list, fetch, and outbound call initiation.

use crate::error::AppError;
use crate::registry;
use crate::AppState;
use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use switchboard_types::{InitiateConfig, SessionView};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub phone_number: Option<String>,
}

/// `GET /call?phone_number=...` — all sessions for a phone number, newest
/// first.
pub async fn call_list_get(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    let Some(phone_number) = params.phone_number else {
        return Err(AppError::Validation(vec![
            "phone_number query parameter is required".to_string(),
        ]));
    };

    let phone = phone_number.clone();
    let sessions = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_search_all(conn, &phone)
    })
    .await?;

    if sessions.is_empty() {
        return Err(AppError::NotFound(format!(
            "No sessions for {phone_number}"
        )));
    }
    Ok(Json(sessions.into_iter().map(SessionView::from).collect()))
}

/// `GET /call/{call_id_or_phone_number}` — fetch one session, by id first,
/// then by phone-number lookup.
pub async fn call_get(
    Extension(state): Extension<Arc<AppState>>,
    Path(id_or_phone): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    if let Ok(id) = Uuid::parse_str(&id_or_phone) {
        let found =
            crate::with_conn(&state.pool, move |conn| switchboard_db::session_get(conn, id))
                .await?;
        if let Some(session) = found {
            return Ok(Json(session.into()));
        }
    }

    let window = state.config.conversation.timeout_hours;
    let phone = id_or_phone.clone();
    let session = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_search_one(conn, &phone, window)
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Session {id_or_phone} not found")))?;

    Ok(Json(session.into()))
}

/// `POST /call` — initiate an outbound call.
///
/// Body is an [`InitiateConfig`]. Resolves or creates the session, then
/// asks the provider to place the call with the session's callback and
/// stream URLs. Returns 201 with the session view.
pub async fn call_post(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let initiate: InitiateConfig = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(vec![e.to_string()]))?;
    if initiate.phone_number.is_empty() {
        return Err(AppError::Validation(vec![
            "phone_number must not be empty".to_string(),
        ]));
    }

    let phone_number = initiate.phone_number.clone();
    let resolved = registry::resolve_or_create(&state, &phone_number, Some(initiate)).await?;

    let connection_id = state
        .call_control
        .create_call(
            resolved.session.phone_number(),
            &resolved.callback_url,
            &resolved.stream_url,
        )
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;

    tracing::info!(
        session_id = %resolved.session.id,
        %phone_number,
        %connection_id,
        "outbound call created"
    );

    Ok((StatusCode::CREATED, Json(resolved.session.into())))
}
