//! Provider callback endpoint for ongoing calls.

use crate::error::AppError;
use crate::events;
use crate::AppState;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::sync::Arc;
use switchboard_types::EventEnvelope;
use uuid::Uuid;

/// `POST /communication/callback/{session_id}/{secret}`
///
/// Body is a JSON array of event envelopes, possibly for different moments
/// of the same call. The bearer token is checked once per request; the URL
/// secret is checked per envelope on load. Envelopes dispatch concurrently
/// with no ordering guarantee and join before the response.
///
/// Returns 204 on success, 401 on a bad token or secret, 404 for an unknown
/// session, and a validation envelope when the body is not a list of
/// envelopes.
pub async fn callback_post(
    Extension(state): Extension<Arc<AppState>>,
    Path((session_id, secret)): Path<(Uuid, String)>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, AppError> {
    state.token_validator.validate_bearer(&headers).await?;

    let Some(entries) = body.as_array() else {
        return Err(AppError::Validation(vec![
            "Events must be a list".to_string()
        ]));
    };

    // Decode the whole batch before dispatching any of it, so a malformed
    // envelope rejects the request instead of half-applying it.
    let mut envelopes = Vec::with_capacity(entries.len());
    let mut violations = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<EventEnvelope>(entry.clone()) {
            Ok(envelope) => envelopes.push(envelope),
            Err(e) => violations.push(format!("event {index}: {e}")),
        }
    }
    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }

    let results = futures_util::future::join_all(
        envelopes
            .into_iter()
            .map(|envelope| events::dispatch_event(&state, session_id, &secret, envelope)),
    )
    .await;

    for result in results {
        result?;
    }

    Ok(StatusCode::NO_CONTENT)
}
