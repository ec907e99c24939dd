//! Queue dispatch workers.
//!
//! Three long-running consumers — new-call intake, SMS intake, and
//! post-call processing — each bound to one named channel. Every iteration
//! fetches one message and invokes its handler; a handler failure is logged
//! and the loop continues, since redelivery and backoff belong to the queue
//! transport. Handlers are safe to run more than once for the same logical
//! event.
//!
//! Workers start at process init and observe a shutdown watch: when it
//! flips, the current iteration finishes (or is abandoned at the receive
//! point) and the loop exits. In-flight side effects may be partially
//! applied across a restart; the at-least-once contract covers the rest.

use crate::error::AppError;
use crate::events;
use crate::registry;
use crate::AppState;
use std::sync::Arc;
use switchboard_types::{
    GridEnvelope, IncomingCallData, Message, MessageAction, Persona, SmsReceivedData,
    INCOMING_CALL_EVENT, SMS_RECEIVED_EVENT,
};
use tokio::sync::watch;
use uuid::Uuid;

/// New-call intake loop.
pub async fn run_call_worker(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(queue = state.queues.call.name(), "call intake worker started");
    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = state.queues.call.receive() => message,
        };
        let Some(message) = message else {
            tracing::warn!("call queue closed, stopping worker");
            break;
        };
        if let Err(e) = handle_call_message(&state, &message.content).await {
            tracing::warn!("call intake handler failed: {}", e);
        }
    }
    tracing::info!("call intake worker stopped");
}

/// SMS intake loop.
pub async fn run_sms_worker(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(queue = state.queues.sms.name(), "sms intake worker started");
    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = state.queues.sms.receive() => message,
        };
        let Some(message) = message else {
            tracing::warn!("sms queue closed, stopping worker");
            break;
        };
        if let Err(e) = handle_sms_message(&state, &message.content).await {
            tracing::warn!("sms intake handler failed: {}", e);
        }
    }
    tracing::info!("sms intake worker stopped");
}

/// Post-call processing loop.
pub async fn run_post_worker(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(queue = state.queues.post.name(), "post-processing worker started");
    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = state.queues.post.receive() => message,
        };
        let Some(message) = message else {
            tracing::warn!("post queue closed, stopping worker");
            break;
        };
        if let Err(e) = handle_post_message(&state, &message.content).await {
            tracing::warn!("post-processing handler failed: {}", e);
        }
    }
    tracing::info!("post-processing worker stopped");
}

/// Handles one new-call notification.
///
/// Only the designated incoming-call event type proceeds; everything else is
/// logged and dropped. Resolves or creates the session, then answers the
/// call with the session's callback and stream URLs.
pub async fn handle_call_message(state: &AppState, content: &str) -> Result<(), AppError> {
    let envelope: GridEnvelope = serde_json::from_str(content)
        .map_err(|e| AppError::Validation(vec![format!("invalid queue payload: {e}")]))?;

    if envelope.event_type != INCOMING_CALL_EVENT {
        tracing::warn!(event_type = %envelope.event_type, "event not supported");
        return Ok(());
    }

    let data: IncomingCallData = serde_json::from_value(envelope.data)
        .map_err(|e| AppError::Validation(vec![format!("invalid incoming-call payload: {e}")]))?;
    let phone_number = data.from.phone_number.value;

    let resolved = registry::resolve_or_create(state, &phone_number, None).await?;
    let connection_id = state
        .call_control
        .answer_call(
            &data.incoming_call_context,
            &resolved.callback_url,
            &resolved.stream_url,
        )
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;

    tracing::info!(
        session_id = %resolved.session.id,
        %phone_number,
        %connection_id,
        "answered call"
    );
    Ok(())
}

/// Handles one inbound-SMS notification.
///
/// An SMS from a number with no recent session is logged and dropped — no
/// session is created for an SMS without a prior call.
pub async fn handle_sms_message(state: &AppState, content: &str) -> Result<(), AppError> {
    let envelope: GridEnvelope = serde_json::from_str(content)
        .map_err(|e| AppError::Validation(vec![format!("invalid queue payload: {e}")]))?;

    if envelope.event_type != SMS_RECEIVED_EVENT {
        tracing::warn!(event_type = %envelope.event_type, "event not supported");
        return Ok(());
    }

    let data: SmsReceivedData = serde_json::from_value(envelope.data)
        .map_err(|e| AppError::Validation(vec![format!("invalid sms payload: {e}")]))?;

    let window = state.config.conversation.timeout_hours;
    let phone = data.from.clone();
    let session = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_search_one(conn, &phone, window)
    })
    .await?;

    let Some(mut session) = session else {
        tracing::warn!(phone_number = %data.from, "no session for inbound sms");
        return Ok(());
    };

    session.messages.push(Message::new(
        Persona::Human,
        MessageAction::Sms,
        data.message.clone(),
    ));

    if let Err(e) = state
        .dialogue
        .sms_received(&mut session, state.call_control.as_ref(), &data.message)
        .await
    {
        tracing::warn!(session_id = %session.id, "sms dialogue handler failed: {}", e);
    }

    events::persist_session(state, &session).await
}

/// Handles one post-call processing request: a bare session id.
pub async fn handle_post_message(state: &AppState, content: &str) -> Result<(), AppError> {
    let session_id = Uuid::parse_str(content.trim())
        .map_err(|e| AppError::Validation(vec![format!("invalid session id: {e}")]))?;

    let session = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_get(conn, session_id)
    })
    .await?;

    let Some(session) = session else {
        tracing::warn!(session_id = %session_id, "session not found for post-processing");
        return Ok(());
    };

    tracing::debug!(session_id = %session.id, "post-processing session");
    state
        .dialogue
        .session_ended(&session)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
