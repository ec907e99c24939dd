//! Provider-event state machine for ongoing calls.
//!
//! Each authorized callback envelope is decoded once into a closed
//! [`CallEventKind`] and dispatched to its handler. Whatever the handler
//! touched, the session is persisted exactly once per envelope. Envelopes
//! within one request body dispatch concurrently with no ordering
//! guarantee; two envelopes for the same session race on persistence and
//! the last write wins.

use crate::dialogue::DialogueError;
use crate::error::AppError;
use crate::telephony::CallControlError;
use crate::AppState;
use std::collections::HashSet;
use switchboard_types::{EventData, EventEnvelope, Message, MessageAction, Persona, Session};
use uuid::Uuid;

/// The fixed set of provider event kinds this gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEventKind {
    Connected,
    Disconnected,
    RecognizeCompleted,
    RecognizeFailed,
    PlayCompleted,
    PlayFailed,
    TransferAccepted,
    TransferFailed,
    /// Forward-compatibility catch-all: logged, never fatal.
    Unrecognized,
}

impl CallEventKind {
    /// Decodes the wire `type` string. Unknown strings map to
    /// [`CallEventKind::Unrecognized`].
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Microsoft.Communication.CallConnected" => Self::Connected,
            "Microsoft.Communication.CallDisconnected" => Self::Disconnected,
            "Microsoft.Communication.RecognizeCompleted" => Self::RecognizeCompleted,
            "Microsoft.Communication.RecognizeFailed" => Self::RecognizeFailed,
            "Microsoft.Communication.PlayCompleted" => Self::PlayCompleted,
            "Microsoft.Communication.PlayFailed" => Self::PlayFailed,
            "Microsoft.Communication.CallTransferAccepted" => Self::TransferAccepted,
            "Microsoft.Communication.CallTransferFailed" => Self::TransferFailed,
            _ => Self::Unrecognized,
        }
    }
}

/// Operation contexts attached to play/recognize actions, echoed back by the
/// provider in completion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamContext {
    ConnectAgent,
    Goodbye,
    IvrLangSelect,
    TransferFailed,
}

impl StreamContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectAgent => "connect_agent",
            Self::Goodbye => "goodbye",
            Self::IvrLangSelect => "ivr_lang_select",
            Self::TransferFailed => "transfer_failed",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "connect_agent" => Some(Self::ConnectAgent),
            "goodbye" => Some(Self::Goodbye),
            "ivr_lang_select" => Some(Self::IvrLangSelect),
            "transfer_failed" => Some(Self::TransferFailed),
            _ => None,
        }
    }
}

/// Parses the `operationContext` field: a JSON-encoded array of context
/// strings. Unknown entries are skipped with a warning; anything unparseable
/// yields the empty set.
pub fn parse_contexts(value: Option<&str>) -> HashSet<StreamContext> {
    let Some(value) = value else {
        return HashSet::new();
    };
    let Ok(entries) = serde_json::from_str::<Vec<String>>(value) else {
        return HashSet::new();
    };
    let mut contexts = HashSet::new();
    for entry in entries {
        match StreamContext::from_str(&entry) {
            Some(context) => {
                contexts.insert(context);
            }
            None => tracing::warn!(context = %entry, "unknown operation context, skipping"),
        }
    }
    contexts
}

/// Authorizes and dispatches one callback envelope, then persists the
/// session.
///
/// The connection id carried by every event is recorded before dispatch, so
/// even an otherwise-ignored event keeps the session's provider linkage
/// fresh. The persist happens regardless of how many fields the handler
/// changed.
pub async fn dispatch_event(
    state: &AppState,
    session_id: Uuid,
    secret: &str,
    envelope: EventEnvelope,
) -> Result<(), AppError> {
    let mut session = crate::auth::validate_session(state, session_id, secret).await?;

    if let Some(connection_id) = envelope.data.call_connection_id.clone() {
        session.connection_id = Some(connection_id);
    }

    let kind = CallEventKind::from_wire(&envelope.kind);
    tracing::debug!(session_id = %session.id, kind = ?kind, "call event received");

    let outcome = run_handler(state, &mut session, kind, &envelope).await;

    persist_session(state, &session).await?;
    outcome
}

async fn run_handler(
    state: &AppState,
    session: &mut Session,
    kind: CallEventKind,
    envelope: &EventEnvelope,
) -> Result<(), AppError> {
    let data = &envelope.data;
    let sub_code = data.result_information.as_ref().and_then(|i| i.sub_code);

    match kind {
        CallEventKind::Connected => on_connected(state, session, data).await,
        CallEventKind::Disconnected => on_disconnected(state, session).await,
        CallEventKind::RecognizeCompleted => on_recognize_completed(state, session, data).await,
        CallEventKind::RecognizeFailed => {
            if let Some(info) = &data.result_information {
                tracing::debug!(
                    session_id = %session.id,
                    sub_code = info.sub_code,
                    message = info.message.as_deref(),
                    "recognition failed"
                );
            }
            state
                .dialogue
                .recognize_failed(session, state.call_control.as_ref(), sub_code)
                .await
                .map_err(dialogue_err)
        }
        CallEventKind::PlayCompleted => {
            let contexts = parse_contexts(data.operation_context.as_deref());
            on_play_completed(state, session, &contexts).await
        }
        CallEventKind::PlayFailed => on_play_failed(state, session, sub_code).await,
        CallEventKind::TransferAccepted => {
            tracing::info!(session_id = %session.id, "call transfer accepted");
            Ok(())
        }
        CallEventKind::TransferFailed => {
            tracing::info!(session_id = %session.id, sub_code, "call transfer failed");
            state
                .dialogue
                .transfer_failed(session, state.call_control.as_ref(), sub_code)
                .await
                .map_err(dialogue_err)
        }
        CallEventKind::Unrecognized => {
            tracing::warn!(kind = %envelope.kind, "event not supported");
            Ok(())
        }
    }
}

async fn on_connected(
    state: &AppState,
    session: &mut Session,
    data: &EventData,
) -> Result<(), AppError> {
    tracing::info!(
        session_id = %session.id,
        server_call_id = data.server_call_id.as_deref(),
        "call connected"
    );
    session.recognition_retry = 0;
    session.in_progress = true;
    session
        .messages
        .push(Message::new(Persona::Human, MessageAction::Call, ""));

    if let Some(connection_id) = session.connection_id.clone() {
        state
            .call_control
            .start_media_streaming(&connection_id)
            .await
            .map_err(provider_err)?;
    }
    Ok(())
}

async fn on_disconnected(state: &AppState, session: &mut Session) -> Result<(), AppError> {
    tracing::info!(session_id = %session.id, "call disconnected");
    finalize_call(state, session).await;
    Ok(())
}

async fn on_recognize_completed(
    state: &AppState,
    session: &mut Session,
    data: &EventData,
) -> Result<(), AppError> {
    match data.recognition_type.as_deref() {
        Some("choices") => {
            let label = data
                .choice_result
                .as_ref()
                .and_then(|choice| choice.label.clone())
                .unwrap_or_default();
            state
                .dialogue
                .ivr_selected(session, state.call_control.as_ref(), &label)
                .await
                .map_err(dialogue_err)
        }
        other => {
            tracing::debug!(recognition_type = other, "recognition result ignored");
            Ok(())
        }
    }
}

async fn on_play_completed(
    state: &AppState,
    session: &mut Session,
    contexts: &HashSet<StreamContext>,
) -> Result<(), AppError> {
    tracing::debug!(session_id = %session.id, "play completed");

    if contexts.contains(&StreamContext::Goodbye)
        || contexts.contains(&StreamContext::TransferFailed)
    {
        tracing::info!(session_id = %session.id, "ending call");
        finalize_call(state, session).await;
        return Ok(());
    }

    if contexts.contains(&StreamContext::ConnectAgent) {
        match (
            session.initiate.agent_phone_number.clone(),
            session.connection_id.clone(),
        ) {
            (Some(target), Some(connection_id)) => {
                tracing::info!(session_id = %session.id, "initiating call transfer");
                state
                    .call_control
                    .transfer(&connection_id, &target)
                    .await
                    .map_err(provider_err)?;
            }
            _ => {
                tracing::warn!(
                    session_id = %session.id,
                    "transfer requested without an agent number or connection"
                );
            }
        }
    }
    Ok(())
}

async fn on_play_failed(
    state: &AppState,
    session: &mut Session,
    sub_code: Option<i64>,
) -> Result<(), AppError> {
    match sub_code {
        Some(8535) => tracing::warn!("playback failed, file format is invalid"),
        Some(8536) => tracing::warn!("playback failed, file could not be downloaded"),
        Some(8565) => tracing::error!("playback failed, cannot reach the speech service"),
        code => tracing::warn!(code, "playback failed"),
    }
    state
        .dialogue
        .play_failed(session, sub_code)
        .await
        .map_err(dialogue_err)
}

/// Shared end-of-call path: close the transcript, hang up if a connection is
/// still known, and enqueue the post-processing job.
async fn finalize_call(state: &AppState, session: &mut Session) {
    session.in_progress = false;
    session
        .messages
        .push(Message::new(Persona::Human, MessageAction::Hangup, ""));

    if let Some(connection_id) = session.connection_id.clone() {
        if let Err(e) = state.call_control.hangup(&connection_id).await {
            // The remote side usually hung up first; nothing to act on.
            tracing::debug!(session_id = %session.id, "hangup returned: {}", e);
        }
    }

    if let Err(e) = state.queues.post.send(session.id.to_string()).await {
        tracing::warn!(session_id = %session.id, "failed to enqueue post-processing: {}", e);
    }
}

pub(crate) async fn persist_session(state: &AppState, session: &Session) -> Result<(), AppError> {
    let to_store = session.clone();
    crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_upsert(conn, &to_store)
    })
    .await
}

fn provider_err(e: CallControlError) -> AppError {
    AppError::Transient(e.to_string())
}

fn dialogue_err(e: DialogueError) -> AppError {
    match e {
        DialogueError::Provider(p) => AppError::Transient(p.to_string()),
        DialogueError::Other(message) => AppError::Internal(message),
    }
}
