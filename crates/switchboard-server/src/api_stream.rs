//! Realtime duplex audio bridge.
//!
//! The provider opens a WebSocket to
//! `/communication/stream/{session_id}/{secret}` when media streaming starts
//! on a call. After the secret check, two activities run for the stream's
//! lifetime: the receive loop, which filters and decodes audio frames into a
//! bounded byte channel, and the audio-pipeline collaborator consuming that
//! channel. Whichever finishes first cancels the other and closes the
//! stream.

use crate::auth;
use crate::dialogue::AudioFormat;
use crate::AppState;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use switchboard_types::{Session, StreamFrame, AUDIO_DATA_KIND};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of the audio byte channel. Bounded so a stalled pipeline
/// back-pressures the receive loop instead of growing memory.
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// `GET /communication/stream/{session_id}/{secret}` — WebSocket upgrade.
///
/// The secret is validated before the upgrade is accepted; a bad secret or
/// unknown session never reaches the socket layer.
pub async fn stream_ws(
    Extension(state): Extension<Arc<AppState>>,
    Path((session_id, secret)): Path<(Uuid, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    let session = match auth::validate_session(&state, session_id, &secret).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_stream(socket, state, session))
}

async fn handle_stream(mut socket: WebSocket, state: Arc<AppState>, session: Session) {
    tracing::info!(session_id = %session.id, "audio stream established");

    let (tx, rx) = mpsc::channel::<Vec<u8>>(AUDIO_CHANNEL_CAPACITY);

    // The sender lives inside the receive future: when either side of the
    // select finishes, dropping the future drops the sender, the channel
    // closes, and the pipeline sees end-of-stream.
    let receive = async move {
        while let Some(message) = socket.recv().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("audio stream read error: {}", e);
                    break;
                }
            };
            match message {
                WsMessage::Text(text) => {
                    if let Some(bytes) = decode_audio_frame(text.as_str()) {
                        if tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    };

    let pipeline = state
        .audio_pipeline
        .process(&session, AudioFormat::default(), rx);

    tokio::select! {
        () = receive => {
            tracing::debug!(session_id = %session.id, "audio stream closed by peer");
        }
        result = pipeline => {
            if let Err(e) = result {
                tracing::warn!(session_id = %session.id, "audio pipeline failed: {}", e);
            }
        }
    }

    tracing::info!(session_id = %session.id, "audio stream finished");
}

/// Extracts the PCM bytes from one stream frame.
///
/// Frames that are not audio, are marked silent, or carry no payload yield
/// `None` and are dropped without error.
fn decode_audio_frame(text: &str) -> Option<Vec<u8>> {
    let frame: StreamFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("dropping unparseable stream frame: {}", e);
            return None;
        }
    };
    if frame.kind.as_deref() != Some(AUDIO_DATA_KIND) {
        return None;
    }
    let payload = frame.audio_data?;
    if payload.silent {
        return None;
    }
    let data = payload.data?;
    match BASE64.decode(data.as_bytes()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!("dropping undecodable audio frame: {}", e);
            None
        }
    }
}
