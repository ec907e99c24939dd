//! Dialogue and speech-pipeline collaborator seams.
//!
//! What the bot *says* is not this crate's business. The event state machine
//! and the workers route domain signals (IVR labels, recognition failures,
//! playback errors, inbound SMS text, end-of-call) to a [`Dialogue`]
//! implementation, and the realtime audio bridge hands raw PCM to an
//! [`AudioPipeline`] implementation. Both are injected at startup; the
//! bundled implementations log and drain so the gateway runs standalone.

use crate::telephony::{CallControl, CallControlError};
use async_trait::async_trait;
use switchboard_types::Session;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a dialogue or pipeline collaborator can surface.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error(transparent)]
    Provider(#[from] CallControlError),

    #[error("dialogue error: {0}")]
    Other(String),
}

/// Fixed audio format parameters handed to the pipeline. Per-connection
/// format negotiation is a future extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub bits_per_sample: u16,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            channels: 1,
            sample_rate: 16_000,
        }
    }
}

/// Conversation decisions, delegated to the embedding deployment.
///
/// Implementations receive a mutable session so they can append transcript
/// messages and adjust turn state; the caller persists afterwards.
#[async_trait]
pub trait Dialogue: Send + Sync {
    /// An IVR choice was recognized.
    async fn ivr_selected(
        &self,
        session: &mut Session,
        client: &dyn CallControl,
        label: &str,
    ) -> Result<(), DialogueError>;

    /// Speech or IVR recognition failed.
    async fn recognize_failed(
        &self,
        session: &mut Session,
        client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError>;

    /// Media playback failed with a provider sub-code.
    async fn play_failed(
        &self,
        session: &mut Session,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError>;

    /// A call transfer failed with a provider sub-code.
    async fn transfer_failed(
        &self,
        session: &mut Session,
        client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError>;

    /// An inbound SMS was matched to this session. The message text has
    /// already been appended to the transcript.
    async fn sms_received(
        &self,
        session: &mut Session,
        client: &dyn CallControl,
        message: &str,
    ) -> Result<(), DialogueError>;

    /// The call has ended and post-processing was requested.
    async fn session_ended(&self, session: &Session) -> Result<(), DialogueError>;
}

/// Consumes the realtime audio of one call.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    /// Runs for the lifetime of the stream, reading PCM chunks until the
    /// channel closes. Returning (or erroring) ends the bridge.
    async fn process(
        &self,
        session: &Session,
        format: AudioFormat,
        audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), DialogueError>;
}

/// Dialogue implementation that logs every signal. Keeps the gateway
/// runnable without an LLM behind it.
pub struct LoggingDialogue;

#[async_trait]
impl Dialogue for LoggingDialogue {
    async fn ivr_selected(
        &self,
        session: &mut Session,
        _client: &dyn CallControl,
        label: &str,
    ) -> Result<(), DialogueError> {
        session.recognition_retry = 0;
        tracing::info!(session_id = %session.id, label, "ivr choice recognized");
        Ok(())
    }

    async fn recognize_failed(
        &self,
        session: &mut Session,
        _client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        session.recognition_retry += 1;
        tracing::info!(
            session_id = %session.id,
            error_code,
            retry = session.recognition_retry,
            "recognition failed"
        );
        Ok(())
    }

    async fn play_failed(
        &self,
        session: &mut Session,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        tracing::warn!(session_id = %session.id, error_code, "media playback failed");
        Ok(())
    }

    async fn transfer_failed(
        &self,
        session: &mut Session,
        _client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        tracing::warn!(session_id = %session.id, error_code, "call transfer failed");
        Ok(())
    }

    async fn sms_received(
        &self,
        session: &mut Session,
        _client: &dyn CallControl,
        message: &str,
    ) -> Result<(), DialogueError> {
        tracing::info!(session_id = %session.id, len = message.len(), "sms received");
        Ok(())
    }

    async fn session_ended(&self, session: &Session) -> Result<(), DialogueError> {
        tracing::info!(
            session_id = %session.id,
            messages = session.messages.len(),
            "post-call processing"
        );
        Ok(())
    }
}

/// Pipeline implementation that drains the byte channel. Without a drain the
/// bounded channel would fill and stall the stream receive loop.
pub struct DrainingAudioPipeline;

#[async_trait]
impl AudioPipeline for DrainingAudioPipeline {
    async fn process(
        &self,
        session: &Session,
        format: AudioFormat,
        mut audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), DialogueError> {
        let mut chunks = 0usize;
        let mut bytes = 0usize;
        while let Some(chunk) = audio.recv().await {
            chunks += 1;
            bytes += chunk.len();
        }
        tracing::info!(
            session_id = %session.id,
            chunks,
            bytes,
            sample_rate = format.sample_rate,
            "audio stream drained"
        );
        Ok(())
    }
}
