//! Outbound call-control seam.
//!
//! The gateway issues actions against an ongoing call (answer, play,
//! recognize, transfer, hang up) through the [`CallControl`] trait. The real
//! transport is the provider SDK, wired in by the embedding deployment; this
//! crate ships a logging implementation for local runs. The client is
//! constructed once at startup and injected everywhere it is needed.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the call-control transport. These propagate to the
/// caller unchanged; the gateway never retries provider calls itself.
#[derive(Debug, Error)]
pub enum CallControlError {
    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("provider request failed: {0}")]
    Transient(String),
}

/// Actions the gateway issues against the telephony provider.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Answers an inbound call identified by its opaque incoming-call
    /// context. Returns the provider connection id.
    async fn answer_call(
        &self,
        incoming_context: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError>;

    /// Places an outbound call. Returns the provider connection id.
    async fn create_call(
        &self,
        phone_number: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError>;

    /// Speaks text into the call.
    async fn play_text(
        &self,
        connection_id: &str,
        text: &str,
        context: Option<&str>,
    ) -> Result<(), CallControlError>;

    /// Starts an IVR choice recognition.
    async fn recognize_ivr(
        &self,
        connection_id: &str,
        context: Option<&str>,
    ) -> Result<(), CallControlError>;

    /// Transfers the call to another phone number.
    async fn transfer(&self, connection_id: &str, target: &str) -> Result<(), CallControlError>;

    /// Hangs up the call.
    async fn hangup(&self, connection_id: &str) -> Result<(), CallControlError>;

    /// Starts media streaming toward the stream URL the call was created
    /// with.
    async fn start_media_streaming(&self, connection_id: &str) -> Result<(), CallControlError>;
}

/// Call-control implementation that only logs, for local development.
/// Connection ids are synthesized.
pub struct LoggingCallControl;

#[async_trait]
impl CallControl for LoggingCallControl {
    async fn answer_call(
        &self,
        incoming_context: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError> {
        let connection_id = Uuid::new_v4().to_string();
        tracing::info!(
            context_len = incoming_context.len(),
            callback_url,
            stream_url,
            %connection_id,
            "answer call"
        );
        Ok(connection_id)
    }

    async fn create_call(
        &self,
        phone_number: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError> {
        let connection_id = Uuid::new_v4().to_string();
        tracing::info!(
            phone_number,
            callback_url,
            stream_url,
            %connection_id,
            "create call"
        );
        Ok(connection_id)
    }

    async fn play_text(
        &self,
        connection_id: &str,
        text: &str,
        context: Option<&str>,
    ) -> Result<(), CallControlError> {
        tracing::info!(connection_id, context, "play text: {}", text);
        Ok(())
    }

    async fn recognize_ivr(
        &self,
        connection_id: &str,
        context: Option<&str>,
    ) -> Result<(), CallControlError> {
        tracing::info!(connection_id, context, "recognize ivr");
        Ok(())
    }

    async fn transfer(&self, connection_id: &str, target: &str) -> Result<(), CallControlError> {
        tracing::info!(connection_id, target, "transfer call");
        Ok(())
    }

    async fn hangup(&self, connection_id: &str) -> Result<(), CallControlError> {
        tracing::info!(connection_id, "hang up call");
        Ok(())
    }

    async fn start_media_streaming(&self, connection_id: &str) -> Result<(), CallControlError> {
        tracing::info!(connection_id, "start media streaming");
        Ok(())
    }
}
