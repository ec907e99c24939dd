//! Shared types for the Switchboard call gateway.
//!
//! This crate provides the domain model used across the workspace: the
//! durable [`Session`] record of one phone conversation, the transcript
//! [`Message`] model with its LLM chat-unit translation, the wire envelopes
//! exchanged with the telephony provider (callback events, audio stream
//! frames, queue notifications), and the standard HTTP error envelope.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

pub mod error;
pub mod event;
pub mod message;
pub mod session;

pub use error::{ErrorInner, ErrorModel};
pub use event::{
    AudioPayload, ChoiceResult, EventData, EventEnvelope, GridEnvelope, IncomingCallData,
    ResultInformation, SmsReceivedData, StreamFrame, AUDIO_DATA_KIND, INCOMING_CALL_EVENT,
    SMS_RECEIVED_EVENT,
};
pub use message::{
    sanitize_function_name, ChatRole, ChatToolCall, ChatUnit, Message, MessageAction, Persona,
    ToolCall, VoiceStyle,
};
pub use session::{generate_callback_secret, InitiateConfig, Session, SessionView, SECRET_LEN};
