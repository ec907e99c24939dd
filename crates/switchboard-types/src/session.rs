//! The durable record of one phone conversation.

use crate::message::Message;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the per-session callback secret.
pub const SECRET_LEN: usize = 16;

/// Configuration captured once when a session is created.
///
/// Inbound callbacks never change it; a caller supplying a *different*
/// initiate configuration gets a brand-new session instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateConfig {
    /// E.164 phone number of the remote party.
    pub phone_number: String,
    /// Name the bot introduces itself with.
    pub bot_name: String,
    /// Company the bot speaks for.
    pub bot_company: String,
    /// BCP 47 language tag used for prompts and recognition.
    pub lang: String,
    /// Human agent to transfer to when the bot gives up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_phone_number: Option<String>,
}

/// One phone conversation: identity, configuration, and transcript.
///
/// The persistence layer exclusively owns sessions. Request handlers load a
/// copy, mutate it, and write it back; the struct is never held across
/// requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique id, fixed at creation.
    pub id: Uuid,
    /// 16-character token authorizing provider callbacks for this session,
    /// fixed at creation.
    pub callback_secret: String,
    pub created_at: DateTime<Utc>,
    pub initiate: InitiateConfig,
    /// Provider-side call connection id, learned from the first callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Chronological transcript; append-only.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Consecutive failed recognition attempts in the current turn.
    #[serde(default)]
    pub recognition_retry: u32,
    /// False once the call has disconnected.
    #[serde(default = "default_in_progress")]
    pub in_progress: bool,
}

fn default_in_progress() -> bool {
    true
}

impl Session {
    /// Creates a fresh session: new id, new secret, empty transcript.
    pub fn new(initiate: InitiateConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            callback_secret: generate_callback_secret(),
            created_at: Utc::now(),
            initiate,
            connection_id: None,
            messages: Vec::new(),
            recognition_retry: 0,
            in_progress: true,
        }
    }

    pub fn phone_number(&self) -> &str {
        &self.initiate.phone_number
    }
}

/// Generates a fresh callback secret: 16 alphanumeric characters.
pub fn generate_callback_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

/// API projection of a [`Session`] that never exposes the callback secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub initiate: InitiateConfig,
    pub messages: Vec<Message>,
    pub in_progress: bool,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            initiate: session.initiate,
            messages: session.messages,
            in_progress: session.in_progress,
        }
    }
}
