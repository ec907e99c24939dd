//! Transcript messages and their translation into LLM chat units.
//!
//! A call transcript is an ordered, append-only list of [`Message`]s. The
//! dialogue engine replays the transcript to the LLM chat API through
//! [`Message::to_chat_units`], which flattens each message into one or more
//! role-tagged units while preserving tool-call pairing exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Assistant,
    Human,
    Tool,
}

/// The channel or control action a message was carried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAction {
    Call,
    Hangup,
    Sms,
    Talk,
}

impl MessageAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Hangup => "hangup",
            Self::Sms => "sms",
            Self::Talk => "talk",
        }
    }
}

/// Voice style the speech synthesizer supports.
///
/// `None` is not a synthesizer style; it marks a message with no style
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStyle {
    Cheerful,
    None,
    Sad,
}

impl VoiceStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cheerful => "cheerful",
            Self::None => "none",
            Self::Sad => "sad",
        }
    }
}

/// A function invocation requested by the LLM.
///
/// `id` pairs the request with the later tool-role result unit. Arguments
/// are an opaque JSON-encoded string, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function_name: String,
    pub function_arguments: String,
}

/// One transcript entry. Order within the transcript is chronological and
/// meaningful; `created_at` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub persona: Persona,
    #[serde(default = "default_action")]
    pub action: MessageAction,
    #[serde(default = "default_style")]
    pub style: VoiceStyle,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

fn default_action() -> MessageAction {
    MessageAction::Talk
}

fn default_style() -> VoiceStyle {
    VoiceStyle::None
}

impl Message {
    /// Creates a message with no tool calls, stamped now.
    pub fn new(persona: Persona, action: MessageAction, content: impl Into<String>) -> Self {
        Self {
            persona,
            action,
            style: VoiceStyle::None,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The machine-readable tag prefixed to the content when the message is
    /// replayed to the LLM. The original text follows verbatim.
    fn tagged_content(&self) -> String {
        format!(
            "action={} style={} {}",
            self.action.as_str(),
            self.style.as_str(),
            self.content
        )
    }

    /// Flattens this message into the units an LLM chat API expects.
    ///
    /// A human message yields one user unit; an assistant message without
    /// tool calls yields one assistant unit. A message carrying tool calls
    /// yields one assistant unit holding the full descriptor list, followed
    /// by exactly one empty tool unit per call, in order, each referencing
    /// its originating tool-call id. The pairing must never be broken or
    /// reordered.
    pub fn to_chat_units(&self) -> Vec<ChatUnit> {
        match self.persona {
            Persona::Human => {
                return vec![ChatUnit {
                    role: ChatRole::User,
                    content: self.tagged_content(),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }];
            }
            Persona::Assistant if self.tool_calls.is_empty() => {
                return vec![ChatUnit {
                    role: ChatRole::Assistant,
                    content: self.tagged_content(),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }];
            }
            _ => {}
        }

        let mut units = Vec::with_capacity(1 + self.tool_calls.len());
        units.push(ChatUnit {
            role: ChatRole::Assistant,
            content: self.tagged_content(),
            tool_calls: self
                .tool_calls
                .iter()
                .map(|call| ChatToolCall {
                    id: call.id.clone(),
                    // Older model generations emitted names the current API
                    // rejects; sanitize for compatibility.
                    function_name: sanitize_function_name(&call.function_name),
                    function_arguments: call.function_arguments.clone(),
                })
                .collect(),
            tool_call_id: None,
        });
        for call in &self.tool_calls {
            units.push(ChatUnit {
                role: ChatRole::Tool,
                content: String::new(),
                tool_calls: Vec::new(),
                tool_call_id: Some(call.id.clone()),
            });
        }
        units
    }
}

/// Role of a chat unit sent to the LLM API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

/// Tool-call descriptor attached to an assistant chat unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    pub function_name: String,
    pub function_arguments: String,
}

/// One discrete unit of the LLM chat API conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUnit {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Sanitizes an LLM-produced function name for the chat API.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `-`, then consecutive
/// dashes collapse into one. Idempotent.
pub fn sanitize_function_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_dash = false;
    for c in name.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '-'
        };
        if mapped == '-' {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else {
            out.push(mapped);
            prev_dash = false;
        }
    }
    out
}
