//! Wire formats exchanged with the telephony provider.
//!
//! Three surfaces share these shapes: the webhook callback body (a JSON
//! array of [`EventEnvelope`]s), the realtime audio stream (JSON
//! [`StreamFrame`]s), and the notification queues (Event Grid style
//! [`GridEnvelope`]s). Field names follow the provider's camelCase wire
//! convention.

use serde::{Deserialize, Serialize};

/// Queue event type announcing an inbound call.
pub const INCOMING_CALL_EVENT: &str = "Microsoft.Communication.IncomingCall";

/// Queue event type announcing an inbound SMS.
pub const SMS_RECEIVED_EVENT: &str = "Microsoft.Communication.SMSReceived";

/// Stream frame kind carrying audio.
pub const AUDIO_DATA_KIND: &str = "AudioData";

/// One normalized notification about a state change in an ongoing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: EventData,
}

/// Payload of a callback event. All fields are optional on the wire; each
/// handler reads only what its event kind guarantees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventData {
    pub call_connection_id: Option<String>,
    pub server_call_id: Option<String>,
    /// JSON-encoded array of context strings set when the action was issued.
    pub operation_context: Option<String>,
    pub recognition_type: Option<String>,
    pub choice_result: Option<ChoiceResult>,
    pub result_information: Option<ResultInformation>,
}

/// Result of an IVR choice recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceResult {
    pub label: Option<String>,
}

/// Provider error detail attached to failure events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInformation {
    pub sub_code: Option<i64>,
    pub message: Option<String>,
}

/// One frame received on the duplex audio stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub audio_data: Option<AudioPayload>,
}

/// Audio chunk within a stream frame.
///
/// A missing `silent` flag is treated as silent, matching the provider's
/// behavior of omitting the flag on filler frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPayload {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default = "default_silent")]
    pub silent: bool,
}

fn default_silent() -> bool {
    true
}

/// Event Grid style envelope delivered on the notification queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `data` payload of an [`INCOMING_CALL_EVENT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallData {
    pub incoming_call_context: String,
    pub from: CallerId,
}

/// Caller identification on an incoming-call notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerId {
    pub phone_number: PhoneNumberValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumberValue {
    pub value: String,
}

/// `data` payload of an [`SMS_RECEIVED_EVENT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsReceivedData {
    pub message: String,
    pub from: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_envelope_parses_provider_fields() {
        let json = r#"{
            "type": "Microsoft.Communication.RecognizeFailed",
            "data": {
                "callConnectionId": "conn-9",
                "operationContext": "[\"ivr_lang_select\"]",
                "resultInformation": {"subCode": 8510, "message": "silence timeout"}
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).expect("envelope should parse");
        assert_eq!(envelope.kind, "Microsoft.Communication.RecognizeFailed");
        assert_eq!(envelope.data.call_connection_id.as_deref(), Some("conn-9"));
        let info = envelope.data.result_information.expect("result info");
        assert_eq!(info.sub_code, Some(8510));
    }

    #[test]
    fn envelope_with_empty_data_parses() {
        let envelope: EventEnvelope =
            serde_json::from_str(r#"{"type": "Custom.Thing"}"#).expect("envelope should parse");
        assert!(envelope.data.call_connection_id.is_none());
    }

    #[test]
    fn stream_frame_missing_silent_defaults_to_silent() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"kind": "AudioData", "audioData": {"data": "AAAA"}}"#)
                .expect("frame should parse");
        assert!(frame.audio_data.expect("payload").silent);
    }

    #[test]
    fn incoming_call_data_reads_nested_phone_number() {
        let json = r#"{
            "incomingCallContext": "ctx-opaque",
            "from": {"phoneNumber": {"value": "+15551234567"}}
        }"#;
        let data: IncomingCallData = serde_json::from_str(json).expect("data should parse");
        assert_eq!(data.from.phone_number.value, "+15551234567");
        assert_eq!(data.incoming_call_context, "ctx-opaque");
    }
}
