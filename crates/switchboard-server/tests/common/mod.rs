//! Shared fixtures for server integration tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};
use switchboard_server::config::Config;
use switchboard_server::dialogue::{AudioFormat, AudioPipeline, Dialogue, DialogueError};
use switchboard_server::telephony::{CallControl, CallControlError};
use switchboard_server::AppState;
use switchboard_types::Session;
use tokio::sync::mpsc;

/// One recorded outbound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AnswerCall {
        incoming_context: String,
        callback_url: String,
        stream_url: String,
    },
    CreateCall {
        phone_number: String,
        callback_url: String,
        stream_url: String,
    },
    PlayText {
        connection_id: String,
        text: String,
    },
    RecognizeIvr {
        connection_id: String,
    },
    Transfer {
        connection_id: String,
        target: String,
    },
    Hangup {
        connection_id: String,
    },
    StartMediaStreaming {
        connection_id: String,
    },
}

/// Call-control double that records every action and hands back a fixed
/// connection id.
#[derive(Default)]
pub struct RecordingCallControl {
    pub actions: Mutex<Vec<Action>>,
}

impl RecordingCallControl {
    pub fn recorded(&self) -> Vec<Action> {
        self.actions.lock().expect("actions lock").clone()
    }

    fn record(&self, action: Action) {
        self.actions.lock().expect("actions lock").push(action);
    }
}

#[async_trait]
impl CallControl for RecordingCallControl {
    async fn answer_call(
        &self,
        incoming_context: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError> {
        self.record(Action::AnswerCall {
            incoming_context: incoming_context.to_string(),
            callback_url: callback_url.to_string(),
            stream_url: stream_url.to_string(),
        });
        Ok("conn-test".to_string())
    }

    async fn create_call(
        &self,
        phone_number: &str,
        callback_url: &str,
        stream_url: &str,
    ) -> Result<String, CallControlError> {
        self.record(Action::CreateCall {
            phone_number: phone_number.to_string(),
            callback_url: callback_url.to_string(),
            stream_url: stream_url.to_string(),
        });
        Ok("conn-test".to_string())
    }

    async fn play_text(
        &self,
        connection_id: &str,
        text: &str,
        _context: Option<&str>,
    ) -> Result<(), CallControlError> {
        self.record(Action::PlayText {
            connection_id: connection_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn recognize_ivr(
        &self,
        connection_id: &str,
        _context: Option<&str>,
    ) -> Result<(), CallControlError> {
        self.record(Action::RecognizeIvr {
            connection_id: connection_id.to_string(),
        });
        Ok(())
    }

    async fn transfer(&self, connection_id: &str, target: &str) -> Result<(), CallControlError> {
        self.record(Action::Transfer {
            connection_id: connection_id.to_string(),
            target: target.to_string(),
        });
        Ok(())
    }

    async fn hangup(&self, connection_id: &str) -> Result<(), CallControlError> {
        self.record(Action::Hangup {
            connection_id: connection_id.to_string(),
        });
        Ok(())
    }

    async fn start_media_streaming(&self, connection_id: &str) -> Result<(), CallControlError> {
        self.record(Action::StartMediaStreaming {
            connection_id: connection_id.to_string(),
        });
        Ok(())
    }
}

/// Dialogue double that records which signal fired.
#[derive(Default)]
pub struct RecordingDialogue {
    pub signals: Mutex<Vec<String>>,
}

impl RecordingDialogue {
    pub fn recorded(&self) -> Vec<String> {
        self.signals.lock().expect("signals lock").clone()
    }

    fn record(&self, signal: String) {
        self.signals.lock().expect("signals lock").push(signal);
    }
}

#[async_trait]
impl Dialogue for RecordingDialogue {
    async fn ivr_selected(
        &self,
        _session: &mut Session,
        _client: &dyn CallControl,
        label: &str,
    ) -> Result<(), DialogueError> {
        self.record(format!("ivr_selected:{label}"));
        Ok(())
    }

    async fn recognize_failed(
        &self,
        _session: &mut Session,
        _client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        self.record(format!("recognize_failed:{error_code:?}"));
        Ok(())
    }

    async fn play_failed(
        &self,
        _session: &mut Session,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        self.record(format!("play_failed:{error_code:?}"));
        Ok(())
    }

    async fn transfer_failed(
        &self,
        _session: &mut Session,
        _client: &dyn CallControl,
        error_code: Option<i64>,
    ) -> Result<(), DialogueError> {
        self.record(format!("transfer_failed:{error_code:?}"));
        Ok(())
    }

    async fn sms_received(
        &self,
        _session: &mut Session,
        _client: &dyn CallControl,
        message: &str,
    ) -> Result<(), DialogueError> {
        self.record(format!("sms_received:{message}"));
        Ok(())
    }

    async fn session_ended(&self, session: &Session) -> Result<(), DialogueError> {
        self.record(format!("session_ended:{}", session.id));
        Ok(())
    }
}

/// Pipeline double that drains silently.
pub struct DrainPipeline;

#[async_trait]
impl AudioPipeline for DrainPipeline {
    async fn process(
        &self,
        _session: &Session,
        _format: AudioFormat,
        mut audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), DialogueError> {
        while audio.recv().await.is_some() {}
        Ok(())
    }
}

/// Builds state around an in-memory database and the recording doubles.
///
/// The pool is capped at one connection: an in-memory SQLite database
/// exists per connection, so a larger pool would hand out empty databases.
pub fn build_state(
    call_control: Arc<RecordingCallControl>,
    dialogue: Arc<RecordingDialogue>,
    validate_tokens: bool,
) -> Arc<AppState> {
    let mut config = Config::default();
    config.telephony.validate_tokens = validate_tokens;
    config.telephony.public_domain = "https://call.example.com".to_string();

    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .expect("pool creation should succeed");
    {
        let conn = pool.get().expect("should get a connection");
        run_migrations(&conn).expect("migrations should succeed");
    }

    Arc::new(AppState::new(
        config,
        pool,
        call_control,
        dialogue,
        Arc::new(DrainPipeline),
    ))
}
