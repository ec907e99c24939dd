//! Per-call session registry.
//!
//! Resolves the session behind an inbound phone number — reusing a recent
//! conversation when possible, creating a fresh one otherwise — and builds
//! the callback and stream URLs the provider will call back on. The registry
//! persists only session *creation*; every later mutation is written back by
//! whoever made it.

use crate::error::AppError;
use crate::AppState;
use switchboard_types::{InitiateConfig, Session};

/// Callback and stream URL templates, parameterized by session id and
/// secret.
#[derive(Debug, Clone)]
pub struct UrlTemplates {
    callback: String,
    stream: String,
}

impl UrlTemplates {
    /// Derives both templates from the public base URL of this server. The
    /// stream template swaps the scheme for its WebSocket counterpart.
    pub fn from_public_domain(public_domain: &str) -> Self {
        let base = public_domain.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("wss://{base}")
        };
        Self {
            callback: format!("{base}/communication/callback/{{session_id}}/{{secret}}"),
            stream: format!("{ws_base}/communication/stream/{{session_id}}/{{secret}}"),
        }
    }

    pub fn callback_url(&self, session: &Session) -> String {
        render(&self.callback, session)
    }

    pub fn stream_url(&self, session: &Session) -> String {
        render(&self.stream, session)
    }
}

fn render(template: &str, session: &Session) -> String {
    template
        .replace("{session_id}", &session.id.to_string())
        .replace("{secret}", &session.callback_secret)
}

/// Result of a registry resolution.
pub struct ResolvedSession {
    pub callback_url: String,
    pub stream_url: String,
    pub session: Session,
    /// True when a fresh session was created (and persisted) by this call.
    pub created: bool,
}

/// Finds or creates the session for a phone number.
///
/// A caller ringing back within the conversation window continues their
/// previous session. Supplying an initiate configuration that differs from
/// the stored one forces a brand-new session: new id, new secret, empty
/// transcript.
pub async fn resolve_or_create(
    state: &AppState,
    phone_number: &str,
    initiate: Option<InitiateConfig>,
) -> Result<ResolvedSession, AppError> {
    let window = state.config.conversation.timeout_hours;
    let phone = phone_number.to_string();
    let existing = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_search_one(conn, &phone, window)
    })
    .await?;

    let (session, created) = match existing {
        Some(session)
            if initiate
                .as_ref()
                .map_or(true, |supplied| *supplied == session.initiate) =>
        {
            tracing::debug!(session_id = %session.id, phone_number, "reusing session");
            (session, false)
        }
        _ => {
            let session = Session::new(initiate.unwrap_or_else(|| {
                state.config.conversation.default_initiate(phone_number)
            }));
            let to_store = session.clone();
            crate::with_conn(&state.pool, move |conn| {
                switchboard_db::session_upsert(conn, &to_store)
            })
            .await?;
            tracing::info!(session_id = %session.id, phone_number, "created session");
            (session, true)
        }
    };

    Ok(ResolvedSession {
        callback_url: state.urls.callback_url(&session),
        stream_url: state.urls.stream_url(&session),
        session,
        created,
    })
}
