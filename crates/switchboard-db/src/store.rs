//! Session store: whole-document persistence with indexed lookup columns.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use switchboard_types::Session;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_ts(ts: DateTime<Utc>) -> String {
    // One fixed format for every stored timestamp, so lexicographic
    // comparison in SQL matches chronological order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Inserts or replaces a session. Creation and every subsequent mutation go
/// through this same call; the last write wins.
pub fn session_upsert(conn: &Connection, session: &Session) -> Result<(), StoreError> {
    let data = serde_json::to_string(session)?;
    conn.execute(
        "INSERT OR REPLACE INTO sessions (id, phone_number, created_at, in_progress, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.id.to_string(),
            session.phone_number(),
            format_ts(session.created_at),
            session.in_progress,
            data,
        ],
    )?;
    Ok(())
}

/// Loads a session by id. Returns `None` when absent; rows whose document no
/// longer parses are logged and treated as absent rather than failing the
/// caller.
pub fn session_get(conn: &Connection, id: Uuid) -> Result<Option<Session>, StoreError> {
    let row: Option<String> = conn
        .query_row(
            "SELECT data FROM sessions WHERE id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(row.and_then(|data| parse_session(&data)))
}

/// Finds the most recent open session for a phone number.
///
/// "Open" is a recency window: only sessions created within the last
/// `window_hours` are candidates, ordered newest first. Older sessions never
/// swallow a new call.
pub fn session_search_one(
    conn: &Connection,
    phone_number: &str,
    window_hours: u32,
) -> Result<Option<Session>, StoreError> {
    let cutoff = format_ts(Utc::now() - Duration::hours(i64::from(window_hours)));
    let row: Option<String> = conn
        .query_row(
            "SELECT data FROM sessions
             WHERE phone_number = ?1 AND created_at >= ?2
             ORDER BY created_at DESC
             LIMIT 1",
            params![phone_number, cutoff],
            |row| row.get(0),
        )
        .optional()?;

    Ok(row.and_then(|data| parse_session(&data)))
}

/// Lists every session for a phone number, newest first.
pub fn session_search_all(
    conn: &Connection,
    phone_number: &str,
) -> Result<Vec<Session>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT data FROM sessions
         WHERE phone_number = ?1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([phone_number], |row| row.get::<_, String>(0))?;
    let mut sessions = Vec::new();
    for row in rows {
        if let Some(session) = parse_session(&row?) {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

fn parse_session(data: &str) -> Option<Session> {
    match serde_json::from_str(data) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!("skipping unparseable session document: {}", e);
            None
        }
    }
}
