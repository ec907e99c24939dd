//! Standard HTTP error envelope.

use serde::{Deserialize, Serialize};

/// Body returned for every surfaced handler failure:
/// `{"error": {"message": ..., "details": [...]}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorModel {
    pub error: ErrorInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInner {
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl ErrorModel {
    pub fn new(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            error: ErrorInner {
                message: message.into(),
                details,
            },
        }
    }
}
