//! Inbound authorization: provider bearer tokens and per-session secrets.
//!
//! Every callback request passes two independent gates before any domain
//! logic runs: the signed bearer token issued by the provider, and the
//! 16-character secret embedded in the callback URL (the provider cannot
//! attach custom headers to stream callbacks, so the secret travels in the
//! path).

use crate::config::TelephonyConfig;
use crate::error::AppError;
use crate::AppState;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use switchboard_types::Session;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Clock-skew allowance on token expiry, in seconds.
const JWT_LEEWAY_SECS: u64 = 300;

/// JWKS document published by the provider.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

/// Verifies provider bearer tokens against the published signing keys.
///
/// Keys are cached in-process; an unknown `kid` triggers one refetch before
/// the request is rejected.
pub struct TokenValidator {
    enabled: bool,
    issuer: String,
    audience: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl TokenValidator {
    pub fn new(config: &TelephonyConfig) -> Self {
        Self {
            enabled: config.validate_tokens,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            jwks_url: config.jwks_url.clone(),
            http: reqwest::Client::new(),
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Validates the `Authorization: Bearer` header of a callback request.
    ///
    /// Checks signature (RS256 against the cached JWKS), issuer, audience,
    /// and expiry with a five-minute clock-skew allowance.
    pub async fn validate_bearer(&self, headers: &HeaderMap) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }

        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Authorization header missing".to_string()))?;
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

        let jwt_header = decode_header(token)
            .map_err(|_| AppError::Unauthorized("Invalid bearer token".to_string()))?;
        let kid = jwt_header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token has no key id".to_string()))?;

        let key = self.signing_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = JWT_LEEWAY_SECS;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<serde_json::Value>(token, &key, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid bearer token".to_string()))?;
        Ok(())
    }

    async fn signing_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        // Unknown kid: the provider may have rotated keys. Refetch once.
        self.refresh_keys().await?;

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Unknown signing key".to_string()))
    }

    async fn refresh_keys(&self) -> Result<(), AppError> {
        let document: JwksDocument = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("failed to fetch signing keys: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("failed to parse signing keys: {e}")))?;

        let mut keys = self.keys.write().await;
        keys.clear();
        for jwk in document.keys {
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => {
                    tracing::warn!(%kid, "skipping unusable signing key: {}", err);
                }
            }
        }
        tracing::debug!(count = keys.len(), "refreshed provider signing keys");
        Ok(())
    }
}

/// Validates the per-session URL secret and returns the loaded session for
/// the caller to mutate.
///
/// Unknown session → `NotFound`; secret mismatch → `Unauthorized`.
pub async fn validate_session(
    state: &AppState,
    session_id: Uuid,
    secret: &str,
) -> Result<Session, AppError> {
    let session = crate::with_conn(&state.pool, move |conn| {
        switchboard_db::session_get(conn, session_id)
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    if session.callback_secret != secret {
        tracing::warn!(session_id = %session_id, "callback secret does not match");
        return Err(AppError::Unauthorized("Secret does not match".to_string()));
    }

    Ok(session)
}
