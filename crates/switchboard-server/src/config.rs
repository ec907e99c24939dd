//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use switchboard_types::InitiateConfig;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telephony provider settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Conversation defaults.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Queue channel names.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "switchboard_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Telephony provider settings: callback URLs and bearer-token verification.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    /// Public base URL of this server, used to build the callback and
    /// stream URL templates handed to the provider.
    #[serde(default = "default_public_domain")]
    pub public_domain: String,

    /// Phone number the bot answers and places calls from.
    #[serde(default)]
    pub phone_number: String,

    /// Whether inbound callback bearer tokens are verified. Disable only
    /// for local development.
    #[serde(default = "default_true")]
    pub validate_tokens: bool,

    /// Expected JWT issuer.
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Expected JWT audience (the provider resource id).
    #[serde(default)]
    pub jwt_audience: String,

    /// URL of the provider's published signing keys.
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
}

/// Conversation defaults applied when an inbound call has no explicit
/// initiate configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default = "default_bot_company")]
    pub bot_company: String,

    #[serde(default = "default_lang")]
    pub lang: String,

    /// Human agent to transfer to when the bot gives up.
    #[serde(default)]
    pub agent_phone_number: Option<String>,

    /// How long a session stays "open" for phone-number lookup, in hours.
    /// A caller ringing back inside this window continues the same
    /// conversation.
    #[serde(default = "default_timeout_hours")]
    pub timeout_hours: u32,
}

impl ConversationConfig {
    /// Builds the default initiate configuration for an inbound caller.
    pub fn default_initiate(&self, phone_number: &str) -> InitiateConfig {
        InitiateConfig {
            phone_number: phone_number.to_string(),
            bot_name: self.bot_name.clone(),
            bot_company: self.bot_company.clone(),
            lang: self.lang.clone(),
            agent_phone_number: self.agent_phone_number.clone(),
        }
    }
}

/// Names of the three notification channels.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_call_queue")]
    pub call_name: String,

    #[serde(default = "default_sms_queue")]
    pub sms_name: String,

    #[serde(default = "default_post_queue")]
    pub post_name: String,

    /// In-memory queue capacity before senders block.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "switchboard.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_domain() -> String {
    "http://localhost:3000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_jwt_issuer() -> String {
    "https://acscallautomation.communication.azure.com".to_string()
}

fn default_jwks_url() -> String {
    "https://acscallautomation.communication.azure.com/calling/keys".to_string()
}

fn default_bot_name() -> String {
    "Ava".to_string()
}

fn default_bot_company() -> String {
    "Contoso".to_string()
}

fn default_lang() -> String {
    "en-US".to_string()
}

fn default_timeout_hours() -> u32 {
    72
}

fn default_call_queue() -> String {
    "call-events".to_string()
}

fn default_sms_queue() -> String {
    "sms-events".to_string()
}

fn default_post_queue() -> String {
    "post-events".to_string()
}

fn default_queue_capacity() -> usize {
    128
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            public_domain: default_public_domain(),
            phone_number: String::new(),
            validate_tokens: default_true(),
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: String::new(),
            jwks_url: default_jwks_url(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            bot_company: default_bot_company(),
            lang: default_lang(),
            agent_phone_number: None,
            timeout_hours: default_timeout_hours(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            call_name: default_call_queue(),
            sms_name: default_sms_queue(),
            post_name: default_post_queue(),
            capacity: default_queue_capacity(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHBOARD_HOST` overrides `server.host`
/// - `SWITCHBOARD_PORT` overrides `server.port`
/// - `SWITCHBOARD_DB_PATH` overrides `database.path`
/// - `SWITCHBOARD_LOG_LEVEL` overrides `logging.level`
/// - `SWITCHBOARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `SWITCHBOARD_PUBLIC_DOMAIN` overrides `telephony.public_domain`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("SWITCHBOARD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("SWITCHBOARD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(domain) = std::env::var("SWITCHBOARD_PUBLIC_DOMAIN") {
        config.telephony.public_domain = domain;
    }

    Ok(config)
}
