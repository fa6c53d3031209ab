//! Configuration from environment variables.
//!
//! Configuration is loaded once, before the listener binds. A missing
//! credential is fatal: the process refuses to start instead of failing
//! per request.
//!
//! **Environment variables:**
//! - `GROQ_API_KEY`: bearer credential for the upstream (required)
//! - `PORT`: server port (default: 5000)
//! - `GROQ_API_URL`: upstream chat completions endpoint
//!   (default: https://api.groq.com/openai/v1/chat/completions)
//! - `GROQ_MODEL`: model identifier (default: llama-3.1-8b-instant)
//! - `STATIC_DIR`: directory served at `/` (default: `.`)
//! - `REQUEST_TIMEOUT_SECS`: upstream request timeout (default: none)
//! - `ECHO_TOKENS`: echo forwarded tokens to stdout (default: true)

use crate::error::ConfigError;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: SecretString,
    pub port: u16,
    pub upstream_url: String,
    pub model: String,
    pub static_dir: PathBuf,
    pub request_timeout_secs: Option<u64>,
    pub echo_tokens: bool,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GROQ_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let port: u16 = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(p) => p.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "PORT",
                value: p.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let request_timeout_secs: Option<u64> = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(t) => Some(t.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "REQUEST_TIMEOUT_SECS",
                value: t.clone(),
            })?),
            None => None,
        };

        let echo_tokens = match lookup("ECHO_TOKENS") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue {
                var: "ECHO_TOKENS",
                value: v,
            })?,
            None => true,
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            port,
            upstream_url: lookup("GROQ_API_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            model: lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            request_timeout_secs,
            echo_tokens,
        })
    }

    /// Build a config with defaults for everything but the credential.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            port: DEFAULT_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            static_dir: PathBuf::from("."),
            request_timeout_secs: None,
            echo_tokens: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
