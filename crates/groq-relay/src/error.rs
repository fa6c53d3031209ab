//! Relay error types

use thiserror::Error;

/// In-band message sent when the upstream request could not be opened.
pub const SETUP_FAILED_MESSAGE: &str = "Groq API failed";

/// In-band message sent when the upstream body fails mid-stream.
pub const STREAM_FAILED_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is not set in environment variables")]
    MissingApiKey,

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl RelayError {
    /// The fixed message the downstream client sees for this failure.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Stream(_) => STREAM_FAILED_MESSAGE,
            Self::Network(_) | Self::UpstreamStatus { .. } | Self::Configuration(_) => {
                SETUP_FAILED_MESSAGE
            }
        }
    }
}
