//! Groq Relay - streams chat completions from Groq to HTTP clients.
//!
//! A client posts `{"prompt": "..."}` to `/api/groq`. The relay opens a
//! streaming `chat/completions` request upstream and re-emits every text
//! delta as it arrives, using the same `data: ` event-stream framing:
//!
//! ```text
//! data: {"token":"Hel"}
//!
//! data: {"token":"lo"}
//!
//! data: [DONE]
//!
//! ```
//!
//! The response status is always 200. Failures are reported in-band with a
//! single `data: {"error": ...}` frame in place of `[DONE]`.

pub mod config;
pub mod error;
pub mod frame;
pub mod server;
pub mod streaming;
pub mod upstream;
pub mod utf8;

pub use config::RelayConfig;
pub use error::{ConfigError, RelayError};
pub use server::serve;
