//! `groq-relay` binary entrypoint.
//!
//! Configuration is loaded from environment variables before the listener
//! binds; a missing `GROQ_API_KEY` stops the process here.

use groq_relay::{serve, RelayConfig};
use tracing::error;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to relay-friendly info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match RelayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "refusing to start");
            std::process::exit(1);
        }
    };

    serve(config).await
}
