//! Actix Web HTTP server.
//!
//! Exposes:
//! - `POST /api/groq` (event-stream relay)
//! - static files from the configured directory at `/`

use crate::{config::RelayConfig, streaming, upstream::UpstreamClient};
use actix_cors::Cors;
use actix_files::Files;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub client: UpstreamClient,
    pub echo_tokens: bool,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = UpstreamClient::new(config).context("failed to build upstream client")?;
        Ok(Self {
            client,
            echo_tokens: config.echo_tokens,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    /// Passed to the upstream untouched. `None` only when the field is
    /// absent; an explicit `null` is `Some(Value::Null)`.
    #[serde(default, deserialize_with = "present_value")]
    pub prompt: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub async fn serve(config: RelayConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let state = web::Data::new(AppState::new(&config)?);
    let static_dir = config.static_dir.clone();

    info!(addr = %addr, static_dir = %static_dir.display(), "groq-relay listening");

    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .configure(|cfg| configure(cfg, state.clone(), &static_dir))
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

/// Register the relay route, then static files from `static_dir`.
///
/// The API route must come first: the static service is mounted at `/` and
/// would otherwise claim every path.
pub fn configure(cfg: &mut web::ServiceConfig, state: web::Data<AppState>, static_dir: &Path) {
    cfg.app_data(state)
        .route("/api/groq", web::post().to(handle_relay))
        .service(Files::new("/", static_dir).index_file("index.html"));
}

/// Any origin, answered with a literal `*`.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .send_wildcard()
}

/// Parse the request body the way a lenient JSON body parser would: an empty
/// body is a request without a prompt.
pub fn parse_prompt_request(body: &[u8]) -> Result<PromptRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PromptRequest::default());
    }
    serde_json::from_slice(body)
}

async fn handle_relay(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let prompt = match parse_prompt_request(&body) {
        Ok(req) => req.prompt,
        Err(e) => {
            warn!(error = %e, "invalid request body");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };
    debug!(prompt = ?prompt, "Incoming prompt");

    let stream = streaming::relay(state.client.clone(), prompt, state.echo_tokens);

    // Always 200; failures are reported in-band as error frames.
    // No `Connection` header: actix-http drops it and HTTP/1.1 keeps the
    // connection alive by default.
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE))
        .insert_header((header::CACHE_CONTROL, "no-cache, no-transform"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .streaming(stream)
}
