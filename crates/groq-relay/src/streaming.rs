//! Streaming relay (SSE).
//!
//! The upstream streams `data: {json}` lines terminated by `data: [DONE]`.
//! This module decodes the upstream body incrementally, pulls the text delta
//! out of every payload and re-emits it to the client as
//! `data: {"token": ...}` frames, in arrival order, one chunk per frame.
//!
//! A downstream stream always ends with exactly one terminal frame:
//! `data: [DONE]` on a clean end of body, or a single error frame otherwise.

use crate::{
    error::STREAM_FAILED_MESSAGE,
    frame::{extract_token, parse_line, Frame, LineEvent, LineSplitter},
    upstream::UpstreamClient,
    utf8::Utf8Decoder,
};
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt::Display;
use std::io::Write;
use tracing::{debug, error, info, trace, warn};

/// Open the upstream request and relay its body.
///
/// The upstream is contacted lazily on first poll so the caller can commit
/// the event-stream response headers before anything is known.
pub fn relay(
    client: UpstreamClient,
    prompt: Option<Value>,
    echo_tokens: bool,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream! {
        let response = match client.open_stream(prompt).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, model = client.model(), "Groq API request failed");
                yield Ok(Bytes::from(Frame::Error(e.client_message()).encode()));
                return;
            }
        };

        let frames = relay_stream(response.bytes_stream(), echo_tokens);
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            yield frame;
        }
    }
}

/// Convert an upstream body into downstream frames.
pub fn relay_stream<S, B, E>(body: S, echo_tokens: bool) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    stream! {
        let mut decoder = Utf8Decoder::new();
        let mut splitter = LineSplitter::new();
        let mut forwarded: usize = 0;

        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, forwarded, "Streaming error");
                    yield Ok(Bytes::from(Frame::Error(STREAM_FAILED_MESSAGE).encode()));
                    return;
                }
            };

            let text = decoder.decode(chunk.as_ref());
            for line in splitter.push(&text) {
                if let Some(token) = token_from_line(&line) {
                    forwarded += 1;
                    yield Ok(token_frame(token, echo_tokens));
                }
            }
        }

        // Body ended: drain anything still held by the decoder or splitter.
        if decoder.has_pending() {
            warn!(forwarded, "upstream body ended inside a UTF-8 sequence");
        }
        let tail = decoder.finish();
        let mut remaining = splitter.push(&tail);
        remaining.extend(splitter.finish());
        for line in remaining {
            if let Some(token) = token_from_line(&line) {
                forwarded += 1;
                yield Ok(token_frame(token, echo_tokens));
            }
        }

        if echo_tokens && forwarded > 0 {
            echo("\n");
        }
        info!(forwarded, "Stream finished");
        yield Ok(Bytes::from(Frame::Done.encode()));
    }
}

fn token_from_line(line: &str) -> Option<String> {
    match parse_line(line) {
        LineEvent::Ignored => None,
        // The natural end of the body terminates the relay, not the sentinel.
        LineEvent::Done => {
            debug!("upstream sent [DONE]");
            None
        }
        LineEvent::Payload(data) => match extract_token(data) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, line = %data, "SSE parse error");
                None
            }
        },
    }
}

fn token_frame(token: String, echo_tokens: bool) -> Bytes {
    trace!(token = %token, "forwarding token");
    if echo_tokens {
        echo(&token);
    }
    Bytes::from(Frame::Token(token).encode())
}

fn echo(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn sse(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    async fn collect<S>(frames: S) -> Vec<String>
    where
        S: Stream<Item = Result<Bytes, Infallible>>,
    {
        frames
            .map(|f| match f {
                Ok(b) => String::from_utf8(b.to_vec()).unwrap(),
                Err(never) => match never {},
            })
            .collect()
            .await
    }

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, io::Error>> {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_tokens_forwarded_in_order_then_done() {
        let body = format!("{}{}{}data: [DONE]\n\n", sse("Hel"), sse("lo"), sse(" world"));
        let frames = collect(relay_stream(chunks(vec![body.into_bytes()]), false)).await;

        assert_eq!(
            frames,
            vec![
                "data: {\"token\":\"Hel\"}\n\n",
                "data: {\"token\":\"lo\"}\n\n",
                "data: {\"token\":\" world\"}\n\n",
                "data: [DONE]\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let body = sse("héllo 🚀").into_bytes();
        let rocket = body
            .windows(4)
            .position(|w| w == "🚀".as_bytes())
            .unwrap();
        let (a, b) = body.split_at(rocket + 2);

        let frames = collect(relay_stream(chunks(vec![a.to_vec(), b.to_vec()]), false)).await;

        assert_eq!(frames[0], "data: {\"token\":\"héllo 🚀\"}\n\n");
        assert!(!frames[0].contains('\u{FFFD}'));
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let body = sse("joined").into_bytes();
        let (a, b) = body.split_at(20);
        let frames = collect(relay_stream(chunks(vec![a.to_vec(), b.to_vec()]), false)).await;

        assert_eq!(frames, vec!["data: {\"token\":\"joined\"}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_lines_without_content_emit_nothing() {
        let body = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"x_groq\":{\"id\":\"req_1\"}}\n\n",
            ": ping\n\n",
        );
        let frames = collect(relay_stream(chunks(vec![body.as_bytes().to_vec()]), false)).await;

        assert_eq!(frames, vec!["data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let body = format!("{}data: {{not json}}\n\n{}", sse("A"), sse("B"));
        let frames = collect(relay_stream(chunks(vec![body.into_bytes()]), false)).await;

        assert_eq!(
            frames,
            vec![
                "data: {\"token\":\"A\"}\n\n",
                "data: {\"token\":\"B\"}\n\n",
                "data: [DONE]\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_done_sentinel_does_not_stop_early() {
        let body = format!("{}data: [DONE]\n\n{}", sse("before"), sse("after"));
        let frames = collect(relay_stream(chunks(vec![body.into_bytes()]), false)).await;

        assert_eq!(
            frames,
            vec![
                "data: {\"token\":\"before\"}\n\n",
                "data: {\"token\":\"after\"}\n\n",
                "data: [DONE]\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_body_ending_inside_character_still_completes() {
        let mut body = sse("ok").into_bytes();
        body.push(0xE2);
        let frames = collect(relay_stream(chunks(vec![body]), false)).await;

        assert_eq!(frames, vec!["data: {\"token\":\"ok\"}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_relayed() {
        let body = sse("tail");
        let body = body.trim_end().to_string();
        let frames = collect(relay_stream(chunks(vec![body.into_bytes()]), false)).await;

        assert_eq!(frames, vec!["data: {\"token\":\"tail\"}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_mid_stream_error_ends_without_done() {
        let parts: Vec<Result<Vec<u8>, io::Error>> = vec![
            Ok(sse("one").into_bytes()),
            Ok(sse("two").into_bytes()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            Ok(sse("never").into_bytes()),
        ];
        let frames = collect(relay_stream(stream::iter(parts), false)).await;

        assert_eq!(
            frames,
            vec![
                "data: {\"token\":\"one\"}\n\n",
                "data: {\"token\":\"two\"}\n\n",
                "data: {\"error\":\"Internal Server Error\"}\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_body_only_done() {
        let frames = collect(relay_stream(chunks(Vec::new()), false)).await;
        assert_eq!(frames, vec!["data: [DONE]\n\n"]);
    }
}
