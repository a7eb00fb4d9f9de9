use crate::adapter::StreamAdapter;
use crate::callbacks::StreamCallbacks;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::middleware::{Relay, RelayBuilder, RelayOutcome};
use crate::providers::{ProviderKind, delta_parser};
use crate::ratelimit::{FailPolicy, FixedWindowRateLimiter, MemoryStore, WindowRecord, WindowStore};
use crate::transport::{ChunkStreamTransport, WireFormat};
use crate::types::{RawChunk, StreamChunk};
use crate::utils::test_helpers::{
    FakeStreamError, MockTransport, fake_ndjson_response, fake_sse_response, fake_sse_response_chunked,
    fake_sse_response_with_done,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// Store whose backend is always down
struct DownStore;

#[async_trait::async_trait]
impl WindowStore for DownStore {
    async fn increment_with_window_reset(
        &self,
        _key: &str,
        _limit: u64,
        _window: Duration,
    ) -> Result<WindowRecord, GateError> {
        Err(GateError::limiter_backend("connection reset by peer"))
    }
}

fn openai_relay(limit: u64) -> Relay {
    let limiter =
        FixedWindowRateLimiter::new(MemoryStore::new(), limit, Duration::from_secs(30)).unwrap();
    Relay::builder().rate_limiter(limiter).build()
}

fn openai_adapter() -> StreamAdapter {
    let body = fake_sse_response_with_done(&[
        r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
        r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
    ]);
    StreamAdapter::for_provider(ChunkStreamTransport::sse(body), ProviderKind::OpenAI)
}

#[tokio::test]
async fn test_openai_sse_end_to_end() {
    let text = assert_ok!(openai_adapter().collect_text().await);
    assert_eq!(text, "Hello");
}

#[tokio::test]
async fn test_anthropic_sse_split_across_reads() {
    let body = fake_sse_response_chunked(
        &[
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Bonjour"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" à tous"}}"#,
            r#"{"type":"message_stop"}"#,
        ],
        7,
    );
    let mut adapter =
        StreamAdapter::for_provider(ChunkStreamTransport::sse(body), ProviderKind::Anthropic);

    assert_eq!(assert_ok!(adapter.collect_text().await), "Bonjour à tous");
}

#[tokio::test]
async fn test_google_sse_without_done_sentinel() {
    let body = fake_sse_response(
        &[
            r#"{"candidates":[{"content":{"parts":[{"text":"Ciao"}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}]}"#,
        ],
        None,
    );
    let mut adapter =
        StreamAdapter::for_provider(ChunkStreamTransport::sse(body), ProviderKind::Google);

    assert_eq!(assert_ok!(adapter.collect_text().await), "Ciao!");
}

#[tokio::test]
async fn test_cohere_ndjson_end_to_end() {
    let body = fake_ndjson_response(
        &[
            r#"{"is_finished":false,"event_type":"stream-start"}"#,
            r#"{"is_finished":false,"event_type":"text-generation","text":"Hola"}"#,
            r#"{"is_finished":true,"event_type":"stream-end","finish_reason":"COMPLETE"}"#,
        ],
        Some(11),
        false,
    );
    let transport = ChunkStreamTransport::framed(body, ProviderKind::Cohere.wire_format());
    let mut adapter = StreamAdapter::for_provider(transport, ProviderKind::Cohere);

    assert_eq!(assert_ok!(adapter.collect_text().await), "Hola");
}

#[tokio::test]
async fn test_custom_parser_over_raw_text() {
    let body = fake_ndjson_response(&["upper", "case"], None, true);
    let transport = ChunkStreamTransport::framed(body, WireFormat::Ndjson);
    let parser = delta_parser(|payload| Some(payload.to_uppercase()));

    let mut adapter = StreamAdapter::new(transport, parser);
    assert_eq!(assert_ok!(adapter.collect_text().await), "UPPERCASE");
}

#[tokio::test]
async fn test_custom_parser_error_fails_as_transport_error() {
    let transport = MockTransport::from_payloads(&["ok", "bad"]);
    let parser = |raw: &RawChunk| -> Result<StreamChunk, GateError> {
        if raw.payload == "bad" {
            Err(GateError::configuration("unexpected payload"))
        } else {
            Ok(StreamChunk::delta(raw.sequence, raw.payload.as_str()))
        }
    };

    let mut adapter = StreamAdapter::new(transport, parser);
    let err = assert_err!(adapter.collect_text().await);
    assert!(matches!(err, GateError::StreamTransport { .. }));
    assert_eq!(err.partial_text(), Some("ok"));
}

#[tokio::test]
async fn test_plain_text_keeps_line_endings_byte_for_byte() {
    let reads: Vec<Result<bytes::Bytes, FakeStreamError>> = vec![
        Ok(bytes::Bytes::from_static(b"line1\r")),
        Ok(bytes::Bytes::from_static(b"\nline2\r")),
    ];
    let transport = ChunkStreamTransport::raw(futures::stream::iter(reads));

    let mut adapter = StreamAdapter::for_provider(transport, ProviderKind::Text);
    assert_eq!(
        assert_ok!(adapter.collect_text().await),
        "line1\r\nline2\r"
    );
}

#[tokio::test]
async fn test_plain_text_truncated_utf8_fails_the_stream() {
    let completed = Arc::new(Mutex::new(false));
    let callbacks = {
        let completed = completed.clone();
        StreamCallbacks::new().on_completion(move |_| *completed.lock().unwrap() = true)
    };

    let reads: Vec<Result<bytes::Bytes, FakeStreamError>> =
        vec![Ok(bytes::Bytes::from_static(b"ok\xC3"))];
    let transport = ChunkStreamTransport::raw(futures::stream::iter(reads));

    let mut adapter =
        StreamAdapter::for_provider(transport, ProviderKind::Text).with_callbacks(callbacks);
    let err = assert_err!(adapter.collect_text().await);
    assert!(matches!(err, GateError::StreamTransport { .. }));
    assert_eq!(err.partial_text(), Some("ok"));
    assert!(!*completed.lock().unwrap());
}

#[tokio::test]
async fn test_callbacks_see_the_same_text_as_the_consumer() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(None));

    let callbacks = {
        let seen = seen.clone();
        let completed = completed.clone();
        StreamCallbacks::new()
            .on_token(move |t| seen.lock().unwrap().push(t.to_string()))
            .on_final(move |t| *completed.lock().unwrap() = Some(t.to_string()))
    };

    let mut adapter = openai_adapter().with_callbacks(callbacks);
    let consumed: Vec<String> = assert_ok!(adapter.text_stream())
        .map(|t| t.unwrap())
        .collect()
        .await;

    assert_eq!(*seen.lock().unwrap(), consumed);
    assert_eq!(completed.lock().unwrap().as_deref(), Some("Hello"));
}

#[tokio::test(start_paused = true)]
async fn test_relay_admits_then_rejects() {
    let relay = openai_relay(2);

    for expected_remaining in [1, 0] {
        let outcome = assert_ok!(relay.handle("203.0.113.7", || async { Ok(openai_adapter()) }).await);
        assert_eq!(outcome.decision().unwrap().remaining, expected_remaining);

        let RelayOutcome::Streaming { stream, .. } = outcome else {
            panic!("request should have been admitted");
        };
        let text: String = stream.map(|t| t.unwrap().text).collect::<Vec<_>>().await.concat();
        assert_eq!(text, "Hello");
    }

    let rejected = assert_ok!(relay.handle("203.0.113.7", || async { Ok(openai_adapter()) }).await);
    assert_eq!(rejected.status_code(), 429);
    let headers = rejected.decision().unwrap().headers();
    assert!(headers.iter().any(|(name, value)| *name == "Retry-After" && value == "30"));

    // Other clients have their own window
    let other = assert_ok!(relay.handle("198.51.100.1", || async { Ok(openai_adapter()) }).await);
    assert_eq!(other.status_code(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_relay_quota_returns_after_window() {
    let relay = openai_relay(1);
    let upstream = || async { Ok(openai_adapter()) };

    assert_eq!(assert_ok!(relay.handle("k", upstream).await).status_code(), 200);
    assert_eq!(assert_ok!(relay.handle("k", upstream).await).status_code(), 429);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(assert_ok!(relay.handle("k", upstream).await).status_code(), 200);
}

#[tokio::test]
async fn test_relay_fail_policy_with_store_down() {
    let closed = RelayBuilder::new()
        .rate_limiter(FixedWindowRateLimiter::new(DownStore, 5, Duration::from_secs(30)).unwrap())
        .build();
    let outcome = assert_ok!(closed.handle("k", || async { Ok(openai_adapter()) }).await);
    assert_eq!(outcome.status_code(), 429);

    let open = RelayBuilder::new()
        .rate_limiter(FixedWindowRateLimiter::new(DownStore, 5, Duration::from_secs(30)).unwrap())
        .fail_policy(FailPolicy::Open)
        .build();
    let outcome = assert_ok!(open.handle("k", || async { Ok(openai_adapter()) }).await);
    assert_eq!(outcome.status_code(), 200);
}

#[tokio::test]
async fn test_relay_built_from_config() {
    let config = GateConfig::from_toml_str(
        r#"
        fail_policy = "open"

        [rate_limit]
        limit = 1

        [stream]
        enable_metrics = true
        "#,
    )
    .unwrap();

    let limiter = FixedWindowRateLimiter::from_config(DownStore, &config.rate_limit).unwrap();
    let relay = RelayBuilder::with_config(&config).rate_limiter(limiter).build();
    assert!(relay.config().enable_metrics);

    let outcome = assert_ok!(relay.handle("k", || async { Ok(openai_adapter()) }).await);
    let RelayOutcome::Streaming { mut stream, .. } = outcome else {
        panic!("open fail policy should admit");
    };
    assert_eq!(stream.next().await.unwrap().unwrap().text, "Hel");
}

#[tokio::test]
async fn test_relay_surfaces_mid_stream_failure() {
    let relay = Relay::builder().metrics().build();
    let outcome = assert_ok!(
        relay
            .handle("k", || async {
                let transport = MockTransport::from_payloads(&["par", "tial"])
                    .then_fail(GateError::transport("connection reset", ""));
                Ok(StreamAdapter::for_provider(transport, ProviderKind::Text))
            })
            .await
    );

    let RelayOutcome::Streaming { stream, .. } = outcome else {
        panic!("no limiter configured");
    };
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 3);
    let err = assert_err!(items[2].as_ref());
    assert_eq!(err.partial_text(), Some("partial"));
}
