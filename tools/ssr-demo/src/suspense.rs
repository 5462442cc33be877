//! Server render demo: the async text page in every render mode.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, Stream, StreamExt};
use serde::Deserialize;
use ssr_core::{RenderError, RenderMode, RequestContext};
use ssr_executor::RenderSession;
use ssr_observability::{LogFormat, LogLevel, MetricsCollector, MetricsObserver, StructuredLogger};
use ssr_streaming::StreamingSink;

use crate::app;
use crate::config::DemoConfig;
use crate::output::{format_us, Output};

const HTML: &str = "text/html; charset=utf-8";

/// Chunks buffered between the render task and the response body.
const BODY_BUFFER: usize = 16;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<DemoConfig>,
    output: Output,
}

impl AppState {
    /// Create handler state.
    pub fn new(config: DemoConfig, output: Output) -> Self {
        Self {
            config: Arc::new(config),
            output,
        }
    }
}

/// Response body fed by a render task.
///
/// Dropping the body drops `_closed`, which resolves the receiver handed
/// to the task.
struct SessionBody {
    chunks: mpsc::Receiver<Vec<u8>>,
    _closed: oneshot::Sender<()>,
}

impl SessionBody {
    fn new(chunks: mpsc::Receiver<Vec<u8>>) -> (Self, oneshot::Receiver<()>) {
        let (closed_tx, closed_rx) = oneshot::channel();
        let body = Self {
            chunks,
            _closed: closed_tx,
        };
        (body, closed_rx)
    }
}

impl Stream for SessionBody {
    type Item = Result<Vec<u8>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_next_unpin(cx).map(|chunk| chunk.map(Ok))
    }
}

/// Query parameters accepted by every render route.
#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    /// Render mode name, only read by `/render`.
    pub mode: Option<String>,
    /// 1-based index of the async text that rejects.
    pub fail: Option<usize>,
}

/// Router serving the page in every mode.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/renderToString", get(render_to_string))
        .route("/renderToStaticNodeStream", get(render_buffered))
        .route("/renderToPipeableStream", get(render_incremental))
        .route("/fallbackOnly", get(render_fallback_only))
        .route("/render", get(render_any))
        .with_state(state)
}

async fn render_to_string(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    render(state, RenderMode::Eager, "/renderToString", query.fail).await
}

async fn render_buffered(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    render(state, RenderMode::Buffered, "/renderToStaticNodeStream", query.fail).await
}

async fn render_incremental(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    render(state, RenderMode::Incremental, "/renderToPipeableStream", query.fail).await
}

async fn render_fallback_only(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    render(state, RenderMode::FallbackOnly, "/fallbackOnly", query.fail).await
}

async fn render_any(State(state): State<AppState>, Query(query): Query<RenderQuery>) -> Response {
    let mode = match query.mode.as_deref() {
        None => state.config.render.mode,
        Some(name) => match name.parse::<RenderMode>() {
            Ok(mode) => mode,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        },
    };
    render(state, mode, "/render", query.fail).await
}

async fn render(state: AppState, mode: RenderMode, route: &str, fail: Option<usize>) -> Response {
    if let Some(n) = fail.filter(|n| !app::is_text_index(*n)) {
        let msg = format!("fail must be between 1 and {}, got {}", app::TEXTS.len(), n);
        return (StatusCode::BAD_REQUEST, msg).into_response();
    }

    let ctx = RequestContext::new(route);
    let logger = StructuredLogger::new(ctx.request_id.clone())
        .with_service("ssr-demo")
        .with_route(route)
        .with_mode(mode)
        .with_format(LogFormat::Human)
        .with_min_level(if state.output.is_verbose() {
            LogLevel::Debug
        } else {
            LogLevel::Info
        });

    let config = &state.config;
    let delays = app::random_delays(config.min_delay_ms, config.max_delay_ms);
    let tree = app::build(&delays, fail.or(config.fail_slot));
    let session = RenderSession::new(config.render.clone().with_mode(mode));

    let timeout = config.session_timeout().map(|limit| {
        let handle = session.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::warn!(?limit, "session timed out");
            handle.abort();
        })
    });

    logger
        .debug("render session started")
        .field("delays_ms", delays.iter().map(|d| d.as_millis() as u64).collect::<Vec<_>>())
        .emit();

    if mode == RenderMode::Eager {
        let result = session.render_to_string(tree).await;
        if let Some(timeout) = timeout {
            timeout.abort();
        }
        return match result {
            Ok(html) => {
                logger.info("render session complete").field("bytes", html.len()).emit();
                ([(header::CONTENT_TYPE, HTML)], html).into_response()
            }
            Err(e) => {
                logger.error("render failed").field("error", e.to_string()).emit();
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        };
    }

    let mut collector = MetricsCollector::new(ctx.request_id.clone());
    collector.set_route(route);
    collector.set_mode(mode);
    let metrics = Arc::new(MetricsObserver::new(collector));

    let (tx, rx) = mpsc::channel::<Vec<u8>>(BODY_BUFFER);
    let (body, closed) = SessionBody::new(rx);
    let sink = StreamingSink::new(tx, ctx.timing).with_observer(metrics.clone());
    let output = state.output.clone();

    tokio::spawn(async move {
        let result = session
            .stream_until_closed(tree, sink, closed.map(|_| ()))
            .await;
        if let Some(timeout) = timeout {
            timeout.abort();
        }

        match result {
            Ok(report) => {
                metrics.with(|c| c.record_failures(report.failed));
                logger
                    .info("render session complete")
                    .field("slots", report.slots)
                    .field("failed", report.failed)
                    .field(
                        "patch_order",
                        report.patch_order.iter().map(|s| s.get()).collect::<Vec<_>>(),
                    )
                    .millis("elapsed_ms", report.elapsed)
                    .emit();
            }
            Err(RenderError::Aborted) => {
                logger.warn("render session aborted").emit();
            }
            Err(e) => {
                logger
                    .warn("render session ended early")
                    .field("error", e.to_string())
                    .field("fatal", e.is_fatal())
                    .emit();
            }
        }

        let summary = metrics.finalize(Some(StatusCode::OK.as_u16()));
        if let Some(tts) = summary.time_to_shell_us {
            output.debug(&format!("{} shell after {}", summary.request_id, format_us(tts)));
        }
        tracing::info!("\n{}", summary.to_summary());
    });

    (
        [(header::CONTENT_TYPE, HTML)],
        Body::from_stream(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request;
    use ssr_streaming::patch::{apply_patches, WireChunk};
    use tower::ServiceExt;

    use super::*;

    fn test_state(config: DemoConfig) -> AppState {
        AppState::new(config, Output::new(false))
    }

    fn fast_config() -> DemoConfig {
        DemoConfig {
            min_delay_ms: 1000,
            max_delay_ms: 5000,
            ..Default::default()
        }
    }

    async fn get_chunks(state: AppState, uri: &str) -> (StatusCode, Vec<String>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();

        let mut body = resp.into_body().into_data_stream();
        let mut chunks = Vec::new();
        while let Some(chunk) = body.next().await {
            chunks.push(String::from_utf8(chunk.unwrap().to_vec()).unwrap());
        }
        (status, chunks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeable_stream_sends_shell_then_patches() {
        let (status, chunks) = get_chunks(test_state(fast_config()), "/renderToPipeableStream").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chunks.len(), 7);

        let shell = &chunks[0];
        assert!(shell.starts_with("<!DOCTYPE html><html><head><title>Hello, React App</title>"));
        assert!(shell.contains("⏳️ Waiting for promise 3 to resolve…"));
        assert!(shell.contains(app::TRAILER));

        let mut patched = Vec::new();
        for chunk in &chunks[1..6] {
            match WireChunk::classify(chunk) {
                WireChunk::Patch { slot, markup } => patched.push((slot, markup)),
                other => panic!("expected patch, got {:?}", other),
            }
        }
        assert_eq!(WireChunk::classify(&chunks[6]), WireChunk::Terminator);

        let page = apply_patches(shell, &patched);
        for text in app::TEXTS {
            assert!(page.contains(&format!("<p>{}</p>", text)));
        }
        assert!(!page.contains("Waiting for promise"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_to_string_is_one_body() {
        let start = tokio::time::Instant::now();
        let (status, chunks) = get_chunks(test_state(fast_config()), "/renderToString").await;
        assert_eq!(status, StatusCode::OK);
        assert!(start.elapsed() >= Duration::from_millis(1000));

        let body = chunks.concat();
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("<p>✅ side</p>"));
        assert!(!body.contains("data-slot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_node_stream_writes_once() {
        let (_, chunks) = get_chunks(test_state(fast_config()), "/renderToStaticNodeStream").await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("<p>✅ Hello</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_only_returns_immediately() {
        let start = tokio::time::Instant::now();
        let (_, chunks) = get_chunks(test_state(fast_config()), "/fallbackOnly").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("⏳️ Waiting for promise 1 to resolve…"));
        assert!(!chunks[0].contains("✅"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_text_gets_error_markup() {
        let (_, chunks) = get_chunks(test_state(fast_config()), "/render?mode=buffered&fail=2").await;
        let body = chunks.concat();
        assert!(body.contains(ssr_core::DEFAULT_ERROR_MARKUP));
        assert!(!body.contains("✅ from"));
        assert!(body.contains("✅ other"));
    }

    #[tokio::test]
    async fn test_unknown_mode_is_bad_request() {
        let (status, chunks) = get_chunks(test_state(fast_config()), "/render?mode=sideways").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(chunks.concat().contains("unknown render mode"));
    }

    #[tokio::test]
    async fn test_fail_out_of_range_is_bad_request() {
        for uri in ["/render?fail=0", "/renderToPipeableStream?fail=6", "/renderToString?fail=9"] {
            let (status, chunks) = get_chunks(test_state(fast_config()), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert!(chunks.concat().contains("fail must be between 1 and 5"));
        }
    }

    #[tokio::test]
    async fn test_dropping_body_signals_closed() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
        let (body, closed) = SessionBody::new(rx);
        drop(body);

        assert!(closed.await.is_err());
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_timeout_ends_stream_early() {
        let config = DemoConfig {
            min_delay_ms: 10_000,
            max_delay_ms: 10_001,
            session_timeout_ms: Some(500),
            ..Default::default()
        };
        let (_, chunks) = get_chunks(test_state(config), "/renderToPipeableStream").await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(WireChunk::classify(&chunks[0]), WireChunk::Shell(_)));
    }
}
