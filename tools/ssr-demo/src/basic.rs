//! Chunked response demo: a tiny page written one line at a time.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;

/// Lines of the page, each written after one chunk delay.
pub const LINES: [&str; 10] = [
    "<head>",
    "  <title>Hello HTTP Streams</title>",
    "</head>",
    "<body>",
    "  <p>1</p>",
    "  <p>2</p>",
    "  <p>3</p>",
    "  <p>4</p>",
    "  <p>5</p>",
    "</body>",
];

/// Router serving the chunked page on `/`.
pub fn router(chunk_delay: Duration) -> Router {
    Router::new().route("/", get(page)).with_state(chunk_delay)
}

async fn page(State(chunk_delay): State<Duration>) -> impl IntoResponse {
    tracing::info!(lines = LINES.len(), "streaming chunked page");

    let body = futures::stream::iter(LINES).then(move |line| async move {
        tokio::time::sleep(chunk_delay).await;
        tracing::debug!(line, "chunk written");
        Ok::<_, Infallible>(format!("{}\n", line))
    });

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(body),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_page_streams_all_lines() {
        let start = tokio::time::Instant::now();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = router(Duration::from_secs(1)).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let mut body = resp.into_body().into_data_stream();
        let mut chunks = Vec::new();
        while let Some(chunk) = body.next().await {
            chunks.push(String::from_utf8(chunk.unwrap().to_vec()).unwrap());
        }

        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[0], "<head>\n");
        assert_eq!(chunks[9], "</body>\n");
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
