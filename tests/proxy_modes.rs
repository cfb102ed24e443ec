//! Buffered and streaming proxy behavior against real sockets.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;

mod common;

const PAGE: &str = "<html><body><h1>app</h1></body></html>";

fn bearer() -> String {
    format!("Bearer {}", common::TOKEN)
}

#[tokio::test]
async fn html_gets_portal_button_and_new_length() {
    let backend = common::start_mock_backend("text/html; charset=utf-8", PAGE).await;
    let portal = common::start_portal(backend).await;

    let response = common::client()
        .get(portal.url("/app"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let declared: usize = response.headers()[CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = response.text().await.unwrap();

    assert_eq!(declared, body.len());
    assert!(body.len() > PAGE.len());
    let button = body.find("portal-nav-btn").unwrap();
    let close = body.find("</body>").unwrap();
    assert!(button < close);
    assert!(body.starts_with("<html><body><h1>app</h1>"));
}

#[tokio::test]
async fn non_html_is_untouched() {
    let json = r#"{"body":"</body>"}"#;
    let backend = common::start_mock_backend("application/json", json).await;
    let portal = common::start_portal(backend).await;

    let response = common::client()
        .get(portal.url("/api/data"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), json);
}

#[tokio::test]
async fn upstream_sees_its_own_host_and_forwarded_for() {
    let backend = common::start_echo_backend().await;
    let portal = common::start_portal(backend).await;

    let head = common::client()
        .get(portal.url("/echo?x=1"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
        .to_ascii_lowercase();

    assert!(head.starts_with("get /echo?x=1 http/1.1"));
    assert!(head.contains(&format!("host: {}", backend)));
    assert!(head.contains("x-forwarded-for: 127.0.0.1"));
}

#[tokio::test]
async fn stream_path_relays_each_line_then_closes() {
    static LINES: &[&str] = &["data: one\n", "data: two\n", "data: three\n"];
    let backend = common::start_sse_backend(LINES, Duration::from_millis(200)).await;
    let portal = common::start_portal(backend).await;

    let started = Instant::now();
    let mut response = common::client()
        .get(portal.url("/events/stream"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let mut first_line_at = None;
    let mut received = Vec::new();
    while let Some(chunk) = response.chunk().await.unwrap() {
        first_line_at.get_or_insert_with(|| started.elapsed());
        received.extend_from_slice(&chunk);
    }

    assert_eq!(
        String::from_utf8(received).unwrap(),
        "data: one\ndata: two\ndata: three\n"
    );
    // The first line arrives before the upstream has finished writing.
    assert!(first_line_at.unwrap() < Duration::from_millis(500));
}

#[tokio::test]
async fn dropped_stream_closes_upstream_connection() {
    let (backend, mut upstream_closed) =
        common::start_endless_sse_backend("data: tick\n", Duration::from_millis(50)).await;
    let portal = common::start_portal(backend).await;

    let mut response = common::client()
        .get(portal.url("/events/stream"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap();
    let first = response.chunk().await.unwrap().unwrap();
    assert!(first.starts_with(b"data: tick\n"));

    // Abandon the stream mid-flight; the upstream must notice.
    drop(response);

    let closed = tokio::time::timeout(Duration::from_secs(10), upstream_closed.recv()).await;
    assert!(
        matches!(closed, Ok(Some(()))),
        "upstream kept writing after the client went away"
    );
}

#[tokio::test]
async fn accept_header_selects_streaming() {
    static LINES: &[&str] = &["event: ping\n", "\n"];
    let backend = common::start_sse_backend(LINES, Duration::from_millis(10)).await;
    let portal = common::start_portal(backend).await;

    let response = common::client()
        .get(portal.url("/events"))
        .header(AUTHORIZATION, bearer())
        .header("accept", "text/event-stream")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.text().await.unwrap(), "event: ping\n\n");
}

#[tokio::test]
async fn dead_upstream_is_bad_gateway() {
    let portal = common::start_portal(common::dead_address().await).await;

    let response = common::client()
        .get(portal.url("/"))
        .header(AUTHORIZATION, bearer())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text().await.unwrap(), "Upstream request failed");
}
