// tests/fetcher_http.rs
//
// HttpFetcher against a loopback Axum server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use feed_curator::ingest::fetcher::{FeedFetcher, FetchError, HttpFetcher, DEFAULT_USER_AGENT};

const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Loop</title>
<item><title>hello</title><link>https://loop.test/1</link>
<pubDate>Wed, 01 May 2024 00:00:00 +0000</pubDate></item>
</channel></rss>"#;

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/rss", get(|| async { FEED }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/html", get(|| async { "<html><body>hi</body></html>" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                FEED
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher(timeout: Duration) -> HttpFetcher {
    HttpFetcher::new(timeout, DEFAULT_USER_AGENT).expect("client")
}

#[tokio::test]
async fn fetches_and_parses_feed() {
    let addr = serve().await;
    let items = fetcher(Duration::from_secs(5))
        .fetch(&format!("http://{addr}/rss"))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].link.as_deref(), Some("https://loop.test/1"));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let addr = serve().await;
    let err = fetcher(Duration::from_secs(5))
        .fetch(&format!("http://{addr}/broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status(500)), "{err}");
}

#[tokio::test]
async fn non_feed_body_is_malformed() {
    let addr = serve().await;
    let err = fetcher(Duration::from_secs(5))
        .fetch(&format!("http://{addr}/html"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)), "{err}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let addr = serve().await;
    let err = fetcher(Duration::from_millis(200))
        .fetch(&format!("http://{addr}/slow"))
        .await
        .unwrap_err();
    match err {
        FetchError::Http(e) => assert!(e.is_timeout(), "{e}"),
        other => panic!("expected timeout, got {other}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_an_http_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = fetcher(Duration::from_secs(2))
        .fetch(&format!("http://{addr}/rss"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Http(_)), "{err}");
}
