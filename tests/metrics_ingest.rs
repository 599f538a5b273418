// tests/metrics_ingest.rs
#![cfg(feature = "strict-metrics")]

mod common;

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Duration;
use feed_curator::ingest::fetcher::StaticFetcher;
use feed_curator::metrics::Metrics;
use feed_curator::model::Source;
use feed_curator::store::{MemoryStore, Store};
use tower::ServiceExt as _;

use common::{ingestor, rss_feed, FeedEntry, BODY_LIMIT};

#[tokio::test]
async fn ingest_series_are_exported() {
    // Process-wide recorder; keep this the only test in the binary.
    let metrics = Metrics::init().expect("recorder");

    let store = Arc::new(MemoryStore::new());
    store
        .create_source(Source::new("ok", "https://ok.test/rss"))
        .await
        .unwrap();
    store
        .create_source(Source::new("down", "https://down.test/rss"))
        .await
        .unwrap();
    let fetcher = StaticFetcher::new()
        .with_feed(
            "https://ok.test/rss",
            rss_feed(&[
                FeedEntry::new("fresh", "https://ok.test/1", Duration::hours(1)),
                FeedEntry::new("old", "https://ok.test/2", Duration::days(30)),
            ]),
        )
        .with_failure("https://down.test/rss", "refused");
    let ing = ingestor(store, fetcher);

    let job = ing.create_job(None, None).await.unwrap();
    ing.wait(job.id).await;

    let text = metrics.render();
    for name in [
        "ingest_jobs_total",
        "ingest_items_stored_total",
        "ingest_items_skipped_total",
        "ingest_source_errors_total",
        "ingest_fetch_ms",
    ] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
    assert!(text.contains("reason=\"cutoff\""), "{text}");

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("ingest_items_stored_total"));
}
