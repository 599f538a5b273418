// tests/feed_parse.rs
//
// Fixture documents for each supported feed dialect.

use chrono::{TimeZone, Utc};
use feed_curator::analyze::ContentAnalyzer;
use feed_curator::ingest::fetcher::{FeedFetcher, FetchError, StaticFetcher};
use feed_curator::ingest::parse::parse_feed;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

#[test]
fn rss2_fixture() {
    let items = parse_feed(&fixture("rss2.xml")).unwrap();
    assert_eq!(items.len(), 3);

    let q = &items[0];
    assert_eq!(q.title, "Queue design & backpressure");
    assert_eq!(q.link.as_deref(), Some("https://systems.test/queues"));
    assert_eq!(q.summary, "How bounded queues keep latency flat.");
    assert_eq!(
        q.body.as_deref(),
        Some(r#"<p>Bounded queues <a href="https://ext.test/paper">paper</a></p>"#)
    );
    assert_eq!(q.author.as_deref(), Some("R. Chen"));
    assert_eq!(q.categories, vec!["queues".to_string(), "performance".to_string()]);
    assert_eq!(
        q.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 7, 9, 30, 0).unwrap())
    );

    let g = &items[1];
    assert_eq!(g.link.as_deref(), Some("https://systems.test/guid-only"));
    assert_eq!(
        g.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 6, 18, 0, 0).unwrap())
    );
    assert!(g.body.is_none());

    assert!(items[2].published_at.is_none());
}

#[test]
fn atom_xhtml_fixture() {
    let items = parse_feed(&fixture("atom_xhtml.xml")).unwrap();
    assert_eq!(items.len(), 2);

    let c = &items[0];
    assert_eq!(c.title, "Café & cache\u{a0}tuning");
    assert_eq!(c.link.as_deref(), Some("https://cafe.test/cache?lang=fr&v=2"));
    assert_eq!(c.summary, "Guide — short");
    assert_eq!(
        c.published_at,
        Some(Utc.with_ymd_and_hms(2024, 6, 1, 7, 45, 0).unwrap())
    );
    let body = c.body.as_deref().expect("xhtml body");
    assert!(body.starts_with(r#"<div xmlns="http://www.w3.org/1999/xhtml">"#), "{body}");
    assert!(body.contains(r#"<a href="https://paper.test/lru">LRU paper</a>"#), "{body}");
    assert!(body.contains("a &lt; b"), "{body}");
    assert!(body.ends_with("</div>"), "{body}");

    let score = ContentAnalyzer::default().analyze(&c.title, &c.summary, Some(body));
    // One external link out of two anchors.
    assert_eq!(score.components.links, 0.5);

    assert_eq!(
        items[1].published_at,
        Some(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap())
    );
}

#[test]
fn atom_fixture() {
    let items = parse_feed(&fixture("atom.xml")).unwrap();
    assert_eq!(items.len(), 2);

    let c = &items[0];
    assert_eq!(c.title, "Compaction strategies");
    assert_eq!(c.link.as_deref(), Some("https://storage.test/compaction"));
    assert_eq!(c.summary, "Leveled vs tiered.");
    assert_eq!(
        c.body.as_deref(),
        Some("<p>Leveled <b>vs</b> tiered compaction.</p>")
    );
    assert_eq!(c.author.as_deref(), Some("M. Ortiz"));
    assert_eq!(c.categories, vec!["lsm".to_string(), "storage".to_string()]);
    assert_eq!(
        c.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 8, 6, 15, 0).unwrap())
    );

    let u = &items[1];
    assert_eq!(u.link.as_deref(), Some("https://storage.test/updated-only"));
    assert_eq!(
        u.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap())
    );
}

#[test]
fn rdf_fixture() {
    let items = parse_feed(&fixture("rdf.xml")).unwrap();
    assert_eq!(items.len(), 1);
    let r = &items[0];
    assert_eq!(r.link.as_deref(), Some("https://legacy.test/one"));
    assert_eq!(r.categories, vec!["history".to_string()]);
    assert_eq!(
        r.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 5, 7, 0, 0).unwrap())
    );
}

#[test]
fn channel_metadata_is_not_an_item() {
    let xml = r#"<rss version="2.0"><channel><title>Only channel</title>
        <link>https://x.test/</link></channel></rss>"#;
    assert!(parse_feed(xml).unwrap().is_empty());
}

#[test]
fn broken_documents_are_malformed() {
    for doc in [
        "",
        "just text",
        "<html><head/></html>",
        "<rss><channel><item><title>cut",
    ] {
        match parse_feed(doc) {
            Err(FetchError::Malformed(_)) => {}
            other => panic!("{doc:?}: expected malformed, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn static_fetcher_serves_fixtures() {
    let fetcher = StaticFetcher::new()
        .with_feed("https://storage.test/atom", fixture("atom.xml"))
        .with_failure("https://down.test/rss", "503 from upstream");

    let items = fetcher.fetch("https://storage.test/atom").await.unwrap();
    assert_eq!(items.len(), 2);

    let err = fetcher.fetch("https://down.test/rss").await.unwrap_err();
    assert!(err.to_string().contains("503 from upstream"));

    let err = fetcher.fetch("https://nowhere.test/").await.unwrap_err();
    assert!(matches!(err, FetchError::Unavailable(_)));
}
