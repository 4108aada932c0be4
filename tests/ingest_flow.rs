use chrono::NaiveDate;
use event_ingest::apis::eventbrite::EventbriteAdapter;
use event_ingest::apis::helpful_village::HelpfulVillageAdapter;
use event_ingest::apis::libnet::LibnetAdapter;
use event_ingest::apis::wordpress_mec::WordpressMecRssAdapter;
use event_ingest::apis::wordpress_rss::WordpressRssAdapter;
use event_ingest::apis::IngestContext;
use event_ingest::catalog::SourceCatalog;
use event_ingest::infra::http_client::ReqwestHttp;
use event_ingest::normalize::NormalizeSettings;
use event_ingest::pipeline::Pipeline;
use event_ingest::storage::{FileCache, InMemoryCache};
use event_ingest::types::{EventAdapter, EventSourceConfig};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn context(server: &ServerGuard) -> IngestContext {
    let http = ReqwestHttp::new("event_ingest-tests", Duration::from_secs(5)).unwrap();
    IngestContext {
        http: Arc::new(http),
        settings: NormalizeSettings::default(),
        eventbrite_api_base: format!("{}/v3", server.url()),
        eventbrite_token: Some("secret".into()),
        today: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
    }
}

fn source(url: String, name: &str, filters: serde_json::Value) -> EventSourceConfig {
    serde_json::from_value(json!({
        "url": url,
        "name": name,
        "city": "DC",
        "filters": filters
    }))
    .unwrap()
}

fn pipeline() -> Pipeline {
    Pipeline::new(Arc::new(InMemoryCache::new()))
}

const LIBNET_ROWS: &str = r#"[
    {"title": "Jazz in the Stacks", "url": "https://dclibrary.libnet.info/event/123",
     "raw_start_time": "2025-09-19 22:00:00", "description": "<p>Live jazz</p>",
     "calendar": "Mt Pleasant", "tagsArray": ["Live Music"]},
    {"title": "Book Club", "url": "https://dclibrary.libnet.info/event/124",
     "raw_start_time": "2025-09-20 10:00:00", "tagsArray": []}
]"#;

#[tokio::test]
async fn test_eventbrite_series_placeholder_expanded() {
    let mut server = Server::new_async().await;
    let listing = r#"<html><head><script type="application/ld+json">[
            {"name": "Weekly Repair", "url": "https://www.eventbrite.com/e/weekly-repair-555",
             "startDate": "2025-09-01T18:00:00-04:00", "endDate": "2025-12-01T20:00:00-05:00"},
            {"name": "Swap Meet", "url": "https://www.eventbrite.com/e/swap-meet-777",
             "startDate": "2025-09-13T10:00:00-04:00"}
        ]</script></head><body></body></html>"#;
    let listing_mock = server
        .mock("GET", "/o/bike-collective-1")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(listing)
        .create_async()
        .await;
    let series_mock = server
        .mock("GET", "/v3/series/555/events/")
        .match_query(Matcher::UrlEncoded("token".into(), "secret".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"events": [
                {"name": {"text": "Weekly Repair"}, "start": {"utc": "2025-09-08T22:00:00Z"},
                 "end": {"utc": "2025-09-09T00:00:00Z"}, "url": "https://www.eventbrite.com/e/x-1"},
                {"name": {"text": "Weekly Repair"}, "start": {"utc": "2025-09-15T22:00:00Z"},
                 "url": "https://www.eventbrite.com/e/x-2"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let ctx = context(&server);
    let sources = vec![source(
        format!("{}/o/bike-collective-1", server.url()),
        "Bike Collective",
        json!([["bikes", "bike", "repair"]]),
    )];
    let bundles = pipeline()
        .run_adapter(Arc::new(EventbriteAdapter::new(&ctx)), sources)
        .await;

    listing_mock.assert_async().await;
    series_mock.assert_async().await;
    let events = &bundles[0].events;
    assert_eq!(events.len(), 3);
    assert!(events[..2].iter().all(|e| e.org == "Bike Collective"));
    assert_eq!(events[0].start.to_rfc3339(), "2025-09-08T22:00:00+00:00");
    assert_eq!(events[1].end, events[1].start);
    assert_eq!(events[2].title, "Swap Meet @ Bike Collective");
}

#[tokio::test]
async fn test_libnet_native_tags_and_failed_source_keeps_position() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/east/eeventcaldata")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(LIBNET_ROWS)
        .create_async()
        .await;
    server
        .mock("GET", "/west/eeventcaldata")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let ctx = context(&server);
    let sources = vec![
        source(format!("{}/east/eeventcaldata", server.url()), "East Library", json!([])),
        source(format!("{}/west/eeventcaldata", server.url()), "West Library", json!([])),
        source(format!("{}/east/eeventcaldata", server.url()), "East Again", json!([["books", "book"]])),
    ];
    let bundles = pipeline()
        .run_adapter(Arc::new(LibnetAdapter::new(&ctx)), sources)
        .await;

    let names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["East Library", "West Library", "East Again"]);
    assert_eq!(bundles[0].events.len(), 2);
    assert!(bundles[1].events.is_empty());
    assert_eq!(bundles[0].events[0].tags, vec!["live_music"]);
    assert_eq!(bundles[0].events[0].start.to_rfc3339(), "2025-09-20T02:00:00+00:00");
    assert_eq!(bundles[2].events[1].tags, vec!["books"]);
}

#[tokio::test]
async fn test_repeated_runs_are_stable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/lib/eeventcaldata")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(LIBNET_ROWS)
        .expect(2)
        .create_async()
        .await;

    let ctx = context(&server);
    let adapter: Arc<dyn EventAdapter> = Arc::new(LibnetAdapter::new(&ctx));
    let sources = vec![source(format!("{}/lib/eeventcaldata", server.url()), "Library", json!([["music", "jazz"]]))];
    let pipeline = pipeline();

    let first = pipeline.run_adapter(adapter.clone(), sources.clone()).await;
    let second = pipeline.run_adapter(adapter, sources).await;

    let key = |b: &event_ingest::types::SourceResultBundle| {
        b.events
            .iter()
            .map(|e| (e.id.clone(), e.title.clone(), e.tags.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&first[0]), key(&second[0]));
    assert!(first[0].events.iter().all(|e| e.id.is_some()));
}

#[tokio::test]
async fn test_malformed_mec_feed_yields_empty_bundle() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/bad/feed/")
        .with_status(200)
        .with_body("<rss><channel><item><title>Broken</channel>")
        .create_async()
        .await;
    server
        .mock("GET", "/good/feed/")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(
            r#"<rss version="2.0" xmlns:mec="http://webnus.net/rss/mec/"><channel><item>
                <title>Jazz Jam</title><link>https://community.example.org/events/jam/</link>
                <mec:startDate>2025-09-19</mec:startDate><mec:startHour>10:00 pm</mec:startHour>
            </item></channel></rss>"#,
        )
        .create_async()
        .await;

    let ctx = context(&server);
    let sources = vec![
        source(format!("{}/bad/feed/", server.url()), "Broken Feed", json!([])),
        source(format!("{}/good/feed/", server.url()), "Community Center", json!([])),
    ];
    let bundles = pipeline()
        .run_adapter(Arc::new(WordpressMecRssAdapter::new(&ctx)), sources)
        .await;

    assert_eq!(bundles[0].name, "Broken Feed");
    assert_eq!(bundles[0].city, "DC");
    assert!(bundles[0].events.is_empty());
    let jam = &bundles[1].events[0];
    assert_eq!(jam.start.to_rfc3339(), "2025-09-20T02:00:00+00:00");
    assert_eq!(jam.end, jam.start);
}

#[tokio::test]
async fn test_rss_page_enrichment_and_placeholder_fallback() {
    let mut server = Server::new_async().await;
    let base = server.url();
    server
        .mock("GET", "/feed/")
        .with_status(200)
        .with_body(format!(
            r#"<rss version="2.0"><channel>
                <item><title>Late Night Jazz</title><link>{base}/event/jazz/</link>
                  <pubDate>Mon, 01 Sep 2025 12:00:00 +0000</pubDate></item>
                <item><title>Gone Page</title><link>{base}/event/gone/</link>
                  <pubDate>Tue, 02 Sep 2025 12:00:00 +0000</pubDate></item>
            </channel></rss>"#
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/event/jazz/")
        .with_status(200)
        .with_body(
            r#"<html><body><div><strong>Start Date:<span>2025/09/19 10:00 pm</span></strong></div>
               <p>3203 Mt Pleasant St NW, Washington DC 20010</p></body></html>"#,
        )
        .create_async()
        .await;
    let gone = server
        .mock("GET", "/event/gone/")
        .with_status(404)
        .create_async()
        .await;

    let ctx = context(&server);
    let sources = vec![source(format!("{}/feed/", base), "Marx Cafe", json!([["music", "jazz"]]))];
    let bundles = pipeline()
        .run_adapter(Arc::new(WordpressRssAdapter::new(&ctx)), sources)
        .await;

    gone.assert_async().await;
    let events = &bundles[0].events;
    assert_eq!(events.len(), 2);

    let jazz = &events[0];
    assert_eq!(jazz.start.to_rfc3339(), "2025-09-20T02:00:00+00:00");
    assert_eq!(jazz.end, jazz.start);
    assert_eq!(
        jazz.location.as_deref(),
        Some("Marx Cafe, 3203 Mt Pleasant St NW, Washington DC 20010")
    );
    assert!(jazz.id.is_some());
    assert_eq!(jazz.tags, vec!["music"]);

    let placeholder = &events[1];
    assert_eq!(placeholder.start.to_rfc3339(), "2025-09-02T12:00:00+00:00");
    assert!(placeholder.id.is_none());
    assert!(!placeholder.extended_props.needs_date_extraction);
}

#[tokio::test]
async fn test_helpful_village_detail_pages() {
    let mut server = Server::new_async().await;
    let base = server.url();
    server
        .mock("GET", "/events.json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "2025-09-01".into()),
            Matcher::UrlEncoded("end".into(), "2025-10-01".into()),
        ]))
        .with_status(200)
        .with_body(
            json!([
                {"title": "Potluck", "url": format!("{base}/events/11-potluck"), "calendar": "Community"},
                {"title": "Board Meeting", "url": format!("{base}/events/12")}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/events/11")
        .with_status(200)
        .with_body(
            r#"<html><head><script type="application/ld+json">//<![CDATA[
{"startDate": "2025-09-12T18:00:00-04:00", "location": {"name": "Lamont Park"}, "description": "Bring a dish"}
//]]></script></head><body></body></html>"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/events/12")
        .with_status(200)
        .with_body("<html><body><div>Members Only</div></body></html>")
        .create_async()
        .await;

    let ctx = context(&server);
    let sources = vec![source(format!("{base}/events.json"), "Mount Pleasant Village", json!([]))];
    let bundles = pipeline()
        .run_adapter(Arc::new(HelpfulVillageAdapter::new(&ctx)), sources)
        .await;

    let events = &bundles[0].events;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].url, format!("{base}/events/11"));
    assert_eq!(events[0].location.as_deref(), Some("Lamont Park"));
    assert_eq!(events[0].start.to_rfc3339(), "2025-09-12T22:00:00+00:00");
}

#[tokio::test]
async fn test_file_cache_snapshot_survives_missing_family() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/lib/eeventcaldata")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(LIBNET_ROWS)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server);
    let catalog = SourceCatalog::from_json(
        &json!({"libnet": [{"url": format!("{}/lib/eeventcaldata", server.url()), "name": "Library", "city": "DC"}]})
            .to_string(),
    )
    .unwrap();

    let fresh = Pipeline::new(Arc::new(FileCache::new(dir.path())))
        .run_family(Arc::new(LibnetAdapter::new(&ctx)), &catalog)
        .await;
    assert_eq!(fresh[0].events.len(), 2);
    assert!(dir.path().join("libnetSources.json").exists());

    let empty_catalog = SourceCatalog::from_json("{}").unwrap();
    let served = Pipeline::new(Arc::new(FileCache::new(dir.path())))
        .run_family(Arc::new(LibnetAdapter::new(&ctx)), &empty_catalog)
        .await;
    assert_eq!(served, fresh);
}
