use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::wordpress_mec::{convert_mec_feed, describe, fetch_feed, UNTITLED};
use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    DC_NAMESPACE, TITLE_DATED_SOURCE_NAME, WORDPRESS_RSS_API, WORDPRESS_RSS_CACHE_KEY,
    WORDPRESS_RSS_CATALOG_KEY,
};
use crate::enrich::PageEnricher;
use crate::error::{Result, ScraperError};
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::time::{parse_clock, parse_rfc2822, resolve_local};
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};
use crate::xml::{self, lookup, XmlElement};

static TITLE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:mon|tues|wednes|thurs|fri|satur|sun)day,?\s+(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})\s*:")
        .expect("static regex")
});
static TIME_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?::\d{2})?\s*[ap]\.?m\b\.?)").expect("static regex")
});

/// Date from a `Weekday M/D/YY: ...` title plus the first clock phrase found
/// in the title or description; midnight when no time is given.
pub fn title_dated_start(title: &str, description: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let captures = TITLE_DATE.captures(title)?;
    let month: u32 = captures.get(1)?.as_str().parse().ok()?;
    let day: u32 = captures.get(2)?.as_str().parse().ok()?;
    let year_text = captures.get(3)?.as_str();
    let mut year: i32 = year_text.parse().ok()?;
    if year_text.len() == 2 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time = [title, description]
        .iter()
        .find_map(|text| {
            TIME_PHRASE
                .captures_iter(text)
                .find_map(|c| parse_clock(c.get(1)?.as_str()))
        })
        .or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
    resolve_local(date.and_time(time), tz)
}

/// Convert a plain RSS item. Its publication date is only a placeholder, so
/// the draft is flagged for page enrichment.
pub fn standard_item_to_draft(
    item: &XmlElement,
    source: &EventSourceConfig,
    settings: &NormalizeSettings,
) -> Result<EventDraft> {
    let link = lookup(item, None, "link")
        .filter(|link| !link.is_empty())
        .ok_or_else(|| ScraperError::MissingField("link".into()))?;
    let title = lookup(item, None, "title")
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let published = lookup(item, None, "pubDate").and_then(|d| parse_rfc2822(&d));

    let (text, image) = describe(item);
    let mut draft = EventDraft {
        org: source.name.clone(),
        start: published,
        end: published,
        description: with_more_info_link(&text, &link, false),
        tag_text: Some(text.clone()),
        url: link,
        images: image.into_iter().collect(),
        ..Default::default()
    };
    draft.extended_props.creator = lookup(item, Some(DC_NAMESPACE), "creator").filter(|c| !c.is_empty());

    if source.name == TITLE_DATED_SOURCE_NAME {
        if let Some(start) = title_dated_start(&title, &text, settings.timezone) {
            draft.start = Some(start);
            draft.end = Some(start);
            draft.timing_reliable = true;
        }
    }
    draft.extended_props.needs_date_extraction = !draft.timing_reliable;
    draft.title = title;
    Ok(draft)
}

/// Blog feeds; event timing lives on each post's page
pub struct WordpressRssAdapter {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
    enricher: PageEnricher,
}

impl WordpressRssAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            http: ctx.http.clone(),
            settings: ctx.settings,
            enricher: PageEnricher::new(ctx.http.clone(), ctx.settings),
        }
    }

    fn finish(&self, draft: EventDraft, source: &EventSourceConfig) -> Option<CanonicalEvent> {
        match draft.finish(source, &self.settings) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("{}: dropping item: {}", source.name, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for WordpressRssAdapter {
    fn adapter_name(&self) -> &'static str {
        WORDPRESS_RSS_API
    }

    fn catalog_key(&self) -> &'static str {
        WORDPRESS_RSS_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        WORDPRESS_RSS_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let document = fetch_feed(self.http.as_ref(), &source.url).await.map_err(|e| {
            warn!("{}: feed unavailable: {}", source.name, e);
            e
        })?;

        if source.is_mec {
            let events = convert_mec_feed(&document, source, &self.settings);
            info!("Fetched {} events from {}", events.len(), source.name);
            return Ok(events);
        }

        let drafts: Vec<EventDraft> = xml::items(&document)
            .into_iter()
            .filter_map(|item| match standard_item_to_draft(item, source, &self.settings) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    debug!("{}: dropping item: {}", source.name, e);
                    None
                }
            })
            .collect();

        let enriched = join_all(
            drafts
                .into_iter()
                .map(|draft| self.enricher.enrich(draft, &source.name)),
        )
        .await;

        let events: Vec<CanonicalEvent> = enriched
            .into_iter()
            .filter_map(|draft| self.finish(draft, source))
            .collect();
        info!("Fetched {} events from {}", events.len(), source.name);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::test_support::{context, StaticHttp};
    use crate::constants::MARX_CAFE_SOURCE_NAME;
    use chrono_tz::America::New_York;
    use serde_json::json;

    const FEED_URL: &str = "https://marxcafe.com/feed/";

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
  <item>
    <title>Late Night Jazz</title>
    <link>https://marxcafe.com/event/late-night-jazz/</link>
    <pubDate>Mon, 01 Sep 2025 12:00:00 +0000</pubDate>
    <dc:creator>marx</dc:creator>
    <description><![CDATA[<p>Jazz all night</p>]]></description>
  </item>
  <item>
    <title>Gone Page</title>
    <link>https://marxcafe.com/event/gone/</link>
    <pubDate>Tue, 02 Sep 2025 12:00:00 +0000</pubDate>
  </item>
  <item>
    <title>Never Dated</title>
    <link>https://marxcafe.com/event/never-dated/</link>
  </item>
</channel>
</rss>"#;

    const JAZZ_PAGE: &str = r#"<html><head><meta property="og:image" content="https://marxcafe.com/jazz.jpg"></head>
<body><div><strong>Start Date:<span>2025/09/19 10:00 pm</span></strong>
<strong>End Date:<span>2025/09/20 1:00 am</span></strong></div>
<p>3203 Mt Pleasant St NW, Washington DC 20010</p></body></html>"#;

    fn source(name: &str) -> EventSourceConfig {
        serde_json::from_value(json!({
            "url": FEED_URL,
            "name": name,
            "city": "DC",
            "filters": [["music", "jazz"]]
        }))
        .unwrap()
    }

    #[test]
    fn test_title_dated_start() {
        let start = title_dated_start("Friday 9/19/25: The Band", "Doors 8:30 pm", New_York).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-09-20T00:30:00+00:00");

        let start = title_dated_start("Saturday 9/20/25: Early show 7pm", "", New_York).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-09-20T23:00:00+00:00");

        let midnight = title_dated_start("Sunday 9/21/25: Brunch", "", New_York).unwrap();
        assert_eq!(midnight.to_rfc3339(), "2025-09-21T04:00:00+00:00");

        assert!(title_dated_start("The Band on 9/19", "8 pm", New_York).is_none());
    }

    #[tokio::test]
    async fn test_enrichment_and_placeholder_fallback() {
        let http = StaticHttp::default()
            .with(FEED_URL, 200, FEED)
            .with("https://marxcafe.com/event/late-night-jazz/", 200, JAZZ_PAGE);
        let adapter = WordpressRssAdapter::new(&context(http));
        let events = adapter.fetch_and_normalize(&source(MARX_CAFE_SOURCE_NAME)).await.unwrap();

        // The undated item has neither a placeholder nor a page
        assert_eq!(events.len(), 2);

        let jazz = &events[0];
        assert_eq!(jazz.start.to_rfc3339(), "2025-09-20T02:00:00+00:00");
        assert_eq!(jazz.end.to_rfc3339(), "2025-09-20T05:00:00+00:00");
        assert_eq!(jazz.id.as_deref(), Some("2509192200lat"));
        assert_eq!(
            jazz.location.as_deref(),
            Some("Marx Cafe, 3203 Mt Pleasant St NW, Washington DC 20010")
        );
        assert_eq!(jazz.images, vec!["https://marxcafe.com/jazz.jpg"]);
        assert!(!jazz.extended_props.needs_date_extraction);
        assert_eq!(jazz.tags, vec!["music"]);

        let gone = &events[1];
        assert_eq!(gone.start.to_rfc3339(), "2025-09-02T12:00:00+00:00");
        assert_eq!(gone.end, gone.start);
        assert!(gone.id.is_none());
        assert!(!gone.extended_props.needs_date_extraction);
    }

    #[test]
    fn test_plain_item_tags_ignore_more_info_link() {
        let feed = xml::parse_document(
            r#"<rss><channel><item>
                <title>Trivia Night</title>
                <link>https://marxcafe.com/event/jazz-trivia/</link>
                <pubDate>Mon, 01 Sep 2025 12:00:00 +0000</pubDate>
                <description>Teams of four</description>
            </item></channel></rss>"#,
        )
        .unwrap();
        let item = xml::items(&feed)[0];
        let source = source("Some Bar");
        let settings = NormalizeSettings::default();

        let event = standard_item_to_draft(item, &source, &settings)
            .unwrap()
            .finish(&source, &settings)
            .unwrap();
        assert!(event.description.contains("jazz-trivia"));
        assert!(event.tags.is_empty());
    }

    #[tokio::test]
    async fn test_title_dated_source_skips_page_fetch() {
        let feed = r#"<rss><channel><item>
            <title>Friday 9/19/25: Punk Night</title>
            <link>https://unreachable.example.org/punk</link>
            <description>Doors at 9 pm</description>
        </item></channel></rss>"#;
        let http = StaticHttp::default().with(FEED_URL, 200, feed);
        let adapter = WordpressRssAdapter::new(&context(http));
        let events = adapter.fetch_and_normalize(&source(TITLE_DATED_SOURCE_NAME)).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.to_rfc3339(), "2025-09-20T01:00:00+00:00");
        assert!(events[0].id.is_some());
    }

    #[tokio::test]
    async fn test_mec_flag_uses_mec_conversion() {
        let feed = r#"<rss xmlns:mec="http://webnus.net/rss/mec/"><channel><item>
            <title>Jazz Jam</title><link>https://example.org/jam</link>
            <mec:startDate>2025-09-19</mec:startDate><mec:startHour>10:00 pm</mec:startHour>
        </item></channel></rss>"#;
        let mut mec_source = source("Community Center");
        mec_source.is_mec = true;
        let adapter = WordpressRssAdapter::new(&context(StaticHttp::default().with(FEED_URL, 200, feed)));

        let events = adapter.fetch_and_normalize(&mec_source).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.to_rfc3339(), "2025-09-20T02:00:00+00:00");
    }
}
