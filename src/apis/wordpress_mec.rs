use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    CONTENT_NAMESPACE, DC_NAMESPACE, MEC_NAMESPACE, WORDPRESS_MEC_RSS_API,
    WORDPRESS_MEC_RSS_CACHE_KEY, WORDPRESS_MEC_RSS_CATALOG_KEY,
};
use crate::error::{Result, ScraperError};
use crate::extract::{first_image_src, html_to_text};
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::time::parse_date_and_clock;
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};
use crate::xml::{self, lookup, XmlElement};

pub const UNTITLED: &str = "No Title";

/// Fetch and parse an RSS document. Non-2xx and malformed XML are both errors.
pub async fn fetch_feed(http: &dyn HttpClientPort, url: &str) -> Result<XmlElement> {
    let response = http.get(url).await?;
    if !response.is_success() {
        return Err(ScraperError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }
    xml::parse_document(&response.text())
}

/// Body HTML of an item: `content:encoded` when present, else `description`.
pub fn item_body(item: &XmlElement) -> Option<String> {
    lookup(item, Some(CONTENT_NAMESPACE), "encoded")
        .filter(|body| !body.is_empty())
        .or_else(|| lookup(item, None, "description").filter(|body| !body.is_empty()))
}

/// Clean description text and first image of an item body.
pub fn describe(item: &XmlElement) -> (String, Option<String>) {
    match item_body(item) {
        Some(body) => (html_to_text(&body), first_image_src(&body)),
        None => (String::new(), None),
    }
}

/// Convert an item carrying MEC event fields.
pub fn mec_item_to_draft(
    item: &XmlElement,
    source: &EventSourceConfig,
    settings: &NormalizeSettings,
) -> Result<EventDraft> {
    let tz = settings.timezone;
    let link = lookup(item, None, "link")
        .filter(|link| !link.is_empty())
        .ok_or_else(|| ScraperError::MissingField("link".into()))?;
    let title = lookup(item, None, "title")
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mec = |name: &str| lookup(item, Some(MEC_NAMESPACE), name).filter(|v| !v.is_empty());
    let start = match (mec("startDate"), mec("startHour")) {
        (Some(date), Some(hour)) => parse_date_and_clock(&date, &hour, tz),
        _ => None,
    };
    let end = match (mec("endDate"), mec("endHour")) {
        (Some(date), Some(hour)) => parse_date_and_clock(&date, &hour, tz),
        _ => None,
    };

    let (text, image) = describe(item);
    let mut draft = EventDraft {
        title,
        org: source.name.clone(),
        start,
        end,
        description: with_more_info_link(&text, &link, false),
        tag_text: Some(text.clone()),
        url: link,
        location: mec("location"),
        images: image.into_iter().collect(),
        timing_reliable: start.is_some(),
        ..Default::default()
    };
    draft.extended_props.category = mec("category");
    draft.extended_props.creator = lookup(item, Some(DC_NAMESPACE), "creator").filter(|c| !c.is_empty());
    Ok(draft)
}

/// Convert every item of an MEC feed, dropping the ones that fail.
pub fn convert_mec_feed(
    document: &XmlElement,
    source: &EventSourceConfig,
    settings: &NormalizeSettings,
) -> Vec<CanonicalEvent> {
    xml::items(document)
        .into_iter()
        .filter_map(|item| {
            match mec_item_to_draft(item, source, settings).and_then(|d| d.finish(source, settings)) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!("{}: dropping item: {}", source.name, e);
                    None
                }
            }
        })
        .collect()
}

/// Event-calendar plugin feeds with namespaced event fields
pub struct WordpressMecRssAdapter {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
}

impl WordpressMecRssAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            http: ctx.http.clone(),
            settings: ctx.settings,
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for WordpressMecRssAdapter {
    fn adapter_name(&self) -> &'static str {
        WORDPRESS_MEC_RSS_API
    }

    fn catalog_key(&self) -> &'static str {
        WORDPRESS_MEC_RSS_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        WORDPRESS_MEC_RSS_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let document = fetch_feed(self.http.as_ref(), &source.url).await.map_err(|e| {
            warn!("{}: feed unavailable: {}", source.name, e);
            e
        })?;
        let events = convert_mec_feed(&document, source, &self.settings);
        info!("Fetched {} events from {}", events.len(), source.name);
        Ok(events)
    }
}
