use chrono::Duration;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::apis::eventbrite_series::EventbriteSeriesClient;
use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    EVENTBRITE_API, EVENTBRITE_CACHE_KEY, EVENTBRITE_CATALOG_KEY, SERIES_PLACEHOLDER_MIN_DAYS,
};
use crate::error::{Result, ScraperError};
use crate::extract::json_ld_blocks;
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::time::parse_iso_instant;
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};
use std::sync::Arc;

/// Shapes a listing page's structured data block comes in, most specific first
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StructuredData {
    Bare(Vec<Value>),
    Events {
        events: Vec<Value>,
    },
    ItemList {
        #[serde(rename = "itemListElement")]
        item_list_element: Vec<Value>,
    },
    Graph {
        #[serde(rename = "@graph")]
        graph: Vec<Value>,
    },
    #[allow(dead_code)]
    Other(Value),
}

impl StructuredData {
    fn into_records(self) -> Vec<Value> {
        let records = match self {
            StructuredData::Bare(records)
            | StructuredData::Events { events: records }
            | StructuredData::ItemList {
                item_list_element: records,
            }
            | StructuredData::Graph { graph: records } => records,
            StructuredData::Other(_) => Vec::new(),
        };
        records
            .into_iter()
            .map(|record| match record {
                // ListItem wrappers carry the event under `item`
                Value::Object(mut map) if map.get("item").is_some_and(Value::is_object) => {
                    map.remove("item").unwrap_or(Value::Null)
                }
                other => other,
            })
            .collect()
    }
}

/// The records of a listing page: the second structured data block when
/// there are several, else the only one.
pub fn structured_records(html: &str) -> Result<Vec<Value>> {
    let blocks = json_ld_blocks(html);
    let Some(block) = blocks.get(1).or_else(|| blocks.first()) else {
        return Ok(Vec::new());
    };
    let data: StructuredData = serde_json::from_str(block.trim())?;
    Ok(data.into_records())
}

fn image_url(image: &Value) -> Option<String> {
    match image {
        Value::String(url) => Some(url.clone()),
        Value::Array(images) => images.iter().find_map(image_url),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn location_data(location: &Value) -> Value {
    let geo = location.get("geo").filter(|g| g.is_object());
    let geo_json = geo.map(|geo| {
        json!({
            "type": "Point",
            "coordinates": [geo.get("longitude"), geo.get("latitude")]
        })
    });
    let address = location.get("address").filter(|a| a.is_object());
    let field = |name: &str| address.and_then(|a| a.get(name)).cloned().unwrap_or(Value::Null);

    json!({
        "geoJSON": geo_json,
        "eventVenue": {
            "name": location.get("name"),
            "address": {
                "streetAddress": field("streetAddress"),
                "addressLocality": field("addressLocality"),
                "addressRegion": field("addressRegion"),
                "postalCode": field("postalCode"),
                "addressCountry": field("addressCountry"),
            },
            "geo": geo,
        }
    })
}

/// Map one schema.org Event into a draft.
pub fn record_to_draft(
    record: &Value,
    source: &EventSourceConfig,
    settings: &NormalizeSettings,
) -> Result<EventDraft> {
    let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::trim);

    let name = text("name").ok_or_else(|| ScraperError::MissingField("name".into()))?;
    let url = text("url").unwrap_or_default().to_string();
    let start = text("startDate").and_then(|s| parse_iso_instant(s, settings.timezone));
    let end = text("endDate").and_then(|s| parse_iso_instant(s, settings.timezone));
    let location = record.get("location").filter(|l| l.is_object());

    let mut draft = EventDraft {
        title: format!("{} @ {}", name, source.name),
        org: source.name.clone(),
        start,
        end,
        description: with_more_info_link(text("description").unwrap_or_default(), &url, true),
        url,
        location: location
            .and_then(|l| l.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        images: record.get("image").and_then(image_url).into_iter().collect(),
        timing_reliable: start.is_some(),
        ..Default::default()
    };
    draft.extended_props.location_data = location.map(location_data);
    Ok(draft)
}

fn is_series_placeholder(draft: &EventDraft) -> bool {
    match (draft.start, draft.end) {
        (Some(start), Some(end)) => end - start > Duration::days(SERIES_PLACEHOLDER_MIN_DAYS),
        _ => false,
    }
}

/// Organizer listing pages carrying schema.org structured data
pub struct EventbriteAdapter {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
    series: EventbriteSeriesClient,
}

impl EventbriteAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            http: ctx.http.clone(),
            settings: ctx.settings,
            series: ctx.series_client(),
        }
    }

    async fn finish_record(&self, draft: EventDraft, source: &EventSourceConfig) -> Vec<CanonicalEvent> {
        if is_series_placeholder(&draft) {
            debug!("Expanding series placeholder {}", draft.url);
            return match self.series.expand(&draft.url, &source.name, source).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Series lookup failed for {}: {}", draft.url, e);
                    Vec::new()
                }
            };
        }

        match draft.finish(source, &self.settings) {
            Ok(event) => vec![event],
            Err(e) => {
                debug!("Dropping record from {}: {}", source.name, e);
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for EventbriteAdapter {
    fn adapter_name(&self) -> &'static str {
        EVENTBRITE_API
    }

    fn catalog_key(&self) -> &'static str {
        EVENTBRITE_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        EVENTBRITE_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let response = self.http.get(&source.url).await?;
        if !response.is_success() {
            return Err(ScraperError::Status {
                url: source.url.clone(),
                status: response.status,
            });
        }

        let records = structured_records(&response.text())?;
        let drafts: Vec<EventDraft> = records
            .iter()
            .filter_map(|record| match record_to_draft(record, source, &self.settings) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!("{}: skipping record: {}", source.name, e);
                    None
                }
            })
            .collect();

        let events: Vec<CanonicalEvent> = join_all(
            drafts
                .into_iter()
                .map(|draft| self.finish_record(draft, source)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        info!("Fetched {} events from {}", events.len(), source.name);
        Ok(events)
    }
}
