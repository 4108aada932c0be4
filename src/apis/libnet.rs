use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    LIBNET_API, LIBNET_CACHE_KEY, LIBNET_CATALOG_KEY, LIBNET_EVENT_TYPE, LIBNET_IMAGE_BASE,
    LIBNET_LOCATION_ID, LIBNET_WINDOW_DAYS,
};
use crate::error::{Result, ScraperError};
use crate::extract::{collapse_duplicate_slashes, first_paragraph};
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::tags::normalize_native_tag;
use crate::time::parse_sql_timestamp;
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};

/// The `req` query parameter the calendar endpoint expects
#[derive(Debug, Serialize)]
struct CalendarRequest {
    private: bool,
    date: String,
    days: u32,
    locations: Vec<u32>,
    ages: Vec<String>,
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    name: Option<String>,
}

/// One row of the library calendar feed
#[derive(Debug, Deserialize)]
pub struct LibnetEvent {
    title: String,
    #[serde(default)]
    url: String,
    raw_start_time: String,
    #[serde(default)]
    raw_end_time: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    venue_description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    calendar: Option<String>,
    #[serde(default)]
    event_image: Option<String>,
    #[serde(default)]
    categories_arr: Vec<Category>,
    #[serde(default, rename = "tagsArray")]
    tags_array: Vec<Value>,
    #[serde(default)]
    online_registration: Value,
    #[serde(default)]
    in_person_registration: Value,
    #[serde(default)]
    registration_enabled: Value,
}

/// Loose truthiness for registration flags that arrive as bools, numbers or strings
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Null => false,
        _ => true,
    }
}

fn native_tag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn request_url(base: &str, today: NaiveDate) -> Result<String> {
    let req = CalendarRequest {
        private: false,
        date: today.format("%Y-%m-%d").to_string(),
        days: LIBNET_WINDOW_DAYS,
        locations: vec![LIBNET_LOCATION_ID],
        ages: Vec::new(),
        types: Vec::new(),
    };
    let req = serde_json::to_string(&req)?;
    let url = reqwest::Url::parse_with_params(
        base,
        &[("event_type", LIBNET_EVENT_TYPE.to_string()), ("req", req)],
    )
    .map_err(|e| ScraperError::Config(format!("Invalid libnet url '{}': {}", base, e)))?;
    Ok(url.to_string())
}

impl LibnetEvent {
    pub fn into_draft(self, source: &EventSourceConfig, settings: &NormalizeSettings) -> EventDraft {
        let tz = settings.timezone;
        let start = parse_sql_timestamp(&self.raw_start_time, tz);
        let end = self
            .raw_end_time
            .as_deref()
            .and_then(|end| parse_sql_timestamp(end, tz));
        let url = collapse_duplicate_slashes(&self.url);

        let register = truthy(&self.online_registration)
            || truthy(&self.in_person_registration)
            || truthy(&self.registration_enabled);
        let mut description =
            with_more_info_link(self.description.as_deref().unwrap_or_default(), &url, register);
        if let Some(room) = self.location.as_deref().filter(|l| !l.trim().is_empty()) {
            description = format!("Location: {}<br />{}", room, description);
        }
        for category in self.categories_arr.iter().filter_map(|c| c.name.as_deref()) {
            description.push_str(&format!("<br />Category: {}", category));
        }

        EventDraft {
            title: self.title,
            org: format!("{}: {}", source.name, self.calendar.unwrap_or_default()),
            start,
            end,
            url,
            description,
            location: self
                .venue_description
                .as_deref()
                .map(first_paragraph)
                .filter(|l| !l.is_empty()),
            images: self
                .event_image
                .filter(|image| !image.is_empty())
                .map(|image| format!("{}{}", LIBNET_IMAGE_BASE, image))
                .into_iter()
                .collect(),
            native_tags: self
                .tags_array
                .iter()
                .filter_map(native_tag_text)
                .map(|tag| normalize_native_tag(&tag))
                .collect(),
            timing_reliable: start.is_some(),
            ..Default::default()
        }
    }
}

/// Public library calendar feed (tabular JSON)
pub struct LibnetAdapter {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
    today: NaiveDate,
}

impl LibnetAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            http: ctx.http.clone(),
            settings: ctx.settings,
            today: ctx.today,
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for LibnetAdapter {
    fn adapter_name(&self) -> &'static str {
        LIBNET_API
    }

    fn catalog_key(&self) -> &'static str {
        LIBNET_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        LIBNET_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let url = request_url(&source.url, self.today)?;
        debug!("Requesting {} from {}", source.name, url);
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(ScraperError::Status {
                url: source.url.clone(),
                status: response.status,
            });
        }

        let rows: Vec<Value> = serde_json::from_slice(&response.bytes)?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let record: LibnetEvent = match serde_json::from_value(row) {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}: skipping malformed record: {}", source.name, e);
                    continue;
                }
            };
            match record.into_draft(source, &self.settings).finish(source, &self.settings) {
                Ok(event) => events.push(event),
                Err(e) => warn!("{}: dropping record: {}", source.name, e),
            }
        }

        info!("Fetched {} events from {}", events.len(), source.name);
        Ok(events)
    }
}
