use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::libnet::truthy;
use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    HELPFUL_VILLAGE_API, HELPFUL_VILLAGE_CACHE_KEY, HELPFUL_VILLAGE_CATALOG_KEY,
    HELPFUL_VILLAGE_WINDOW_DAYS,
};
use crate::error::{Result, ScraperError};
use crate::extract::{has_members_only_notice, json_ld_blocks};
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::time::parse_iso_instant;
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};

static EVENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/events/(\d+)").expect("static regex"));

const CDATA_OPEN: &str = "//<![CDATA[";
const CDATA_CLOSE: &str = "//]]>";

/// One entry of the community calendar listing
#[derive(Debug, Deserialize)]
pub struct VillageListing {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    calendar: Option<String>,
    #[serde(default)]
    featured_image: Option<String>,
    #[serde(default)]
    online_registration: Value,
    #[serde(default)]
    in_person_registration: Value,
    #[serde(default)]
    registration_enabled: Value,
}

/// What an event's detail page says about it
#[derive(Debug, Default, PartialEq)]
pub struct VillageDetails {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum DetailPage {
    MembersOnly,
    Public(VillageDetails),
}

pub fn event_id(url: &str) -> Option<u64> {
    EVENT_ID.captures(url)?.get(1)?.as_str().parse().ok()
}

/// Pull the structured data block wrapped in a CDATA comment out of a detail page.
pub fn parse_detail_page(html: &str) -> DetailPage {
    if has_members_only_notice(html) {
        return DetailPage::MembersOnly;
    }

    let details = json_ld_blocks(html)
        .into_iter()
        .find(|block| block.contains(CDATA_OPEN))
        .and_then(|block| {
            let json = block.replacen(CDATA_OPEN, "", 1).replacen(CDATA_CLOSE, "", 1);
            match serde_json::from_str::<Value>(json.trim()) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Failed to parse detail page structured data: {}", e);
                    None
                }
            }
        })
        .map(|data| {
            let text = |key: &str| {
                data.get(key)
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            VillageDetails {
                start_date: text("startDate"),
                end_date: text("endDate"),
                location: data
                    .get("location")
                    .and_then(|l| l.get("name"))
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                description: text("description"),
            }
        })
        .unwrap_or_default();

    DetailPage::Public(details)
}

pub fn listing_url(base: &str, today: NaiveDate) -> Result<String> {
    let end = today + Duration::days(HELPFUL_VILLAGE_WINDOW_DAYS);
    let url = reqwest::Url::parse_with_params(
        base,
        &[
            ("start", today.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
        ],
    )
    .map_err(|e| ScraperError::Config(format!("Invalid calendar url '{}': {}", base, e)))?;
    Ok(url.to_string())
}

/// Neighborhood mutual-aid calendar: JSON listing plus one detail page per event
pub struct HelpfulVillageAdapter {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
    today: NaiveDate,
}

impl HelpfulVillageAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            http: ctx.http.clone(),
            settings: ctx.settings,
            today: ctx.today,
        }
    }

    async fn details(&self, detail_url: &str) -> DetailPage {
        match self.http.get(detail_url).await {
            Ok(page) if page.is_success() => parse_detail_page(&page.text()),
            Ok(page) => {
                warn!("Detail page {} returned HTTP {}", detail_url, page.status);
                DetailPage::Public(VillageDetails::default())
            }
            Err(e) => {
                warn!("Failed to fetch detail page {}: {}", detail_url, e);
                DetailPage::Public(VillageDetails::default())
            }
        }
    }

    async fn convert(&self, listing: VillageListing, origin: &str, source: &EventSourceConfig) -> Option<CanonicalEvent> {
        let Some(id) = listing.url.as_deref().and_then(event_id) else {
            warn!("{}: no event id in {:?}", source.name, listing.url);
            return None;
        };
        let detail_url = format!("{}/events/{}", origin, id);

        let details = match self.details(&detail_url).await {
            DetailPage::MembersOnly => {
                debug!("{}: skipping members-only event {}", source.name, id);
                return None;
            }
            DetailPage::Public(details) => details,
        };

        let tz = self.settings.timezone;
        let start = details.start_date.as_deref().and_then(|s| parse_iso_instant(s, tz));
        let end = details.end_date.as_deref().and_then(|s| parse_iso_instant(s, tz));
        let register = truthy(&listing.online_registration)
            || truthy(&listing.in_person_registration)
            || truthy(&listing.registration_enabled);

        let mut description =
            with_more_info_link(details.description.as_deref().unwrap_or_default(), &detail_url, register);
        if let Some(location) = details.location.as_deref() {
            description = format!("Location: {}<br />{}", location, description);
        }

        let draft = EventDraft {
            title: listing.title,
            org: format!("{}: {}", source.name, listing.calendar.unwrap_or_default()),
            start,
            end,
            url: detail_url,
            description,
            location: details.location,
            images: listing.featured_image.into_iter().filter(|i| !i.is_empty()).collect(),
            timing_reliable: start.is_some(),
            ..Default::default()
        };

        match draft.finish(source, &self.settings) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("{}: dropping event {}: {}", source.name, id, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for HelpfulVillageAdapter {
    fn adapter_name(&self) -> &'static str {
        HELPFUL_VILLAGE_API
    }

    fn catalog_key(&self) -> &'static str {
        HELPFUL_VILLAGE_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        HELPFUL_VILLAGE_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let origin = reqwest::Url::parse(&source.url)
            .map_err(|e| ScraperError::Config(format!("Invalid calendar url '{}': {}", source.url, e)))?
            .origin()
            .ascii_serialization();

        let url = listing_url(&source.url, self.today)?;
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(ScraperError::Status {
                url: source.url.clone(),
                status: response.status,
            });
        }

        let rows: Vec<Value> = serde_json::from_slice(&response.bytes)?;
        let listings: Vec<VillageListing> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!("{}: skipping malformed listing: {}", source.name, e);
                    None
                }
            })
            .collect();

        let events: Vec<CanonicalEvent> = join_all(
            listings
                .into_iter()
                .map(|listing| self.convert(listing, &origin, source)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        info!("Fetched {} events from {}", events.len(), source.name);
        Ok(events)
    }
}
