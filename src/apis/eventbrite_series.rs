use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::IngestContext;
use crate::app::ports::HttpClientPort;
use crate::constants::{
    EVENTBRITE_SERIES_API, EVENTBRITE_SERIES_CACHE_KEY, EVENTBRITE_SERIES_CATALOG_KEY,
};
use crate::error::Result;
use crate::normalize::{with_more_info_link, EventDraft, NormalizeSettings};
use crate::time::parse_iso_instant;
use crate::types::{CanonicalEvent, EventAdapter, EventSourceConfig};

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    events: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstantField {
    utc: String,
}

/// One occurrence as returned by the series endpoint
#[derive(Debug, Deserialize)]
pub struct SeriesOccurrence {
    name: TextField,
    start: InstantField,
    end: Option<InstantField>,
    #[serde(default)]
    url: String,
    description: Option<TextField>,
}

/// Series id from a listing URL: the text after the last `-` of its final path segment.
pub fn series_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let id = segment.rsplit('-').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Client for the vendor's series lookup, shared by the listing and series adapters
#[derive(Clone)]
pub struct EventbriteSeriesClient {
    http: Arc<dyn HttpClientPort>,
    api_base: String,
    token: Option<String>,
    settings: NormalizeSettings,
}

impl EventbriteSeriesClient {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        api_base: &str,
        token: Option<String>,
        settings: NormalizeSettings,
    ) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            settings,
        }
    }

    /// Occurrences of the series behind `event_url`. A 404 or a body
    /// without `events` means the series has none.
    pub async fn occurrences(&self, event_url: &str) -> Result<Vec<SeriesOccurrence>> {
        let Some(token) = self.token.as_deref() else {
            warn!("No Eventbrite API key configured, skipping series lookup for {}", event_url);
            return Ok(Vec::new());
        };
        let Some(series_id) = series_id_from_url(event_url) else {
            warn!("Could not find a series id in {}", event_url);
            return Ok(Vec::new());
        };

        let url = format!("{}/series/{}/events/?token={}", self.api_base, series_id, token);
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            warn!("Series lookup for {} returned HTTP {}", series_id, response.status);
            return Ok(Vec::new());
        }

        let body: SeriesResponse = serde_json::from_slice(&response.bytes)?;
        let occurrences = body
            .events
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<SeriesOccurrence>(raw) {
                Ok(occurrence) => Some(occurrence),
                Err(e) => {
                    debug!("Skipping series occurrence of {}: {}", series_id, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!("Series {} has {} occurrences", series_id, occurrences.len());
        Ok(occurrences)
    }

    /// Map one occurrence into a draft credited to `display_name`.
    pub fn to_draft(&self, occurrence: SeriesOccurrence, display_name: &str) -> EventDraft {
        let tz = self.settings.timezone;
        let start = parse_iso_instant(&occurrence.start.utc, tz);
        let end = occurrence
            .end
            .and_then(|end| parse_iso_instant(&end.utc, tz));
        let description = occurrence
            .description
            .and_then(|d| d.text)
            .unwrap_or_default();

        EventDraft {
            title: format!(
                "{} @ {}",
                occurrence.name.text.unwrap_or_default(),
                display_name
            ),
            org: display_name.to_string(),
            start,
            end,
            description: with_more_info_link(&description, &occurrence.url, true),
            url: occurrence.url,
            timing_reliable: start.is_some(),
            ..Default::default()
        }
    }

    /// Look up and finish every occurrence for a source.
    pub async fn expand(
        &self,
        event_url: &str,
        display_name: &str,
        source: &EventSourceConfig,
    ) -> Result<Vec<CanonicalEvent>> {
        let occurrences = self.occurrences(event_url).await?;
        let events = occurrences
            .into_iter()
            .filter_map(|occurrence| {
                match self.to_draft(occurrence, display_name).finish(source, &self.settings) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        debug!("Dropping series occurrence for {}: {}", display_name, e);
                        None
                    }
                }
            })
            .collect();
        Ok(events)
    }
}

/// Single sources that are one recurring vendor series
pub struct EventbriteSeriesAdapter {
    client: EventbriteSeriesClient,
}

impl EventbriteSeriesAdapter {
    pub fn new(ctx: &IngestContext) -> Self {
        Self {
            client: ctx.series_client(),
        }
    }
}

#[async_trait::async_trait]
impl EventAdapter for EventbriteSeriesAdapter {
    fn adapter_name(&self) -> &'static str {
        EVENTBRITE_SERIES_API
    }

    fn catalog_key(&self) -> &'static str {
        EVENTBRITE_SERIES_CATALOG_KEY
    }

    fn cache_key(&self) -> &'static str {
        EVENTBRITE_SERIES_CACHE_KEY
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>> {
        let display_name = source.source_name.as_deref().unwrap_or(&source.name);
        let events = self.client.expand(&source.url, display_name, source).await?;
        info!("Fetched {} series occurrences for {}", events.len(), source.name);
        Ok(events)
    }
}
