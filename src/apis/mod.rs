use chrono::NaiveDate;
use std::sync::Arc;

use crate::app::ports::HttpClientPort;
use crate::config::AppConfig;
use crate::constants;
use crate::error::Result;
use crate::normalize::NormalizeSettings;
use crate::types::EventAdapter;

pub mod eventbrite;
pub mod eventbrite_series;
pub mod helpful_village;
pub mod libnet;
pub mod wordpress_mec;
pub mod wordpress_rss;

use eventbrite::EventbriteAdapter;
use eventbrite_series::{EventbriteSeriesAdapter, EventbriteSeriesClient};
use helpful_village::HelpfulVillageAdapter;
use libnet::LibnetAdapter;
use wordpress_mec::WordpressMecRssAdapter;
use wordpress_rss::WordpressRssAdapter;

/// Shared dependencies handed to every adapter
#[derive(Clone)]
pub struct IngestContext {
    pub http: Arc<dyn HttpClientPort>,
    pub settings: NormalizeSettings,
    pub eventbrite_api_base: String,
    pub eventbrite_token: Option<String>,
    /// First day of the query window for date-ranged upstreams
    pub today: NaiveDate,
}

impl IngestContext {
    pub fn from_config(config: &AppConfig, http: Arc<dyn HttpClientPort>, today: NaiveDate) -> Result<Self> {
        Ok(Self {
            http,
            settings: NormalizeSettings {
                timezone: config.timezone()?,
                debug_titles: config.debug_titles,
            },
            eventbrite_api_base: config.eventbrite_api_base.clone(),
            eventbrite_token: config.eventbrite_token.clone(),
            today,
        })
    }

    pub fn series_client(&self) -> EventbriteSeriesClient {
        EventbriteSeriesClient::new(
            self.http.clone(),
            &self.eventbrite_api_base,
            self.eventbrite_token.clone(),
            self.settings,
        )
    }
}

pub fn create_adapter(name: &str, ctx: &IngestContext) -> Option<Arc<dyn EventAdapter>> {
    match name {
        constants::EVENTBRITE_API => Some(Arc::new(EventbriteAdapter::new(ctx))),
        constants::EVENTBRITE_SERIES_API => Some(Arc::new(EventbriteSeriesAdapter::new(ctx))),
        constants::LIBNET_API => Some(Arc::new(LibnetAdapter::new(ctx))),
        constants::WORDPRESS_MEC_RSS_API => Some(Arc::new(WordpressMecRssAdapter::new(ctx))),
        constants::WORDPRESS_RSS_API => Some(Arc::new(WordpressRssAdapter::new(ctx))),
        constants::HELPFUL_VILLAGE_API => Some(Arc::new(HelpfulVillageAdapter::new(ctx))),
        _ => None,
    }
}
