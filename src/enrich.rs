use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::ports::HttpClientPort;
use crate::constants::{MARX_CAFE_FALLBACK_LOCATION, MARX_CAFE_SOURCE_NAME};
use crate::extract::{best_image, page_text};
use crate::normalize::{EventDraft, NormalizeSettings};
use crate::time::parse_slash_datetime;

static START_DATE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<strong>Start Date:<span>([^<]*)</span></strong>").expect("static regex")
});
static END_DATE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<strong>End Date:<span>([^<]*)</span></strong>").expect("static regex")
});
static MARX_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)3203\s+MT\.?\s*PLEASANT\s+ST\s+NW[^,]*,?\s*WASHINGTON\s+DC\s+\d{5}")
        .expect("static regex")
});

/// Everything a detail page can contribute to a record
#[derive(Debug, Default, PartialEq)]
pub struct PageDetails {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub image: Option<String>,
}

/// Run the page extraction rules that apply to `source_name`.
pub fn extract_page_details(html: &str, source_name: &str, tz: Tz) -> PageDetails {
    let [start, end] = [&*START_DATE_SPAN, &*END_DATE_SPAN].map(|span| {
        span.captures(html)
            .and_then(|c| c.get(1))
            .and_then(|inner| parse_slash_datetime(inner.as_str(), tz))
    });

    let location = (source_name == MARX_CAFE_SOURCE_NAME).then(|| {
        let text = page_text(html);
        match MARX_ADDRESS.find(&text) {
            Some(address) => format!("{}, {}", MARX_CAFE_SOURCE_NAME, address.as_str()),
            None => MARX_CAFE_FALLBACK_LOCATION.to_string(),
        }
    });

    PageDetails {
        start,
        end,
        location,
        image: best_image(html),
    }
}

/// Recovers real timing for records whose feed only carried a publication date.
pub struct PageEnricher {
    http: Arc<dyn HttpClientPort>,
    settings: NormalizeSettings,
}

impl PageEnricher {
    pub fn new(http: Arc<dyn HttpClientPort>, settings: NormalizeSettings) -> Self {
        Self { http, settings }
    }

    /// Fetch the record's page once. The draft comes back with its
    /// extraction flag cleared whatever the outcome.
    pub async fn enrich(&self, mut draft: EventDraft, source_name: &str) -> EventDraft {
        if !draft.extended_props.needs_date_extraction {
            return draft;
        }

        match self.http.get(&draft.url).await {
            Ok(page) if page.is_success() => {
                let details = extract_page_details(&page.text(), source_name, self.settings.timezone);
                apply_details(&mut draft, details);
            }
            Ok(page) => {
                warn!("Failed to fetch event page {}: HTTP {}", draft.url, page.status);
            }
            Err(e) => {
                warn!("Failed to fetch event page {}: {}", draft.url, e);
            }
        }

        draft.extended_props.needs_date_extraction = false;
        draft
    }
}

fn apply_details(draft: &mut EventDraft, details: PageDetails) {
    if let Some(start) = details.start {
        debug!("Recovered start {} for {}", start, draft.title);
        draft.start = Some(start);
        draft.end = Some(details.end.unwrap_or(start));
        draft.timing_reliable = true;
    }
    if let Some(location) = details.location {
        draft.location = Some(location);
    }
    if let Some(image) = details.image {
        draft.images = vec![image];
    }
}
