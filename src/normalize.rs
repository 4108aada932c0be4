use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::constants::{DEFAULT_TIMEZONE, MORE_INFO_REGISTER_TEXT, MORE_INFO_TEXT};
use crate::error::{Result, ScraperError};
use crate::extract::escape_attribute;
use crate::tags::derive_tags;
use crate::time::format_title_and_date_to_id;
use crate::types::{CanonicalEvent, EventSourceConfig, ExtendedProps};

/// Rendering options threaded into every adapter
#[derive(Debug, Clone, Copy)]
pub struct NormalizeSettings {
    /// Civil zone for every zone-naive upstream timestamp
    pub timezone: Tz,
    /// Prefix titles with their tag count
    pub debug_titles: bool,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.parse().unwrap_or(chrono_tz::America::New_York),
            debug_titles: false,
        }
    }
}

/// A record on its way to becoming a `CanonicalEvent`.
///
/// `title` is the untouched upstream title; affixes, tags, id and debug
/// annotation are all applied in `finish`.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub org: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub url: String,
    pub description: String,
    pub location: Option<String>,
    pub images: Vec<String>,
    pub native_tags: Vec<String>,
    /// Visible text to match filter keywords against when it differs from
    /// `description`, e.g. before the call-to-action link is appended
    pub tag_text: Option<String>,
    pub extended_props: ExtendedProps,
    /// False while `start` is only a placeholder such as a publication date
    pub timing_reliable: bool,
}

impl EventDraft {
    pub fn finish(self, source: &EventSourceConfig, settings: &NormalizeSettings) -> Result<CanonicalEvent> {
        let start = self
            .start
            .ok_or_else(|| ScraperError::MissingField(format!("start for '{}'", self.title)))?;
        let end = self.end.unwrap_or(start);

        let title = apply_title_affixes(source, &self.title);
        let tag_text = self.tag_text.as_deref().unwrap_or(&self.description);
        let tags = derive_tags(&source.filters, &title, tag_text, &self.native_tags);

        let id = self
            .timing_reliable
            .then(|| format_title_and_date_to_id(&start.with_timezone(&settings.timezone), &title));

        let title = if settings.debug_titles {
            annotate_title(&title, tags.len())
        } else {
            title
        };

        Ok(CanonicalEvent {
            id,
            title,
            org: self.org,
            start,
            end,
            url: self.url,
            description: self.description,
            location: self.location.filter(|l| !l.trim().is_empty()),
            images: self.images.into_iter().filter(|i| !i.is_empty()).take(1).collect(),
            tags,
            extended_props: self.extended_props,
        })
    }
}

pub fn apply_title_affixes(source: &EventSourceConfig, title: &str) -> String {
    format!(
        "{}{}{}",
        source.prefix_title.as_deref().unwrap_or_default(),
        title,
        source.suffix_title.as_deref().unwrap_or_default()
    )
}

pub fn annotate_title(title: &str, tag_count: usize) -> String {
    format!("{} {}", tag_count, title)
}

/// Append the "more information" link unless the description already points at `url`.
pub fn with_more_info_link(description: &str, url: &str, register: bool) -> String {
    if url.is_empty() {
        return description.to_string();
    }
    let href = escape_attribute(url);
    if description.contains(&format!("href=\"{}\"", href)) || description.contains(&format!("href=\"{}\"", url)) {
        return description.to_string();
    }
    let text = if register { MORE_INFO_REGISTER_TEXT } else { MORE_INFO_TEXT };
    format!("{}<br /><a href=\"{}\">{}</a>", description, href, text)
}
