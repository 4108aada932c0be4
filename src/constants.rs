/// Adapter name constants to ensure consistency across the codebase.
/// Each adapter maps to one catalog family and owns one cache key.

// Adapter names (used in CLI)
pub const EVENTBRITE_API: &str = "eventbrite";
pub const EVENTBRITE_SERIES_API: &str = "eventbrite_series";
pub const LIBNET_API: &str = "libnet";
pub const WORDPRESS_MEC_RSS_API: &str = "wordpress_mec_rss";
pub const WORDPRESS_RSS_API: &str = "wordpress_rss";
pub const HELPFUL_VILLAGE_API: &str = "helpfulvillage";

// Catalog family keys (as they appear in the source catalog JSON)
pub const EVENTBRITE_CATALOG_KEY: &str = "eventbriteAccounts";
pub const EVENTBRITE_SERIES_CATALOG_KEY: &str = "eventbriteSingleEventSeries";
pub const LIBNET_CATALOG_KEY: &str = "libnet";
pub const WORDPRESS_MEC_RSS_CATALOG_KEY: &str = "wordpressMECRss";
pub const WORDPRESS_RSS_CATALOG_KEY: &str = "wordpressRss";
pub const HELPFUL_VILLAGE_CATALOG_KEY: &str = "helpfulvillage";

// Cache keys (one per adapter, overwritten wholesale on each run)
pub const EVENTBRITE_CACHE_KEY: &str = "eventbriteSources";
pub const EVENTBRITE_SERIES_CACHE_KEY: &str = "eventbriteSeriesSources";
pub const LIBNET_CACHE_KEY: &str = "libnetSources";
pub const WORDPRESS_MEC_RSS_CACHE_KEY: &str = "wordpressMECRssSources";
pub const WORDPRESS_RSS_CACHE_KEY: &str = "wordpressRssSources";
pub const HELPFUL_VILLAGE_CACHE_KEY: &str = "helpfulvillageSources";

// RSS namespaces
pub const MEC_NAMESPACE: &str = "http://webnus.net/rss/mec/";
pub const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

// Upstream endpoints and query constants
pub const DEFAULT_EVENTBRITE_API_BASE: &str = "https://www.eventbriteapi.com/v3";
pub const LIBNET_IMAGE_BASE: &str = "https://static.libnet.info/images/events/dclibrary/";
pub const LIBNET_EVENT_TYPE: u32 = 0;
pub const LIBNET_LOCATION_ID: u32 = 2317;
pub const LIBNET_WINDOW_DAYS: u32 = 60;
pub const HELPFUL_VILLAGE_WINDOW_DAYS: i64 = 30;

/// Records longer than this are series placeholders, not single events.
pub const SERIES_PLACEHOLDER_MIN_DAYS: i64 = 3;

// Sources with bespoke enrichment rules, matched by display name
pub const MARX_CAFE_SOURCE_NAME: &str = "Marx Cafe";
pub const MARX_CAFE_FALLBACK_LOCATION: &str = "Marx Cafe, 3203 MT. Pleasant St NW, Washington DC";
pub const TITLE_DATED_SOURCE_NAME: &str = "Comet Ping Pong";

// Description call-to-action text
pub const MORE_INFO_TEXT: &str = "For more information check out the full page here!";
pub const MORE_INFO_REGISTER_TEXT: &str =
    "For more information and to register check out the full page here!";

/// Placeholder used for id derivation when a title is empty.
pub const UNTITLED_ID_PLACEHOLDER: &str = "und";

pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; event_ingest/0.1)";

/// Get all supported adapter names
pub fn get_supported_apis() -> Vec<&'static str> {
    vec![
        EVENTBRITE_API,
        EVENTBRITE_SERIES_API,
        LIBNET_API,
        WORDPRESS_MEC_RSS_API,
        WORDPRESS_RSS_API,
        HELPFUL_VILLAGE_API,
    ]
}
