use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Normalized event as served to the calendar front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub org: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub url: String,
    pub description: String,
    pub location: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extended_props: ExtendedProps,
}

/// Adapter-specific data that is not part of the cross-adapter contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_data: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_date_extraction: bool,
}

/// One configured upstream source, owned by the source catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSourceConfig {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub prefix_title: Option<String>,
    #[serde(default)]
    pub suffix_title: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterRule>,
    #[serde(default, rename = "isMEC")]
    pub is_mec: bool,
    /// Display name used for single-series sources
    #[serde(default)]
    pub source_name: Option<String>,
}

/// Tag candidates named by the first element of a filter rule
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TagCandidates {
    Single(String),
    Nested(Vec<String>),
    #[default]
    Invalid,
}

impl TagCandidates {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            TagCandidates::Single(tag) => std::slice::from_ref(tag),
            TagCandidates::Nested(tags) => tags.as_slice(),
            TagCandidates::Invalid => &[],
        };
        slice.iter().map(String::as_str)
    }
}

/// A filter rule as written in the catalog: `[tag | [tags...], keyword | [keywords...]...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRule {
    pub candidates: TagCandidates,
    pub keywords: Vec<String>,
}

impl FilterRule {
    pub fn from_values(values: &[Value]) -> Self {
        let candidates = match values.first() {
            Some(Value::String(tag)) => TagCandidates::Single(tag.clone()),
            Some(Value::Array(items)) => TagCandidates::Nested(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => TagCandidates::Invalid,
        };

        let mut keywords = Vec::new();
        for value in values.iter().skip(1) {
            match value {
                Value::String(keyword) => keywords.push(keyword.clone()),
                Value::Array(items) => {
                    keywords.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)))
                }
                _ => {}
            }
        }

        Self {
            candidates,
            keywords,
        }
    }
}

impl<'de> Deserialize<'de> for FilterRule {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A rule that isn't an array contributes nothing instead of failing the whole source
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(values) => FilterRule::from_values(&values),
            _ => FilterRule::default(),
        })
    }
}

/// Per-source output unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResultBundle {
    pub events: Vec<CanonicalEvent>,
    pub city: String,
    pub name: String,
}

impl SourceResultBundle {
    pub fn new(source: &EventSourceConfig, events: Vec<CanonicalEvent>) -> Self {
        Self {
            events,
            city: source.city.clone(),
            name: source.name.clone(),
        }
    }

    /// Placeholder for a source whose run failed
    pub fn empty(source: &EventSourceConfig) -> Self {
        Self::new(source, Vec::new())
    }
}

/// Core trait that every upstream format family implements
#[async_trait::async_trait]
pub trait EventAdapter: Send + Sync {
    /// Unique identifier for this adapter
    fn adapter_name(&self) -> &'static str;

    /// Key of this adapter's source list in the catalog
    fn catalog_key(&self) -> &'static str;

    /// Key under which this adapter's bundles are cached
    fn cache_key(&self) -> &'static str;

    /// Fetch one configured source and map its records into canonical events
    async fn fetch_and_normalize(&self, source: &EventSourceConfig) -> Result<Vec<CanonicalEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_rule_single_tag_with_keywords() {
        let rule: FilterRule = serde_json::from_value(json!(["music", "concert", ["jazz", "band"]])).unwrap();
        assert_eq!(rule.candidates, TagCandidates::Single("music".into()));
        assert_eq!(rule.keywords, vec!["concert", "jazz", "band"]);
    }

    #[test]
    fn test_filter_rule_nested_tags() {
        let rule: FilterRule = serde_json::from_value(json!([["books", "library"]])).unwrap();
        assert_eq!(rule.candidates.iter().collect::<Vec<_>>(), vec!["books", "library"]);
        assert!(rule.keywords.is_empty());
    }

    #[test]
    fn test_non_array_rule_is_inert() {
        let source: EventSourceConfig = serde_json::from_value(json!({
            "url": "https://example.org/feed",
            "name": "Example",
            "city": "DC",
            "filters": ["oops", ["ok"]],
            "isMEC": true
        }))
        .unwrap();
        assert_eq!(source.filters.len(), 2);
        assert_eq!(source.filters[0].candidates, TagCandidates::Invalid);
        assert_eq!(source.filters[1].candidates, TagCandidates::Single("ok".into()));
        assert!(source.is_mec);
    }

    #[test]
    fn test_needs_date_extraction_only_serialized_when_set() {
        let props = ExtendedProps::default();
        assert_eq!(serde_json::to_value(&props).unwrap(), json!({}));

        let props = ExtendedProps {
            needs_date_extraction: true,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            json!({"needsDateExtraction": true})
        );
    }
}
