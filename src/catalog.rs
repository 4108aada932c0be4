use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, ScraperError};
use crate::types::EventSourceConfig;

/// The source catalog: one list of sources per adapter family plus the
/// front end's tag configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceCatalog {
    #[serde(rename = "appConfig", default)]
    pub app_config: AppCatalogConfig,
    /// Families are kept raw so one malformed family cannot poison the others
    #[serde(flatten)]
    pub families: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppCatalogConfig {
    /// Endpoint paths; the last segment of each names a catalog family
    pub event_api_to_grab: Vec<String>,
    pub tags_hidden: Vec<String>,
    pub tags_header: Vec<TagDefault>,
    #[serde(deserialize_with = "grouped_tags")]
    pub tags_to_show: Vec<Vec<TagDefault>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefault {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagGroup {
    Group(Vec<TagDefault>),
    Single(TagDefault),
}

/// `tagsToShow` may be a list of groups or a flat list of tags.
fn grouped_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<TagDefault>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let groups = Vec::<TagGroup>::deserialize(deserializer)?;
    Ok(groups
        .into_iter()
        .map(|group| match group {
            TagGroup::Group(tags) => tags,
            TagGroup::Single(tag) => vec![tag],
        })
        .collect())
}

impl SourceCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read source catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Decode one family's source list.
    pub fn sources_for(&self, key: &str) -> Result<Vec<EventSourceConfig>> {
        let raw = self
            .families
            .get(key)
            .ok_or_else(|| ScraperError::Config(format!("Catalog has no '{}' family", key)))?;
        Ok(Vec::<EventSourceConfig>::deserialize(raw)?)
    }

    /// Catalog keys named by `eventApiToGrab`, in order.
    pub fn families_to_grab(&self) -> Vec<String> {
        self.app_config
            .event_api_to_grab
            .iter()
            .filter_map(|endpoint| {
                endpoint
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
            .collect()
    }
}
