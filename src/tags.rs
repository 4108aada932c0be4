use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::catalog::{SourceCatalog, TagDefault};
use crate::types::FilterRule;

/// Lowercase a source-native tag and join its words with underscores.
pub fn normalize_native_tag(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

fn rule_matches(rule: &FilterRule, haystack: &str) -> bool {
    rule.keywords.is_empty()
        || rule
            .keywords
            .iter()
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
}

/// Derive the tag list for one event.
///
/// Native tags come first, in source order, followed by the candidates of every
/// filter rule whose keywords match the title or description. A rule without
/// keywords always applies.
pub fn derive_tags(
    filters: &[FilterRule],
    title: &str,
    description: &str,
    native_tags: &[String],
) -> Vec<String> {
    let haystack = format!("{title} {description}").to_lowercase();
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    let mut push = |tag: &str| {
        if !tag.is_empty() && seen.insert(tag.to_string()) {
            tags.push(tag.to_string());
        }
    };

    for tag in native_tags {
        push(tag);
    }

    for rule in filters.iter().filter(|rule| rule_matches(rule, &haystack)) {
        for candidate in rule.candidates.iter() {
            push(candidate);
        }
    }

    tags
}

/// Visibility labels for one tag, as consumed by the front end's filter UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    pub name: String,
    /// Shown by default
    pub is_visible: bool,
    /// Events carrying this tag are hidden permanently
    pub is_hidden: bool,
    /// At least one visible header tag must be on an event for it to show
    pub is_header: bool,
}

fn default_visibility(entry: Option<&TagDefault>) -> Option<bool> {
    entry
        .and_then(|tag| tag.default_value.as_deref())
        .map(|value| value == "true")
}

/// Collect every tag that any configured filter can produce, labelled with
/// its default visibility.
pub fn collect_tag_catalog(catalog: &SourceCatalog) -> Vec<TagInfo> {
    let mut names: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for family in catalog.families_to_grab() {
        let sources = match catalog.sources_for(&family) {
            Ok(sources) => sources,
            Err(e) => {
                debug!("Skipping catalog family {} while collecting tags: {}", family, e);
                continue;
            }
        };
        for source in &sources {
            for rule in &source.filters {
                for tag in rule.candidates.iter() {
                    if seen.insert(tag.to_string()) {
                        names.push(tag.to_string());
                    }
                }
            }
        }
    }

    let app = &catalog.app_config;
    let hidden: HashSet<&str> = app.tags_hidden.iter().map(String::as_str).collect();
    let headers: HashMap<&str, &TagDefault> = app
        .tags_header
        .iter()
        .map(|tag| (tag.name.as_str(), tag))
        .collect();
    let shown: HashMap<&str, &TagDefault> = app
        .tags_to_show
        .iter()
        .flat_map(|group| group.iter())
        .map(|tag| (tag.name.as_str(), tag))
        .collect();

    names
        .into_iter()
        .map(|name| {
            let is_hidden = hidden.contains(name.as_str());
            let is_visible = default_visibility(headers.get(name.as_str()).copied())
                .or_else(|| default_visibility(shown.get(name.as_str()).copied()))
                .unwrap_or(!is_hidden);
            TagInfo {
                is_visible,
                is_hidden,
                is_header: headers.contains_key(name.as_str()),
                name,
            }
        })
        .collect()
}
