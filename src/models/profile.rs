//! Declarative source profiles.
//!
//! A profile describes where a ranked list lives and how to pull entries out
//! of its markup: an ordered list of strategies tried until one succeeds,
//! the noise-trim rules applied to every matched field, and pagination and
//! caching parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything needed to extract and cache one ranked list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Unique identifier, also the cache key stem
    pub id: String,

    /// Human-readable display name
    #[serde(default)]
    pub name: String,

    /// Page URL. `{page}` is replaced with the 1-based page index.
    pub url: String,

    /// Secondary attributes every entry carries (missing values become "unknown")
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Noise-trim rules applied in order to every matched field
    #[serde(default)]
    pub trims: Vec<TrimRule>,

    /// Titles longer than this (in characters) are truncated
    #[serde(default = "defaults::max_title_len")]
    pub max_title_len: usize,

    /// Cap on entries kept per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    #[serde(default)]
    pub pagination: Pagination,

    /// Freshness window for this source, overriding the global default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    /// Extraction strategies, tried in declared order
    #[serde(default)]
    pub strategies: Vec<StrategySpec>,
}

impl SourceProfile {
    /// URL for a given 1-based page.
    pub fn page_url(&self, page_index: u32) -> String {
        self.url.replace("{page}", &page_index.to_string())
    }

    /// Cache window for this source, falling back to `default`.
    pub fn ttl(&self, default: Duration) -> Duration {
        self.ttl_secs.map_or(default, Duration::from_secs)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// How a logical ranking is split across pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Number of ranks each page covers
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Number of pages to request
    #[serde(default = "defaults::pages")]
    pub pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            pages: defaults::pages(),
        }
    }
}

/// A noise-removal rule applied to matched fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TrimRule {
    /// Remove the text if the field ends with it
    Suffix(String),
    /// Remove the text if the field starts with it
    Prefix(String),
    /// Remove every occurrence of the text
    Substring(String),
    /// Remove every match of a regular expression
    Pattern(String),
}

/// One extraction strategy of a source's cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    /// Select repeated containers (rows, boxes) and read fields inside each.
    ContainerScan {
        name: String,
        /// Selector for each row/item
        container: String,
        /// Selector for the title element within a container
        title: String,
        /// Selector for an explicit rank token within a container
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rank: Option<String>,
        /// Attribute name -> selector within a container
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_title_len: Option<usize>,
    },

    /// Collect anchors whose href contains a marker; the link text is the title.
    LinkHarvest {
        name: String,
        href_contains: String,
        /// Attribute to store the resolved link under
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link_attribute: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_title_len: Option<usize>,
    },

    /// Run regular expressions over the document's visible text.
    ///
    /// Named groups: `title` (required), `rank` (optional); any other named
    /// group becomes an attribute. The first pattern that matches wins.
    FreeText {
        name: String,
        patterns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_title_len: Option<usize>,
    },
}

impl StrategySpec {
    pub fn name(&self) -> &str {
        match self {
            Self::ContainerScan { name, .. }
            | Self::LinkHarvest { name, .. }
            | Self::FreeText { name, .. } => name,
        }
    }

    /// Minimum title length; titles must be strictly longer.
    pub fn min_title_len(&self) -> usize {
        let explicit = match self {
            Self::ContainerScan { min_title_len, .. }
            | Self::LinkHarvest { min_title_len, .. }
            | Self::FreeText { min_title_len, .. } => *min_title_len,
        };
        explicit.unwrap_or(0)
    }
}

mod defaults {
    pub fn max_title_len() -> usize {
        200
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn pages() -> u32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
        id = "aladin"
        url = "https://example.com/best?page={page}"
        attributes = ["author"]
        trims = [{ kind = "suffix", value = " (개정판)" }, { kind = "pattern", value = "\\[.*?\\]" }]

        [pagination]
        page_size = 50
        pages = 2

        [[strategies]]
        kind = "container_scan"
        name = "book-box"
        container = ".ss_book_box"
        title = ".bo3"
        attributes = { author = "a[href*='AuthorSearch']" }

        [[strategies]]
        kind = "link_harvest"
        name = "product-links"
        href_contains = "wproduct.aspx"
        min_title_len = 5
    "#;

    #[test]
    fn test_profile_from_toml() {
        let profile: SourceProfile = toml::from_str(PROFILE).unwrap();
        assert_eq!(profile.strategies.len(), 2);
        assert_eq!(profile.strategies[0].name(), "book-box");
        assert_eq!(profile.strategies[0].min_title_len(), 0);
        assert_eq!(profile.strategies[1].min_title_len(), 5);
        assert_eq!(profile.trims[0], TrimRule::Suffix(" (개정판)".into()));
        assert_eq!(profile.pagination.page_size, 50);
        assert_eq!(profile.max_title_len, 200);
    }

    #[test]
    fn test_page_url_and_ttl() {
        let profile: SourceProfile = toml::from_str(PROFILE).unwrap();
        assert_eq!(profile.page_url(2), "https://example.com/best?page=2");
        assert_eq!(
            profile.ttl(Duration::from_secs(300)),
            Duration::from_secs(300)
        );
        assert_eq!(profile.display_name(), "aladin");
    }
}
