//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceProfile;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Cache freshness settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Console logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Source profiles
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceProfile>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_concurrent == 0 {
            return Err(AppError::validation("fetcher.max_concurrent must be > 0"));
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(AppError::validation("cache.default_ttl_secs must be > 0"));
        }
        if self.cache.ttl_override_secs == Some(0) {
            return Err(AppError::validation("cache.ttl_override_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AppError::validation("source id is empty"));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            if source.url.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "source '{}' has an empty url",
                    source.id
                )));
            }
            if source.strategies.is_empty() {
                return Err(AppError::config(format!(
                    "source '{}' declares no extraction strategies",
                    source.id
                )));
            }
            if source.pagination.page_size == 0 || source.pagination.pages == 0 {
                return Err(AppError::validation(format!(
                    "source '{}': pagination.page_size and pagination.pages must be > 0",
                    source.id
                )));
            }
            if source.pagination.pages > 1 && !source.url.contains("{page}") {
                return Err(AppError::validation(format!(
                    "source '{}' requests {} pages but its url has no {{page}} placeholder",
                    source.id, source.pagination.pages
                )));
            }
            if source.max_title_len == 0 {
                return Err(AppError::validation(format!(
                    "source '{}': max_title_len must be > 0",
                    source.id
                )));
            }
        }
        Ok(())
    }

    /// Look up a source profile by id.
    pub fn source(&self, id: &str) -> Option<&SourceProfile> {
        self.sources.iter().find(|s| s.id == id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client settings for the document fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum page fetches in flight per source
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Extra headers sent with every request
    #[serde(default = "defaults::headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            headers: defaults::headers(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cache freshness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window used by sources without their own `ttl_secs`
    #[serde(default = "defaults::ttl")]
    pub default_ttl_secs: u64,

    /// Window applied to every source regardless of its own setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_override_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: defaults::ttl(),
            ttl_override_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn ttl_override(&self) -> Option<Duration> {
        self.ttl_override_secs.map(Duration::from_secs)
    }
}

/// Console logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of debug, info, warn, error
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    use crate::models::{Pagination, SourceProfile, StrategySpec, TrimRule};

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            (
                "Accept-Language".to_string(),
                "ko-KR,ko;q=0.9,en;q=0.8".to_string(),
            ),
        ])
    }

    // Cache defaults
    pub fn ttl() -> u64 {
        300
    }

    pub fn log_level() -> String {
        "info".into()
    }

    fn selectors(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // Source defaults
    pub fn default_sources() -> Vec<SourceProfile> {
        vec![melon(), bugs(), aladin()]
    }

    fn melon() -> SourceProfile {
        SourceProfile {
            id: "melon".to_string(),
            name: "Melon Daily Chart".to_string(),
            url: "https://www.melon.com/chart/day/index.htm".to_string(),
            attributes: vec!["artist".to_string()],
            trims: Vec::new(),
            max_title_len: 200,
            max_entries: Some(100),
            pagination: Pagination::default(),
            ttl_secs: None,
            strategies: vec![StrategySpec::ContainerScan {
                name: "chart-rows".to_string(),
                container: "tbody > tr".to_string(),
                title: ".ellipsis.rank01 > span > a".to_string(),
                rank: Some(".rank".to_string()),
                attributes: selectors(&[("artist", ".ellipsis.rank02 > a")]),
                min_title_len: None,
            }],
        }
    }

    fn bugs() -> SourceProfile {
        SourceProfile {
            id: "bugs".to_string(),
            name: "Bugs Realtime Chart".to_string(),
            url: "https://music.bugs.co.kr/chart/track/realtime/total".to_string(),
            attributes: vec!["artist".to_string()],
            trims: vec![TrimRule::Pattern(r"^\[?19금\]?\s*".to_string())],
            max_title_len: 200,
            max_entries: Some(100),
            pagination: Pagination::default(),
            ttl_secs: None,
            strategies: vec![
                StrategySpec::ContainerScan {
                    name: "chart-rows".to_string(),
                    container: "tbody > tr".to_string(),
                    title: "p.title".to_string(),
                    rank: Some(".ranking > strong".to_string()),
                    attributes: selectors(&[("artist", "p.artist")]),
                    min_title_len: None,
                },
                StrategySpec::ContainerScan {
                    name: "list-cells".to_string(),
                    container: "table.list tbody tr".to_string(),
                    title: "td:nth-child(2)".to_string(),
                    rank: Some("td:nth-child(1)".to_string()),
                    attributes: selectors(&[("artist", "td:nth-child(3)")]),
                    min_title_len: None,
                },
            ],
        }
    }

    fn aladin() -> SourceProfile {
        let stop = r"(?:\s+지음|\s+저|\s+편집|\s+글|\s+그림|\s+외)";
        SourceProfile {
            id: "aladin".to_string(),
            name: "Aladin Bestsellers".to_string(),
            url: "https://www.aladin.co.kr/shop/common/wbest.aspx?BestType=NowBest&BranchType=1&CID=0&page={page}&cnt=50&SortOrder=1".to_string(),
            attributes: vec!["author".to_string(), "publisher".to_string()],
            trims: vec![
                TrimRule::Suffix("(지은이)".to_string()),
                TrimRule::Suffix("지음".to_string()),
            ],
            max_title_len: 120,
            max_entries: Some(50),
            pagination: Pagination {
                page_size: 50,
                pages: 2,
            },
            ttl_secs: None,
            strategies: vec![
                StrategySpec::ContainerScan {
                    name: "book-box".to_string(),
                    container: ".ss_book_box".to_string(),
                    title: ".bo3".to_string(),
                    rank: None,
                    attributes: selectors(&[
                        ("author", "li > a[href*='AuthorSearch']"),
                        ("publisher", "li > a[href*='PublisherSearch']"),
                    ]),
                    min_title_len: None,
                },
                StrategySpec::LinkHarvest {
                    name: "product-links".to_string(),
                    href_contains: "wproduct.aspx".to_string(),
                    link_attribute: Some("link".to_string()),
                    min_title_len: Some(5),
                },
                StrategySpec::FreeText {
                    name: "rank-text".to_string(),
                    patterns: vec![
                        format!(r"(?P<rank>\d+)\.\s*(?P<title>[가-힣\s]+?){stop}"),
                        format!(r"(?P<rank>\d+)\s*(?P<title>[가-힣\s]+?){stop}"),
                        format!(r"순위\s*(?P<rank>\d+)[^가-힣]*(?P<title>[가-힣\s]+?){stop}"),
                    ],
                    min_title_len: Some(3),
                },
            ],
        }
    }
}
