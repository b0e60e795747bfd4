// src/pipeline/collect.rs

//! Ranking collection.
//!
//! Ties the pieces together for one source: fetch every configured page,
//! run the extraction cascade over each, stitch the pages into one ranking
//! and serve it through the cache.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{Config, MergedResult, PageBatch, RawDocument};
use crate::services::{CompiledSource, PaginationMerger, SourceRegistry};
use crate::storage::{CacheKey, CacheStatus, CacheStore, Cached, ClearScope};
use crate::utils::http::{DocumentFetcher, HttpFetcher};

/// Serves merged rankings per source, cached with last-known-good fallback.
pub struct RankingService {
    registry: SourceRegistry,
    fetcher: Arc<dyn DocumentFetcher>,
    cache: Arc<CacheStore<MergedResult>>,
    default_ttl: Duration,
    max_concurrent: usize,
}

impl RankingService {
    pub fn new(registry: SourceRegistry, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            registry,
            fetcher,
            cache: Arc::new(CacheStore::new()),
            default_ttl: Duration::from_secs(300),
            max_concurrent: 4,
        }
    }

    /// Build a service that fetches over HTTP with the configured settings.
    pub fn from_config(config: &Config, registry: SourceRegistry) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
        let service = Self::new(registry, fetcher)
            .with_default_ttl(config.cache.default_ttl())
            .with_max_concurrent(config.fetcher.max_concurrent);
        service.cache.set_ttl_override(config.cache.ttl_override());
        Ok(service)
    }

    /// Share an existing cache, e.g. one driven by a manual clock.
    pub fn with_cache(mut self, cache: Arc<CacheStore<MergedResult>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<CacheStore<MergedResult>> {
        &self.cache
    }

    /// Cache key for a source: its id plus the page count it spans.
    pub fn cache_key(source: &CompiledSource) -> CacheKey {
        CacheKey::new(&source.profile.id).param("pages", source.profile.pagination.pages)
    }

    /// Ranking for `id`, from cache when fresh.
    ///
    /// Only an unknown source id is an error. Fetch and extraction failures
    /// surface as [`Cached::Stale`] or [`Cached::Unavailable`].
    pub async fn get(&self, id: &str) -> Result<Cached<MergedResult>> {
        let source = self
            .registry
            .get(id)
            .ok_or_else(|| AppError::config(format!("unknown source '{id}'")))?;

        let key = Self::cache_key(&source).to_string();
        let ttl = source.profile.ttl(self.default_ttl);
        Ok(self
            .cache
            .get_or_fetch(&key, ttl, || self.collect(&source))
            .await)
    }

    /// Fetch, extract and merge every page of a source, bypassing the cache.
    ///
    /// Pages that fail to fetch or match nothing are recorded in
    /// `missing_pages`; the call fails only when no page yields an entry.
    pub async fn collect(&self, source: &CompiledSource) -> Result<MergedResult> {
        let profile = &source.profile;
        let documents = self.fetch_pages(source).await;

        let mut batches = Vec::with_capacity(documents.len());
        let mut missing = Vec::new();
        let mut reasons = Vec::new();

        for document in &documents {
            let result = source.cascade.extract(document);
            if result.success {
                log::debug!(
                    "[{}] page {}: {} entries via '{}'",
                    profile.id,
                    document.page_index,
                    result.len(),
                    result.strategy.as_deref().unwrap_or_default()
                );
                batches.push(PageBatch::new(
                    document.page_index,
                    profile.pagination.page_size,
                    result.entries,
                ));
                continue;
            }

            let reason = match document.failure_reason() {
                Some(reason) => format!("page {}: {reason}", document.page_index),
                None => format!("page {}: no strategy matched", document.page_index),
            };
            log::warn!("[{}] {reason}", profile.id);
            missing.push(document.page_index);
            reasons.push(reason);
        }

        let mut merged = PaginationMerger::new().merge(&batches);
        merged.missing_pages = missing;

        if merged.is_empty() {
            return Err(AppError::extraction(&profile.id, reasons.join("; ")));
        }
        if merged.is_partial() {
            log::warn!(
                "[{}] partial ranking: pages {:?} missing",
                profile.id,
                merged.missing_pages
            );
        }
        Ok(merged)
    }

    /// Fetch all pages, at most `max_concurrent` at a time, in page order.
    async fn fetch_pages(&self, source: &CompiledSource) -> Vec<RawDocument> {
        let profile = &source.profile;
        let fetcher = &self.fetcher;
        stream::iter(1..=profile.pagination.pages)
            .map(|page| {
                let url = profile.page_url(page);
                async move { fetcher.fetch(&profile.id, page, &url).await }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    pub fn set_ttl_override(&self, ttl: Option<Duration>) {
        self.cache.set_ttl_override(ttl);
    }

    pub fn clear(&self, scope: ClearScope) {
        self.cache.clear(scope);
    }

    pub fn overview(&self) -> Vec<CacheStatus> {
        self.cache.overview()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Pagination, SourceProfile, StrategySpec};

    /// Serves canned bodies by URL; unknown URLs fail.
    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn fetch(&self, source_id: &str, page_index: u32, url: &str) -> RawDocument {
            match self.pages.get(url) {
                Some(body) => RawDocument::success(source_id, page_index, url, body.clone()),
                None => RawDocument::failed(source_id, page_index, url, "connection refused"),
            }
        }
    }

    fn profile(pages: u32) -> SourceProfile {
        SourceProfile {
            id: "chart".into(),
            name: String::new(),
            url: "https://chart.test/?p={page}".into(),
            attributes: vec!["artist".into()],
            trims: Vec::new(),
            max_title_len: 200,
            max_entries: None,
            pagination: Pagination { page_size: 3, pages },
            ttl_secs: None,
            strategies: vec![StrategySpec::ContainerScan {
                name: "rows".into(),
                container: "li".into(),
                title: ".t".into(),
                rank: None,
                attributes: [("artist".to_string(), ".a".to_string())].into(),
                min_title_len: None,
            }],
        }
    }

    fn body(titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .map(|t| format!("<li><span class=\"t\">{t}</span><span class=\"a\">X</span></li>"))
            .collect();
        format!("<ul>{items}</ul>")
    }

    fn service(pages: u32, bodies: &[(u32, String)]) -> RankingService {
        let registry = SourceRegistry::compile(&[profile(pages)]).unwrap();
        let fetcher = StaticFetcher {
            pages: bodies
                .iter()
                .map(|(p, b)| (format!("https://chart.test/?p={p}"), b.clone()))
                .collect(),
        };
        RankingService::new(registry, Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_pages_merge_with_offsets() {
        let svc = service(2, &[(1, body(&["A", "B", "C"])), (2, body(&["D", "E"]))]);
        let result = svc.get("chart").await.unwrap();
        let merged = result.payload().unwrap();
        let ranks: Vec<u32> = merged.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(merged.pages, vec![1, 2]);
        assert!(!merged.is_partial());
    }

    #[tokio::test]
    async fn test_missing_page_is_soft_failure() {
        let svc = service(3, &[(1, body(&["A", "B", "C"])), (3, body(&["G"]))]);
        let result = svc.get("chart").await.unwrap();
        let merged = result.payload().unwrap();
        assert_eq!(merged.missing_pages, vec![2]);
        assert_eq!(merged.entries.last().unwrap().rank, 7);
    }

    #[tokio::test]
    async fn test_nothing_extracted_is_unavailable() {
        let svc = service(1, &[(1, "<p>maintenance</p>".to_string())]);
        let result = svc.get("chart").await.unwrap();
        assert!(result.is_unavailable());
        assert!(result.error().unwrap().contains("no strategy matched"));
        assert!(svc.overview().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_is_error() {
        let svc = service(1, &[]);
        assert!(svc.get("nope").await.is_err());
    }

    #[test]
    fn test_cache_key_includes_page_count() {
        let registry = SourceRegistry::compile(&[profile(2)]).unwrap();
        let source = registry.get("chart").unwrap();
        assert_eq!(RankingService::cache_key(&source).to_string(), "chart?pages=2");
    }
}
