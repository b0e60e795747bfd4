// src/services/cascade.rs

//! Extraction cascade.
//!
//! Tries a source's strategies in declared order and stops at the first one
//! that yields at least one valid entry. Later strategies are never run once
//! an earlier one succeeds.

use crate::error::{AppError, Result};
use crate::models::{ExtractionResult, RawDocument, SourceProfile};
use crate::services::strategies::{Page, Strategy, build_strategy};
use crate::services::Normalizer;

/// Ordered strategies plus the normalizer shared by all of them.
pub struct ExtractionCascade {
    source_id: String,
    strategies: Vec<Box<dyn Strategy>>,
    normalizer: Normalizer,
    max_entries: Option<usize>,
}

impl ExtractionCascade {
    /// Assemble a cascade from already compiled strategies.
    pub fn new(
        source_id: impl Into<String>,
        strategies: Vec<Box<dyn Strategy>>,
        normalizer: Normalizer,
    ) -> Result<Self> {
        let source_id = source_id.into();
        if strategies.is_empty() {
            return Err(AppError::config(format!(
                "source '{source_id}' declares no extraction strategies"
            )));
        }
        Ok(Self {
            source_id,
            strategies,
            normalizer,
            max_entries: None,
        })
    }

    /// Compile the cascade declared by a profile.
    pub fn from_profile(profile: &SourceProfile) -> Result<Self> {
        let strategies = profile
            .strategies
            .iter()
            .map(build_strategy)
            .collect::<Result<Vec<_>>>()?;
        let cascade = Self::new(&profile.id, strategies, Normalizer::from_profile(profile)?)?;
        Ok(cascade.with_max_entries(profile.max_entries))
    }

    /// Keep at most `max` entries (lowest ranks) per document.
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Strategy names in cascade order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the cascade over one document.
    ///
    /// A failed fetch is never parsed. Returns an unsuccessful, empty result
    /// when no strategy yields anything.
    pub fn extract(&self, document: &RawDocument) -> ExtractionResult {
        if let Some(reason) = document.failure_reason() {
            log::debug!(
                "[{}] page {}: not extracting failed fetch ({reason})",
                self.source_id,
                document.page_index
            );
            return ExtractionResult::empty();
        }

        let page = Page::parse(document);
        for strategy in &self.strategies {
            let matches = strategy.scan(&page);
            let found = matches.len();
            let mut entries = self.normalizer.finish(matches, strategy.min_title_len());

            if entries.is_empty() {
                log::debug!(
                    "[{}] page {}: strategy '{}' yielded nothing ({} raw matches)",
                    self.source_id,
                    document.page_index,
                    strategy.name(),
                    found
                );
                continue;
            }

            if let Some(max) = self.max_entries {
                entries.truncate(max);
            }
            log::debug!(
                "[{}] page {}: strategy '{}' accepted with {} entries",
                self.source_id,
                document.page_index,
                strategy.name(),
                entries.len()
            );
            return ExtractionResult::from_strategy(strategy.name(), entries);
        }

        log::warn!(
            "[{}] page {}: no strategy matched ({} tried)",
            self.source_id,
            document.page_index,
            self.strategies.len()
        );
        ExtractionResult::empty()
    }
}
