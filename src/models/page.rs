//! Page batches and merged rankings.

use serde::{Deserialize, Serialize};

use super::RankedEntry;

/// Entries extracted from one page, before rank offsetting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBatch {
    /// 1-based page index
    pub page_index: u32,

    /// Number of ranks each page covers
    pub page_size: u32,

    /// Entries with page-local ranks
    pub entries: Vec<RankedEntry>,
}

impl PageBatch {
    pub fn new(page_index: u32, page_size: u32, entries: Vec<RankedEntry>) -> Self {
        Self {
            page_index,
            page_size,
            entries,
        }
    }

    /// Rank offset applied to every entry of this page.
    pub fn rank_offset(&self) -> u32 {
        self.page_size
            .saturating_mul(self.page_index.saturating_sub(1))
    }
}

/// Soft problem found while merging pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeWarning {
    /// Two different titles claimed the same global rank; the later one was dropped
    RankConflict {
        rank: u32,
        kept: String,
        dropped: String,
    },
    /// An entry ranked at or below one already emitted; it was dropped
    OutOfOrder { rank: u32, previous: u32, title: String },
}

/// A single ranking spanning all fetched pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResult {
    /// Entries in strictly ascending rank order
    pub entries: Vec<RankedEntry>,

    /// Page indices that contributed to the result
    pub pages: Vec<u32>,

    /// Page indices that were requested but failed to fetch or parse
    #[serde(default)]
    pub missing_pages: Vec<u32>,

    #[serde(default)]
    pub warnings: Vec<MergeWarning>,
}

impl MergedResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether some requested pages did not contribute.
    pub fn is_partial(&self) -> bool {
        !self.missing_pages.is_empty()
    }

    /// The first `n` entries (chart range view).
    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_offset() {
        assert_eq!(PageBatch::new(1, 50, Vec::new()).rank_offset(), 0);
        assert_eq!(PageBatch::new(2, 50, Vec::new()).rank_offset(), 50);
        assert_eq!(PageBatch::new(3, 20, Vec::new()).rank_offset(), 40);
    }

    #[test]
    fn test_top_clamps_to_length() {
        let merged = MergedResult {
            entries: (1..=5).map(|i| RankedEntry::new(i, format!("T{i}"))).collect(),
            ..MergedResult::default()
        };
        assert_eq!(merged.top(3).len(), 3);
        assert_eq!(merged.top(10).len(), 5);
    }
}
