// src/services/merge.rs

//! Pagination merge.
//!
//! Stitches page-level results into one ranking. Ranks are offset
//! arithmetically (`page_size * (page_index - 1)`), never renumbered, so the
//! published ranks stay verifiable against the source.

use crate::models::{MergeWarning, MergedResult, PageBatch};
use crate::services::TitleDeduplicator;

/// Combines page batches supplied in ascending page order.
#[derive(Debug, Clone, Default)]
pub struct PaginationMerger;

impl PaginationMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge batches in the order given.
    ///
    /// Duplicate titles keep their first occurrence. An entry whose offset
    /// rank is not above the last emitted rank is dropped and recorded as a
    /// warning, so the output is strictly rank-ascending.
    pub fn merge(&self, batches: &[PageBatch]) -> MergedResult {
        let mut dedup = TitleDeduplicator::new();
        let mut merged = MergedResult::default();
        let mut last: Option<(u32, usize)> = None;

        for batch in batches {
            let offset = batch.rank_offset();
            merged.pages.push(batch.page_index);

            for entry in &batch.entries {
                let rank = entry.rank.saturating_add(offset);
                if !dedup.insert(&entry.title) {
                    continue;
                }

                if let Some((previous, index)) = last {
                    if rank <= previous {
                        let warning = if rank == previous {
                            MergeWarning::RankConflict {
                                rank,
                                kept: merged.entries[index].title.clone(),
                                dropped: entry.title.clone(),
                            }
                        } else {
                            MergeWarning::OutOfOrder {
                                rank,
                                previous,
                                title: entry.title.clone(),
                            }
                        };
                        log::warn!("Pagination merge: {warning:?}");
                        merged.warnings.push(warning);
                        continue;
                    }
                }

                let mut entry = entry.clone();
                entry.rank = rank;
                merged.entries.push(entry);
                last = Some((rank, merged.entries.len() - 1));
            }
        }

        merged
    }
}

/// Convenience function to merge batches.
pub fn merge_pages(batches: &[PageBatch]) -> MergedResult {
    PaginationMerger::new().merge(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RankedEntry;

    fn batch(page: u32, size: u32, titles: &[&str]) -> PageBatch {
        let entries = titles
            .iter()
            .enumerate()
            .map(|(i, t)| RankedEntry::new(i as u32 + 1, *t))
            .collect();
        PageBatch::new(page, size, entries)
    }

    fn full_page(page: u32, size: u32) -> PageBatch {
        let entries = (1..=size)
            .map(|i| RankedEntry::new(i, format!("Page {page} Item {i}")))
            .collect();
        PageBatch::new(page, size, entries)
    }

    #[test]
    fn test_offset_applied() {
        let merged = merge_pages(&[full_page(1, 50), full_page(2, 50)]);
        let first_of_page_two = merged
            .entries
            .iter()
            .find(|e| e.title == "Page 2 Item 1")
            .unwrap();
        assert_eq!(first_of_page_two.rank, 51);
    }

    #[test]
    fn test_two_full_pages() {
        let merged = merge_pages(&[full_page(1, 50), full_page(2, 50)]);
        assert_eq!(merged.len(), 100);
        let ranks: Vec<u32> = merged.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=100).collect::<Vec<_>>());
        assert!(merged.warnings.is_empty());
        assert_eq!(merged.pages, vec![1, 2]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batches = [batch(1, 3, &["A", "B", "a"]), batch(2, 3, &["C", "b", "D"])];
        assert_eq!(merge_pages(&batches), merge_pages(&batches));
    }

    #[test]
    fn test_cross_page_duplicates_keep_first() {
        let merged = merge_pages(&[batch(1, 2, &["Foo  Bar", "Baz"]), batch(2, 2, &["foo bar", "Qux"])]);
        let titles: Vec<&str> = merged.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Foo  Bar", "Baz", "Qux"]);
        assert_eq!(merged.entries[2].rank, 4);
    }

    #[test]
    fn test_rank_conflict_drops_later_entry() {
        // Page 1 overflows its page size: local rank 3 on a 2-wide page
        // collides with page 2's first entry.
        let mut first = batch(1, 2, &["A", "B"]);
        first.entries.push(RankedEntry::new(3, "C"));
        let merged = merge_pages(&[first, batch(2, 2, &["D", "E"])]);

        let titles: Vec<&str> = merged.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "E"]);
        assert_eq!(
            merged.warnings,
            vec![MergeWarning::RankConflict {
                rank: 3,
                kept: "C".into(),
                dropped: "D".into()
            }]
        );
    }

    #[test]
    fn test_ranks_strictly_increase() {
        let mut first = batch(1, 2, &["A", "B"]);
        first.entries.push(RankedEntry::new(5, "Far"));
        let merged = merge_pages(&[first, batch(2, 2, &["C", "D"])]);
        assert!(merged.entries.windows(2).all(|w| w[0].rank < w[1].rank));
        assert!(matches!(merged.warnings[0], MergeWarning::OutOfOrder { rank: 3, previous: 5, .. }));
    }

    #[test]
    fn test_missing_middle_page_keeps_offsets() {
        let merged = merge_pages(&[full_page(1, 10), full_page(3, 10)]);
        assert_eq!(merged.len(), 20);
        assert_eq!(merged.entries[10].rank, 21);
    }

    #[test]
    fn test_empty_input() {
        let merged = merge_pages(&[]);
        assert!(merged.is_empty());
        assert!(merged.pages.is_empty());
    }
}
