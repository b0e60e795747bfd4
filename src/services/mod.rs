//! Service layer for the ranking engine.
//!
//! This module contains the extraction logic:
//! - Strategy compilation and scanning (`strategies`)
//! - Field cleaning, rank assignment and deduplication (`Normalizer`)
//! - The short-circuiting strategy driver (`ExtractionCascade`)
//! - Page stitching (`PaginationMerger`)
//! - Compiled profiles by source id (`SourceRegistry`)

mod cascade;
mod merge;
mod normalize;
mod registry;
pub mod strategies;

pub use cascade::ExtractionCascade;
pub use merge::{PaginationMerger, merge_pages};
pub use normalize::{Normalizer, RawMatch, TitleDeduplicator, normalize_title, parse_rank};
pub use registry::{CompiledSource, SourceRegistry};
pub use strategies::{Page, Strategy};
