// src/models/mod.rs

//! Domain models for the ranking engine.
//!
//! This module contains all plain data structures used throughout the
//! application, organized by their primary purpose.

mod config;
mod document;
mod entry;
mod page;
mod profile;

// Re-export all public types
pub use config::{CacheConfig, Config, FetcherConfig, LoggingConfig};
pub use document::{FetchOutcome, RawDocument};
pub use entry::{ExtractionResult, RankedEntry, UNKNOWN};
pub use page::{MergeWarning, MergedResult, PageBatch};
pub use profile::{Pagination, SourceProfile, StrategySpec, TrimRule};
