//! Pipeline entry points.
//!
//! - `RankingService`: fetch, extract, merge and cache rankings per source
//! - `run_validate`: check a configuration file without fetching anything

pub mod collect;
pub mod validate;

pub use collect::RankingService;
pub use validate::run_validate;
