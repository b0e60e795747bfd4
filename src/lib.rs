// src/lib.rs

//! Ranked-list extraction and caching engine.
//!
//! Turns loosely structured ranking pages (music charts, bestseller lists)
//! into validated, deduplicated rankings, and keeps serving the last good
//! ranking while an upstream source is failing.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
