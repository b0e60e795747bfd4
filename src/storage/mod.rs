//! In-memory storage for extracted rankings.
//!
//! Implements a two-tier store:
//! - Cache: the latest payload per key, served while younger than its TTL
//! - Shadow: the last successful payload per key, served when a refresh fails
//!
//! ```text
//! request ──► fresh cache entry? ──yes──► Hit
//!                  │ no
//!                  ▼
//!               fetch ──ok──► write cache + shadow ──► Fetched
//!                  │ err
//!                  ▼
//!            shadow entry? ──yes──► Stale
//!                  │ no
//!                  ▼
//!             Unavailable
//! ```
//!
//! Nothing is persisted; all state lives for the lifetime of the process.

pub mod cache;
mod clock;
mod key;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use cache::{CacheEntry, CacheStatus, CacheStore, ClearScope, ShadowEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;

/// Outcome of a cache lookup.
#[derive(Debug)]
pub enum Cached<T> {
    /// Served from a fresh cache entry without fetching
    Hit {
        payload: Arc<T>,
        refreshed_at: DateTime<Utc>,
    },
    /// Fetched just now
    Fetched {
        payload: Arc<T>,
        refreshed_at: DateTime<Utc>,
    },
    /// Refresh failed; last known good payload served instead
    Stale {
        payload: Arc<T>,
        refreshed_at: DateTime<Utc>,
        error: String,
    },
    /// Refresh failed and nothing was ever fetched successfully
    Unavailable { error: String },
}

impl<T> Cached<T> {
    pub fn payload(&self) -> Option<&Arc<T>> {
        match self {
            Self::Hit { payload, .. } | Self::Fetched { payload, .. } | Self::Stale { payload, .. } => {
                Some(payload)
            }
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_payload(self) -> Option<Arc<T>> {
        match self {
            Self::Hit { payload, .. } | Self::Fetched { payload, .. } | Self::Stale { payload, .. } => {
                Some(payload)
            }
            Self::Unavailable { .. } => None,
        }
    }

    /// When the served payload was last fetched successfully.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Hit { refreshed_at, .. }
            | Self::Fetched { refreshed_at, .. }
            | Self::Stale { refreshed_at, .. } => Some(*refreshed_at),
            Self::Unavailable { .. } => None,
        }
    }

    /// Error of the refresh attempt, for stale or unavailable results.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Stale { error, .. } | Self::Unavailable { error } => Some(error),
            Self::Hit { .. } | Self::Fetched { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "cached",
            Self::Fetched { .. } => "fresh",
            Self::Stale { .. } => "stale",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}
