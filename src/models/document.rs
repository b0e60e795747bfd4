//! Raw documents handed over by the fetcher.

use chrono::{DateTime, Utc};

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Payload retrieved with the given HTTP status
    Success { status: u16 },
    /// Transport error, timeout or non-success status
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Raw markup for one page of a source.
///
/// Created by a [`DocumentFetcher`](crate::utils::http::DocumentFetcher) and
/// discarded once the extraction cascade has run over it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Source identifier the page belongs to
    pub source_id: String,

    /// 1-based page index
    pub page_index: u32,

    /// URL the document was fetched from (used to resolve relative links)
    pub url: String,

    /// Raw text or markup
    pub body: String,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,

    pub outcome: FetchOutcome,
}

impl RawDocument {
    /// A successfully fetched document.
    pub fn success(
        source_id: impl Into<String>,
        page_index: u32,
        url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            page_index,
            url: url.into(),
            body: body.into(),
            fetched_at: Utc::now(),
            outcome: FetchOutcome::Success { status: 200 },
        }
    }

    /// A failed fetch; the body is empty.
    pub fn failed(
        source_id: impl Into<String>,
        page_index: u32,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            page_index,
            url: url.into(),
            body: String::new(),
            fetched_at: Utc::now(),
            outcome: FetchOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        if let FetchOutcome::Success { .. } = self.outcome {
            self.outcome = FetchOutcome::Success { status };
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Failure reason, if the fetch did not succeed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Failed { reason } => Some(reason),
            FetchOutcome::Success { .. } => None,
        }
    }
}
