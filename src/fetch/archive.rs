//! Archive-aware fetching: wrapper encoding plus timestamp fallback.
//!
//! Callers hand in original URLs; the client encodes them into wrapper form
//! at the run's primary timestamp and, when the archive reports the capture
//! absent, walks the [`TimeframeResolver`] schedule until a nearby capture
//! answers or every window is exhausted.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::snapshot::{Timestamp, TimeframeResolver, codec};

use super::{FetchOutcome, Fetcher, Payload};

/// Resource-level fetch failure. Never fatal to the crawl.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Absent at the primary timestamp and across every fallback window.
    #[error("no capture of {url} at {timestamp} or any nearby timestamp")]
    NotFound {
        /// The original URL that has no capture.
        url: String,
        /// The primary timestamp the search started from.
        timestamp: String,
    },

    /// Timeout or connection failure.
    #[error("transient failure fetching {url}: {reason}")]
    Transient {
        /// The original URL that failed.
        url: String,
        /// The underlying transport failure.
        reason: String,
    },
}

impl FetchError {
    fn not_found(url: &str, timestamp: &Timestamp) -> Self {
        Self::NotFound {
            url: url.to_string(),
            timestamp: timestamp.raw().to_string(),
        }
    }

    fn transient(url: &str, reason: String) -> Self {
        Self::Transient {
            url: url.to_string(),
            reason,
        }
    }
}

/// Fetches original URLs out of the snapshot archive with fallback search.
pub struct ArchiveClient {
    fetcher: Arc<dyn Fetcher>,
    resolver: TimeframeResolver,
    primary: Timestamp,
}

impl std::fmt::Debug for ArchiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveClient")
            .field("fetcher", &"<dyn Fetcher>")
            .field("resolver", &self.resolver)
            .field("primary", &self.primary)
            .finish()
    }
}

impl ArchiveClient {
    /// Creates a client bound to the run's primary capture timestamp.
    pub fn new(fetcher: Arc<dyn Fetcher>, resolver: TimeframeResolver, primary: Timestamp) -> Self {
        Self {
            fetcher,
            resolver,
            primary,
        }
    }

    /// The run's primary capture timestamp.
    #[must_use]
    pub fn primary_timestamp(&self) -> &Timestamp {
        &self.primary
    }

    /// Fetches an original URL, falling back across nearby timestamps when
    /// the primary capture is absent.
    ///
    /// A transient failure at the primary timestamp fails the resource
    /// without fallback: the capture may exist, so probing other timestamps
    /// would materialize the wrong answer.
    ///
    /// # Errors
    ///
    /// [`FetchError::NotFound`] after every window is exhausted;
    /// [`FetchError::Transient`] on timeout/connection failure.
    #[instrument(skip(self), fields(url = %original_url))]
    pub async fn fetch_original(&self, original_url: &str) -> Result<Payload, FetchError> {
        let wrapper = codec::encode(original_url, &self.primary);
        match self.fetcher.fetch(&wrapper).await {
            FetchOutcome::Success(payload) => return Ok(payload),
            FetchOutcome::Transient(reason) => {
                return Err(FetchError::transient(original_url, reason));
            }
            FetchOutcome::NotFound => {
                info!(url = original_url, "absent at primary timestamp, searching nearby captures");
            }
        }

        for candidates in self.resolver.schedule(&self.primary) {
            for candidate in candidates {
                let wrapper = codec::encode(original_url, &candidate);
                match self.fetcher.fetch(&wrapper).await {
                    FetchOutcome::Success(payload) => {
                        let offset_hours =
                            candidate.abs_offset_secs(&self.primary) as f64 / 3600.0;
                        info!(
                            url = original_url,
                            timestamp = candidate.raw(),
                            offset_hours,
                            "found capture at fallback timestamp"
                        );
                        return Ok(payload);
                    }
                    FetchOutcome::NotFound | FetchOutcome::Transient(_) => {
                        debug!(timestamp = candidate.raw(), "no capture at candidate");
                    }
                }
            }
        }

        Err(FetchError::not_found(original_url, &self.primary))
    }
}
