//! Fetch collaborators: transport trait, HTTP implementation, and the
//! archive-aware client that layers timestamp fallback on top.
//!
//! The crawl engine depends only on the tri-state [`FetchOutcome`] contract:
//! a fetch yields a payload, a definitive not-found, or a transient failure.
//! Everything transport-specific stays behind the [`Fetcher`] trait so tests
//! can substitute a scripted fetcher.

mod archive;
mod client;

pub use archive::{ArchiveClient, FetchError};
pub use client::HttpFetcher;

use async_trait::async_trait;

/// A fetched payload plus the response metadata classification needs.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Raw response body.
    pub bytes: Vec<u8>,
    /// Content-Type header value, when the server sent one.
    pub content_type: Option<String>,
}

/// Tri-state result of one fetch attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The resource was served.
    Success(Payload),
    /// The resource is definitively absent at this URL (404 and friends).
    NotFound,
    /// Timeout, connection failure, or server error; may succeed elsewhere.
    Transient(String),
}

/// Transport abstraction over "GET this archive URL".
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one archive URL. Never blocks indefinitely; implementations
    /// carry timeouts and report them as [`FetchOutcome::Transient`].
    async fn fetch(&self, url: &str) -> FetchOutcome;
}
