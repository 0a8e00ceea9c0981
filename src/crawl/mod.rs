//! The crawl engine: frontier loop, at-most-once fetch, wiring.
//!
//! Strictly sequential by design. Dedup, discovery ordering, and the
//! corrupted-asset registry are trivially correct only because there is one
//! writer; the loop owns the [`CrawlSession`] and nothing else mutates it.
//! Per-resource failures never halt the crawl — only a malformed seed (before
//! any fetch) and frontier exhaustion terminate a run.

pub mod session;

pub use session::{ArchivedResource, CorruptedAssets, CrawlSession, FrontierEntry};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Policy;
use crate::error::MirrorError;
use crate::fetch::{ArchiveClient, FetchError, Fetcher};
use crate::mapper;
use crate::media::{self, MediaKind};
use crate::optimize;
use crate::rewrite::{self, RewriteContext};
use crate::site::SiteScope;
use crate::snapshot::{TimeframeResolver, codec};
use crate::store::MirrorStore;

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlStats {
    fetched: usize,
    failed: usize,
    skipped_duplicates: usize,
    suppressed_corrupted: usize,
}

impl CrawlStats {
    /// Resources successfully materialized.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Resources that failed after fallback exhaustion or transport errors.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Frontier entries skipped because their identity was already visited.
    #[must_use]
    pub fn skipped_duplicates(&self) -> usize {
        self.skipped_duplicates
    }

    /// References suppressed because their target was a corrupted asset.
    #[must_use]
    pub fn suppressed_corrupted(&self) -> usize {
        self.suppressed_corrupted
    }

    /// Total resources dispatched (fetched + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.fetched + self.failed
    }
}

/// Result of a completed (or cancelled) run.
#[derive(Debug)]
pub struct CrawlReport {
    /// Run counters.
    pub stats: CrawlStats,
    /// Where the mirror tree was written.
    pub output_dir: PathBuf,
}

/// Per-resource failure. Logged, counted, never propagated.
#[derive(Debug, Error)]
enum ResourceFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The payload's media kind contradicts the asset kind the URL promises.
    #[error("corrupted asset: {url} answered with a document payload")]
    Corrupted { url: String },

    #[error(transparent)]
    Store(#[from] MirrorError),
}

/// The orchestrating crawl loop.
#[derive(Debug)]
pub struct CrawlEngine {
    archive: ArchiveClient,
    policy: Policy,
    scope: SiteScope,
    store: MirrorStore,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
}

impl CrawlEngine {
    /// Builds an engine from a seed wrapper URL, returning the engine and
    /// the seed frontier entry.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Format`] when the seed does not match the wrapper
    /// form; [`MirrorError::Seed`] when the wrapped original URL is
    /// unparseable. Both abort before any fetch.
    pub fn for_seed(
        seed_wrapper: &str,
        policy: Policy,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<(Self, FrontierEntry), MirrorError> {
        let decoded = codec::decode(seed_wrapper)?;
        let base = Url::parse(&decoded.original_url)
            .map_err(|source| MirrorError::seed(&decoded.original_url, source))?;

        let scope = SiteScope::for_site(&base, policy.www);
        let seed = match scope.normalize(decoded.original_url.as_str(), &base) {
            Some(normalized) => FrontierEntry {
                fetch_url: normalized.url,
                canonical: normalized.canonical,
            },
            None => FrontierEntry {
                canonical: scope.canonicalize(&base),
                fetch_url: base,
            },
        };

        let archive = ArchiveClient::new(fetcher, TimeframeResolver::default(), decoded.timestamp);
        let store = MirrorStore::new(policy.output_dir.clone());

        info!(
            site = scope.domain(),
            timestamp = archive.primary_timestamp().raw(),
            "mirror run configured"
        );

        Ok((
            Self {
                archive,
                policy,
                scope,
                store,
                cancel: Arc::new(AtomicBool::new(false)),
                progress: None,
            },
            seed,
        ))
    }

    /// The cancellation flag; setting it stops the loop at the next
    /// frontier-dequeue boundary, leaving all materialized files intact.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Attaches a progress bar updated per dispatched resource.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs the crawl to frontier exhaustion, budget, or cancellation.
    ///
    /// # Errors
    ///
    /// Only manifest-write failures surface; per-resource errors are counted
    /// in the returned stats.
    #[instrument(skip(self, seed), fields(site = self.scope.domain()))]
    pub async fn run(&self, seed: FrontierEntry) -> Result<CrawlReport, MirrorError> {
        let mut session = CrawlSession::new(seed);
        let mut stats = CrawlStats::default();

        while let Some(entry) = session.pop_next() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancellation requested, stopping with partial mirror");
                break;
            }
            if let Some(max) = self.policy.max_documents
                && session.visited_count() >= max
            {
                info!(max, "document budget reached, discarding remaining frontier");
                break;
            }
            if !session.mark_visited(&entry.canonical) {
                stats.skipped_duplicates += 1;
                continue;
            }

            if let Some(progress) = &self.progress {
                progress.set_message(entry.canonical.to_string());
                progress.inc(1);
            }

            match self.process(&entry, &mut session).await {
                Ok(suppressed) => {
                    stats.fetched += 1;
                    stats.suppressed_corrupted += suppressed;
                }
                Err(failure) => {
                    warn!(url = %entry.canonical, error = %failure, "resource failed");
                    stats.failed += 1;
                }
            }
        }

        self.store.write_manifest(session.archived()).await?;
        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        info!(
            fetched = stats.fetched,
            failed = stats.failed,
            skipped = stats.skipped_duplicates,
            suppressed = stats.suppressed_corrupted,
            "crawl complete"
        );

        Ok(CrawlReport {
            stats,
            output_dir: self.store.root().to_path_buf(),
        })
    }

    /// Fetches, classifies, rewrites, and persists one resource; enqueues
    /// its discoveries. Returns the number of corrupted-asset references the
    /// rewrite suppressed.
    async fn process(
        &self,
        entry: &FrontierEntry,
        session: &mut CrawlSession,
    ) -> Result<usize, ResourceFailure> {
        let url = entry.fetch_url.as_str();
        debug!(url, "fetching");
        let payload = self.archive.fetch_original(url).await?;

        let kind = media::classify(url, payload.content_type.as_deref(), &payload.bytes);
        if is_corrupted(url, kind) {
            session.corrupted.record(entry.canonical.clone());
            return Err(ResourceFailure::Corrupted {
                url: url.to_string(),
            });
        }

        let relative = mapper::map(&entry.fetch_url);
        let mut suppressed = 0usize;

        if kind.is_rewritable() {
            let text = String::from_utf8_lossy(&payload.bytes).into_owned();
            let (rewritten, discovered) = {
                let ctx = RewriteContext {
                    policy: &self.policy,
                    scope: &self.scope,
                    base: &entry.fetch_url,
                    corrupted: &session.corrupted,
                };
                match rewrite::rewrite(kind, &text, &ctx) {
                    Ok(outcome) => {
                        suppressed = outcome.suppressed;
                        (outcome.payload, outcome.discovered)
                    }
                    Err(error) => {
                        // Parse failure: persist verbatim, skip discovery
                        // for this resource only.
                        warn!(url, error = %error, "rewrite failed, persisting verbatim");
                        (text.clone(), Vec::new())
                    }
                }
            };

            for normalized in discovered {
                let admitted = session.enqueue(FrontierEntry {
                    fetch_url: normalized.url,
                    canonical: normalized.canonical,
                });
                if admitted {
                    debug!(frontier = session.frontier_len(), "discovered reference");
                }
            }

            let optimized = match kind {
                MediaKind::Document => optimize::optimize_html(&self.policy, rewritten),
                MediaKind::Stylesheet => optimize::minify_css(&self.policy, rewritten),
                _ => optimize::minify_js(&self.policy, rewritten),
            };
            self.store.write_text(&relative, &optimized).await?;
        } else if let MediaKind::Image(image_kind) = kind {
            let bytes = optimize::recompress_image(&self.policy, image_kind, payload.bytes);
            self.store.write_bytes(&relative, &bytes).await?;
        } else {
            self.store.write_bytes(&relative, &payload.bytes).await?;
        }

        session.record_archived(
            entry.canonical.clone(),
            ArchivedResource {
                path: relative,
                kind,
            },
        );
        Ok(suppressed)
    }
}

/// A payload is corrupted when its URL promises an asset kind but the
/// archive answered with a document (typically a styled error page).
fn is_corrupted(url: &str, kind: MediaKind) -> bool {
    if kind != MediaKind::Document {
        return false;
    }
    matches!(
        media::expected_from_url(url),
        Some(
            MediaKind::Font
                | MediaKind::Image(_)
                | MediaKind::Stylesheet
                | MediaKind::Script
        )
    )
}
