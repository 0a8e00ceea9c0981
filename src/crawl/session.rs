//! Per-run crawl state.
//!
//! One [`CrawlSession`] owns every piece of mutable crawl-wide state:
//! frontier, visited set, corrupted-asset registry, and the archived-resource
//! map. Only the engine loop mutates it; collaborators get read-only views.
//! The session is created when a crawl starts and dropped when it ends —
//! nothing persists across runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use url::Url;

use crate::media::MediaKind;
use crate::site::CanonicalUrl;

/// A discovered-but-not-yet-fetched resource: the URL as discovered (query
/// kept for fetching) paired with its canonical identity for dedup.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Absolute URL to fetch.
    pub fetch_url: Url,
    /// Canonical identity.
    pub canonical: CanonicalUrl,
}

/// A successfully materialized resource.
#[derive(Debug, Clone)]
pub struct ArchivedResource {
    /// Path relative to the output root.
    pub path: PathBuf,
    /// Detected media kind.
    pub kind: MediaKind,
}

/// Canonical URLs whose archived payload turned out to be the wrong media
/// kind (a font URL answering with an error document). Grows monotonically;
/// consulted by stylesheet rewriting to suppress dead references.
#[derive(Debug, Default)]
pub struct CorruptedAssets {
    set: HashSet<CanonicalUrl>,
}

impl CorruptedAssets {
    /// Records a corrupted asset. Returns `false` when already known.
    pub fn record(&mut self, canonical: CanonicalUrl) -> bool {
        self.set.insert(canonical)
    }

    /// Whether this canonical URL is known-corrupted.
    #[must_use]
    pub fn contains(&self, canonical: &CanonicalUrl) -> bool {
        self.set.contains(canonical)
    }

    /// Number of registered corrupted assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True when no corrupted asset has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// All mutable state for one crawl run.
#[derive(Debug)]
pub struct CrawlSession {
    frontier: VecDeque<FrontierEntry>,
    /// Canonical URLs currently sitting in the frontier.
    queued: HashSet<CanonicalUrl>,
    /// Canonical URLs already dispatched for fetch. Never shrinks.
    visited: HashSet<CanonicalUrl>,
    /// Registry of wrong-kind payloads; read by the rewrite engine.
    pub corrupted: CorruptedAssets,
    archived: HashMap<CanonicalUrl, ArchivedResource>,
}

impl CrawlSession {
    /// Starts a session with the seed as the only frontier entry.
    #[must_use]
    pub fn new(seed: FrontierEntry) -> Self {
        let mut queued = HashSet::new();
        queued.insert(seed.canonical.clone());
        let mut frontier = VecDeque::new();
        frontier.push_back(seed);
        Self {
            frontier,
            queued,
            visited: HashSet::new(),
            corrupted: CorruptedAssets::default(),
            archived: HashMap::new(),
        }
    }

    /// Pops the next frontier entry in discovery (FIFO) order.
    pub fn pop_next(&mut self) -> Option<FrontierEntry> {
        let entry = self.frontier.pop_front()?;
        self.queued.remove(&entry.canonical);
        Some(entry)
    }

    /// Appends a discovered entry unless its identity was already visited or
    /// is already queued. Returns whether it was admitted.
    pub fn enqueue(&mut self, entry: FrontierEntry) -> bool {
        if self.visited.contains(&entry.canonical) || !self.queued.insert(entry.canonical.clone())
        {
            return false;
        }
        self.frontier.push_back(entry);
        true
    }

    /// Marks an identity as dispatched. Returns `false` when it already was,
    /// in which case the caller must skip the fetch.
    pub fn mark_visited(&mut self, canonical: &CanonicalUrl) -> bool {
        self.visited.insert(canonical.clone())
    }

    /// Whether an identity has been dispatched.
    #[must_use]
    pub fn is_visited(&self, canonical: &CanonicalUrl) -> bool {
        self.visited.contains(canonical)
    }

    /// Number of identities dispatched for fetch.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Entries still waiting in the frontier.
    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Records a materialized resource.
    pub fn record_archived(&mut self, canonical: CanonicalUrl, resource: ArchivedResource) {
        self.archived.insert(canonical, resource);
    }

    /// Materialized resources so far.
    #[must_use]
    pub fn archived(&self) -> &HashMap<CanonicalUrl, ArchivedResource> {
        &self.archived
    }
}
