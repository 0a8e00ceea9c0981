//! Expanding-window timestamp fallback search.
//!
//! When a resource is absent at the run's primary capture timestamp, nearby
//! captures often exist: the archive crawls a site over hours or days, so an
//! image referenced by a page captured at T0 may only have been stored at
//! T0+3h. The resolver generates candidate timestamps across expanding
//! windows (±6h, ±24h, ±72h, ±168h), closest candidates first, and the
//! caller tries each until one fetch succeeds.
//!
//! The schedule is fully deterministic: identical (origin, window
//! configuration) inputs always produce identical candidate order. There is
//! deliberately no jitter here, unlike a retry-backoff policy.

use super::Timestamp;

/// Default expanding windows, in hours either side of the origin.
pub const DEFAULT_WINDOW_HOURS: [i64; 4] = [6, 24, 72, 168];

/// Default bound on candidates tried per window before escalating.
pub const DEFAULT_CANDIDATES_PER_WINDOW: usize = 10;

/// One search window: how far to look and at what granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    /// Hours to search before and after the origin.
    pub hours_range: i64,
    /// Step between candidate offsets, in hours.
    pub step_hours: i64,
}

impl SearchWindow {
    /// A window with the step the range implies: wider windows step coarser
    /// so candidate counts stay comparable (`max(1, range / 12)`).
    #[must_use]
    pub fn spanning(hours_range: i64) -> Self {
        Self {
            hours_range,
            step_hours: (hours_range / 12).max(1),
        }
    }
}

/// Deterministic candidate-timestamp generator for fallback searches.
#[derive(Debug, Clone)]
pub struct TimeframeResolver {
    windows: Vec<SearchWindow>,
    candidates_per_window: usize,
}

impl Default for TimeframeResolver {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOW_HOURS
                .iter()
                .map(|&hours| SearchWindow::spanning(hours))
                .collect(),
            candidates_per_window: DEFAULT_CANDIDATES_PER_WINDOW,
        }
    }
}

impl TimeframeResolver {
    /// Creates a resolver with a custom window schedule.
    #[must_use]
    pub fn new(windows: Vec<SearchWindow>, candidates_per_window: usize) -> Self {
        Self {
            windows,
            candidates_per_window: candidates_per_window.max(1),
        }
    }

    /// Number of configured windows.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Candidate timestamps for one window, sorted by ascending absolute
    /// distance from `origin` and capped at the per-window bound.
    ///
    /// For equal distances the earlier capture sorts first (the generation
    /// order walks offsets from `-range` upward and the sort is stable).
    /// The origin itself is never a candidate; the caller already tried it.
    #[must_use]
    pub fn window_candidates(&self, origin: &Timestamp, window: SearchWindow) -> Vec<Timestamp> {
        let mut candidates = Vec::new();
        let mut offset = -window.hours_range;
        while offset <= window.hours_range {
            if offset != 0 {
                candidates.push(origin.offset_by_hours(offset));
            }
            offset += window.step_hours;
        }
        candidates.sort_by_key(|candidate| candidate.abs_offset_secs(origin));
        candidates.truncate(self.candidates_per_window);
        candidates
    }

    /// All windows' candidate lists in escalation order.
    #[must_use]
    pub fn schedule(&self, origin: &Timestamp) -> Vec<Vec<Timestamp>> {
        self.windows
            .iter()
            .map(|&window| self.window_candidates(origin, window))
            .collect()
    }
}
