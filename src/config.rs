//! Immutable run configuration.
//!
//! A [`Policy`] is assembled once at startup and only ever read afterwards;
//! the crawl, rewrite, and optimizer layers all borrow it.

use std::path::PathBuf;

use thiserror::Error;

use crate::site::WwwPolicy;

/// How rewritten external hyperlinks are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalLinkPolicy {
    /// Leave the reference pointing at the live external site.
    Keep,
    /// Replace the anchor with its visible text (default).
    #[default]
    Neutralize,
    /// Remove the element entirely.
    Drop,
}

/// Invalid policy combinations surfaced at startup, before any fetch.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Dropping elements and keeping their text are mutually exclusive.
    #[error("--drop-external-links and --keep-external-links are mutually exclusive")]
    ConflictingExternalLinkFlags,
}

impl ExternalLinkPolicy {
    /// Derives the policy from the two CLI override flags.
    ///
    /// # Errors
    ///
    /// [`PolicyError::ConflictingExternalLinkFlags`] when both overrides are
    /// set; there is no implicit precedence.
    pub fn from_flags(drop: bool, keep: bool) -> Result<Self, PolicyError> {
        match (drop, keep) {
            (true, true) => Err(PolicyError::ConflictingExternalLinkFlags),
            (true, false) => Ok(Self::Drop),
            (false, true) => Ok(Self::Keep),
            (false, false) => Ok(Self::Neutralize),
        }
    }
}

/// Configuration snapshot for one mirror run. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Root directory the mirror tree is written under.
    pub output_dir: PathBuf,

    /// Strip analytics/tracker scripts and consent tooling.
    pub remove_trackers: bool,
    /// Strip advertisement elements.
    pub remove_ads: bool,
    /// Neutralize clickable contact references outside preserve containers.
    pub remove_clickable_contacts: bool,
    /// Remove iframes pointing off-site.
    pub remove_external_iframes: bool,

    /// Treatment of external hyperlinks.
    pub external_links: ExternalLinkPolicy,
    /// Rewrite same-site references to local mirror paths.
    pub internal_links_relative: bool,
    /// Direction of www-prefix normalization.
    pub www: WwwPolicy,

    /// Whitespace-trim documents after rewriting.
    pub optimize_html: bool,
    /// Re-encode images at a lossier quality.
    pub optimize_images: bool,
    /// Strip comments/blank runs from stylesheets.
    pub minify_css: bool,
    /// Reserved gate; scripts currently pass through unchanged.
    pub minify_js: bool,

    /// Stop admitting new fetches once this many resources are materialized.
    pub max_documents: Option<usize>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            remove_trackers: true,
            remove_ads: true,
            remove_clickable_contacts: true,
            remove_external_iframes: false,
            external_links: ExternalLinkPolicy::Neutralize,
            internal_links_relative: true,
            www: WwwPolicy::Strip,
            optimize_html: true,
            optimize_images: false,
            minify_css: false,
            minify_js: false,
            max_documents: None,
        }
    }
}
