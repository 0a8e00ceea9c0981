//! Payload rewriting: removal policies, reference localization, discovery.
//!
//! One transformable payload (document, stylesheet, script, or inline style)
//! goes in; the rewritten payload comes out together with every newly
//! discovered same-site reference in first-encounter document order. Each
//! media kind has its own pure handler; dispatch is over the tagged
//! [`MediaKind`] variant.

pub mod css;
pub mod html;
pub mod js;
pub mod preserve;

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::Policy;
use crate::crawl::CorruptedAssets;
use crate::mapper;
use crate::media::MediaKind;
use crate::site::{CanonicalUrl, Normalized, SiteScope};

/// Rewrite failure; the caller persists the original payload verbatim and
/// skips discovery for that resource only.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The markup rewriter rejected the document.
    #[error("markup rewrite failed: {reason}")]
    Markup {
        /// Underlying rewriter error text.
        reason: String,
    },
}

/// Result of rewriting one payload.
#[derive(Debug)]
pub struct RewriteOutcome {
    /// The transformed payload.
    pub payload: String,
    /// Newly discovered mirrorable references, de-duplicated by canonical
    /// identity, in document order.
    pub discovered: Vec<Normalized>,
    /// Number of references suppressed because their target is a known
    /// corrupted asset.
    pub suppressed: usize,
}

/// Everything a rewrite pass needs to know about the run. Read-only.
pub struct RewriteContext<'a> {
    /// Run configuration.
    pub policy: &'a Policy,
    /// Site identity rules.
    pub scope: &'a SiteScope,
    /// The resource's own original URL; relative references resolve here.
    pub base: &'a Url,
    /// Known wrong-kind assets; stylesheet passes suppress references to
    /// these.
    pub corrupted: &'a CorruptedAssets,
}

impl RewriteContext<'_> {
    pub(crate) fn normalize(&self, raw: &str) -> Option<Normalized> {
        self.scope.normalize(raw, self.base)
    }

    /// Normalizes a reference and keeps it only when it should be fetched
    /// and materialized locally.
    pub(crate) fn mirrorable(&self, raw: &str) -> Option<Normalized> {
        let normalized = self.normalize(raw)?;
        self.scope
            .is_mirrorable(normalized.url.as_str())
            .then_some(normalized)
    }

    /// The reference string an internal target rewrites to under the current
    /// policy: a local mirror path, or the normalized absolute URL when
    /// relative rewriting is disabled.
    pub(crate) fn internal_href(&self, normalized: &Normalized, is_page: bool) -> String {
        if self.policy.internal_links_relative {
            mapper::link_path(&normalized.url, is_page)
        } else {
            normalized.url.to_string()
        }
    }
}

/// First-encounter-ordered, identity-deduplicated discovery accumulator.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryList {
    seen: HashSet<CanonicalUrl>,
    items: Vec<Normalized>,
}

impl DiscoveryList {
    pub(crate) fn push(&mut self, normalized: Normalized) {
        if self.seen.insert(normalized.canonical.clone()) {
            self.items.push(normalized);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Normalized> {
        self.items
    }
}

/// Rewrites one payload according to its media kind.
///
/// Non-transformable kinds pass through unchanged with no discovery.
///
/// # Errors
///
/// [`RewriteError::Markup`] when the document rewriter fails; stylesheet and
/// script passes are regex-based and never error.
pub fn rewrite(
    kind: MediaKind,
    payload: &str,
    ctx: &RewriteContext<'_>,
) -> Result<RewriteOutcome, RewriteError> {
    match kind {
        MediaKind::Document => html::rewrite_document(payload, ctx),
        MediaKind::Stylesheet => Ok(css::rewrite_stylesheet(payload, ctx)),
        MediaKind::Script => Ok(RewriteOutcome {
            payload: payload.to_string(),
            discovered: js::scan(payload, ctx),
            suppressed: 0,
        }),
        MediaKind::Image(_) | MediaKind::Font | MediaKind::Other => Ok(RewriteOutcome {
            payload: payload.to_string(),
            discovered: Vec::new(),
            suppressed: 0,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::site::WwwPolicy;

    #[test]
    fn test_discovery_list_dedups_by_identity_keeps_order() {
        let base = Url::parse("http://example.com/").unwrap();
        let scope = SiteScope::for_site(&base, WwwPolicy::Strip);
        let mut list = DiscoveryList::default();

        list.push(scope.normalize("/b", &base).unwrap());
        list.push(scope.normalize("/a", &base).unwrap());
        list.push(scope.normalize("/b?x=1", &base).unwrap());

        let items = list.into_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].canonical.as_str(), "http://example.com/b");
        assert_eq!(items[1].canonical.as_str(), "http://example.com/a");
    }

    #[test]
    fn test_rewrite_other_kind_is_identity() {
        let base = Url::parse("http://example.com/").unwrap();
        let scope = SiteScope::for_site(&base, WwwPolicy::Strip);
        let policy = Policy::default();
        let corrupted = CorruptedAssets::default();
        let ctx = RewriteContext {
            policy: &policy,
            scope: &scope,
            base: &base,
            corrupted: &corrupted,
        };

        let outcome = rewrite(MediaKind::Other, "raw bytes as text", &ctx).unwrap();
        assert_eq!(outcome.payload, "raw bytes as text");
        assert!(outcome.discovered.is_empty());
    }
}
