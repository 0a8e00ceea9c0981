//! Site scoping: canonical URL identity and reference classification.
//!
//! Everything the crawl and rewrite layers need to answer "is this reference
//! ours, and which file is it?" lives here. A [`SiteScope`] is built once
//! from the seed's original URL and is pure: identical inputs always produce
//! identical normalization results.

use std::fmt;
use std::sync::LazyLock;

use regex::RegexSet;
use url::Url;

use crate::snapshot::codec;

/// Externally-hosted resource families that are mirrored locally under a
/// namespaced path instead of being treated as foreign references.
pub const EXTERNAL_FAMILY_HOSTS: &[&str] = &["fonts.googleapis.com", "fonts.gstatic.com"];

/// Hostname fragments identifying third-party analytics/tracking scripts.
#[allow(clippy::expect_used)]
static TRACKER_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)google-analytics\.com",
        r"(?i)googletagmanager\.com",
        r"(?i)facebook\.net",
        r"(?i)doubleclick\.net",
        r"(?i)googleads\.g\.doubleclick\.net",
        r"(?i)googlesyndication\.com",
        r"(?i)facebook\.com/tr",
        r"(?i)analytics\.",
        r"(?i)stats\.",
        r"(?i)tracking\.",
        r"(?i)tagmanager\.google\.com",
        r"(?i)gtag\.js",
        r"(?i)ga\.js",
        r"(?i)analytics\.js",
    ])
    .expect("tracker patterns are valid")
});

/// Hostname/path fragments identifying advertisement resources.
#[allow(clippy::expect_used)]
static AD_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)ads\.",
        r"(?i)advertising\.com",
        r"(?i)doubleclick\.net",
        r"(?i)googlesyndication\.com",
        r"(?i)googleads\.",
        r"(?i)adserver\.",
        r"(?i)banner",
        r"(?i)popup",
        r"(?i)sponsor",
    ])
    .expect("ad patterns are valid")
});

/// Clickable-contact scheme prefixes.
#[allow(clippy::expect_used)]
static CONTACT_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^mailto:",
        r"(?i)^tel:",
        r"(?i)^sms:",
        r"(?i)^whatsapp:",
        r"(?i)^callto:",
    ])
    .expect("contact patterns are valid")
});

/// Content fragments that mark an inline script as tracking/consent tooling.
const TRACKER_SCRIPT_FRAGMENTS: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "gtag",
    "datalayer",
    "doubleclick",
    "googlesyndication",
    "cookieyes",
    "cookie consent",
    "cookie banner",
    "cookiebar",
];

/// Canonical identity of a resource: scheme + host (post www-policy) + path.
///
/// Query and fragment are excluded, except for namespaced external-family
/// hosts where the query participates in the mapped path and therefore in
/// identity. Two URLs differing only by query/fragment/www-prefix share one
/// `CanonicalUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of www-prefix normalization for the mirrored site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WwwPolicy {
    /// Remove a leading `www.` (default).
    #[default]
    Strip,
    /// Insert a leading `www.` when absent.
    Force,
    /// Leave hosts as found.
    Preserve,
}

/// Reference classification feeding the rewrite removal policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    /// Third-party analytics/tracking.
    Tracker,
    /// Advertisement resource.
    Advertisement,
    /// Clickable contact reference (mailto/tel/sms/...).
    Contact,
    /// None of the above.
    None,
}

/// A reference resolved against its base document.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Absolute URL suitable for fetching (query preserved).
    pub url: Url,
    /// Canonical identity for dedup and path mapping.
    pub canonical: CanonicalUrl,
}

/// Identity and classification rules for one mirrored site.
#[derive(Debug, Clone)]
pub struct SiteScope {
    domain: String,
    scheme: String,
    www: WwwPolicy,
}

impl SiteScope {
    /// Builds the scope from the seed's original URL.
    #[must_use]
    pub fn for_site(base: &Url, www: WwwPolicy) -> Self {
        let host = base.host_str().unwrap_or_default().to_lowercase();
        Self {
            domain: apply_www_policy(&host, www),
            scheme: base.scheme().to_string(),
            www,
        }
    }

    /// The registered site domain, post www-policy.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resolves a discovered reference against its base document and
    /// computes its canonical identity.
    ///
    /// Embedded wrapper paths are unwrapped first; relative and
    /// protocol-relative references resolve against `base`; the www policy
    /// applies to the host; same-site references are pinned to the base
    /// scheme so one mirror never mixes http and https identities.
    ///
    /// Returns `None` for unparseable references and for non-HTTP schemes
    /// (contact links, `javascript:`, `data:`, ...), which have no canonical
    /// identity.
    #[must_use]
    pub fn normalize(&self, raw: &str, base: &Url) -> Option<Normalized> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let candidate = codec::extract_original(raw).unwrap_or_else(|| raw.to_string());
        if has_non_http_scheme(&candidate) {
            return None;
        }

        let mut resolved = if candidate.starts_with("http://") || candidate.starts_with("https://")
        {
            Url::parse(&candidate).ok()?
        } else if candidate.starts_with("//") {
            Url::parse(&format!("{}:{candidate}", base.scheme())).ok()?
        } else {
            base.join(&candidate).ok()?
        };

        if let Some(host) = resolved.host_str() {
            let adjusted = apply_www_policy(&host.to_lowercase(), self.www);
            if adjusted != host {
                resolved.set_host(Some(&adjusted)).ok()?;
            }
        }
        if self.is_internal(resolved.as_str()) && resolved.scheme() != self.scheme {
            // set_scheme only fails across special/non-special boundaries,
            // which http/https never cross.
            let _ = resolved.set_scheme(&self.scheme);
        }

        let canonical = self.canonicalize(&resolved);
        Some(Normalized {
            url: resolved,
            canonical,
        })
    }

    /// Canonical identity of an already-resolved URL.
    #[must_use]
    pub fn canonicalize(&self, url: &Url) -> CanonicalUrl {
        let mut identity = url.clone();
        identity.set_fragment(None);
        let keep_query = url
            .host_str()
            .is_some_and(|host| is_external_family_host(host));
        if !keep_query {
            identity.set_query(None);
        }
        CanonicalUrl(identity.to_string())
    }

    /// True when the reference belongs to the mirrored site: its host (after
    /// www-normalization) matches the registered domain, or it has no host at
    /// all (path-relative). Non-HTTP schemes are never internal.
    #[must_use]
    pub fn is_internal(&self, url: &str) -> bool {
        if has_non_http_scheme(url) {
            return false;
        }
        match Url::parse(url) {
            Ok(parsed) => parsed
                .host_str()
                .is_some_and(|host| host_matches(host, &self.domain)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                if let Some(rest) = url.strip_prefix("//") {
                    // Protocol-relative: internal only when the host matches.
                    return Url::parse(&format!("https://{rest}"))
                        .ok()
                        .and_then(|u| u.host_str().map(|h| host_matches(h, &self.domain)))
                        .unwrap_or(false);
                }
                // No network-location: a path-relative reference into the site.
                true
            }
            Err(_) => false,
        }
    }

    /// True when the reference should be fetched and materialized locally:
    /// internal, or part of a namespaced external family.
    #[must_use]
    pub fn is_mirrorable(&self, url: &str) -> bool {
        if self.is_internal(url) {
            return true;
        }
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(is_external_family_host))
            .unwrap_or(false)
    }

    /// Classifies a reference for the removal policies. Classification never
    /// affects crawl admission.
    #[must_use]
    pub fn classify(&self, url: &str) -> LinkClass {
        if is_contact(url) {
            LinkClass::Contact
        } else if is_tracker(url) {
            LinkClass::Tracker
        } else if is_advertisement(url) {
            LinkClass::Advertisement
        } else {
            LinkClass::None
        }
    }
}

/// True for references to known analytics/tracking endpoints.
#[must_use]
pub fn is_tracker(url: &str) -> bool {
    TRACKER_PATTERNS.is_match(url)
}

/// True for references to known advertisement endpoints.
#[must_use]
pub fn is_advertisement(url: &str) -> bool {
    AD_PATTERNS.is_match(url)
}

/// True for clickable contact references.
#[must_use]
pub fn is_contact(url: &str) -> bool {
    CONTACT_PATTERNS.is_match(url)
}

/// True when inline script content looks like tracking/consent tooling.
#[must_use]
pub fn is_tracker_script_content(content: &str) -> bool {
    let lowered = content.to_lowercase();
    TRACKER_SCRIPT_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// True for hosts mirrored under the namespaced external tree.
#[must_use]
pub fn is_external_family_host(host: &str) -> bool {
    EXTERNAL_FAMILY_HOSTS
        .iter()
        .any(|family| host.eq_ignore_ascii_case(family))
}

fn apply_www_policy(host: &str, policy: WwwPolicy) -> String {
    match policy {
        WwwPolicy::Strip => host.strip_prefix("www.").unwrap_or(host).to_string(),
        WwwPolicy::Force => {
            if host.is_empty() || host.starts_with("www.") {
                host.to_string()
            } else {
                format!("www.{host}")
            }
        }
        WwwPolicy::Preserve => host.to_string(),
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    let strip = |h: &str| h.strip_prefix("www.").map(str::to_string).unwrap_or_else(|| h.to_string());
    strip(&host.to_lowercase()) == strip(&domain.to_lowercase())
}

fn has_non_http_scheme(value: &str) -> bool {
    let Some(colon) = value.find(':') else {
        return false;
    };
    let scheme = &value[..colon];
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        || !scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
    {
        return false;
    }
    !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scope() -> SiteScope {
        let base = Url::parse("http://example.com/").unwrap();
        SiteScope::for_site(&base, WwwPolicy::Strip)
    }

    fn base() -> Url {
        Url::parse("http://example.com/blog/post").unwrap()
    }

    // ==================== normalize ====================

    #[test]
    fn test_normalize_resolves_relative_reference() {
        let normalized = scope().normalize("../about", &base()).unwrap();
        assert_eq!(normalized.url.as_str(), "http://example.com/about");
        assert_eq!(normalized.canonical.as_str(), "http://example.com/about");
    }

    #[test]
    fn test_normalize_strips_query_and_fragment_from_identity() {
        let a = scope().normalize("/x?a=1#top", &base()).unwrap();
        let b = scope().normalize("/x?a=2", &base()).unwrap();
        assert_eq!(a.canonical, b.canonical);
        assert_eq!(a.canonical.as_str(), "http://example.com/x");
        // The fetchable URL keeps its query.
        assert_eq!(a.url.as_str(), "http://example.com/x?a=1");
    }

    #[test]
    fn test_normalize_unwraps_embedded_wrapper_first() {
        let normalized = scope()
            .normalize(
                "/web/20250417203037im_/https://example.com/logo.png",
                &base(),
            )
            .unwrap();
        assert_eq!(normalized.canonical.as_str(), "http://example.com/logo.png");
    }

    #[test]
    fn test_normalize_applies_www_strip() {
        let normalized = scope()
            .normalize("http://www.example.com/page", &base())
            .unwrap();
        assert_eq!(normalized.canonical.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_normalize_www_force_inserts_prefix() {
        let b = Url::parse("http://www.example.com/").unwrap();
        let forced = SiteScope::for_site(&b, WwwPolicy::Force);
        let normalized = forced.normalize("http://example.com/page", &b).unwrap();
        assert_eq!(normalized.canonical.as_str(), "http://www.example.com/page");
    }

    #[test]
    fn test_normalize_pins_same_site_scheme() {
        // Base site is http; an https same-site reference must not fork the
        // mirror into two identities.
        let normalized = scope()
            .normalize("https://example.com/page", &base())
            .unwrap();
        assert_eq!(normalized.canonical.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_normalize_leaves_external_scheme_alone() {
        let normalized = scope().normalize("https://other.com/page", &base()).unwrap();
        assert_eq!(normalized.canonical.as_str(), "https://other.com/page");
    }

    #[test]
    fn test_normalize_protocol_relative_uses_base_scheme() {
        let normalized = scope().normalize("//example.com/a.css", &base()).unwrap();
        assert_eq!(normalized.canonical.as_str(), "http://example.com/a.css");
    }

    #[test]
    fn test_normalize_rejects_contact_and_script_schemes() {
        for raw in ["mailto:a@example.com", "tel:+1555", "javascript:void(0)", "data:image/png;base64,AAAA"] {
            assert!(scope().normalize(raw, &base()).is_none(), "raw: {raw}");
        }
    }

    #[test]
    fn test_normalize_keeps_query_for_external_family() {
        let a = scope()
            .normalize("https://fonts.googleapis.com/css?family=Roboto", &base())
            .unwrap();
        let b = scope()
            .normalize("https://fonts.googleapis.com/css?family=Lato", &base())
            .unwrap();
        assert_ne!(a.canonical, b.canonical);
    }

    #[test]
    fn test_normalize_is_pure() {
        let first = scope().normalize("/x?a=1", &base()).unwrap();
        let second = scope().normalize("/x?a=1", &base()).unwrap();
        assert_eq!(first.canonical, second.canonical);
        assert_eq!(first.url, second.url);
    }

    // ==================== is_internal ====================

    #[test]
    fn test_is_internal_same_domain_and_www_variant() {
        let s = scope();
        assert!(s.is_internal("http://example.com/a"));
        assert!(s.is_internal("http://www.example.com/a"));
        assert!(s.is_internal("https://example.com/a"));
    }

    #[test]
    fn test_is_internal_relative_path() {
        assert!(scope().is_internal("/about"));
        assert!(scope().is_internal("img/logo.png"));
    }

    #[test]
    fn test_is_internal_rejects_foreign_and_non_http() {
        let s = scope();
        assert!(!s.is_internal("http://other.com/a"));
        assert!(!s.is_internal("mailto:a@example.com"));
        assert!(!s.is_internal("tel:+1555"));
        assert!(!s.is_internal("javascript:void(0)"));
    }

    #[test]
    fn test_is_mirrorable_includes_font_services() {
        let s = scope();
        assert!(s.is_mirrorable("https://fonts.gstatic.com/s/roboto/v30/x.woff2"));
        assert!(s.is_mirrorable("/about"));
        assert!(!s.is_mirrorable("https://cdn.other.com/lib.js"));
    }

    // ==================== classification ====================

    #[test]
    fn test_classify_tracker() {
        assert_eq!(
            scope().classify("https://www.google-analytics.com/analytics.js"),
            LinkClass::Tracker
        );
        assert_eq!(
            scope().classify("https://www.googletagmanager.com/gtm.js?id=GTM-X"),
            LinkClass::Tracker
        );
    }

    #[test]
    fn test_classify_advertisement() {
        assert_eq!(
            scope().classify("https://adserver.example.net/spot"),
            LinkClass::Advertisement
        );
        assert_eq!(
            scope().classify("https://cdn.site.com/img/banner-top.png"),
            LinkClass::Advertisement
        );
    }

    #[test]
    fn test_classify_contact_beats_other_classes() {
        assert_eq!(scope().classify("mailto:ads@example.com"), LinkClass::Contact);
        assert_eq!(scope().classify("tel:+34555000111"), LinkClass::Contact);
    }

    #[test]
    fn test_classify_none_for_ordinary_references() {
        assert_eq!(scope().classify("http://example.com/about"), LinkClass::None);
    }

    #[test]
    fn test_tracker_script_content_detection() {
        assert!(is_tracker_script_content(
            "window.dataLayer = window.dataLayer || []; gtag('js', new Date());"
        ));
        assert!(is_tracker_script_content("CookieYes.init({})"));
        assert!(!is_tracker_script_content("document.querySelector('.menu').open();"));
    }
}
