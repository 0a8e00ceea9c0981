//! Stylesheet reference scanning and rewriting.
//!
//! Pattern-based by design: `url(...)` and `@import` cover what stylesheets
//! can reference, and a regex pass keeps the engine independent of any CSS
//! grammar. The same logic serves standalone stylesheets, `<style>` blocks,
//! and inline `style` attributes.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::{DiscoveryList, RewriteContext, RewriteOutcome};
use crate::site::Normalized;

/// A `url(...)` token with an optional trailing `format(...)` qualifier, as
/// found in `src:` source lists.
#[allow(clippy::expect_used)]
static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)url\(\s*["']?([^"'()]+?)["']?\s*\)(\s*format\(\s*["']?[^"'()]*["']?\s*\))?"#,
    )
    .expect("url token regex is valid")
});

/// Bare-string `@import "x.css"` (the `url()` form is caught by
/// [`URL_TOKEN`]).
#[allow(clippy::expect_used)]
static IMPORT_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+["']([^"']+)["']"#).expect("import regex is valid")
});

/// Combined alternation used for discovery so references come back in
/// document order regardless of token form.
#[allow(clippy::expect_used)]
static ANY_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+["']([^"'()]+)["']|url\(\s*["']?([^"'()]+?)["']?\s*\)"#)
        .expect("combined reference regex is valid")
});

/// Comma dangling before a declaration/block terminator after suppression.
#[allow(clippy::expect_used)]
static DANGLING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([;}])").expect("dangling comma regex is valid"));

/// Comma doubled up where a list entry was removed.
#[allow(clippy::expect_used)]
static DOUBLE_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*,").expect("double comma regex is valid"));

/// Comma left leading a declaration value.
#[allow(clippy::expect_used)]
static LEADING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*,\s*").expect("leading comma regex is valid"));

/// Declaration whose whole value was suppressed.
#[allow(clippy::expect_used)]
static EMPTY_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z-]+\s*:\s*;").expect("empty declaration regex is valid"));

/// Values that are not fetchable references.
fn is_opaque(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("data:")
        || trimmed.starts_with("javascript:")
        || trimmed.starts_with("vbscript:")
}

/// Rewrites one stylesheet payload: suppresses references to known-corrupted
/// assets (collapsing any comma debris they leave in source lists), rewrites
/// mirrorable references to local paths, and reports discoveries in document
/// order.
#[must_use]
pub fn rewrite_stylesheet(css: &str, ctx: &RewriteContext<'_>) -> RewriteOutcome {
    let discovered = scan(css, ctx);
    let mut suppressed = 0usize;

    let rewritten = URL_TOKEN.replace_all(css, |caps: &Captures<'_>| {
        let raw = caps[1].trim();
        let format_qualifier = caps.get(2).map_or("", |m| m.as_str());
        if is_opaque(raw) {
            return caps[0].to_string();
        }
        match ctx.normalize(raw) {
            Some(normalized) if ctx.corrupted.contains(&normalized.canonical) => {
                debug!(reference = raw, "suppressing corrupted asset reference");
                suppressed += 1;
                String::new()
            }
            Some(normalized) if ctx.scope.is_mirrorable(normalized.url.as_str()) => {
                let href = ctx.internal_href(&normalized, false);
                format!("url({href}){format_qualifier}")
            }
            _ => caps[0].to_string(),
        }
    });

    let rewritten = IMPORT_BARE.replace_all(&rewritten, |caps: &Captures<'_>| {
        let raw = caps[1].trim();
        match ctx.normalize(raw) {
            Some(normalized) if ctx.corrupted.contains(&normalized.canonical) => {
                suppressed += 1;
                String::new()
            }
            Some(normalized) if ctx.scope.is_mirrorable(normalized.url.as_str()) => {
                let href = ctx.internal_href(&normalized, false);
                format!("@import \"{href}\"")
            }
            _ => caps[0].to_string(),
        }
    });

    let payload = if suppressed > 0 {
        collapse_suppression_debris(&rewritten)
    } else {
        rewritten.into_owned()
    };

    RewriteOutcome {
        payload,
        discovered,
        suppressed,
    }
}

/// Extracts mirrorable references from stylesheet text in document order.
#[must_use]
pub fn scan(css: &str, ctx: &RewriteContext<'_>) -> Vec<Normalized> {
    let mut list = DiscoveryList::default();
    for caps in ANY_REF.captures_iter(css) {
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        if is_opaque(raw) {
            continue;
        }
        if let Some(normalized) = ctx.mirrorable(raw) {
            list.push(normalized);
        }
    }
    list.into_vec()
}

/// Collapses the comma/declaration debris a suppressed list entry leaves
/// behind: `url(a), , url(b)` and trailing/leading commas in `src:` lists,
/// then whole declarations whose value emptied out.
fn collapse_suppression_debris(css: &str) -> String {
    let mut out = css.to_string();
    loop {
        let pass = DOUBLE_COMMA.replace_all(&out, ",").into_owned();
        let pass = LEADING_COMMA.replace_all(&pass, ": ").into_owned();
        let pass = DANGLING_COMMA.replace_all(&pass, "$1").into_owned();
        let pass = EMPTY_DECLARATION.replace_all(&pass, "").into_owned();
        if pass == out {
            return out;
        }
        out = pass;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::config::Policy;
    use crate::crawl::CorruptedAssets;
    use crate::site::{SiteScope, WwwPolicy};

    struct Fixture {
        policy: Policy,
        scope: SiteScope,
        base: Url,
        corrupted: CorruptedAssets,
    }

    impl Fixture {
        fn new() -> Self {
            let base = Url::parse("http://example.com/css/site.css").unwrap();
            let scope = SiteScope::for_site(&Url::parse("http://example.com/").unwrap(), WwwPolicy::Strip);
            Self {
                policy: Policy::default(),
                scope,
                base,
                corrupted: CorruptedAssets::default(),
            }
        }

        fn corrupt(&mut self, reference: &str) {
            let normalized = self
                .scope
                .normalize(reference, &self.base)
                .unwrap();
            self.corrupted.record(normalized.canonical);
        }

        fn ctx(&self) -> RewriteContext<'_> {
            RewriteContext {
                policy: &self.policy,
                scope: &self.scope,
                base: &self.base,
                corrupted: &self.corrupted,
            }
        }
    }

    // ==================== rewriting ====================

    #[test]
    fn test_rewrite_localizes_internal_url_tokens() {
        let fixture = Fixture::new();
        let css = "body { background: url(/img/bg.png); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert_eq!(outcome.payload, "body { background: url(/img/bg.png); }");

        let css = "body { background: url(http://www.example.com/img/bg.png); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert_eq!(outcome.payload, "body { background: url(/img/bg.png); }");
    }

    #[test]
    fn test_rewrite_unwraps_archive_wrapped_references() {
        let fixture = Fixture::new();
        let css = r#"div { background: url("/web/20250417203037im_/https://example.com/img/bg.png"); }"#;
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert_eq!(outcome.payload, "div { background: url(/img/bg.png); }");
    }

    #[test]
    fn test_rewrite_leaves_external_and_opaque_references() {
        let fixture = Fixture::new();
        let css = "a { background: url(https://cdn.other.com/x.png); } \
                   b { background: url(data:image/png;base64,AAAA); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert_eq!(outcome.payload, css);
        assert!(outcome.discovered.is_empty());
    }

    #[test]
    fn test_rewrite_bare_import() {
        let fixture = Fixture::new();
        let css = r#"@import "theme.css";"#;
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert_eq!(outcome.payload, r#"@import "/css/theme.css";"#);
        assert_eq!(outcome.discovered.len(), 1);
    }

    #[test]
    fn test_rewrite_font_service_reference_maps_to_ext_tree() {
        let fixture = Fixture::new();
        let css = "@font-face { src: url(https://fonts.gstatic.com/s/r/x.woff2) format('woff2'); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());
        assert!(
            outcome
                .payload
                .contains("url(/ext/fonts.gstatic.com/s/r/x.woff2) format('woff2')")
        );
        assert_eq!(outcome.discovered.len(), 1);
    }

    // ==================== corrupted suppression ====================

    #[test]
    fn test_suppression_removes_reference_and_trailing_comma() {
        let mut fixture = Fixture::new();
        fixture.corrupt("/fonts/broken.woff");
        let css = "@font-face { src: url(/fonts/broken.woff) format(\"woff\"), url(/fonts/ok.woff2) format(\"woff2\"); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());

        assert!(!outcome.payload.contains("broken.woff"));
        assert!(outcome.payload.contains("url(/fonts/ok.woff2)"));
        assert!(!outcome.payload.contains(": ,"), "leading comma left: {}", outcome.payload);
        assert!(!outcome.payload.contains(",,"), "double comma left: {}", outcome.payload);
        assert_eq!(outcome.suppressed, 1);
    }

    #[test]
    fn test_suppression_last_entry_leaves_no_dangling_comma() {
        let mut fixture = Fixture::new();
        fixture.corrupt("/fonts/broken.woff");
        let css = "@font-face { src: url(/fonts/ok.woff2) format(\"woff2\"), url(/fonts/broken.woff) format(\"woff\"); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());

        assert!(!outcome.payload.contains("broken.woff"));
        assert!(
            !DANGLING_COMMA.is_match(&outcome.payload),
            "dangling comma left: {}",
            outcome.payload
        );
    }

    #[test]
    fn test_suppression_of_entire_list_drops_declaration() {
        let mut fixture = Fixture::new();
        fixture.corrupt("/fonts/a.woff");
        fixture.corrupt("/fonts/b.woff");
        let css = "@font-face { font-family: X; src: url(/fonts/a.woff), url(/fonts/b.woff); }";
        let outcome = rewrite_stylesheet(css, &fixture.ctx());

        assert!(!outcome.payload.contains("url("));
        assert!(!outcome.payload.to_lowercase().contains("src"), "empty src left: {}", outcome.payload);
        assert!(outcome.payload.contains("font-family: X;"));
        assert_eq!(outcome.suppressed, 2);
    }

    // ==================== discovery ====================

    #[test]
    fn test_scan_returns_document_order_deduplicated() {
        let fixture = Fixture::new();
        let css = "@import \"a.css\";\n\
                   body { background: url(/img/bg.png); }\n\
                   div { background: url(/img/bg.png); }\n\
                   span { background: url(icons.svg); }";
        let refs = scan(css, &fixture.ctx());
        let canonicals: Vec<&str> = refs.iter().map(|n| n.canonical.as_str()).collect();
        assert_eq!(
            canonicals,
            [
                "http://example.com/css/a.css",
                "http://example.com/img/bg.png",
                "http://example.com/css/icons.svg",
            ]
        );
    }

    #[test]
    fn test_scan_skips_external_and_opaque() {
        let fixture = Fixture::new();
        let css = "a { background: url(https://cdn.other.com/x.png); } \
                   b { background: url(#gradient); } \
                   c { background: url(data:image/gif;base64,AA); }";
        assert!(scan(css, &fixture.ctx()).is_empty());
    }
}
