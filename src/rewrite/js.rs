//! Script reference discovery.
//!
//! Scripts are never structurally rewritten; the engine only harvests
//! same-site references so the assets they load get mirrored. The heuristics
//! are deliberately narrow (call-like patterns, property assignments, and
//! literal asset URLs) to keep false positives against ordinary code tokens
//! low; completeness over executable content is an explicit non-goal.

use std::sync::LazyLock;

use regex::Regex;

use super::{DiscoveryList, RewriteContext};
use crate::site::Normalized;

/// Network-call invocations whose first string argument is a URL.
#[allow(clippy::expect_used)]
static CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:fetch|XMLHttpRequest|axios\.get|axios\.post|\.load|\.ajax)\s*\(\s*["']([^"']+)["']"#,
    )
    .expect("call pattern regex is valid")
});

/// `something.src = "..."` assignments.
#[allow(clippy::expect_used)]
static SRC_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.src\s*=\s*["']([^"']+)["']"#).expect("src assignment regex is valid")
});

/// `something.href = "..."` assignments.
#[allow(clippy::expect_used)]
static HREF_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.href\s*=\s*["']([^"']+)["']"#).expect("href assignment regex is valid")
});

/// `url:`/`url =` properties holding absolute URLs.
#[allow(clippy::expect_used)]
static URL_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\s*[:=]\s*["'](https?://[^"']+)["']"#).expect("url property regex is valid")
});

/// String literals that are absolute asset URLs.
#[allow(clippy::expect_used)]
static ASSET_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"["'](https?://[^"']+\.(?:jpg|jpeg|png|gif|svg|webp|css|js|woff|woff2|ttf|eot|otf)[^"']*)["']"#,
    )
    .expect("asset literal regex is valid")
});

/// Tokens that mark a candidate as code, not a URL.
const CODE_TOKENS: &[&str] = &["function", "return", "if", "else", "var ", "let ", "const "];

/// Extracts mirrorable references from script content in document order.
#[must_use]
pub fn scan(js: &str, ctx: &RewriteContext<'_>) -> Vec<Normalized> {
    let patterns: [&Regex; 5] = [
        &CALL_PATTERN,
        &SRC_ASSIGN,
        &HREF_ASSIGN,
        &URL_PROPERTY,
        &ASSET_LITERAL,
    ];

    // Collect (position, candidate) across all patterns, then order by
    // position so the result is document order, not pattern order.
    let mut hits: Vec<(usize, &str)> = Vec::new();
    for pattern in patterns {
        for caps in pattern.captures_iter(js) {
            if let Some(m) = caps.get(1) {
                hits.push((m.start(), m.as_str()));
            }
        }
    }
    hits.sort_by_key(|(position, _)| *position);

    let mut list = DiscoveryList::default();
    for (_, candidate) in hits {
        let candidate = candidate.trim();
        if !looks_like_reference(candidate) {
            continue;
        }
        if let Some(normalized) = ctx.normalize(candidate)
            && ctx.scope.is_internal(normalized.url.as_str())
        {
            list.push(normalized);
        }
    }
    list.into_vec()
}

/// Filters obvious non-URL captures: code snippets, opaque schemes, and
/// anything that is neither absolute nor root-relative.
fn looks_like_reference(candidate: &str) -> bool {
    if CODE_TOKENS.iter().any(|token| candidate.contains(token)) {
        return false;
    }
    candidate.starts_with("http://")
        || candidate.starts_with("https://")
        || candidate.starts_with('/')
}
