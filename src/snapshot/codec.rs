//! Wrapper-URL codec for the snapshot archive.
//!
//! The archive serves every capture under a fixed wrapper shape:
//!
//! ```text
//! https://web.archive.org/web/{timestamp}{tag?}/{original-url}
//! ```
//!
//! where `tag` is a short asset-kind code (`im_` image, `cs_` stylesheet,
//! `js_` script; pages carry no tag). This module translates in both
//! directions and scans arbitrary attribute/text values for embedded wrapper
//! paths, which appear in fetched markup as absolute URLs, protocol-relative
//! URLs, or bare `/web/...` paths.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

use super::Timestamp;

/// Host serving the snapshot archive.
pub const ARCHIVE_HOST: &str = "web.archive.org";

/// Routing prefix of every wrapper URL.
pub const WRAPPER_PREFIX: &str = "https://web.archive.org/web/";

/// Wrapper shape for full decode: prefix, timestamp digits (possibly followed
/// by a tag), then the original URL.
#[allow(clippy::expect_used)]
static WRAPPER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://web\.archive\.org/web/(\d+)[a-z_]*/(.+)$").expect("wrapper regex is valid")
});

/// Embedded wrapper path carrying an asset tag.
#[allow(clippy::expect_used)]
static EMBEDDED_ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/web/\d+[a-z]*(?:im_|cs_|js_|jm_)/(https?://[^"\s'<>)]+)"#)
        .expect("embedded asset regex is valid")
});

/// Embedded wrapper path for a page capture (no tag).
#[allow(clippy::expect_used)]
static EMBEDDED_PAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/web/\d+[a-z]*/(https?://[^"\s'<>)]+)"#).expect("embedded page regex is valid")
});

/// Non-HTTP schemes (contact links) wrapped the same way.
#[allow(clippy::expect_used)]
static EMBEDDED_CONTACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/web/\d+[a-z]*/((?:mailto|tel|sms|whatsapp|callto):)(.+)")
        .expect("embedded contact regex is valid")
});

/// Punctuation that trails captured URLs when they are embedded in text.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', '\'', '"'];

/// Errors from decoding a wrapper URL.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The URL does not match the archive wrapper shape.
    #[error("not a snapshot wrapper URL: {url}")]
    NotWrapper {
        /// The offending URL.
        url: String,
    },

    /// The wrapper matched but its timestamp digits are not a datetime.
    #[error("invalid capture timestamp in wrapper URL: {url}")]
    BadTimestamp {
        /// The offending URL.
        url: String,
    },
}

/// A decoded wrapper URL: capture timestamp plus the original resource URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Capture timestamp from the wrapper path.
    pub timestamp: Timestamp,
    /// The wrapped original URL, always scheme-qualified.
    pub original_url: String,
}

/// Asset-kind tag selecting which served variant the archive returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTag {
    /// Raw image bytes (`im_`).
    Image,
    /// Raw stylesheet bytes (`cs_`).
    Stylesheet,
    /// Raw script bytes (`js_`).
    Script,
    /// Page/document default: no tag, archive may inject replay chrome.
    Page,
}

impl AssetTag {
    /// Picks a tag from the URL's file extension.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url_path_lower(url);
        const IMAGE_EXTS: &[&str] = &[
            ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp",
        ];
        if IMAGE_EXTS.iter().any(|ext| path.ends_with(ext)) {
            AssetTag::Image
        } else if path.ends_with(".css") {
            AssetTag::Stylesheet
        } else if path.ends_with(".js") {
            AssetTag::Script
        } else {
            AssetTag::Page
        }
    }

    /// The wrapper-path suffix for this tag.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            AssetTag::Image => "im_",
            AssetTag::Stylesheet => "cs_",
            AssetTag::Script => "js_",
            AssetTag::Page => "",
        }
    }
}

/// True when `url` already points into the archive wrapper space.
#[must_use]
pub fn is_wrapped(url: &str) -> bool {
    url.starts_with("http://web.archive.org") || url.starts_with("https://web.archive.org")
}

/// Decodes a full wrapper URL into its capture timestamp and original URL.
///
/// A bare-host original (the archive accepts `example.com/` without a
/// scheme) is normalized to `http://`.
///
/// # Errors
///
/// [`FormatError::NotWrapper`] when the shape does not match,
/// [`FormatError::BadTimestamp`] when the timestamp digits are invalid.
pub fn decode(wrapper: &str) -> Result<Decoded, FormatError> {
    let captures = WRAPPER_PATTERN
        .captures(wrapper)
        .ok_or_else(|| FormatError::NotWrapper {
            url: wrapper.to_string(),
        })?;

    let timestamp =
        Timestamp::parse(&captures[1]).ok_or_else(|| FormatError::BadTimestamp {
            url: wrapper.to_string(),
        })?;

    let mut original_url = captures[2].to_string();
    if !original_url.starts_with("http://") && !original_url.starts_with("https://") {
        original_url = format!("http://{original_url}");
    }

    Ok(Decoded {
        timestamp,
        original_url,
    })
}

/// Scans an arbitrary string for an embedded wrapper path and returns the
/// wrapped original URL, trailing punctuation trimmed.
///
/// Handles absolute wrapper URLs, protocol-relative `//web.archive.org/...`
/// forms, bare `/web/...` paths, and wrapped contact schemes
/// (`mailto:`/`tel:`/`sms:`/`whatsapp:`/`callto:`, query stripped). Returns
/// `None` when nothing is embedded; never errors.
#[must_use]
pub fn extract_original(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    // Protocol-relative archive references scan the same as absolute ones.
    let qualified;
    let text = if text.starts_with("//") {
        qualified = format!("https:{text}");
        qualified.as_str()
    } else {
        text
    };

    if let Some(captures) = EMBEDDED_ASSET_PATTERN.captures(text) {
        let extracted = captures[1].trim_end_matches(TRAILING_PUNCTUATION);
        trace!(extracted, "unwrapped embedded asset reference");
        return Some(extracted.to_string());
    }

    if let Some(captures) = EMBEDDED_PAGE_PATTERN.captures(text) {
        let extracted = captures[1].trim_end_matches(TRAILING_PUNCTUATION);
        trace!(extracted, "unwrapped embedded page reference");
        return Some(extracted.to_string());
    }

    if let Some(captures) = EMBEDDED_CONTACT_PATTERN.captures(text) {
        let scheme = &captures[1];
        // Contact targets never carry meaningful query parameters.
        let rest = captures[2]
            .split(['?', '&'])
            .next()
            .unwrap_or_default();
        return Some(format!("{scheme}{rest}"));
    }

    None
}

/// Builds the wrapper URL for an original URL at the given capture timestamp.
///
/// An already-wrapped input passes through unchanged. The asset-kind tag is
/// selected from the URL's file extension.
#[must_use]
pub fn encode(original: &str, timestamp: &Timestamp) -> String {
    if is_wrapped(original) {
        return original.to_string();
    }
    let tag = AssetTag::from_url(original);
    format!("{WRAPPER_PREFIX}{timestamp}{}/{original}", tag.suffix())
}

/// Lowercased path component of a URL string, tolerating unparseable input.
fn url_path_lower(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        return parsed.path().to_lowercase();
    }
    // Relative reference: strip query/fragment by hand.
    url.split(['?', '#']).next().unwrap_or_default().to_lowercase()
}
