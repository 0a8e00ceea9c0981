//! Policy-gated payload optimizers.
//!
//! Every transform here is pure (`payload -> payload`) and fails open: any
//! internal error returns the original payload unchanged and the run
//! continues. The transforms are deliberately conservative; aggressive
//! minification belongs to dedicated tooling, not a mirroring pass.

use std::io::Cursor;
use std::sync::LazyLock;

use image::ImageFormat;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Policy;
use crate::media::ImageKind;

/// CSS block comments, excluding the `/*!` license convention.
#[allow(clippy::expect_used)]
static CSS_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*[^!][^*]*\*+(?:[^/*][^*]*\*+)*/").expect("css comment regex is valid")
});

/// JPEG re-encode quality.
const JPEG_QUALITY: u8 = 85;

/// Trims trailing whitespace per line and drops blank-line runs.
///
/// Comments are already gone by the time a document reaches this point (the
/// rewrite pass removes them), so whitespace is all that is left to shed
/// without re-parsing.
#[must_use]
pub fn optimize_html(policy: &Policy, html: String) -> String {
    if !policy.optimize_html {
        return html;
    }
    let mut out = String::with_capacity(html.len());
    let mut blank_run = false;
    for line in html.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run = true;
            continue;
        }
        if blank_run && !out.is_empty() {
            out.push('\n');
        }
        blank_run = false;
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// Strips block comments and collapses blank lines in a stylesheet.
#[must_use]
pub fn minify_css(policy: &Policy, css: String) -> String {
    if !policy.minify_css {
        return css;
    }
    let stripped = CSS_COMMENT.replace_all(&css, "");
    let mut out = String::with_capacity(stripped.len());
    for line in stripped.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// Script minification gate. Currently the identity transform: no crate in
/// this stack minifies JavaScript safely, and a corrupted script is worse
/// than a large one.
#[must_use]
pub fn minify_js(policy: &Policy, js: String) -> String {
    let _ = policy.minify_js;
    js
}

/// Re-encodes JPEG/PNG payloads; other formats and all failures pass the
/// original bytes through. A result larger than the input is discarded.
#[must_use]
pub fn recompress_image(policy: &Policy, kind: ImageKind, bytes: Vec<u8>) -> Vec<u8> {
    if !policy.optimize_images {
        return bytes;
    }
    let format = match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
        // SVG is text, GIF may animate, WEBP/ICO/BMP are left untouched.
        _ => return bytes,
    };

    let decoded = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded,
        Err(error) => {
            warn!(error = %error, "image decode failed, keeping original");
            return bytes;
        }
    };

    let mut encoded = Vec::new();
    let result = match format {
        ImageFormat::Jpeg => {
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
            encoder.encode_image(&decoded.to_rgb8())
        }
        _ => decoded.write_to(&mut Cursor::new(&mut encoded), format),
    };

    match result {
        Ok(()) if encoded.len() < bytes.len() => {
            debug!(
                before = bytes.len(),
                after = encoded.len(),
                "image recompressed"
            );
            encoded
        }
        Ok(()) => bytes,
        Err(error) => {
            warn!(error = %error, "image re-encode failed, keeping original");
            bytes
        }
    }
}
