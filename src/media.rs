//! Media-kind classification for fetched payloads.
//!
//! Detection priority: an explicit, specific content-type header beats the
//! URL path extension, which beats payload byte-signature sniffing. Generic
//! headers (`application/octet-stream`, `text/plain`) are not treated as
//! specific. Whatever stays unresolved is [`MediaKind::Other`] and is
//! persisted verbatim with no further processing.

/// Image subtype, preserved for the optimizer's re-encode decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Svg,
    Webp,
    Ico,
    Bmp,
}

/// Kind of a fetched payload, driving rewrite dispatch and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// HTML document.
    Document,
    /// CSS stylesheet.
    Stylesheet,
    /// JavaScript.
    Script,
    /// Image payload with its subtype.
    Image(ImageKind),
    /// Web font.
    Font,
    /// Anything else; persisted as raw bytes.
    Other,
}

impl MediaKind {
    /// Kinds the rewrite engine transforms.
    #[must_use]
    pub fn is_rewritable(self) -> bool {
        matches!(self, MediaKind::Document | MediaKind::Stylesheet | MediaKind::Script)
    }

    /// Kinds written as UTF-8 text (lossy on decode failure).
    #[must_use]
    pub fn is_textual(self) -> bool {
        self.is_rewritable()
    }
}

/// Classifies a payload from its URL, content-type header, and leading bytes.
#[must_use]
pub fn classify(url: &str, content_type: Option<&str>, payload: &[u8]) -> MediaKind {
    if let Some(kind) = content_type.and_then(from_content_type) {
        return kind;
    }
    if let Some(kind) = expected_from_url(url) {
        return kind;
    }
    sniff(payload).unwrap_or(MediaKind::Other)
}

/// The kind a URL's extension promises, used both as a classification
/// fallback and as the expectation for corrupted-asset detection.
#[must_use]
pub fn expected_from_url(url: &str) -> Option<MediaKind> {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    // Extensions only count on the final path segment.
    if ext.contains('/') {
        return None;
    }
    let kind = match ext {
        "html" | "htm" | "xhtml" => MediaKind::Document,
        "css" => MediaKind::Stylesheet,
        "js" | "mjs" => MediaKind::Script,
        "jpg" | "jpeg" => MediaKind::Image(ImageKind::Jpeg),
        "png" => MediaKind::Image(ImageKind::Png),
        "gif" => MediaKind::Image(ImageKind::Gif),
        "svg" => MediaKind::Image(ImageKind::Svg),
        "webp" => MediaKind::Image(ImageKind::Webp),
        "ico" => MediaKind::Image(ImageKind::Ico),
        "bmp" => MediaKind::Image(ImageKind::Bmp),
        "woff" | "woff2" | "ttf" | "eot" | "otf" => MediaKind::Font,
        _ => return None,
    };
    Some(kind)
}

/// Maps a specific content-type header value to a kind. Generic or unknown
/// values return `None` so detection falls through to the URL heuristic.
fn from_content_type(header: &str) -> Option<MediaKind> {
    let mime = header.split(';').next().unwrap_or_default().trim().to_lowercase();
    let kind = match mime.as_str() {
        "text/html" | "application/xhtml+xml" => MediaKind::Document,
        "text/css" => MediaKind::Stylesheet,
        "text/javascript" | "application/javascript" | "application/x-javascript" => {
            MediaKind::Script
        }
        "image/jpeg" => MediaKind::Image(ImageKind::Jpeg),
        "image/png" => MediaKind::Image(ImageKind::Png),
        "image/gif" => MediaKind::Image(ImageKind::Gif),
        "image/svg+xml" => MediaKind::Image(ImageKind::Svg),
        "image/webp" => MediaKind::Image(ImageKind::Webp),
        "image/x-icon" | "image/vnd.microsoft.icon" => MediaKind::Image(ImageKind::Ico),
        "image/bmp" => MediaKind::Image(ImageKind::Bmp),
        "application/font-woff" | "application/font-woff2" | "application/x-font-ttf"
        | "application/vnd.ms-fontobject" => MediaKind::Font,
        _ if mime.starts_with("font/") => MediaKind::Font,
        _ => return None,
    };
    Some(kind)
}

/// Byte-signature sniffing for payloads nothing else identified.
fn sniff(payload: &[u8]) -> Option<MediaKind> {
    if payload.is_empty() {
        return None;
    }

    // Binary magics first; they are exact.
    if payload.starts_with(b"\x89PNG") {
        return Some(MediaKind::Image(ImageKind::Png));
    }
    if payload.starts_with(b"\xff\xd8\xff") {
        return Some(MediaKind::Image(ImageKind::Jpeg));
    }
    if payload.starts_with(b"GIF8") {
        return Some(MediaKind::Image(ImageKind::Gif));
    }
    if payload.starts_with(b"RIFF") && payload.len() >= 12 && &payload[8..12] == b"WEBP" {
        return Some(MediaKind::Image(ImageKind::Webp));
    }
    if payload.starts_with(b"wOFF") || payload.starts_with(b"wOF2") {
        return Some(MediaKind::Font);
    }
    if payload.starts_with(b"OTTO") || payload.starts_with(b"\x00\x01\x00\x00") {
        return Some(MediaKind::Font);
    }

    let head = leading_text(payload);
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        return Some(MediaKind::Document);
    }
    if head.starts_with("<?xml") || head.contains("<svg") {
        return Some(MediaKind::Image(ImageKind::Svg));
    }
    if head.starts_with("/*") || head.starts_with("@charset") || head.contains("@media") {
        return Some(MediaKind::Stylesheet);
    }

    None
}

/// Lowercased, whitespace-trimmed view of the first few hundred bytes.
fn leading_text(payload: &[u8]) -> String {
    let window = &payload[..payload.len().min(200)];
    String::from_utf8_lossy(window).trim_start().to_lowercase()
}
