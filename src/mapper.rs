//! Deterministic mapping from canonical URLs to on-disk mirror paths.
//!
//! The mirror only works if two views of every resource agree: [`map`] says
//! where a payload is saved under the output root, [`link_path`] says what a
//! rewritten in-document reference looks like. Both share one implementation
//! of the extension/index logic so they cannot drift: a rewritten reference
//! always resolves (under a static file server rooted at the output
//! directory) to the file `map` chose.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use url::Url;

use crate::site::is_external_family_host;

/// Index document name for empty/directory-like paths.
pub const INDEX_FILE: &str = "index.html";

/// Default suffix appended to extension-less page paths.
pub const PAGE_SUFFIX: &str = ".html";

/// Directory namespacing externally-hosted mirrored families.
pub const EXTERNAL_TREE: &str = "ext";

/// Extensions that mark a path as an asset: kept verbatim, never suffixed.
pub const KNOWN_ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf",
    "eot", "otf", "pdf", "zip", "mp4", "mp3", "avi", "mov", "wmv", "flv", "doc", "docx",
];

/// Relative on-disk path for a resource.
///
/// Leading slashes are stripped and the path percent-decoded; duplicate
/// slashes collapse; dot segments are dropped so the result can never climb
/// out of the output root. Empty and directory-like paths become the index
/// document; an extension-less final segment gets the page suffix; known
/// asset extensions are preserved as-is.
#[must_use]
pub fn map(url: &Url) -> PathBuf {
    if url.host_str().is_some_and(is_external_family_host) {
        return PathBuf::from(external_family_path(url));
    }

    let (segments, dir_like) = clean_segments(url.path());
    let mut path = segments.join("/");
    if dir_like || path.is_empty() {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(INDEX_FILE);
    } else if !has_extension(&path) {
        path.push_str(PAGE_SUFFIX);
    }
    PathBuf::from(path)
}

/// Root-relative reference string for a rewritten in-document link.
///
/// Shares `map`'s extension logic; additionally preserves query and fragment
/// for in-page addressing. `is_page` marks document-like targets, which get
/// the page suffix when the path lacks an extension; asset-like targets are
/// never suffixed. Directory-like paths keep their trailing slash (a static
/// server resolves them to the index document `map` produced).
#[must_use]
pub fn link_path(url: &Url, is_page: bool) -> String {
    if url.host_str().is_some_and(is_external_family_host) {
        let mut path = format!("/{}", external_family_path(url));
        if let Some(fragment) = url.fragment() {
            path.push('#');
            path.push_str(fragment);
        }
        return path;
    }

    let (segments, dir_like) = clean_segments(url.path());
    let mut path = format!("/{}", segments.join("/"));
    if dir_like && path != "/" {
        path.push('/');
    } else if path != "/" && is_page && !has_extension(&path) {
        path.push_str(PAGE_SUFFIX);
    }

    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        path.push('#');
        path.push_str(fragment);
    }
    path
}

/// Namespaced path for externally-hosted mirrored families
/// (`ext/{host}/{path}`), with query-bearing URLs disambiguated by a hash of
/// the query string inserted before the extension.
fn external_family_path(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let (segments, _) = clean_segments(url.path());
    let mut file = if segments.is_empty() {
        INDEX_FILE.to_string()
    } else {
        segments.join("/")
    };

    if let Some(query) = url.query() {
        let digest = query_hash(query);
        file = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
                format!("{stem}-{digest}.{ext}")
            }
            _ => format!("{file}-{digest}"),
        };
    }

    format!("{EXTERNAL_TREE}/{host}/{file}")
}

/// First 12 hex characters of SHA-256 over the query string.
fn query_hash(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Percent-decoded path segments with dot segments and empty segments
/// dropped, plus whether the original path was directory-like.
fn clean_segments(path: &str) -> (Vec<String>, bool) {
    let decoded = urlencoding::decode(path)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| path.to_string());
    let dir_like = decoded.ends_with('/') || decoded.is_empty();
    let segments = decoded
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(str::to_string)
        .collect();
    (segments, dir_like)
}

/// Whether the final path segment carries any extension.
fn has_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
}

/// Whether the final path segment carries a known asset extension.
#[must_use]
pub fn has_asset_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rsplit_once('.').is_some_and(|(_, ext)| {
        KNOWN_ASSET_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}
