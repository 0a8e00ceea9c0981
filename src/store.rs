//! Output-tree writer.
//!
//! Materializes payloads under the output root at exactly the relative path
//! [`crate::mapper::map`] chose. Text kinds are written as UTF-8 (the caller
//! already decoded with lossy replacement); everything else is raw bytes. A
//! run manifest mapping canonical URLs to their local paths is written at
//! the end for reporting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::crawl::ArchivedResource;
use crate::error::MirrorError;
use crate::media::MediaKind;
use crate::site::CanonicalUrl;

/// Manifest file name, written into the output root.
pub const MANIFEST_FILE: &str = "mirror-manifest.json";

/// One manifest row.
#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    url: &'a str,
    path: String,
    kind: &'static str,
}

/// Writes mirror files under one output root.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    /// Creates a store rooted at `root`. Directories are created lazily per
    /// write.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a text payload at a mapper-relative path.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Io`] on directory creation or write failure.
    pub async fn write_text(&self, relative: &Path, text: &str) -> Result<PathBuf, MirrorError> {
        self.write_bytes(relative, text.as_bytes()).await
    }

    /// Writes a raw payload at a mapper-relative path.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Io`] on directory creation or write failure.
    pub async fn write_bytes(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf, MirrorError> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MirrorError::io(parent, source))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|source| MirrorError::io(&target, source))?;
        debug!(path = %target.display(), bytes = bytes.len(), "materialized");
        Ok(target)
    }

    /// Writes the run manifest, rows sorted by URL so repeated runs produce
    /// byte-identical output.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Io`] on write failure.
    pub async fn write_manifest(
        &self,
        archived: &HashMap<CanonicalUrl, ArchivedResource>,
    ) -> Result<(), MirrorError> {
        let mut entries: Vec<ManifestEntry<'_>> = archived
            .iter()
            .map(|(canonical, resource)| ManifestEntry {
                url: canonical.as_str(),
                path: resource.path.to_string_lossy().into_owned(),
                kind: kind_label(resource.kind),
            })
            .collect();
        entries.sort_by(|a, b| a.url.cmp(b.url));

        let json = serde_json::to_string_pretty(&entries)
            .unwrap_or_else(|_| "[]".to_string());
        self.write_text(Path::new(MANIFEST_FILE), &json).await?;
        Ok(())
    }
}

fn kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Document => "document",
        MediaKind::Stylesheet => "stylesheet",
        MediaKind::Script => "script",
        MediaKind::Image(_) => "image",
        MediaKind::Font => "font",
        MediaKind::Other => "other",
    }
}
