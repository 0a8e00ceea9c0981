//! Crate-level error type for mirror runs.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::PolicyError;
use crate::snapshot::codec::FormatError;

/// Run-fatal errors. Everything per-resource is absorbed by the crawl loop
/// and surfaces only in the run statistics.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The seed URL does not match the archive wrapper form. Aborts before
    /// any fetch.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The wrapped original URL inside the seed is unparseable.
    #[error("invalid original URL in seed: {url}")]
    Seed {
        /// The offending original URL.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// Invalid policy combination.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Filesystem failure writing into the output tree.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    /// Creates a seed-URL error.
    pub fn seed(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::Seed {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
