//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use wayback_mirror::{ExternalLinkPolicy, MirrorError, Policy, WwwPolicy};

/// Reconstruct a browsable local mirror of a site from a Wayback Machine
/// snapshot.
///
/// Give it one snapshot URL (`https://web.archive.org/web/TIMESTAMP/URL`)
/// and it crawls every same-site resource captured around that moment,
/// strips the archive's replay chrome, and rewrites all references so the
/// result works from a plain static file server.
#[derive(Parser, Debug)]
#[command(name = "wayback-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Snapshot wrapper URL to mirror from
    pub wayback_url: String,

    /// Output directory for the mirror tree
    #[arg(short = 'o', long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Stop after fetching this many resources (0 = unlimited)
    #[arg(short = 'm', long, default_value_t = 0)]
    pub max_documents: usize,

    /// Keep analytics/tracker scripts and consent tooling
    #[arg(long)]
    pub keep_trackers: bool,

    /// Keep advertisement elements
    #[arg(long)]
    pub keep_ads: bool,

    /// Keep clickable contact links (tel:/mailto:/...)
    #[arg(long)]
    pub keep_contacts: bool,

    /// Remove iframes pointing off-site
    #[arg(long)]
    pub remove_external_iframes: bool,

    /// Remove external link elements entirely (default: keep their text)
    #[arg(long)]
    pub drop_external_links: bool,

    /// Leave external links untouched (default: keep their text only)
    #[arg(long)]
    pub keep_external_links: bool,

    /// Leave internal references absolute instead of mirror-relative
    #[arg(long)]
    pub absolute_internal_links: bool,

    /// www-prefix normalization for the mirrored site
    #[arg(long, value_enum, default_value_t = WwwMode::Strip)]
    pub www: WwwMode,

    /// Skip document whitespace trimming
    #[arg(long)]
    pub no_optimize_html: bool,

    /// Re-encode JPEG/PNG images at a lossier quality
    #[arg(long)]
    pub optimize_images: bool,

    /// Strip comments and blank lines from stylesheets
    #[arg(long)]
    pub minify_css: bool,

    /// Run scripts through the (currently pass-through) minifier gate
    #[arg(long)]
    pub minify_js: bool,
}

/// CLI surface for [`WwwPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WwwMode {
    /// Remove a leading `www.`
    Strip,
    /// Insert a leading `www.`
    Force,
    /// Leave hosts as found
    Preserve,
}

impl From<WwwMode> for WwwPolicy {
    fn from(mode: WwwMode) -> Self {
        match mode {
            WwwMode::Strip => WwwPolicy::Strip,
            WwwMode::Force => WwwPolicy::Force,
            WwwMode::Preserve => WwwPolicy::Preserve,
        }
    }
}

impl Args {
    /// Assembles the immutable run policy from the parsed flags.
    ///
    /// # Errors
    ///
    /// [`MirrorError::Policy`] when mutually exclusive external-link flags
    /// are both set.
    pub fn to_policy(&self) -> Result<Policy, MirrorError> {
        let external_links =
            ExternalLinkPolicy::from_flags(self.drop_external_links, self.keep_external_links)?;
        Ok(Policy {
            output_dir: self.output_dir.clone(),
            remove_trackers: !self.keep_trackers,
            remove_ads: !self.keep_ads,
            remove_clickable_contacts: !self.keep_contacts,
            remove_external_iframes: self.remove_external_iframes,
            external_links,
            internal_links_relative: !self.absolute_internal_links,
            www: self.www.into(),
            optimize_html: !self.no_optimize_html,
            optimize_images: self.optimize_images,
            minify_css: self.minify_css,
            minify_js: self.minify_js,
            max_documents: (self.max_documents > 0).then_some(self.max_documents),
        })
    }
}
