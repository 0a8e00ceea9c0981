//! Integration tests for the full mirror flow against a mock archive.
//!
//! The codec pins wrapper URLs to the real archive host, so the tests wrap
//! the HTTP fetcher in a shim that redirects the wrapper prefix to a local
//! wiremock server. Everything else — timestamp fallback, classification,
//! rewriting, path mapping, persistence — runs exactly as in production.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wayback_mirror::{CrawlEngine, FetchOutcome, Fetcher, HttpFetcher, Policy};

const TIMESTAMP: &str = "20250417203037";
const SEED: &str = "https://web.archive.org/web/20250417203037/http://example.com/";

/// Redirects wrapper URLs from the real archive host to the mock server.
struct ShiftedArchive {
    http: HttpFetcher,
    mock_base: String,
}

impl ShiftedArchive {
    fn new(server: &MockServer) -> Self {
        Self {
            http: HttpFetcher::new(),
            mock_base: server.uri(),
        }
    }
}

#[async_trait]
impl Fetcher for ShiftedArchive {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let shifted = url.replace("https://web.archive.org", &self.mock_base);
        self.http.fetch(&shifted).await
    }
}

/// Mounts one capture at `/web/{timestamp}{tag}/{original}`.
async fn mount_capture(
    server: &MockServer,
    timestamp_and_tag: &str,
    original: &str,
    content_type: &str,
    body: &[u8],
) {
    Mock::given(method("GET"))
        .and(path(format!("/web/{timestamp_and_tag}/{original}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), content_type))
        .mount(server)
        .await;
}

async fn run_mirror(server: &MockServer, policy: Policy) -> (wayback_mirror::CrawlReport, TempDir)
{
    let dir = TempDir::new().expect("failed to create temp dir");
    let policy = Policy {
        output_dir: dir.path().to_path_buf(),
        ..policy
    };
    let fetcher = Arc::new(ShiftedArchive::new(server));
    let (engine, seed) =
        CrawlEngine::for_seed(SEED, policy, fetcher).expect("seed should decode");
    let report = engine.run(seed).await.expect("run should complete");
    (report, dir)
}

#[tokio::test]
async fn test_default_policy_scenario() {
    // Seed page links an internal page, an internal asset, and an external
    // site. Default policy: internal links relative, external links
    // neutralized with text kept, document optimization on.
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<html><body>\n\
          <a href=\"/about\">About us</a>\n\
          <img src=\"logo.png\">\n\
          <a href=\"http://other.com\">partner</a>\n\
        </body></html>",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/about",
        "text/html",
        b"<html><body>about page</body></html>",
    )
    .await;
    mount_capture(
        &server,
        &format!("{TIMESTAMP}im_"),
        "http://example.com/logo.png",
        "image/png",
        b"\x89PNG\r\n\x1a\n0000",
    )
    .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(report.stats.fetched(), 3);
    assert_eq!(report.stats.failed(), 0);

    // Page suffix added, asset extension kept.
    let index = std::fs::read_to_string(dir.path().join("index.html")).expect("index exists");
    assert!(index.contains("href=\"/about.html\""), "index: {index}");
    assert!(index.contains("src=\"/logo.png\""), "index: {index}");

    // External anchor replaced by its plain text content.
    assert!(!index.contains("other.com"), "index: {index}");
    assert!(index.contains("partner"), "index: {index}");

    // Saved tree matches the rewritten references.
    assert!(dir.path().join("about.html").exists());
    assert_eq!(
        std::fs::read(dir.path().join("logo.png")).expect("logo exists"),
        b"\x89PNG\r\n\x1a\n0000"
    );
}

#[tokio::test]
async fn test_timeframe_fallback_materializes_identically() {
    // photo.jpg is absent at the primary timestamp but captured 3 hours
    // later, inside the first (±6h) search window.
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<img src=\"/photo.jpg\">",
    )
    .await;
    mount_capture(
        &server,
        "20250417233037im_",
        "http://example.com/photo.jpg",
        "image/jpeg",
        b"\xff\xd8\xff\xe0jpeg-bytes",
    )
    .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(report.stats.fetched(), 2);
    assert_eq!(report.stats.failed(), 0);
    // Materialized exactly as if found at the primary timestamp.
    assert_eq!(
        std::fs::read(dir.path().join("photo.jpg")).expect("photo exists"),
        b"\xff\xd8\xff\xe0jpeg-bytes"
    );
    let index = std::fs::read_to_string(dir.path().join("index.html")).expect("index exists");
    assert!(index.contains("src=\"/photo.jpg\""));
}

#[tokio::test]
async fn test_fallback_exhaustion_fails_resource_not_run() {
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<img src=\"/never-captured.png\"><a href=\"/about\">about</a>",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/about",
        "text/html",
        b"<p>still mirrored</p>",
    )
    .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(report.stats.failed(), 1);
    assert_eq!(report.stats.fetched(), 2);
    assert!(dir.path().join("about.html").exists());
    assert!(!dir.path().join("never-captured.png").exists());
}

#[tokio::test]
async fn test_query_variants_fetch_once_rewrite_same_path() {
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<a href=\"/x?a=1\">one</a><a href=\"/x?a=2\">two</a>",
    )
    .await;
    // One mock for /x; wiremock path matching ignores the query string.
    // expect(1) asserts the identity was fetched exactly once.
    Mock::given(method("GET"))
        .and(path(format!("/web/{TIMESTAMP}/http://example.com/x")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"<p>x</p>".to_vec(), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(report.stats.fetched(), 2);
    let index = std::fs::read_to_string(dir.path().join("index.html")).expect("index exists");
    // Both references rewrite to the same local file.
    assert!(index.contains("href=\"/x.html?a=1\""), "index: {index}");
    assert!(index.contains("href=\"/x.html?a=2\""), "index: {index}");
    assert!(dir.path().join("x.html").exists());

    server.verify().await;
}

#[tokio::test]
async fn test_archive_chrome_stripped_from_mirror() {
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<html><head>\n\
          <script src=\"https://web-static.archive.org/_static/js/bundle-playback.js\"></script>\n\
          <link rel=\"stylesheet\" href=\"https://web-static.archive.org/_static/css/banner-styles.css\">\n\
          </head><body>\n\
          <div id=\"wm-ipp-base\">WAYBACK TOOLBAR</div>\n\
          <!-- playback metadata -->\n\
          <p>actual site content</p>\n\
        </body></html>",
    )
    .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(report.stats.fetched(), 1);
    let index = std::fs::read_to_string(dir.path().join("index.html")).expect("index exists");
    assert!(!index.contains("WAYBACK TOOLBAR"));
    assert!(!index.contains("bundle-playback"));
    assert!(!index.contains("banner-styles"));
    assert!(!index.contains("playback metadata"));
    assert!(index.contains("actual site content"));
}

#[tokio::test]
async fn test_stylesheet_discovery_and_corrupted_suppression_on_next_occurrence() {
    // First stylesheet pulls in a font whose capture is an HTML error page;
    // the font is registered corrupted. A second stylesheet referencing the
    // same font is fetched afterwards and has the reference suppressed.
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<link rel=\"stylesheet\" href=\"/a.css\"><a href=\"/next\">next</a>",
    )
    .await;
    mount_capture(
        &server,
        &format!("{TIMESTAMP}cs_"),
        "http://example.com/a.css",
        "text/css",
        b"@font-face { src: url(/f/bad.woff) format(\"woff\"); }",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/next",
        "text/html",
        b"<link rel=\"stylesheet\" href=\"/b.css\">",
    )
    .await;
    mount_capture(
        &server,
        &format!("{TIMESTAMP}cs_"),
        "http://example.com/b.css",
        "text/css",
        b"@font-face { src: url(/f/bad.woff) format(\"woff\"), url(/f/ok.woff2) format(\"woff2\"); }",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/f/bad.woff",
        "text/html",
        b"<!DOCTYPE html><html><body>cannot serve this capture</body></html>",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/f/ok.woff2",
        "font/woff2",
        b"wOF2fontbytes",
    )
    .await;

    let (report, dir) = run_mirror(&server, Policy::default()).await;

    // bad.woff failed (corrupted), everything else materialized.
    assert_eq!(report.stats.failed(), 1);
    assert!(report.stats.suppressed_corrupted() >= 1);
    assert!(!dir.path().join("f/bad.woff").exists());
    assert!(dir.path().join("f/ok.woff2").exists());

    // The later stylesheet has the corrupted reference stripped with no
    // dangling comma in the source list.
    let b_css = std::fs::read_to_string(dir.path().join("b.css")).expect("b.css exists");
    assert!(!b_css.contains("bad.woff"), "b.css: {b_css}");
    assert!(b_css.contains("url(/f/ok.woff2)"), "b.css: {b_css}");
    assert!(!b_css.contains(": ,"), "b.css: {b_css}");
    assert!(!b_css.contains(",,"), "b.css: {b_css}");

    // The earlier stylesheet was materialized before the corruption was
    // known and is not retroactively reprocessed.
    let a_css = std::fs::read_to_string(dir.path().join("a.css")).expect("a.css exists");
    assert!(a_css.contains("bad.woff"));
}

#[tokio::test]
async fn test_rerun_produces_byte_identical_output() {
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<html><body><a href=\"/about\">about</a><img src=\"/logo.png\"></body></html>",
    )
    .await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/about",
        "text/html",
        b"<html><body>about</body></html>",
    )
    .await;
    mount_capture(
        &server,
        &format!("{TIMESTAMP}im_"),
        "http://example.com/logo.png",
        "image/png",
        b"\x89PNG\r\n\x1a\n0000",
    )
    .await;

    let (first_report, first_dir) = run_mirror(&server, Policy::default()).await;
    let (second_report, second_dir) = run_mirror(&server, Policy::default()).await;

    assert_eq!(first_report.stats.fetched(), second_report.stats.fetched());
    for file in ["index.html", "about.html", "logo.png", "mirror-manifest.json"] {
        let first = std::fs::read(first_dir.path().join(file)).expect("first run file");
        let second = std::fs::read(second_dir.path().join(file)).expect("second run file");
        assert_eq!(first, second, "{file} differs between runs");
    }
}

#[tokio::test]
async fn test_max_documents_budget_respected() {
    let server = MockServer::start().await;
    mount_capture(
        &server,
        TIMESTAMP,
        "http://example.com/",
        "text/html",
        b"<a href=\"/a\">a</a><a href=\"/b\">b</a><a href=\"/c\">c</a>",
    )
    .await;
    for page in ["a", "b", "c"] {
        mount_capture(
            &server,
            TIMESTAMP,
            &format!("http://example.com/{page}"),
            "text/html",
            b"<p>page</p>",
        )
        .await;
    }

    let policy = Policy {
        max_documents: Some(2),
        ..Policy::default()
    };
    let (report, _dir) = run_mirror(&server, policy).await;

    // Seed plus one discovery; the rest of the frontier is discarded.
    assert_eq!(report.stats.total(), 2);
}
