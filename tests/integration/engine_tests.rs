//! Engine behavior over in-memory sites

use crate::common::{test_config, FakeSite, MemorySink};
use std::sync::Arc;
use tidewalk::crawler::{ExtractionError, FetchError, HtmlLinkExtractor};
use tidewalk::output::{FailureKind, SavedKind};
use tidewalk::{Config, CrawlEngine, CrawlReport, LinkExtractor, RunOutcome, TidewalkError};
use tokio_util::sync::CancellationToken;
use url::Url;

const SEED: &str = "https://site.test/";

async fn crawl(config: &Config, site: &Arc<FakeSite>, sink: &Arc<MemorySink>) -> CrawlReport {
    CrawlEngine::new(
        config,
        site.clone(),
        Arc::new(HtmlLinkExtractor::new()),
        sink.clone(),
    )
    .run(CancellationToken::new())
    .await
    .expect("crawl should not fail")
}

fn index_urls(report: &CrawlReport) -> Vec<String> {
    let mut urls: Vec<_> = report.index.iter().map(|e| e.url.to_string()).collect();
    urls.sort();
    urls
}

fn failure_kind(report: &CrawlReport, url: &str) -> Option<FailureKind> {
    report
        .failures
        .iter()
        .find(|f| f.url.as_str() == url)
        .map(|f| f.kind)
}

#[tokio::test]
async fn test_same_origin_scenario() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a> <a href="/b">B</a>"#)
            .page("https://site.test/a", r#"<a href="/a/">again</a>"#)
            .page("https://site.test/b", r#"<a href="https://ext.test/">elsewhere</a>"#),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(
        index_urls(&report),
        vec![
            "https://site.test/",
            "https://site.test/a",
            "https://site.test/b"
        ]
    );
    assert_eq!(report.visited, 3);
    assert_eq!(report.external_links.len(), 1);
    assert_eq!(report.external_links[0].host(), "ext.test");
    assert!(report.assets.is_empty());
    assert!(report.failures.is_empty());

    assert_eq!(sink.flush_count(), 1);
    assert_eq!(sink.flushed_index().unwrap().len(), 3);
    assert!(site.fetches().iter().all(|u| !u.contains("ext.test")));
}

#[tokio::test]
async fn test_cycles_are_fetched_once() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a><a href="/">self</a>"#)
            .page("https://site.test/a", r#"<a href="/b">B</a><a href="/">home</a>"#)
            .page(
                "https://site.test/b",
                r##"<a href="/a#top">A</a><a href="/a/">A/</a><a href="HTTPS://SITE.test/">home</a>"##,
            ),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    for url in ["https://site.test/", "https://site.test/a", "https://site.test/b"] {
        assert_eq!(site.fetch_count(url), 1, "{} fetched more than once", url);
    }
    assert_eq!(report.pages_saved(), 3);
    assert_eq!(
        report
            .visited_urls
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>(),
        vec![
            "https://site.test/",
            "https://site.test/a",
            "https://site.test/b"
        ]
    );
}

#[tokio::test]
async fn test_timeout_does_not_stop_traversal() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/slow">S</a><a href="/x">X</a><a href="/y">Y</a>"#)
            .hang("https://site.test/slow")
            .page("https://site.test/x", r#"<a href="/z">Z</a>"#)
            .page("https://site.test/y", "")
            .page("https://site.test/z", ""),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(
        failure_kind(&report, "https://site.test/slow"),
        Some(FailureKind::Timeout)
    );
    assert_eq!(
        index_urls(&report),
        vec![
            "https://site.test/",
            "https://site.test/x",
            "https://site.test/y",
            "https://site.test/z"
        ]
    );
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_http_errors_are_recorded() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/gone">G</a><a href="/down">D</a><a href="/ok">O</a>"#)
            .fail("https://site.test/down", FetchError::Transport("reset".to_string()))
            .page("https://site.test/ok", ""),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(
        failure_kind(&report, "https://site.test/gone"),
        Some(FailureKind::HttpStatus)
    );
    assert_eq!(
        failure_kind(&report, "https://site.test/down"),
        Some(FailureKind::Transport)
    );
    assert_eq!(report.pages_saved(), 2);
    assert_eq!(report.failures_by_kind().values().sum::<usize>(), 2);
}

#[tokio::test]
async fn test_render_retry_is_bounded() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/app">App</a>"#)
            .never_ready("https://site.test/app"),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.max_render_attempts = 3;

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(site.fetch_count("https://site.test/app"), 3);
    assert_eq!(
        failure_kind(&report, "https://site.test/app"),
        Some(FailureKind::RenderExhausted)
    );
    assert_eq!(report.pages_saved(), 1);
}

#[tokio::test]
async fn test_seed_denied_by_robots() {
    let site = Arc::new(
        FakeSite::new()
            .robots("site.test", "User-agent: *\nDisallow: /")
            .page(SEED, r#"<a href="/a">A</a>"#),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.robots.bypass = false;

    let report = crawl(&config, &site, &sink).await;

    assert!(matches!(report.outcome, RunOutcome::SeedRejected { .. }));
    assert_eq!(report.outcome.exit_code(), 2);
    assert!(site.fetches().is_empty());
    assert_eq!(report.pages_saved(), 0);
    assert_eq!(failure_kind(&report, SEED), Some(FailureKind::PolicyDenied));
    assert_eq!(sink.flush_count(), 0);
    assert_eq!(site.close_count(), 1);
}

#[tokio::test]
async fn test_unreachable_seed_is_reported() {
    let site = Arc::new(FakeSite::new());
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    match &report.outcome {
        RunOutcome::SeedRejected { reason } => assert!(reason.contains("404"), "{}", reason),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(sink.flush_count(), 1);
    assert_eq!(sink.flushed_index().unwrap().len(), 0);
}

#[tokio::test]
async fn test_robots_disallowed_page_is_skipped() {
    let site = Arc::new(
        FakeSite::new()
            .robots("site.test", "User-agent: *\nDisallow: /private")
            .page(SEED, r#"<a href="/private/x">P</a><a href="/public">Q</a>"#)
            .page("https://site.test/private/x", "secret")
            .page("https://site.test/public", ""),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.robots.bypass = false;

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(
        index_urls(&report),
        vec!["https://site.test/", "https://site.test/public"]
    );
    assert_eq!(
        failure_kind(&report, "https://site.test/private/x"),
        Some(FailureKind::PolicyDenied)
    );
    assert_eq!(site.fetch_count("https://site.test/private/x"), 0);
    assert_eq!(site.fetch_count("https://site.test/robots.txt"), 1);
}

#[tokio::test]
async fn test_cancellation_persists_partial_results() {
    let cancel = CancellationToken::new();
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a><a href="/b">B</a>"#)
            .page("https://site.test/a", r#"<a href="/c">C</a>"#)
            .page("https://site.test/b", "")
            .page("https://site.test/c", "")
            .cancel_on("https://site.test/a", cancel.clone()),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.batch_size = 1;
    config.crawler.workers = Some(1);

    let report = CrawlEngine::new(
        &config,
        site.clone(),
        Arc::new(HtmlLinkExtractor::new()),
        sink.clone(),
    )
    .run(cancel)
    .await
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(
        site.fetches(),
        vec!["https://site.test/", "https://site.test/a"]
    );
    assert_eq!(
        index_urls(&report),
        vec!["https://site.test/", "https://site.test/a"]
    );
    assert_eq!(report.frontier_remaining, 2);
    assert_eq!(sink.flush_count(), 1);
    assert_eq!(site.close_count(), 1);
}

#[tokio::test]
async fn test_assets_downloaded_once() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                SEED,
                r#"<link rel="stylesheet" href="/site.css"><img src="/logo.png">
                   <a href="/logo.png">logo</a><a href="/about">about</a>"#,
            )
            .page("https://site.test/about", r#"<img src="/logo.png">"#)
            .asset("https://site.test/logo.png", "image/png", &[0x89, 0x50, 0x4e, 0x47])
            .asset("https://site.test/site.css", "text/css", b"body{}"),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    let mut assets = sink.saved_urls(SavedKind::Asset);
    assets.sort();
    assert_eq!(
        assets,
        vec!["https://site.test/logo.png", "https://site.test/site.css"]
    );
    assert_eq!(site.fetch_count("https://site.test/logo.png"), 1);
    assert_eq!(report.assets.len(), 2);
    assert_eq!(
        index_urls(&report),
        vec!["https://site.test/", "https://site.test/about"]
    );
    assert_eq!(
        sink.content_of("https://site.test/logo.png").unwrap(),
        vec![0x89, 0x50, 0x4e, 0x47]
    );
    assert!(!site.prepared().iter().any(|u| u.ends_with(".png")));
}

#[tokio::test]
async fn test_external_pages_opt_in_and_bounded() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                SEED,
                r#"<a href="https://ext.test/one">1</a><a href="https://ext.test/two">2</a>
                   <script src="https://cdn.test/lib.js"></script>"#,
            )
            .page("https://ext.test/one", r#"<a href="https://ext.test/deeper">deeper</a>"#)
            .page("https://ext.test/two", ""),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.scope.follow_external = true;
    config.scope.max_external_pages = 1;

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(report.external_links.len(), 3);
    assert_eq!(
        sink.saved_urls(SavedKind::ExternalPage),
        vec!["https://ext.test/one"]
    );
    assert_eq!(
        index_urls(&report),
        vec!["https://ext.test/one", "https://site.test/"]
    );
    assert_eq!(site.fetch_count("https://ext.test/deeper"), 0);
    assert_eq!(site.fetch_count("https://cdn.test/lib.js"), 0);
    assert!(!report
        .external_links
        .iter()
        .any(|u| u.as_str() == "https://ext.test/deeper"));
}

#[tokio::test]
async fn test_external_pages_not_fetched_by_default() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="https://ext.test/one">1</a><a href="https://ext.test/one#x">1</a>"#)
            .page("https://ext.test/one", ""),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(report.external_links.len(), 1);
    assert_eq!(site.fetch_count("https://ext.test/one"), 0);
    assert_eq!(report.visited, 1);
}

#[tokio::test]
async fn test_page_cap_leaves_rest_undispatched() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>"#)
            .page("https://site.test/a", "")
            .page("https://site.test/b", "")
            .page("https://site.test/c", ""),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.max_pages = 2;

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(
        index_urls(&report),
        vec!["https://site.test/", "https://site.test/a"]
    );
    assert_eq!(report.frontier_remaining, 2);
}

#[tokio::test]
async fn test_external_pages_do_not_use_page_cap() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                SEED,
                r#"<a href="https://ext.test/one">1</a><a href="https://ext.test/two">2</a><a href="/a">A</a>"#,
            )
            .page("https://ext.test/one", "")
            .page("https://ext.test/two", "")
            .page("https://site.test/a", ""),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.max_pages = 2;
    config.scope.follow_external = true;

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(
        sink.saved_urls(SavedKind::Page),
        vec!["https://site.test/", "https://site.test/a"]
    );
    assert_eq!(sink.saved_urls(SavedKind::ExternalPage).len(), 2);
    assert_eq!(report.frontier_remaining, 0);
}

#[tokio::test]
async fn test_batches_follow_breadth_first_order() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a><a href="/b">B</a>"#)
            .page("https://site.test/a", r#"<a href="/a1">A1</a>"#)
            .page("https://site.test/b", r#"<a href="/b1">B1</a>"#)
            .page("https://site.test/a1", "")
            .page("https://site.test/b1", ""),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.batch_size = 1;
    config.crawler.workers = Some(1);

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(
        site.fetches(),
        vec![
            "https://site.test/",
            "https://site.test/a",
            "https://site.test/b",
            "https://site.test/a1",
            "https://site.test/b1"
        ]
    );
    assert_eq!(report.batches, 5);
}

#[tokio::test]
async fn test_non_reentrant_fetcher_is_serialized() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                SEED,
                r#"<a href="/a">A</a><a href="/b">B</a><a href="/c">C</a><a href="/d">D</a>"#,
            )
            .page("https://site.test/a", "")
            .page("https://site.test/b", "")
            .page("https://site.test/c", "")
            .page("https://site.test/d", "")
            .serial(),
    );
    let sink = Arc::new(MemorySink::new());

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(report.pages_saved(), 5);
    assert_eq!(site.max_in_flight(), 1);
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let links: String = (0..12).map(|i| format!(r#"<a href="/p{}">p</a>"#, i)).collect();
    let mut site = FakeSite::new().page(SEED, &links);
    for i in 0..12 {
        site = site.page(&format!("https://site.test/p{}", i), "");
    }
    let site = Arc::new(site);
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.crawler.workers = Some(3);

    let report = crawl(&config, &site, &sink).await;

    assert_eq!(report.pages_saved(), 13);
    assert!(site.max_in_flight() <= 3);
}

#[tokio::test]
async fn test_sink_failure_is_per_url() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a><a href="/b">B</a>"#)
            .page("https://site.test/a", r#"<a href="/hidden">H</a>"#)
            .page("https://site.test/b", "")
            .page("https://site.test/hidden", ""),
    );
    let sink = Arc::new(MemorySink::failing_on("https://site.test/a"));

    let report = crawl(&test_config(SEED), &site, &sink).await;

    assert_eq!(
        failure_kind(&report, "https://site.test/a"),
        Some(FailureKind::Sink)
    );
    assert_eq!(
        index_urls(&report),
        vec!["https://site.test/", "https://site.test/b"]
    );
    assert_eq!(site.fetch_count("https://site.test/hidden"), 0);
}

#[tokio::test]
async fn test_index_flush_failure_is_fatal() {
    let site = Arc::new(FakeSite::new().page(SEED, ""));
    let sink = Arc::new(MemorySink::failing_flush());

    let result = CrawlEngine::new(
        &test_config(SEED),
        site.clone(),
        Arc::new(HtmlLinkExtractor::new()),
        sink.clone(),
    )
    .run(CancellationToken::new())
    .await;

    assert!(matches!(result, Err(TidewalkError::Sink(_))));
    assert_eq!(site.close_count(), 1);
}

/// Fails on one page and defers to the HTML extractor otherwise
struct BrokenOn(&'static str);

impl LinkExtractor for BrokenOn {
    fn extract(&self, body: &str, base: &Url) -> Result<Vec<String>, ExtractionError> {
        if base.path() == self.0 {
            return Err(ExtractionError("unbalanced markup".to_string()));
        }
        HtmlLinkExtractor::new().extract(body, base)
    }
}

#[tokio::test]
async fn test_extraction_error_means_no_links() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/broken">B</a><a href="/ok">O</a>"#)
            .page("https://site.test/broken", r#"<a href="/hidden">H</a>"#)
            .page("https://site.test/ok", "")
            .page("https://site.test/hidden", ""),
    );
    let sink = Arc::new(MemorySink::new());

    let report = CrawlEngine::new(
        &test_config(SEED),
        site.clone(),
        Arc::new(BrokenOn("/broken")),
        sink.clone(),
    )
    .run(CancellationToken::new())
    .await
    .unwrap();

    assert!(index_urls(&report).contains(&"https://site.test/broken".to_string()));
    assert_eq!(site.fetch_count("https://site.test/hidden"), 0);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_strip_scripts_keeps_asset_discovery() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                SEED,
                r#"<html><body><p>hi</p><script>alert(1)</script><script src="/app.js"></script></body></html>"#,
            )
            .asset("https://site.test/app.js", "text/javascript", b"console.log(1)"),
    );
    let sink = Arc::new(MemorySink::new());
    let mut config = test_config(SEED);
    config.fetcher.strip_scripts = true;

    crawl(&config, &site, &sink).await;

    let saved = String::from_utf8(sink.content_of(SEED).unwrap()).unwrap();
    assert!(saved.contains("<p>hi</p>"));
    assert!(!saved.contains("<script"));
    assert_eq!(
        sink.saved_urls(SavedKind::Asset),
        vec!["https://site.test/app.js"]
    );
    assert_eq!(
        sink.content_of("https://site.test/app.js").unwrap(),
        b"console.log(1)".to_vec()
    );
}

#[tokio::test]
async fn test_extraction_hook_runs_for_followed_pages() {
    let site = Arc::new(
        FakeSite::new()
            .page(SEED, r#"<a href="/a">A</a>"#)
            .page("https://site.test/a", ""),
    );
    let sink = Arc::new(MemorySink::new());

    crawl(&test_config(SEED), &site, &sink).await;

    let mut prepared = site.prepared();
    prepared.sort();
    assert_eq!(prepared, vec!["https://site.test/", "https://site.test/a"]);
}
