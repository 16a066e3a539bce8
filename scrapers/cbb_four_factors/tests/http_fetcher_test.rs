use std::time::Duration;

use chrono::NaiveDate;
use mockito::{Matcher, Server};

use cbb_four_factors::{
    config::ScraperConfig,
    fetch::{HttpFetcher, PageFetcher, Unthrottled},
    Error, Pipeline,
};

fn test_config(base_url: String, max_retries: u32) -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.site.base_url = base_url;
    config.rate_limits.request_interval_ms = 0;
    config.rate_limits.max_retries = max_retries;
    config.scraping.request_timeout_secs = 5;
    config
}

fn fetcher(server: &Server, max_retries: u32) -> HttpFetcher {
    HttpFetcher::new(&test_config(server.url(), max_retries))
        .unwrap()
        .with_throttle(Unthrottled)
        .with_initial_backoff(Duration::from_millis(1))
}

#[test]
fn test_success_is_parsed_and_uncommented() {
    let mut server = Server::new();
    let page = server
        .mock("GET", "/page.html")
        .with_status(200)
        .with_body("<html><body><!-- <table id=\"hidden\"><tr><td>1</td></tr></table> --></body></html>")
        .expect(1)
        .create();

    let fetcher = fetcher(&server, 3);
    let document = fetcher.fetch(&format!("{}/page.html", server.url())).unwrap();
    let table = scraper::Selector::parse("table#hidden").unwrap();

    assert_eq!(document.select(&table).count(), 1);
    page.assert();
    let metrics = fetcher.metrics();
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.retries, 0);
}

#[test_log::test]
fn test_rate_limited_then_success() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/page.html")
        .with_status(429)
        .with_header("retry-after", "0")
        .expect(1)
        .create();
    let ok = server
        .mock("GET", "/page.html")
        .with_status(200)
        .with_body("<html><body>ok</body></html>")
        .expect(1)
        .create();

    let fetcher = fetcher(&server, 3);
    let body = fetcher.fetch_text(&format!("{}/page.html", server.url())).unwrap();

    assert!(body.contains("ok"));
    limited.assert();
    ok.assert();
    let metrics = fetcher.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.retries, 1);
    assert_eq!(metrics.rate_limited_responses, 1);
}

#[test_log::test]
fn test_rate_limit_gives_up_after_max_retries() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/page.html")
        .with_status(429)
        .with_header("retry-after", "0")
        .expect(3)
        .create();

    let fetcher = fetcher(&server, 2);
    let err = fetcher.fetch_text(&format!("{}/page.html", server.url())).unwrap_err();

    match err {
        Error::RateLimited { retry_after, .. } => assert_eq!(retry_after, Duration::ZERO),
        other => panic!("expected RateLimited, got {:?}", other),
    }
    limited.assert();
    assert_eq!(fetcher.metrics().retries, 2);
    assert_eq!(fetcher.metrics().failed_requests, 3);
}

#[test]
fn test_retry_after_is_capped() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/page.html")
        .with_status(429)
        .with_header("retry-after", "86400")
        .expect(2)
        .create();

    let mut config = test_config(server.url(), 1);
    config.rate_limits.max_retry_after_secs = 0;
    let fetcher = HttpFetcher::new(&config).unwrap().with_throttle(Unthrottled);
    let err = fetcher.fetch_text(&format!("{}/page.html", server.url())).unwrap_err();

    match err {
        Error::RateLimited { retry_after, .. } => assert_eq!(retry_after, Duration::ZERO),
        other => panic!("expected RateLimited, got {:?}", other),
    }
    limited.assert();
    assert_eq!(fetcher.metrics().rate_limited_responses, 1);
}

#[test]
fn test_not_found_is_not_retried() {
    let mut server = Server::new();
    let missing = server.mock("GET", "/missing.html").with_status(404).expect(1).create();

    let fetcher = fetcher(&server, 3);
    let err = fetcher.fetch_text(&format!("{}/missing.html", server.url())).unwrap_err();

    match err {
        Error::Fetch { reason, .. } => assert!(reason.contains("404"), "reason: {}", reason),
        other => panic!("expected Fetch, got {:?}", other),
    }
    missing.assert();
    assert_eq!(fetcher.metrics().retries, 0);
}

#[test]
fn test_server_error_is_retried_with_backoff() {
    let mut server = Server::new();
    let unavailable = server.mock("GET", "/page.html").with_status(503).expect(2).create();
    let ok = server
        .mock("GET", "/page.html")
        .with_status(200)
        .with_body("recovered")
        .expect(1)
        .create();

    let fetcher = fetcher(&server, 3);
    let body = fetcher.fetch_text(&format!("{}/page.html", server.url())).unwrap();

    assert_eq!(body, "recovered");
    unavailable.assert();
    ok.assert();
    let metrics = fetcher.metrics();
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.rate_limited_responses, 0);
    assert!(metrics.last_error.is_some());
}

#[test_log::test]
fn test_pipeline_over_http() {
    let mut server = Server::new();
    let schedule = server
        .mock("GET", Matcher::Regex(r"^/cbb/boxscores/index\.cgi".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("month".into(), "1".into()),
            Matcher::UrlEncoded("day".into(), "9".into()),
            Matcher::UrlEncoded("year".into(), "2024".into()),
        ]))
        .with_status(200)
        .with_body(include_str!("fixtures/schedule_2024_01_09.html"))
        .create();
    let box_score = server
        .mock("GET", "/cbb/boxscores/2024-01-09-19-duke.html")
        .with_status(200)
        .with_body(include_str!("fixtures/boxscore_clemson_duke.html"))
        .expect(1)
        .create();

    let config = test_config(format!("{}/cbb", server.url()), 0);
    let pipeline = Pipeline::new(HttpFetcher::new(&config).unwrap(), config);
    let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();

    let assembly = pipeline.build_dataset(date, date, Some(1)).unwrap();

    schedule.assert();
    box_score.assert();
    assert_eq!(assembly.records.len(), 1);
    assert_eq!(assembly.records[0].away.team_id, "clemson");
    assert_eq!(assembly.records[0].home.team_id, "duke");
    assert_eq!(pipeline.fetcher().metrics().total_requests, 2);
}
