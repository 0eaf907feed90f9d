//! Tests for the HTTP feed fetcher.

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use stay_engine::feed::fetch::{normalize_feed_url, FeedFetcher, HttpFeedFetcher};
use stay_engine::StayError;

const FEED: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n";

fn fetcher(timeout: Duration) -> HttpFeedFetcher {
    HttpFeedFetcher::new(timeout, "stay-engine-tests").unwrap()
}

#[test]
fn successful_fetch_returns_body() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/calendar/ical/123.ics")
        .match_header("user-agent", "stay-engine-tests")
        .with_status(200)
        .with_header("content-type", "text/calendar")
        .with_body(FEED)
        .create();

    let url = format!("{}/calendar/ical/123.ics", server.url());
    let body = fetcher(Duration::from_secs(5)).fetch(&url).unwrap();

    assert_eq!(body, FEED);
    mock.assert();
}

#[test]
fn non_success_status_is_upstream_error() {
    let mut server = mockito::Server::new();
    let _mock = server.mock("GET", "/gone.ics").with_status(404).create();

    let url = format!("{}/gone.ics", server.url());
    let err = fetcher(Duration::from_secs(5)).fetch(&url).unwrap_err();

    match err {
        StayError::UpstreamFetch(msg) => assert!(msg.contains("404"), "{}", msg),
        other => panic!("expected UpstreamFetch, got {:?}", other),
    }
}

#[test]
fn server_error_is_upstream_error() {
    let mut server = mockito::Server::new();
    let _mock = server.mock("GET", "/feed.ics").with_status(503).create();

    let url = format!("{}/feed.ics", server.url());
    assert!(matches!(
        fetcher(Duration::from_secs(5)).fetch(&url),
        Err(StayError::UpstreamFetch(_))
    ));
}

#[test]
fn unreachable_host_is_upstream_error() {
    // Bind then drop to get a local port with nothing listening.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{}/feed.ics", port);

    assert!(matches!(
        fetcher(Duration::from_secs(5)).fetch(&url),
        Err(StayError::UpstreamFetch(_))
    ));
}

#[test]
fn stalled_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        if let Ok((mut socket, _)) = listener.accept() {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf);
            // Never answer; hold the connection past the client timeout.
            thread::sleep(Duration::from_secs(3));
        }
    });

    let url = format!("http://{}/slow.ics", addr);
    let err = fetcher(Duration::from_millis(500)).fetch(&url).unwrap_err();

    match err {
        StayError::UpstreamFetch(msg) => assert!(msg.contains("timed out"), "{}", msg),
        other => panic!("expected UpstreamFetch, got {:?}", other),
    }
    handle.join().unwrap();
}

#[test]
fn webcal_scheme_is_fetched_over_https() {
    assert_eq!(
        normalize_feed_url("webcal://www.airbnb.com/calendar/ical/1.ics?s=abc").unwrap(),
        "https://www.airbnb.com/calendar/ical/1.ics?s=abc"
    );
    assert_eq!(
        normalize_feed_url(" https://example.com/a.ics ").unwrap(),
        "https://example.com/a.ics"
    );
}

#[test]
fn non_http_scheme_is_rejected_before_fetching() {
    assert!(matches!(
        normalize_feed_url("ftp://example.com/feed.ics"),
        Err(StayError::Validation(_))
    ));
    assert!(matches!(
        fetcher(Duration::from_secs(1)).fetch("file:///etc/passwd"),
        Err(StayError::Validation(_))
    ));
}
