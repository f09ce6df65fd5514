//! End-to-end tests for the caching client against a stub upstream

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use reqwest::Client;
use tempfile::TempDir;

use common::{closed_url, Reply, StubServer};
use respcache::clock::ManualClock;
use respcache::{Cache, CachedClient, FetchError, HttpFetcher, Logger, Origin, Request, StoreConfig};

fn fetcher(base_url: &str) -> HttpFetcher {
    let client = Client::builder()
        .no_proxy()
        .build()
        .expect("Failed to build HTTP client");
    HttpFetcher::with_client(client, base_url).with_timeout(Duration::from_secs(5))
}

fn memory_cache(clock: &ManualClock) -> Cache {
    let config = StoreConfig::with_timeout(Duration::from_secs(60))
        .logger(Logger::silent())
        .clock(Arc::new(clock.clone()));
    Cache::new("memory", config).expect("memory cache should build")
}

#[tokio::test]
async fn test_second_get_is_served_from_cache() {
    let server = StubServer::start(vec![Reply::ok("{\"tide\":3.2}")]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));
    let request = Request::new("/tides").query("station", "7735");

    let first = client.get(&request).await.unwrap();
    let second = client.get(&request).await.unwrap();

    assert_eq!(first.origin, Origin::Network);
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.response.body, b"{\"tide\":3.2}");
    assert_eq!(server.finish(), vec!["GET /tides?station=7735 HTTP/1.1"]);
}

#[tokio::test]
async fn test_upstream_outage_serves_stale_copy() {
    let server = StubServer::start(vec![Reply::ok("yesterday")]);
    let clock = ManualClock::default();
    let cache = memory_cache(&clock);
    let request = Request::new("/weather");

    let warm = CachedClient::new(cache.clone(), fetcher(&server.url()));
    warm.get(&request).await.unwrap();
    server.finish();

    clock.advance(ChronoDuration::days(1));
    let cold = CachedClient::new(cache, fetcher(&closed_url()));
    let resolved = cold.get(&request).await.unwrap();

    assert_eq!(resolved.origin, Origin::Stale);
    assert_eq!(resolved.response.body, b"yesterday");
}

#[tokio::test]
async fn test_upstream_outage_without_copy_is_an_error() {
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&closed_url()));
    let request = Request::new("/weather");

    let err = client.get(&request).await.unwrap_err();

    assert!(matches!(err, FetchError::RequestFailed(_)));
    assert!(!client.cache().exists(&request.logical_key()).await);
}

#[tokio::test]
async fn test_max_age_header_controls_freshness() {
    let server = StubServer::start(vec![
        Reply::ok("short lived").header("Cache-Control", "public, max-age=120"),
        Reply::ok("refetched"),
    ]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));
    let request = Request::new("/quality");

    client.get(&request).await.unwrap();

    clock.advance(ChronoDuration::seconds(119));
    assert_eq!(client.get(&request).await.unwrap().origin, Origin::Cache);

    clock.advance(ChronoDuration::seconds(2));
    let resolved = client.get(&request).await.unwrap();
    assert_eq!(resolved.origin, Origin::Network);
    assert_eq!(resolved.response.body, b"refetched");
    assert_eq!(server.finish().len(), 2);
}

#[tokio::test]
async fn test_not_found_is_returned_and_not_cached() {
    let server = StubServer::start(vec![Reply::status(404, "no such beach")]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));
    let request = Request::new("/beaches/atlantis");

    let resolved = client.get(&request).await.unwrap();

    assert_eq!(resolved.response.status, 404);
    assert_eq!(resolved.response.body, b"no such beach");
    assert!(!client.cache().exists(&request.logical_key()).await);
    server.finish();
}

#[tokio::test]
async fn test_file_store_fallback_across_cache_instances() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = StoreConfig::with_timeout(Duration::from_secs(0))
        .location(temp_dir.path().to_string_lossy())
        .logger(Logger::silent());
    let request = Request::new("/Beaches");

    let server = StubServer::start(vec![Reply::ok("[\"kits\",\"english bay\"]")]);
    let first = CachedClient::new(Cache::new("file", config.clone()).unwrap(), fetcher(&server.url()));
    assert_eq!(first.get(&request).await.unwrap().origin, Origin::Network);
    server.finish();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = CachedClient::new(Cache::new("file", config).unwrap(), fetcher(&closed_url()));
    let resolved = second.get(&Request::new("/beaches")).await.unwrap();

    assert_eq!(resolved.origin, Origin::Stale);
    assert_eq!(resolved.response.body, b"[\"kits\",\"english bay\"]");
}

#[tokio::test]
async fn test_response_headers_are_kept_in_the_cached_copy() {
    let server = StubServer::start(vec![Reply::ok("x").header("X-Station", "Point Atkinson")]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));
    let request = Request::new("/stations/1");

    client.get(&request).await.unwrap();
    let cached = client.get(&request).await.unwrap();

    assert_eq!(cached.origin, Origin::Cache);
    assert_eq!(cached.response.header("x-station"), Some("Point Atkinson"));
    server.finish();
}

#[tokio::test]
async fn test_binary_body_round_trips_through_the_cache() {
    let png = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0x00, 0xff];
    let server = StubServer::start(vec![Reply::ok(png.clone()).header("Content-Type", "image/png")]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));
    let request = Request::new("/webcam/kits.png");

    let fetched = client.get(&request).await.unwrap();
    let cached = client.get(&request).await.unwrap();

    assert_eq!(fetched.response.body, png);
    assert_eq!(cached.origin, Origin::Cache);
    assert_eq!(cached.response.body, png);
    server.finish();
}

#[tokio::test]
async fn test_escaped_query_values_get_their_own_entry() {
    let server = StubServer::start(vec![Reply::ok("one param"), Reply::ok("two params")]);
    let clock = ManualClock::default();
    let client = CachedClient::new(memory_cache(&clock), fetcher(&server.url()));

    let smuggled = client
        .get(&Request::new("/x").query("a", "1&b=2"))
        .await
        .unwrap();
    let separate = client
        .get(&Request::new("/x").query("a", "1").query("b", "2"))
        .await
        .unwrap();

    assert_eq!(smuggled.response.body, b"one param");
    assert_eq!(separate.origin, Origin::Network);
    assert_eq!(separate.response.body, b"two params");
    assert_eq!(
        server.finish(),
        vec!["GET /x?a=1%26b%3D2 HTTP/1.1", "GET /x?a=1&b=2 HTTP/1.1"]
    );
}
