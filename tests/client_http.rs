//! HTTP client behavior against a local mock server: retry with backoff,
//! rate-limit handling, and burst limiting.

use announce_watch::client::RateLimitedClient;
use announce_watch::config::ClientConfig;
use announce_watch::error::WatchError;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> ClientConfig {
    ClientConfig {
        burst_limit: 100,
        burst_cooldown_min: Duration::from_millis(200),
        burst_cooldown_max: Duration::from_millis(300),
        request_timeout: Duration::from_secs(5),
        retry_attempts: 3,
        backoff_base: Duration::from_millis(100),
        backoff_floor: Duration::from_millis(100),
        backoff_ceiling: Duration::from_millis(400),
        rate_limit_pause: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_transient_failures_then_success_returns_json() {
    let server = MockServer::start().await;

    // Two failures, then the real payload.
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(fast_config()).unwrap();
    let start = Instant::now();
    let value = client.get_json(&format!("{}/feed", server.uri())).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(value["ok"], true);
    // Two rate-limit pauses (50ms each) plus backoffs of 100ms then 200ms,
    // the second no shorter than the first.
    assert!(elapsed >= Duration::from_millis(350), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_exhausted_retries_yield_fetch_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(fast_config()).unwrap();
    let err = client
        .get_json(&format!("{}/feed", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WatchError::FetchFailed { attempts: 3, .. }
    ));
}

#[tokio::test]
async fn test_rate_limit_marker_in_body_is_transient() {
    let server = MockServer::start().await;

    // 200 status but a rate-limit marker body: must be retried, not parsed.
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Rate Limit exceeded, slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(fast_config()).unwrap();
    let value = client.get_json(&format!("{}/feed", server.uri())).await.unwrap();
    assert!(value["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_burst_limit_delays_third_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let cfg = ClientConfig {
        burst_limit: 2,
        ..fast_config()
    };
    let client = RateLimitedClient::new(cfg).unwrap();
    let url = format!("{}/feed", server.uri());

    client.get_json(&url).await.unwrap();
    client.get_json(&url).await.unwrap();

    let start = Instant::now();
    client.get_json(&url).await.unwrap();
    let elapsed = start.elapsed();

    // The third dispatch inside the window must sit out the cooldown.
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_invalid_json_body_fails_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = RateLimitedClient::new(fast_config()).unwrap();
    let err = client
        .get_json(&format!("{}/page", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::FetchFailed { .. }));
}
