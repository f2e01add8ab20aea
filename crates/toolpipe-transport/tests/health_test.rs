//! Integration tests for health polling against a mock HTTP server.

mod common;

use common::init_tracing;
use serde_json::json;
use std::time::{Duration, Instant};
use toolpipe_transport::{HealthCheckConfig, HealthWaiter, http::wait_until_healthy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> HealthCheckConfig {
    HealthCheckConfig {
        connect_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn test_healthy_server_is_detected_promptly() -> anyhow::Result<()> {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let waiter = HealthWaiter::new(&format!("{}/sse", server.uri()))?;
    let report = waiter.probe_until_healthy(Duration::from_secs(5)).await;

    assert!(report.healthy);
    assert_eq!(report.attempts, 1);
    assert!(report.elapsed < Duration::from_secs(1), "took {:?}", report.elapsed);
    Ok(())
}

#[tokio::test]
async fn test_unhealthy_server_times_out_within_bounds() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let waiter = HealthWaiter::with_config(&server.uri(), fast_config())?;
    let timeout = Duration::from_millis(600);
    let started = Instant::now();
    let healthy = waiter.wait_until_healthy(timeout).await;
    let elapsed = started.elapsed();

    assert!(!healthy);
    assert!(elapsed >= timeout, "gave up early after {elapsed:?}");
    assert!(
        elapsed < timeout + Duration::from_millis(500),
        "overran the deadline: {elapsed:?}"
    );
    Ok(())
}

#[tokio::test]
async fn test_non_json_body_is_not_healthy() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>starting</html>"))
        .mount(&server)
        .await;

    let waiter = HealthWaiter::with_config(&server.uri(), fast_config())?;
    let report = waiter.probe_until_healthy(Duration::from_millis(350)).await;
    assert!(!report.healthy);
    assert!(report.attempts >= 2);
    Ok(())
}

#[tokio::test]
async fn test_server_becoming_ready_later() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let waiter = HealthWaiter::with_config(&server.uri(), fast_config())?;
    let report = waiter.probe_until_healthy(Duration::from_secs(5)).await;
    assert!(report.healthy);
    assert_eq!(report.attempts, 3);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_times_out() -> anyhow::Result<()> {
    // Bind and drop to find a port with nothing listening.
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let started = Instant::now();
    let healthy =
        wait_until_healthy(&format!("http://127.0.0.1:{port}/sse"), Duration::from_millis(500))
            .await?;
    assert!(!healthy);
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn test_invalid_url_is_a_configuration_error() {
    assert!(wait_until_healthy("not a url", Duration::from_secs(1)).await.is_err());
}
