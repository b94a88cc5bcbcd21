//! Failure injection tests for the proxy pipeline.

use std::time::Duration;

use axum::http::StatusCode;
use lazy_gateway::config::GatewayConfig;
use reqwest::header::CONTENT_TYPE;

mod common;

fn proxy_to(dst: impl std::fmt::Display) -> GatewayConfig {
    GatewayConfig {
        rules: vec![format!("proxy:127.0.0.1:http:{}", dst)],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_refused_upstream_is_bad_gateway() {
    let (gateway, shutdown) = common::start_gateway(proxy_to(common::unused_addr())).await;

    let res = common::client()
        .get(format!("http://{}/", gateway))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");
    assert!(res.text().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_pipe_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        rules: vec!["proxy:127.0.0.1:pipe:absent.sock".to_string()],
        base_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let (gateway, shutdown) = common::start_gateway(config).await;

    let res = common::client().get(format!("http://{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_truncated_upstream_body_truncates_client_body() {
    let backend = common::start_truncating_backend(5000, 1000).await;
    let (gateway, shutdown) = common::start_gateway(proxy_to(backend)).await;

    let res = common::client()
        .get(format!("http://{}/big", gateway))
        .send()
        .await
        .unwrap();

    // the head was already committed when the body broke
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.is_err(), "client must not see a complete body");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_closing_before_response_is_bad_gateway() {
    let (backend, _) = common::start_raw_backend(Vec::new()).await;
    let (gateway, shutdown) = common::start_gateway(proxy_to(backend)).await;

    let res = common::client().get(format!("http://{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_gateway_survives_failures() {
    let backend = common::start_truncating_backend(100, 10).await;
    let (gateway, shutdown) = common::start_gateway(proxy_to(backend)).await;
    let client = common::client();

    for _ in 0..5 {
        if let Ok(res) = client.get(format!("http://{}/", gateway)).send().await {
            let _ = res.bytes().await;
        }
    }

    // drains run in the background; the listener keeps serving
    tokio::time::sleep(Duration::from_millis(100)).await;
    let res = client.get(format!("http://{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let backend = common::start_echo_backend().await;
    let (gateway, shutdown) = common::start_gateway(proxy_to(backend)).await;

    assert_eq!(shutdown.trigger(), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let result = common::client().get(format!("http://{}/", gateway)).send().await;
    assert!(result.is_err(), "listener should be closed after shutdown");
}
