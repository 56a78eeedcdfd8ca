//! End-to-end forwarding through the dev server.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use dev_proxy::config::ProxyRuleConfig;

mod common;

#[tokio::test]
async fn test_api_prefix_rewritten_and_joined_with_target_path() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;

    let res = common::client()
        .get(format!("http://{proxy}/api/users/42?expand=true"))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), StatusCode::OK);

    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["path"], "/api/users/42");
    assert_eq!(echo["query"], "expand=true");
    assert_eq!(echo["headers"]["host"], backend.to_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_api_ping_without_prepend_path() {
    let backend = common::start_echo_backend().await;
    let mut config = common::reference_config(backend);
    let mut rule = ProxyRuleConfig::strip_prefix("/api", format!("http://{backend}/api"));
    rule.prepend_path = false;
    config.proxy = [("/api", rule)].into_iter().collect();
    let (proxy, shutdown) = common::start_proxy(config).await;

    let echo: Value = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["path"], "/ping");
    assert_eq!(echo["headers"]["host"], backend.to_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_media_prefix() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;

    let echo: Value = common::client()
        .get(format!("http://{proxy}/media/photo.png"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["path"], "/media/photo.png");

    shutdown.trigger();
}

#[tokio::test]
async fn test_host_preserved_without_change_origin() {
    let backend = common::start_echo_backend().await;
    let mut config = common::reference_config(backend);
    config.proxy = [("/api", ProxyRuleConfig::new(format!("http://{backend}")))]
        .into_iter()
        .collect();
    let (proxy, shutdown) = common::start_proxy(config).await;

    let echo: Value = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["path"], "/api/ping");
    assert_eq!(echo["headers"]["host"], proxy.to_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_unmatched_path_not_intercepted() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;

    for path in ["/", "/index.html", "/v1/api/ping"] {
        let res = common::client()
            .get(format!("http://{proxy}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path} should not be proxied");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_post_body_and_headers_forwarded() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;

    let echo: Value = common::client()
        .post(format!("http://{proxy}/api/users"))
        .header("content-type", "application/json")
        .header("x-custom", "kept")
        .body(r#"{"name":"ada"}"#)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["path"], "/api/users");
    assert_eq!(echo["body"], r#"{"name":"ada"}"#);
    assert_eq!(echo["headers"]["x-custom"], "kept");
    assert_eq!(echo["headers"]["content-type"], "application/json");

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_generated_and_forwarded() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;

    let res = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .send()
        .await
        .unwrap();
    let request_id = res
        .headers()
        .get("x-request-id")
        .expect("response carries a request id")
        .to_str()
        .unwrap()
        .to_string();
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["headers"]["x-request-id"], request_id);

    let res = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .header("x-request-id", "client-chosen")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "client-chosen");

    shutdown.trigger();
}

#[tokio::test]
async fn test_xfwd_headers_added() {
    let backend = common::start_echo_backend().await;
    let mut config = common::reference_config(backend);
    let mut rule = ProxyRuleConfig::strip_prefix("/api", format!("http://{backend}/api"));
    rule.xfwd = true;
    config.proxy = [("/api", rule)].into_iter().collect();
    let (proxy, shutdown) = common::start_proxy(config).await;

    let echo: Value = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["headers"]["x-forwarded-for"], "127.0.0.1");
    assert_eq!(echo["headers"]["x-forwarded-proto"], "http");
    assert_eq!(echo["headers"]["x-forwarded-host"], proxy.to_string());
    assert_eq!(echo["headers"]["x-forwarded-port"], proxy.port().to_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dead = common::closed_port().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(dead)).await;

    let res = common::client()
        .get(format!("http://{proxy}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout() {
    let backend = common::start_slow_backend(Duration::from_secs(3)).await;
    let mut config = common::reference_config(backend);
    config.timeouts.request_secs = 1;
    let (proxy, shutdown) = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{proxy}/api/slow"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_independent() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::reference_config(backend)).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let prefix = if i % 2 == 0 { "api" } else { "media" };
        let url = format!("http://{proxy}/{prefix}/item/{i}");
        tasks.push(tokio::spawn(async move {
            let echo: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
            (prefix, i, echo)
        }));
    }

    for task in tasks {
        let (prefix, i, echo) = task.await.unwrap();
        assert_eq!(echo["path"], format!("/{prefix}/item/{i}"));
    }

    shutdown.trigger();
}
