//! Tests whether the 'health-check' and root routes return appropriate status codes

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::helpers::TestApp;

#[tokio::test]
async fn healthcheck_ok() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .get(format!("http://{addr}/health-check"))
        .send()
        .await?;

    assert!(res.status() == StatusCode::OK, "Healthcheck FAILED!");
    assert!(
        res.headers().contains_key("x-request-id"),
        "Response is missing the request id"
    );

    Ok(())
}

#[tokio::test]
async fn api_root_says_hello() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    for uri in [format!("http://{addr}/api"), format!("http://{addr}/api/")] {
        let res = http_client.get(&uri).send().await?;
        assert_eq!(res.status(), StatusCode::OK, "GET {uri}");
        assert_eq!(res.json::<Value>().await?, json!({ "message": "Hello World" }));
    }

    Ok(())
}

#[tokio::test]
async fn invalid_path_404() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .get(format!("http://{addr}/invalidpath"))
        .send()
        .await?;

    assert!(
        res.status() == StatusCode::NOT_FOUND,
        "Invalid Path check FAILED!, expected: {}, got: {}",
        404,
        res.status().as_u16()
    );

    Ok(())
}

#[tokio::test]
async fn cors_preflight_mirrors_origin() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/api/signup"),
        )
        .header("Origin", "https://landing.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await?;

    assert!(res.status().is_success());
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://landing.example.com")
    );
    assert_eq!(
        res.headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    Ok(())
}

#[tokio::test]
async fn error_responses_carry_cors_headers() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .post(format!("http://{addr}/api/signup"))
        .header("Origin", "https://landing.example.com")
        .json(&json!({ "email": "not-an-email" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://landing.example.com")
    );

    Ok(())
}
