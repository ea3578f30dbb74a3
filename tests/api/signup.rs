use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use waitlist::sheets::{SinkState, SIGNUP_SOURCE};
use wiremock::{
    matchers::{any, method, path, query_param},
    Mock, Request, ResponseTemplate,
};

use crate::helpers::{TestApp, APPEND_PATH};

/// Matches an append request whose only row is `[email, <timestamp>, <source>]`.
struct AppendedRow {
    email: &'static str,
}

impl wiremock::Match for AppendedRow {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        let row = &body["values"][0];
        body["values"].as_array().is_some_and(|rows| rows.len() == 1)
            && row.as_array().is_some_and(|cells| cells.len() == 3)
            && row[0] == self.email
            && row[1].as_str().is_some_and(|ts| ts.ends_with('Z'))
            && row[2] == SIGNUP_SOURCE
    }
}

#[tokio::test]
async fn signup_normalizes_email_and_appends_row() -> Result<()> {
    let app = TestApp::spawn().await?;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(AppendedRow {
            email: "user@example.com",
        })
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.google_server)
        .await;

    let res = app
        .post_signup(&json!({ "email": "User@Example.com " }))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await?,
        json!({
            "success": true,
            "message": "Successfully joined the waitlist!",
        })
    );

    Ok(())
}

#[tokio::test]
async fn signup_rejects_invalid_email_without_calling_the_sheet() -> Result<()> {
    let app = TestApp::spawn().await?;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.google_server)
        .await;

    let cases = [
        ("not-an-email", "No at symbol"),
        ("", "Empty email"),
        ("jd@example", "No top level domain"),
        ("jd@example.c", "One letter top level domain"),
        ("john doe@example.com", "Whitespace in local part"),
    ];

    for (email, description) in cases {
        let res = app.post_signup(&json!({ "email": email })).await?;
        assert_eq!(
            res.status(),
            StatusCode::BAD_REQUEST,
            "The API did not return a 400 BAD REQUEST for: {description}"
        );

        let body: Value = res.json().await?;
        assert_eq!(body["success"], false);
        assert!(
            body["message"]
                .as_str()
                .is_some_and(|msg| msg.contains("Invalid email address")),
            "Unexpected body for {description}: {body}"
        );
    }

    // Validation happens before the sink is ever touched.
    assert_eq!(app.app_state.signup_sink.state(), SinkState::Uninitialized);

    Ok(())
}

#[tokio::test]
async fn signup_malformed_payload_unprocessable_entity() -> Result<()> {
    let app = TestApp::spawn().await?;

    let tests = [
        (json!({}), "Empty json"),
        (json!({ "email": null }), "Null email"),
        (json!({ "mail": "jd@example.com" }), "Wrong field"),
    ];

    for (json_request, params) in tests {
        let res = app.post_signup(&json_request).await?;
        assert_eq!(
            res.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "Wrong response: ({}), Expected: ({}); for request with: {params}",
            res.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    Ok(())
}

#[tokio::test]
async fn signup_upstream_failure_is_a_generic_500() -> Result<()> {
    let app = TestApp::spawn().await?;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("backendError: quota exceeded for project"),
        )
        .expect(1)
        .mount(&app.google_server)
        .await;

    let res = app
        .post_signup(&json!({ "email": "jane@example.com" }))
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.text().await?;
    let json_body: Value = serde_json::from_str(&body)?;
    assert_eq!(json_body["success"], false);
    assert_eq!(
        json_body["message"],
        "Failed to save signup. Please try again."
    );
    assert!(
        !body.contains("quota"),
        "Upstream detail leaked to the client: {body}"
    );

    Ok(())
}

#[tokio::test]
async fn signup_upstream_timeout_is_a_generic_500() -> Result<()> {
    let app = TestApp::spawn().await?;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&app.google_server)
        .await;

    let res = app
        .post_signup(&json!({ "email": "jane@example.com" }))
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Failed to save signup. Please try again.");

    Ok(())
}

#[tokio::test]
async fn signup_without_sheet_configuration_is_a_generic_500() -> Result<()> {
    let app = TestApp::spawn_with(|config| {
        config.sheets_config.spreadsheet_id = None;
    })
    .await?;

    let res = app
        .post_signup(&json!({ "email": "jane@example.com" }))
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Failed to save signup. Please try again.");
    assert_eq!(app.app_state.signup_sink.state(), SinkState::Failed);

    Ok(())
}

#[tokio::test]
async fn concurrent_first_signups_initialize_the_sink_once() -> Result<()> {
    let app = TestApp::spawn().await?;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(10)
        .mount(&app.google_server)
        .await;

    let mut set = tokio::task::JoinSet::new();
    for i in 0..10 {
        let http_client = app.http_client.clone();
        let uri = format!("http://{}/api/signup", app.addr);
        set.spawn(async move {
            http_client
                .post(uri)
                .json(&json!({ "email": format!("user{i}@example.com") }))
                .send()
                .await
        });
    }
    while let Some(res) = set.join_next().await {
        assert_eq!(res??.status(), StatusCode::OK);
    }

    assert_eq!(app.app_state.signup_sink.init_attempts(), 1);
    assert_eq!(app.app_state.signup_sink.state(), SinkState::Ready);

    Ok(())
}
