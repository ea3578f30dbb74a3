use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use waitlist::web::types::StatusCheck;

use crate::helpers::TestApp;

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn status_create_returns_the_stored_check() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.app_state.database_mgr.migrate().await?;

    let res = app
        .http_client
        .post(format!("http://{}/api/status", app.addr))
        .json(&json!({ "client_name": "landing-page" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let created: StatusCheck = res.json().await?;
    assert_eq!(created.client_name, "landing-page");

    let saved = sqlx::query_as::<_, StatusCheck>(
        "SELECT id, client_name, timestamp FROM status_checks WHERE id = $1",
    )
    .bind(created.id)
    .fetch_one(app.app_state.database_mgr.db())
    .await?;
    assert_eq!(saved.client_name, created.client_name);

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn status_list_contains_created_checks() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.app_state.database_mgr.migrate().await?;
    let status_uri = format!("http://{}/api/status", app.addr);

    let client_name = format!("client-{}", uuid::Uuid::new_v4());
    for _ in 0..2 {
        let res = app
            .http_client
            .post(&status_uri)
            .json(&json!({ "client_name": client_name }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app.http_client.get(&status_uri).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let checks: Vec<StatusCheck> = res.json().await?;
    assert_eq!(
        checks
            .iter()
            .filter(|check| check.client_name == client_name)
            .count(),
        2
    );

    Ok(())
}

#[tokio::test]
async fn status_create_without_client_name_unprocessable_entity() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = app
        .http_client
        .post(format!("http://{}/api/status", app.addr))
        .json(&json!({}))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn status_without_database_is_a_service_error() -> Result<()> {
    let app = TestApp::spawn_with(|config| {
        // Nothing listens on the discard port.
        config.db_config.port = 9;
    })
    .await?;

    let res = app
        .http_client
        .get(format!("http://{}/api/status", app.addr))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Service Error!");

    Ok(())
}
